//! Command-line entry point for pipelines.
//!
//! A consumer binary declares its [`Pipeline`](crate::Pipeline) and hands
//! control to [`Pipeline::main`], which parses the process arguments and
//! runs the selected task. Exit code is zero on success and nonzero on any
//! declaration, resolution, build or watch error.

use std::num::NonZeroUsize;
use std::process::ExitCode;

use clap::Parser;
use console::style;

use crate::Pipeline;
use crate::error::MillraceError;

#[derive(Parser, Debug)]
#[command(about = "Static site asset pipeline", version)]
struct Args {
    /// Task to run; falls back to the task marked as default.
    task: Option<String>,

    /// Rebuild on file changes and serve with live reload.
    #[cfg(feature = "live")]
    #[arg(short, long)]
    watch: bool,

    /// Cap on concurrently running tasks within a level.
    #[arg(short, long)]
    jobs: Option<NonZeroUsize>,
}

impl Pipeline {
    /// Parses the process arguments and drives the pipeline to completion.
    pub fn main(mut self) -> ExitCode {
        let args = Args::parse();

        if let Some(jobs) = args.jobs {
            self.options.parallelism = Some(jobs);
        }

        #[cfg(feature = "live")]
        if args.watch {
            return match self.watch(args.task.as_deref()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => report(&err),
            };
        }

        let result = match &args.task {
            Some(name) => self.run(name),
            None => self.run_default(),
        };

        match result {
            Ok(diagnostics) => {
                for (name, duration) in diagnostics.slowest_first() {
                    tracing::debug!("task '{name}' took {duration:.2?}");
                }
                ExitCode::SUCCESS
            }
            Err(err) => report(&err),
        }
    }
}

fn report(err: &MillraceError) -> ExitCode {
    eprintln!("{} {err}", style("error:").red().bold());
    ExitCode::FAILURE
}
