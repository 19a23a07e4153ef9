use std::process::ExitCode;

use millrace::{MillraceError, Pipeline, Reload, Work, tasks};

fn pipeline() -> Result<Pipeline, MillraceError> {
    Ok(Pipeline::design()
        .task("clean", &[], tasks::clean("dist"))?
        .task(
            "styles",
            &["clean"],
            tasks::styles("app/styles/**/*.scss", "dist/styles"),
        )?
        .task(
            "scripts",
            &["clean"],
            tasks::scripts("app/scripts/**/*.js", "dist/scripts"),
        )?
        .task(
            "images",
            &["clean"],
            tasks::images("app/images/*.png", "dist/images"),
        )?
        .task(
            "svg",
            &["clean"],
            tasks::svg_sprite("app/images/svg/*.svg", "dist/images/svg/sprite.svg", "icon-"),
        )?
        .task("copy", &["clean"], tasks::copy("app/*.txt", "dist"))?
        // HTML links the compiled styles and scripts, so it goes after them.
        .task("html", &["styles", "scripts"], tasks::html("app/**/*.html", "dist"))?
        .default_task(
            "build",
            &["html", "images", "svg", "copy"],
            Work::noop(),
        )?
        .watch("app/styles/**/*.scss", &["styles"], Reload::Styles)?
        .watch("app/scripts/**/*.js", &["scripts"], Reload::Page)?
        .watch("app/**/*.html", &["html"], Reload::Page)?
        .watch("app/images/**/*", &["images", "svg"], Reload::Page)?
        .finish())
}

fn main() -> ExitCode {
    match pipeline() {
        Ok(pipeline) => pipeline.main(),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
