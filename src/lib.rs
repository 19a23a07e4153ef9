#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

#[cfg(feature = "cli")]
mod cli;
mod error;
mod executor;
mod files;
mod pipeline;
mod registry;
#[cfg(feature = "live")]
mod reload;
mod resolver;
#[cfg(all(feature = "server", feature = "live"))]
mod serve;
pub mod tasks;
mod utils;
#[cfg(feature = "live")]
mod watch;

pub use crate::error::*;
pub use crate::executor::{Diagnostics, FailurePolicy, Options, TaskExecution};
pub use crate::files::{FileRecord, glob_base, read_glob, write_if_changed, write_records};
pub use crate::pipeline::{Pipeline, PipelineBuilder};
pub use crate::registry::{Registry, Task, TaskResult, Work};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
#[cfg(feature = "live")]
pub use crate::watch::{Reload, WatchBinding};

/// This value controls whether the pipeline runs in the `Build` or the
/// `Watch` mode. In `Build` mode, the selected task and its prerequisites
/// run just once and the process stops. In `Watch` mode, the pipeline keeps
/// running: it opens up a websocket port, watches the file system, and
/// re-runs the tasks bound to whatever changed, so the browser can
/// live-reload while you edit the styles or the content of your website.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A one-time build.
    Build,
    /// A continuous watch mode for development.
    Watch,
}

/// Global state visible to every work unit during a run.
#[derive(Debug, Clone)]
pub struct Environment {
    /// The name of the generator.
    pub generator: &'static str,
    /// The current build mode (Build or Watch).
    pub mode: Mode,
    /// The port of the live-reload websocket (if running).
    pub port: Option<u16>,
}

impl Environment {
    /// Returns a JavaScript snippet to enable live-reloading.
    ///
    /// If the pipeline is running in `Watch` mode and a port is configured,
    /// this returns a script that connects to the websocket server and
    /// listens for reload events. A `"reload:styles"` message re-links the
    /// stylesheets in place; anything else reloads the page. Embed the
    /// snippet into generated HTML from an html-producing work unit.
    pub fn live_reload_script(&self) -> Option<String> {
        self.port.map(|port| {
            format!(
                r#"
const socket = new WebSocket("ws://localhost:{port}");
socket.addEventListener("message", event => {{
    if (event.data === "reload:styles") {{
        for (const link of document.querySelectorAll("link[rel=stylesheet]")) {{
            const href = new URL(link.href);
            href.searchParams.set("v", Date.now().toString());
            link.href = href.toString();
        }}
    }} else {{
        window.location.reload();
    }}
}});
"#
            )
        })
    }
}
