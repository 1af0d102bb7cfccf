use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dayboard",
    version,
    about = "Dayboard: move tasks between lists, projects and calendar slots",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the tasks in a view.
    List {
        #[arg(long, default_value = "all")]
        view: String,

        #[arg(long)]
        json: bool,
    },

    /// Show one task.
    Show { id: String },

    /// Create a task in the inbox.
    Add {
        title: String,

        #[arg(long)]
        project: Option<String>,
    },

    /// Drop a task on a target, e.g. `status:today` or `date:2024-03-10`.
    Move { id: String, target: String },

    /// Print the update a drop would send, without sending it.
    Preview { id: String, target: String },

    /// Resolve the drop target under a pointer rectangle against a layout
    /// file.
    Resolve {
        #[arg(long)]
        layout: PathBuf,

        /// `x,y,width,height`
        #[arg(long)]
        pointer: String,
    },

    /// Toggle between done and todo.
    Toggle { id: String },

    /// Move a task to the trash.
    Delete { id: String },

    /// Bring a task back from the trash.
    Restore { id: String },

    /// Delete a task for good.
    Purge { id: String },

    /// List projects.
    Projects,

    /// Create a project.
    ProjectAdd {
        name: String,

        #[arg(long)]
        color: Option<String>,
    },

    /// Delete a project and detach its tasks.
    ProjectDelete { id: String },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
