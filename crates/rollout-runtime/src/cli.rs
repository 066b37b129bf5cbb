//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rollout_core::types::{EnvKind, ViewKey};

use crate::config::Overrides;

#[derive(Parser)]
#[command(name = "rollout", about = "deployment timeline watcher", version)]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/rollout/config.toml)
    #[arg(long, global = true, env = "ROLLOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// API root, e.g. https://ci.example.com/orchestrator
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// API token sent in the `token` header
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        let poll = match &self.command {
            Command::Watch(opts) => opts.poll_interval_ms,
            _ => None,
        };
        Overrides {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            poll_in_progress_ms: poll,
            poll_idle_ms: None,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Reduce a saved timeline response (file or stdin)
    Reduce(ReduceOpts),
    /// Fetch and print the current status once
    Status(StatusOpts),
    /// Poll until the deployment settles
    Watch(WatchOpts),
    /// Ask the backend to re-sync a timed-out status
    Resync(TargetOpts),
}

/// Which deployment to observe.
#[derive(Args, Clone, Debug)]
pub struct TargetOpts {
    #[arg(long)]
    pub app_id: u64,

    #[arg(long)]
    pub env_id: u64,

    /// Specific deployment attempt (default: latest)
    #[arg(long)]
    pub attempt_id: Option<u64>,

    /// Helm-installed app (app-store endpoints)
    #[arg(long)]
    pub helm: bool,
}

impl TargetOpts {
    pub fn view_key(&self) -> ViewKey {
        let mut key = ViewKey::new(self.app_id, self.env_id);
        if let Some(attempt) = self.attempt_id {
            key = key.with_attempt(attempt);
        }
        if self.helm {
            key = key.helm();
        }
        key
    }
}

#[derive(Args, Clone, Debug, Default)]
pub struct OutputOpts {
    /// Target is a virtual environment (helm package only)
    #[arg(long = "virtual")]
    pub virtual_env: bool,

    /// Print the model as JSON
    #[arg(long)]
    pub json: bool,

    /// Color output: auto, always, never
    #[arg(long, default_value = "auto")]
    pub color: String,
}

impl OutputOpts {
    pub fn env_kind(&self) -> EnvKind {
        if self.virtual_env {
            EnvKind::Virtual
        } else {
            EnvKind::Live
        }
    }
}

#[derive(Args)]
pub struct ReduceOpts {
    /// Response body to reduce; `-` or absent reads stdin
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Reference time for relative timestamps (RFC 3339, default: now)
    #[arg(long)]
    pub now: Option<String>,

    #[command(flatten)]
    pub output: OutputOpts,
}

#[derive(Args)]
pub struct StatusOpts {
    #[command(flatten)]
    pub target: TargetOpts,

    #[command(flatten)]
    pub output: OutputOpts,
}

#[derive(Args)]
pub struct WatchOpts {
    #[command(flatten)]
    pub target: TargetOpts,

    #[command(flatten)]
    pub output: OutputOpts,

    /// Override the in-progress poll interval
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}
