//! rollout: deployment timeline watcher.
//!
//! Fetches a deployment's timeline, reduces it with `rollout-core` and keeps
//! polling until the deployment settles.

use anyhow::Context;
use clap::Parser;

mod cli;
mod client;
mod cmd_reduce;
mod cmd_resync;
mod cmd_status;
mod cmd_watch;
mod config;
mod context;
mod driver;
mod render;
mod source;
mod view;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("ROLLOUT_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    if let cli::Command::Reduce(opts) = &args.command {
        return cmd_reduce::cmd_reduce(opts);
    }

    let config = config::RuntimeConfig::load(args.config.as_deref(), &args.overrides())
        .context("failed to load configuration")?;

    match &args.command {
        cli::Command::Reduce(_) => {}
        cli::Command::Status(opts) => {
            cmd_status::cmd_status(&config, opts).await?;
        }
        cli::Command::Watch(opts) => {
            let exit_code = cmd_watch::cmd_watch(&config, opts).await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        cli::Command::Resync(target) => {
            cmd_resync::cmd_resync(&config, target).await?;
        }
    }

    Ok(())
}
