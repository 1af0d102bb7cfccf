pub mod actions;
pub mod cli;
pub mod collision;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod dispatch;
pub mod render;
pub mod service;
pub mod session;
pub mod store;
pub mod target;
pub mod task;
pub mod transition;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting dayboard CLI"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;
  debug!(
    base_url = %cfg.service.base_url,
    timezone = %cfg.time.timezone,
    "configuration resolved"
  );

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  let mut renderer =
    render::Renderer::new(&cfg);
  let app = commands::App::connect(
    cfg,
    runtime.handle().clone()
  )?;

  runtime.block_on(commands::execute(
    &app,
    &mut renderer,
    cli.command
  ))?;

  info!("done");
  Ok(())
}
