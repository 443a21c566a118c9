//! Stop instances, snapshot their volumes, and start them again.
#![deny(missing_docs)]

// The cmd_* modules are public so that missing docs on them are caught.

mod api_client;
mod cmd;
/// The completion command.
pub mod cmd_completion;
/// The config command.
pub mod cmd_config;
/// The instances command.
pub mod cmd_instance;
/// The snapshots command.
pub mod cmd_snapshot;
/// The volumes command.
pub mod cmd_volume;
mod colors;
mod config;
mod config_file;
mod config_from_env;
mod config_from_file;
mod config_map;
mod context;
mod iostreams;
mod orchestrator;
mod provider;
mod query;
mod snapshots;
#[cfg(test)]
mod test_provider;
mod types;

use std::io::Write;

use anyhow::Result;
use clap::Parser;
use slog::Drain;

/// Snapshot the volumes of your compute instances from the command line.
///
/// Every instance is stopped before its volumes are snapshotted and started
/// again afterwards, so the snapshots are consistent.
///
/// Environment variables that can be used with shotty.
///
/// SHOTTY_PROFILE: the credential profile to use, instead of the default one.
///
/// SHOTTY_HOST: the compute API host. Takes precedence over the host of the
/// profile in use.
///
/// SHOTTY_TOKEN: an API token. Takes precedence over the token of the
/// profile in use.
///
/// DEBUG: set to any value to enable verbose output to standard error.
///
/// NO_COLOR: set to any value to avoid printing ANSI escape sequences for color output.
///
/// CLICOLOR: set to "0" to disable printing ANSI colors in output.
///
/// CLICOLOR_FORCE: set to a value other than "0" to keep ANSI colors in output
/// even when the output is piped.
///
/// SHOTTY_CONFIG_DIR: the directory where shotty keeps its configuration files.
/// Default: "$XDG_CONFIG_HOME/shotty" or "$HOME/.config/shotty".
#[derive(Parser, Debug, Clone)]
#[clap(version = clap::crate_version!(), author = clap::crate_authors!("\n"))]
struct Opts {
    /// Print debug info
    #[clap(short, long, global = true, env)]
    debug: bool,

    /// The credential profile to use
    #[clap(long, global = true, env = "SHOTTY_PROFILE")]
    profile: Option<String>,

    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug, Clone)]
enum SubCommand {
    Instances(cmd_instance::CmdInstance),
    Volumes(cmd_volume::CmdVolume),
    Snapshots(cmd_snapshot::CmdSnapshot),
    Config(cmd_config::CmdConfig),
    Completion(cmd_completion::CmdCompletion),
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    // The logger has to exist before anything logs, so peek at --debug first.
    let debug = Opts::try_parse_from(&args).map(|opts| opts.debug).unwrap_or(false);
    let guard = match init_logger(debug) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to set up logging: {}", err);
            std::process::exit(1);
        }
    };

    let mut c = match crate::config_file::parse_default_config() {
        Ok(c) => c,
        Err(err) => {
            eprintln!("{:#}", err);
            drop(guard);
            std::process::exit(1);
        }
    };
    let mut config = crate::config_from_env::EnvConfig::inherit_env(&mut c);
    let mut ctx = crate::context::Context::new(&mut config);

    let (handle, cancel) = crate::orchestrator::Cancellation::new();
    ctx.cancel = cancel;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupted, finishing the instance in progress");
            handle.cancel();
        }
    });

    let code = match do_main(args, &mut ctx).await {
        Ok(code) => code,
        Err(err) => {
            let _ = writeln!(ctx.io.err_out, "{}", err);
            1
        }
    };

    // Flush the async drain before exiting.
    drop(guard);
    std::process::exit(code);
}

fn init_logger(debug: bool) -> Result<slog_scope::GlobalLoggerGuard> {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    let level = if debug { slog::Level::Debug } else { slog::Level::Warning };
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let logger = slog::Logger::root(drain, slog::o!());

    let guard = slog_scope::set_global_logger(logger);
    slog_stdlog::init_with_level(if debug { log::Level::Debug } else { log::Level::Warn })?;

    Ok(guard)
}

/// Parses `args` and runs the command. Returns the exit code for usage
/// errors, help and version output; command failures come back as `Err`.
async fn do_main(args: Vec<String>, ctx: &mut crate::context::Context<'_>) -> Result<i32> {
    let opts = match Opts::try_parse_from(args) {
        Ok(opts) => opts,
        Err(err) => {
            let code = if err.use_stderr() {
                write!(ctx.io.err_out, "{}", err)?;
                2
            } else {
                write!(ctx.io.out, "{}", err)?;
                0
            };
            return Ok(code);
        }
    };

    ctx.debug = opts.debug;
    if opts.profile.is_some() {
        ctx.profile = opts.profile.clone();
    }

    match opts.subcmd {
        SubCommand::Instances(cmd) => run_cmd(&cmd, ctx).await,
        SubCommand::Volumes(cmd) => run_cmd(&cmd, ctx).await,
        SubCommand::Snapshots(cmd) => run_cmd(&cmd, ctx).await,
        SubCommand::Config(cmd) => run_cmd(&cmd, ctx).await,
        SubCommand::Completion(cmd) => run_cmd(&cmd, ctx).await,
    }
}

async fn run_cmd(cmd: &(impl crate::cmd::Command + Sync), ctx: &mut crate::context::Context<'_>) -> Result<i32> {
    cmd.run(ctx).await?;
    Ok(0)
}
