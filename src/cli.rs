//! Command-line interface.
//!
//! Parses arguments with clap and dispatches to the dev and deploy
//! orchestrators. Configuration is resolved here and handed down explicitly.

use crate::config::{self, ConfigStore, Tools};
use crate::deploy::{Deploy, DeployAction};
use crate::dev::{self, DevAction, DevOptions};
use crate::error::Result;
use crate::shell::Runner;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// 🐳 Moby - Docker Project Manager
#[derive(Parser, Debug)]
#[command(name = "moby")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to .moby.yaml (defaults to the one next to the installation)
    #[arg(long, global = true, env = "MOBY_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage development environment
    Dev(DevArgs),
    /// Deploy to ECR
    Deploy(DeployArgs),
    /// Show version information
    Version,
}

#[derive(Args, Debug)]
#[command(after_help = "Examples:
  moby dev start variant-be
  moby dev logs variant-be --follow
  moby dev rebuild variant-be --port 3000
  moby dev ps
  moby dev prune")]
pub struct DevArgs {
    #[arg(value_enum)]
    pub action: DevAction,

    /// Project name from .moby.yaml (optional for ps and prune)
    pub project: Option<String>,

    /// Port to publish (default: first port in .moby.yaml)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Follow logs (only with logs)
    #[arg(short, long)]
    pub follow: bool,
}

#[derive(Args, Debug)]
#[command(after_help = "Examples:
  moby deploy all variant-be --version v1.0.0
  moby deploy build variant-be
  moby deploy push variant-be --version v1.0.0")]
pub struct DeployArgs {
    #[arg(value_enum)]
    pub action: DeployAction,

    /// Project name from .moby.yaml
    pub project: String,

    /// Version tag (defaults to git hash)
    #[arg(short = 't', long, visible_alias = "tag")]
    pub version: Option<String>,

    /// AWS region (defaults to AWS CLI config)
    #[arg(short, long)]
    pub region: Option<String>,
}

pub struct Context<R: Runner> {
    pub store: ConfigStore,
    pub runner: R,
    pub tools: Tools,
}

impl<R: Runner> Context<R> {
    pub fn new(config_path: Option<PathBuf>, runner: R, tools: Tools) -> Self {
        let path = config_path.unwrap_or_else(config::default_config_path);
        Context {
            store: ConfigStore::new(path),
            runner,
            tools,
        }
    }
}

pub async fn execute<R: Runner>(command: Option<Commands>, ctx: &mut Context<R>) -> Result<()> {
    match command {
        None => {
            print_help();
            Ok(())
        }
        Some(Commands::Version) => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Dev(args)) => run_dev(args, ctx).await,
        Some(Commands::Deploy(args)) => run_deploy(args, ctx).await,
    }
}

fn print_help() {
    // Nothing useful to do if stdout is gone.
    let _ = Cli::command().print_help();
}

async fn run_dev<R: Runner>(args: DevArgs, ctx: &mut Context<R>) -> Result<()> {
    let project = args
        .project
        .as_deref()
        .map(|name| ctx.store.resolve(name))
        .transpose()?;
    let opts = DevOptions {
        port: args.port,
        follow: args.follow,
    };

    dev::run(&ctx.runner, &ctx.tools, args.action, project.as_ref(), opts).await
}

async fn run_deploy<R: Runner>(args: DeployArgs, ctx: &mut Context<R>) -> Result<()> {
    let project = ctx.store.resolve(&args.project)?;
    Deploy::new(&ctx.runner, &ctx.tools, &project, args.version, args.region)
        .run(args.action)
        .await
}
