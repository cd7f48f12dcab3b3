use acibox::cli::{self, CliContext, Lifecycle, RuntimeAction, RuntimeFlags, TargetArgs};
use acibox::domain::ImageRuntime;
use acibox::infra::config::default_config_dir;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "acibox", version, about = "Build, test and install ACI images and pods")]
struct Cli {
    /// Configuration directory (default: ~/.config/acibox)
    #[arg(long, env = "ACIBOX_CONFIG_DIR", default_value_os_t = default_config_dir())]
    config_dir: PathBuf,

    /// Log debug output, also passed on to the runtime
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    runtime: RuntimeFlags,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the image (or every app of the pod) in a directory
    Build(TargetArgs),
    /// Remove build outputs
    Clean(TargetArgs),
    /// Run the test suite through the tester image
    Test(TargetArgs),
    /// Import the built image into the runtime store
    Install(TargetArgs),
    /// Print tool and runtime versions
    Version,
    #[command(flatten)]
    Runtime(RuntimeAction),
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = CliContext::load(&cli.config_dir, &cli.runtime)?;

    match cli.command {
        Commands::Build(args) => cli::build::run(Lifecycle::Build, &args, ctx.build_context()),
        Commands::Clean(args) => cli::build::run(Lifecycle::Clean, &args, ctx.build_context()),
        Commands::Test(args) => cli::build::run(Lifecycle::Test, &args, ctx.build_context()),
        Commands::Install(args) => {
            cli::build::run(Lifecycle::Install, &args, ctx.build_context())
        }
        Commands::Version => {
            println!("acibox {}", env!("CARGO_PKG_VERSION"));
            println!("rkt {} ({})", ctx.runtime.version(), ctx.runtime.path()?);
            Ok(())
        }
        Commands::Runtime(action) => cli::runtime::run(action, ctx.runtime.as_ref()),
    }
}
