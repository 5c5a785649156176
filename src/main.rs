use clap::{Parser, Subcommand};
use distpack::config::{self, load_config_with_overrides, module_name_override};
use distpack::output;
use distpack::pipeline::Packager;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that build archives.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Ignore the previous manifest and rebuild every archive
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "distpack")]
#[command(about = "Package web build output for web and native delivery")]
#[command(long_about = "\
Package web build output for web and native delivery

Run after the web bundler has written its output. The build directory is
copied to <production>/web and split into three zip archives under
<production>/native:

  dist_production/
  ├── web/                         # full copy of dist/
  └── native/
      ├── module_assets.zip        # images/ and fonts/ trees
      ├── module_low.zip           # vendor-*, vendors~*, runtime-* chunks
      ├── module_high.zip          # everything else
      ├── module.json              # classification of this run
      └── zips_content_hash.json   # archive name → fingerprint

Archives whose bucket did not change since the last run are left untouched.

Set RUST_LOG=debug to see why each bucket was rebuilt.
Run 'distpack gen-config' to generate a documented distpack.toml.")]
#[command(version)]
struct Cli {
    /// Project root containing distpack.toml and the build output
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Archive name prefix (overrides distpack.toml)
    #[arg(long, global = true)]
    module_name: Option<String>,

    /// Log debug detail to stderr when RUST_LOG is not set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish the web copy and build the native archives
    Package(CacheArgs),
    /// Replace the web output with a copy of the build output
    Web,
    /// Build changed native archives and write the manifests
    Native(CacheArgs),
    /// Show how the build output would be bucketed, without writing anything
    Classify,
    /// Print a stock distpack.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Package(cache_args) => {
            let packager = packager(&cli)?;
            println!("==> Publishing web files");
            let web = packager.publish_web()?;
            output::print_web_report(&web);

            println!("==> Packaging native archives");
            let native = packager.package_native(!cache_args.no_cache)?;
            output::print_native_report(&native);
        }
        Command::Web => {
            let web = packager(&cli)?.publish_web()?;
            output::print_web_report(&web);
        }
        Command::Native(cache_args) => {
            let native = packager(&cli)?.package_native(!cache_args.no_cache)?;
            output::print_native_report(&native);
        }
        Command::Classify => {
            let classification = packager(&cli)?.classify()?;
            output::print_classification(&classification);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Resolve config for the project root, with CLI flags as the top layer.
fn packager(cli: &Cli) -> Result<Packager, config::ConfigError> {
    let overrides = module_name_override(cli.module_name.as_deref());
    let config = load_config_with_overrides(&cli.root, overrides)?;
    Ok(Packager::new(&cli.root, &config))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "distpack=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
