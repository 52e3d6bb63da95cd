mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_CONVERSION_ERROR, EXIT_FAILURE};
use opam2esy_core::{ConversionConfig, Converter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "opam2esy",
    version,
    about = "Convert opam package descriptions into esy package.json manifests"
)]
struct Cli {
    /// Conversion config TOML file; keys it sets replace the built-in tables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert one opam package directory (opam, url, files/).
    Convert {
        /// Package directory, usually named `<name>.<version>`.
        dir: PathBuf,
        /// Package name (defaults to the directory name before the first dot).
        #[arg(long)]
        name: Option<String>,
        /// Package version (defaults to the directory name after the first dot).
        #[arg(long)]
        package_version: Option<String>,
        /// Write the manifest to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert every package of an opam repository `packages/` directory.
    ConvertRepo {
        /// Directory laid out as `<name>/<name>.<version>/`.
        packages_dir: PathBuf,
        /// Output root; manifests land in `<name>/<version>/package.json`.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List the configured per-package overrides.
    Overrides {
        /// Only show overrides for this package.
        package: Option<String>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn load_config(path: Option<&Path>) -> Result<ConversionConfig, String> {
    match path {
        Some(path) => ConversionConfig::load(path)
            .map_err(|e| format!("config error: {}: {e}", path.display())),
        None => Ok(ConversionConfig::builtin()),
    }
}

fn run(command: Commands, config_path: Option<&Path>, json_output: bool) -> Result<u8, String> {
    match command {
        Commands::Convert {
            dir,
            name,
            package_version,
            output,
        } => commands::convert::run(
            &Converter::new(load_config(config_path)?),
            &dir,
            name.as_deref(),
            package_version.as_deref(),
            output.as_deref(),
            json_output,
        ),
        Commands::ConvertRepo {
            packages_dir,
            output,
        } => commands::convert_repo::run(
            &Converter::new(load_config(config_path)?),
            &packages_dir,
            &output,
            json_output,
        ),
        Commands::Overrides { package } => {
            commands::overrides::run(&load_config(config_path)?, package.as_deref(), json_output)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("OPAM2ESY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;

    let result = run(cli.command, cli.config.as_deref(), json_output);

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("conversion error:") {
                EXIT_CONVERSION_ERROR
            } else if msg.starts_with("config error:") {
                EXIT_CONFIG_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
