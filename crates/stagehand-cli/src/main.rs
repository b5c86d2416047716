mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::exit_code_for;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "stagehand",
    version,
    about = "Compile a stagehand project into multi-stage container build artifacts"
)]
struct Cli {
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
    /// Generate Dockerfiles, the compose manifest, and hook wrappers.
    Compile {
        /// Path to the project configuration (TOML or YAML).
        #[arg(default_value = "stagehand.toml")]
        config: PathBuf,
        /// Directory that receives the build context.
        #[arg(short, long, default_value = "build")]
        output: PathBuf,
        /// stagehand-entry binary to place in the build context.
        #[arg(long)]
        entry_binary: Option<PathBuf>,
    },
    /// Validate a configuration without writing anything.
    Check {
        /// Path to the project configuration (TOML or YAML).
        #[arg(default_value = "stagehand.toml")]
        config: PathBuf,
    },
    /// Show the resolved project.
    Inspect {
        /// Path to the project configuration (TOML or YAML).
        #[arg(default_value = "stagehand.toml")]
        config: PathBuf,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
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
            tracing_subscriber::EnvFilter::try_from_env("STAGEHAND_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;
    let result = match cli.command {
        Commands::Compile {
            config,
            output,
            entry_binary,
        } => commands::compile::run(&config, &output, entry_binary.as_deref(), json_output),
        Commands::Check { config } => commands::check::run(&config, json_output),
        Commands::Inspect { config } => commands::inspect::run(&config, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}
