use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use codebuddy_script::{
    execute_script_file, generate_template, validate_script, Error, ScriptConfig, ScriptResult,
};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script
    Run(RunArgs),

    /// Check a script for syntax errors without running it
    Validate {
        /// Path to the script
        file: PathBuf,
    },

    /// Print a starter script
    Template {
        /// Name of the automation
        name: String,

        /// One-line description placed in the header
        #[arg(short, long)]
        description: Option<String>,
    },
}

#[derive(Parser)]
struct RunArgs {
    /// Path to the script
    file: PathBuf,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report file and shell mutations instead of performing them
    #[arg(long)]
    dry_run: bool,

    /// Timeout in milliseconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Run test blocks and echo streamed process output
    #[arg(short, long)]
    verbose: bool,

    /// Enable exec/shell/bash builtins
    #[arg(long)]
    enable_bash: bool,

    /// Enable ai builtins
    #[arg(long)]
    enable_ai: bool,

    /// Disable file builtins
    #[arg(long)]
    no_file_ops: bool,

    /// Print the whole result as JSON
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn config(&self) -> Result<ScriptConfig, Error> {
        let mut config = match &self.config {
            Some(path) => ScriptConfig::from_file(path)?,
            None => ScriptConfig::default(),
        };
        config.dry_run |= self.dry_run;
        config.verbose |= self.verbose;
        config.enable_bash |= self.enable_bash;
        config.enable_ai |= self.enable_ai;
        if self.no_file_ops {
            config.enable_file_ops = false;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Duration::from_millis(timeout);
        }
        Ok(config)
    }
}

fn report(result: &ScriptResult, json: bool) -> Result<(), Error> {
    if json {
        let rendered = serde_json::to_string_pretty(result)
            .map_err(|e| Error::internal(format!("Failed to render result: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    for line in &result.output {
        println!("{}", line);
    }
    if let Some(value) = &result.return_value {
        println!("=> {}", value);
    }
    if let Some(error) = &result.error {
        eprintln!("Error: {}", error);
    }
    Ok(())
}

/// Returns whether the command succeeded.
async fn run(cli: &Cli) -> Result<bool, Error> {
    match &cli.command {
        Commands::Run(args) => {
            let config = args.config()?;
            debug!(?config, "config loaded");
            let result = execute_script_file(&args.file, config).await;
            info!(
                success = result.success,
                duration_ms = result.duration_ms,
                "script finished"
            );
            report(&result, args.json)?;
            Ok(result.success && result.failed_tests().is_empty())
        }
        Commands::Validate { file } => {
            let source = std::fs::read_to_string(file).map_err(|e| {
                Error::internal(format!("Failed to read {}: {}", file.display(), e))
            })?;
            let validation = validate_script(&source);
            if validation.valid {
                println!("{}: OK", file.display());
            } else {
                for error in &validation.errors {
                    eprintln!("{}: {}", file.display(), error);
                }
            }
            Ok(validation.valid)
        }
        Commands::Template { name, description } => {
            print!("{}", generate_template(name, description.as_deref()));
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
