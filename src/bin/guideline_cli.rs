//! Guideline Command Line Interface
//!
//! Compiles rule trees to DSL source and runs the generate/validate loop on
//! guideline text.
//!
//! # Usage
//!
//! ```bash
//! # Compile a node JSON to DSL source
//! guideline_cli compile --file rule.json
//!
//! # Generate, validate and compile a guideline with the configured LLM
//! GUIDELINE_BACKEND=anthropic guideline_cli orchestrate --file guideline.txt
//!
//! # Same, with attempt budget and allowed kinds from YAML
//! guideline_cli orchestrate --file guideline.txt --config orchestrator.yaml
//!
//! # List node kinds
//! guideline_cli kinds
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use guideline_builder::constraint_core::NodeKind;
use guideline_builder::guideline_agentic::{FeedbackLoop, OrchestratorConfig, ParsedGuideline};
use guideline_builder::{compile_node_json, GuidelineError};

#[derive(Parser)]
#[command(name = "guideline_cli")]
#[command(version = "0.1.0")]
#[command(about = "Compile mortgage guidelines into rule-DSL constraints")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json or text (default)
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a node JSON to DSL source
    Compile {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Generate, validate and compile guideline text
    Orchestrate {
        /// Guideline text file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Guideline title, prepended to the text
        #[arg(long)]
        title: Option<String>,

        /// Orchestrator YAML (environment overrides when absent)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List node kinds
    Kinds,
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { file } => cmd_compile(file, cli.format),
        Commands::Orchestrate {
            file,
            title,
            config,
        } => cmd_orchestrate(file, title, config, cli.format).await,
        Commands::Kinds => cmd_kinds(cli.format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_compile(file: Option<PathBuf>, format: OutputFormat) -> anyhow::Result<()> {
    let json = read_input(file)?;
    let source = compile_node_json(&json)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "source": source })),
        OutputFormat::Text => println!("{}", source),
    }
    Ok(())
}

async fn cmd_orchestrate(
    file: Option<PathBuf>,
    title: Option<String>,
    config: Option<PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => OrchestratorConfig::from_yaml_file(path),
        None => OrchestratorConfig::from_env(),
    }
    .map_err(GuidelineError::from)?;
    let body = read_input(file)?;
    let run = FeedbackLoop::with_llm(config)?;

    let compiled = match title {
        Some(title) => run.compile_parsed(&ParsedGuideline::new(title, body)).await,
        None => run.compile_guideline(body.trim()).await,
    }
    .map_err(GuidelineError::from)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&compiled)?),
        OutputFormat::Text => {
            eprintln!(
                "{} accepted after {} attempt(s)",
                "OK".green().bold(),
                compiled.attempts
            );
            println!("{}", compiled.source);
        }
    }
    Ok(())
}

fn cmd_kinds(format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let kinds: Vec<_> = NodeKind::ALL
                .iter()
                .map(|k| serde_json::json!({ "kind": k.as_str(), "constraint": k.is_constraint() }))
                .collect();
            println!("{}", serde_json::Value::Array(kinds));
        }
        OutputFormat::Text => {
            for kind in NodeKind::ALL {
                let role = if kind.is_constraint() { "rule" } else { "operand" };
                println!("{:<26} {}", kind.as_str(), role.dimmed());
            }
        }
    }
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn read_input(file: Option<PathBuf>) -> Result<String, GuidelineError> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            if atty::is(atty::Stream::Stdin) {
                return Err(GuidelineError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "no input provided; use --file or pipe input via stdin",
                )));
            }
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}
