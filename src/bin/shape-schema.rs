//! Shape Schema CLI
//!
//! Command-line interface for validating payloads against shape definitions
//! and deriving descriptions, samples and JSON Schemas from them.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use shape_schema::{
    conforms, deep_cast, from_definition, load_definition, load_definition_auto,
    load_definition_str, to_json_schema, ConformanceError, Validator,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shape-schema")]
#[command(about = "Validate JSON payloads against composable shape definitions")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Definition source: file path or URL (http:// or https://)
    definition: String,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Output file (stdout if not specified)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a payload and print the validated output
    Validate {
        #[command(flatten)]
        source: Source,

        /// Payload file to validate ("-" reads stdin)
        payload: PathBuf,

        /// Cast the payload and every nested value towards the expected types
        #[arg(long)]
        cast: bool,

        /// Also check the output against the exported JSON Schema
        #[arg(long)]
        verify: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Print the description of a definition
    Describe {
        #[command(flatten)]
        source: Source,
    },

    /// Print a synthesized value accepted by a definition
    Sample {
        #[command(flatten)]
        source: Source,

        /// Print {"value", "description"} instead of the bare value
        #[arg(long)]
        with_description: bool,
    },

    /// Print a definition as a standard JSON Schema
    Export {
        #[command(flatten)]
        source: Source,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Validate {
            source,
            payload,
            cast,
            verify,
            json,
        } => run_validate(&source, &payload, cast, verify, json),
        Commands::Describe { source } => {
            load_validator(&source.definition).and_then(|v| emit(&source, &v.describe()))
        }
        Commands::Sample {
            source,
            with_description,
        } => load_validator(&source.definition).and_then(|v| {
            if with_description {
                let sample = serde_json::to_value(v.sample_with_description()).map_err(|e| {
                    eprintln!("Error serializing output: {}", e);
                    2u8
                })?;
                emit(&source, &sample)
            } else {
                emit(&source, &v.sample())
            }
        }),
        Commands::Export { source } => {
            load_validator(&source.definition).and_then(|v| emit(&source, &to_json_schema(&v)))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_validator(source: &str) -> Result<Validator, u8> {
    let definition = load_definition_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    from_definition(&definition).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn render(value: &Value, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })
}

fn emit(source: &Source, value: &Value) -> Result<(), u8> {
    let rendered = render(value, source.pretty)?;
    match &source.output {
        Some(path) => std::fs::write(path, &rendered).map_err(|e| {
            eprintln!("Error writing to {}: {}", path.display(), e);
            3u8
        }),
        None => {
            println!("{}", rendered);
            Ok(())
        }
    }
}

fn load_payload(path: &Path) -> Result<Value, u8> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content).map_err(|e| {
            eprintln!("Error reading stdin: {}", e);
            3u8
        })?;
        return load_definition_str(&content).map_err(|e| {
            eprintln!("Error: loading payload: {}", e);
            e.exit_code() as u8
        });
    }
    load_definition(path).map_err(|e| {
        eprintln!("Error: loading payload: {}", e);
        e.exit_code() as u8
    })
}

fn run_validate(
    source: &Source,
    payload_path: &Path,
    cast: bool,
    verify: bool,
    json_output: bool,
) -> Result<(), u8> {
    let mut validator = load_validator(&source.definition)?;
    if cast {
        validator = deep_cast(validator);
    }
    let payload = load_payload(payload_path)?;

    let output = match validator.validate(payload) {
        Ok(output) => output,
        Err(violations) => {
            if json_output {
                let report = serde_json::json!({
                    "valid": false,
                    "issues": violations.issues(),
                });
                println!("{}", render(&report, source.pretty)?);
            } else {
                eprintln!("Validation failed:");
                for issue in violations.issues() {
                    eprintln!("  {}", issue);
                }
            }
            return Err(1);
        }
    };

    if verify {
        match conforms(&validator, &output) {
            Ok(()) => {}
            Err(ConformanceError::Invalid { errors }) => {
                eprintln!("Output does not conform to its description:");
                for error in errors {
                    eprintln!("  {}", error);
                }
                return Err(1);
            }
            Err(e @ ConformanceError::InvalidSchema { .. }) => {
                eprintln!("Error: {}", e);
                return Err(2);
            }
        }
    }

    if json_output {
        let report = serde_json::json!({ "valid": true, "output": output });
        emit(source, &report)
    } else {
        emit(source, &output)
    }
}
