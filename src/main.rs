//! Operator CLI: offline checks for tool sources, match patterns and
//! argument schemas.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use pagebridge_schema_validator::validate;
use pagebridge_script_meta::{parse_source, url_admitted, SourceKind};

#[derive(Parser)]
#[command(name = "pagebridge", version, about = "Coordinator/page capability bridge tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a tool source file and print its metadata.
    CheckTool {
        /// Path to the tool source.
        path: PathBuf,
        /// Apply the stricter rules for externally authored sources.
        #[arg(long)]
        external: bool,
    },
    /// Decide whether a URL is admitted by match and exclude patterns.
    MatchUrl {
        url: String,
        /// Match pattern, repeatable.
        #[arg(long = "match", value_name = "PATTERN")]
        matches: Vec<String>,
        /// Exclude pattern, repeatable.
        #[arg(long = "exclude", value_name = "PATTERN")]
        excludes: Vec<String>,
    },
    /// Validate a JSON value against a schema and print the issues.
    Validate {
        /// Schema as inline JSON.
        #[arg(long)]
        schema: String,
        /// Value as inline JSON.
        #[arg(long)]
        value: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::CheckTool { path, external } => {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let kind = if external {
                SourceKind::External
            } else {
                SourceKind::Builtin
            };
            match parse_source(&source, kind) {
                Ok(metadata) => {
                    let report = json!({
                        "ok": true,
                        "name": metadata.name,
                        "namespace": metadata.namespace,
                        "qualifiedName": metadata.qualified_name(),
                        "version": metadata.version,
                        "description": metadata.description,
                        "match": metadata.match_patterns,
                        "exclude": metadata.exclude_patterns,
                        "schema": metadata.schema,
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    let report = json!({ "ok": false, "error": err.to_string() });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::MatchUrl {
            url,
            matches,
            excludes,
        } => {
            let admitted = url_admitted(&url, &matches, &excludes);
            println!("{}", json!({ "url": url, "admitted": admitted }));
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { schema, value } => {
            let schema: Value = serde_json::from_str(&schema).context("parsing --schema")?;
            let value: Value = serde_json::from_str(&value).context("parsing --value")?;
            let issues = validate(&schema, &value);
            let report = json!({
                "valid": issues.is_empty(),
                "issues": issues,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if issues.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
