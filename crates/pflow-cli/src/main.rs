mod markdown;
mod render;
mod trace;

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use pflow_core::executor::Executor;
use pflow_core::registry::NodeRegistry;
use pflow_core::wrapper::ResolutionMode;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "pflow", version, about = "Run a .pflow.md workflow file")]
struct Cli {
    /// Path to a `.pflow.md` workflow file.
    workflow: PathBuf,

    /// Inputs as `key=value` pairs. Values that parse as JSON are typed
    /// accordingly; everything else is taken as a literal string.
    #[arg(value_parser = parse_kv)]
    inputs: Vec<(String, Value)>,

    /// Validate the workflow and exit without running any node.
    #[arg(long)]
    validate_only: bool,

    /// Resolve unresolved template references to their literal text instead
    /// of failing the run.
    #[arg(long)]
    permissive: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output_format: OutputFormat,

    /// Directory to write a JSON execution trace into. If omitted, no trace
    /// file is written.
    #[arg(long)]
    trace_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

fn parse_kv(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let parsed = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = pflow_core::executor::ignore_sigpipe() {
        tracing::warn!("{e}");
    }

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

fn run(cli: &Cli) -> Result<i32, String> {
    let source = fs::read_to_string(&cli.workflow)
        .map_err(|e| format!("failed to read {}: {e}", cli.workflow.display()))?;
    let ir = markdown::parse(&source).map_err(|e| format!("{e}"))?;

    let mut registry = NodeRegistry::new();
    pflow_nodes::register_builtin_nodes(&mut registry);

    let report = pflow_core::validator::validate(&ir, &registry);
    if cli.validate_only {
        return match report {
            Ok((_, report)) => {
                render::print_validation_ok(&report, cli.output_format);
                Ok(0)
            }
            Err(e) => {
                render::print_error(&e, cli.output_format);
                Ok(1)
            }
        };
    }
    if let Err(e) = report {
        render::print_error(&e, cli.output_format);
        return Ok(1);
    }

    let inputs: HashMap<String, Value> = cli.inputs.iter().cloned().collect();
    let input_value = Value::Object(inputs.into_iter().collect());

    let mode = if cli.permissive { ResolutionMode::Permissive } else { ResolutionMode::Strict };
    let executor = Executor::new(&registry);

    match executor.run(&ir, input_value, mode) {
        Ok((shared, exec_trace)) => {
            let outputs = executor
                .materialize_outputs(&ir, &shared)
                .map_err(|e| format!("{e}"))?;

            if let Some(dir) = &cli.trace_dir {
                if let Err(e) = trace::write_trace(dir, &exec_trace, &outputs) {
                    tracing::warn!("failed to write execution trace: {e}");
                }
            }

            render::print_result(&exec_trace, &outputs, cli.output_format);
            Ok(0)
        }
        Err(e) => {
            render::print_error(&e, cli.output_format);
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_kv_inputs() {
        let (k, v) = parse_kv("count=3").unwrap();
        assert_eq!(k, "count");
        assert_eq!(v, Value::from(3));
    }

    #[test]
    fn parses_untyped_kv_inputs_as_string() {
        let (k, v) = parse_kv("name=Ada").unwrap();
        assert_eq!(k, "name");
        assert_eq!(v, Value::String("Ada".to_string()));
    }

    #[test]
    fn rejects_kv_without_equals() {
        assert!(parse_kv("not-a-pair").is_err());
    }
}
