use std::fs;
use std::path::{Path, PathBuf};

use behavior_canvas::config::EditorConfig;
use behavior_canvas::engine::EngineCore;
use behavior_canvas::error::{ErrorCode, HostError, SessionError};
use behavior_canvas::session::{Host, Outcome, Session, UnsavedChoice};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};

/// Path that means "write to stdout".
const STDOUT: &str = "-";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{}: {}", .0.error_code(), .0)]
    Session(#[from] SessionError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("export cancelled")]
    Cancelled,
}

#[derive(Parser, Debug)]
#[command(name = "bcanvas", about = "Inspect and export behavior-tree canvas documents")]
struct Cli {
    /// Directory holding `nodes.json` and `configs.json`.
    #[arg(long, env = "BT_CANVAS_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a document and report what was kept and dropped.
    Check { doc: PathBuf },
    /// Write one of the runtime export formats.
    Export {
        kind: ExportKind,
        doc: PathBuf,
        #[arg(long, help = "Output file path; stdout when omitted")]
        out: Option<PathBuf>,
    },
    /// List the function templates stored in a document.
    Functions { doc: PathBuf },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ExportKind {
    Canvas,
    Trees,
    Blackboards,
}

/// File-system host. Dialogs are answered from the command line.
struct FsHost {
    catalog_dir: Option<PathBuf>,
    out: Option<PathBuf>,
}

impl Host for FsHost {
    fn confirm_unsaved(&mut self) -> UnsavedChoice {
        UnsavedChoice::Discard
    }

    fn pick_open_path(&mut self) -> Option<PathBuf> {
        None
    }

    fn pick_save_path(&mut self, _default_name: &str) -> Option<PathBuf> {
        Some(self.out.clone().unwrap_or_else(|| PathBuf::from(STDOUT)))
    }

    fn read_file(&mut self, path: &Path) -> Result<String, HostError> {
        Ok(fs::read_to_string(path)?)
    }

    fn write_file(&mut self, path: &Path, contents: &str) -> Result<(), HostError> {
        if path == Path::new(STDOUT) {
            println!("{contents}");
            return Ok(());
        }
        Ok(fs::write(path, contents)?)
    }

    fn fetch_catalog(&mut self) -> Result<(String, String), HostError> {
        let Some(dir) = &self.catalog_dir else {
            return Err(HostError::Other("no catalog directory configured".to_owned()));
        };
        let nodes = fs::read_to_string(dir.join("nodes.json"))?;
        let configs = fs::read_to_string(dir.join("configs.json"))?;
        Ok((nodes, configs))
    }
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let out = match &cli.command {
        Command::Export { out, .. } => out.clone(),
        _ => None,
    };
    let host = FsHost { catalog_dir: cli.catalog.clone(), out };
    let mut session = Session::new(EngineCore::with_config(EditorConfig::from_env()), host);
    if cli.catalog.is_some() {
        session.load_catalog()?;
    }

    match cli.command {
        Command::Check { doc } => run_check(&mut session, &doc),
        Command::Export { kind, doc, .. } => run_export(&mut session, kind, &doc),
        Command::Functions { doc } => run_functions(&mut session, &doc),
    }
}

fn run_check(session: &mut Session<FsHost>, doc: &Path) -> Result<(), CliError> {
    let report = session.open_path(doc)?;
    let engine = &session.engine;
    let unknown_types: Vec<Value> = match &engine.catalog {
        Some(catalog) => engine
            .graph
            .nodes()
            .iter()
            .filter(|n| !n.is_custom_kind() && catalog.lookup(n.category, &n.type_name).is_none())
            .map(|n| json!({ "id": n.id, "category": n.category, "type": n.type_name }))
            .collect(),
        None => Vec::new(),
    };
    print_json(&json!({
        "nodes": engine.graph.len(),
        "connections": engine.graph.connections().len(),
        "functions": engine.templates.len(),
        "nodes_loaded": report.nodes_loaded,
        "nodes_skipped": report.nodes_skipped,
        "connections_loaded": report.connections_loaded,
        "connections_dropped": report.connections_dropped,
        "names_cleared": report.names_cleared,
        "clean": report.is_clean() && unknown_types.is_empty(),
        "unknown_types": unknown_types,
    }))
}

fn run_export(session: &mut Session<FsHost>, kind: ExportKind, doc: &Path) -> Result<(), CliError> {
    session.open_path(doc)?;
    let outcome = match kind {
        ExportKind::Canvas => session.export_canvas()?,
        ExportKind::Trees => session.export_trees()?,
        ExportKind::Blackboards => session.export_blackboards()?,
    };
    match outcome {
        Outcome::Completed => Ok(()),
        Outcome::Cancelled => Err(CliError::Cancelled),
    }
}

fn run_functions(session: &mut Session<FsHost>, doc: &Path) -> Result<(), CliError> {
    session.open_path(doc)?;
    let functions: Vec<Value> = session
        .engine
        .templates
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "nodes": t.nodes.len(),
                "connections": t.connections.len(),
            })
        })
        .collect();
    print_json(&Value::Array(functions))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
