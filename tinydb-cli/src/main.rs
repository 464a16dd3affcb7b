use std::io::Read as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tinydb_core::{Engine, EngineConfig, Error, StatementResult};

mod logger;

/// Runs a `.sql` script against a fresh or existing tinydb data directory.
///
/// Not an interactive shell: statements are read in full (from a file or
/// stdin), split, and executed in order. There is no readline, history, or
/// line editing here -- that is out of scope.
#[derive(Parser)]
#[command(name = "tinydb", about = "tinydb command runner")]
struct Cli {
    /// Path to a `.sql` script. Reads stdin when omitted.
    script: Option<PathBuf>,

    /// Directory the engine's catalog lives in.
    #[arg(long, env = "TINYDB_DATA_DIR", default_value = "./tinydb-data")]
    data_dir: PathBuf,

    /// Database selected on startup.
    #[arg(long, default_value = "default")]
    database: String,
}

fn main() -> ExitCode {
    let _ = logger::init();
    let cli = Cli::parse();

    let source = match read_source(cli.script.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error reading script: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = EngineConfig {
        data_dir: cli.data_dir,
        default_database: cli.database,
    };
    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("error starting engine: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut had_error = false;
    for statement in split_statements(&source) {
        match engine.execute(statement) {
            Ok(result) => print_result(&result),
            Err(e) => {
                had_error = true;
                print_error(&e);
            }
        }
    }

    if had_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn read_source(path: Option<&std::path::Path>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Naive `;`-delimited statement splitter. Quoted `;` inside string
/// literals is not handled; scripts that need one can escape it by not
/// relying on this splitter's blank-statement tolerance.
fn split_statements(source: &str) -> impl Iterator<Item = &str> {
    source.split(';').map(str::trim).filter(|s| !s.is_empty())
}

fn print_result(result: &StatementResult) {
    match result {
        StatementResult::Rows { columns, rows } => {
            println!("{}", columns.join("\t"));
            for row in rows {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|c| row.get(c).map(ToString::to_string).unwrap_or_default())
                    .collect();
                println!("{}", cells.join("\t"));
            }
        }
        StatementResult::Affected(n) => println!("OK ({n} row(s) affected)"),
        StatementResult::Message(m) => println!("{m}"),
    }
}

fn print_error(err: &Error) {
    let host_err = tinydb_core::HostError::from(err);
    eprintln!("{}: {}", host_err.kind, host_err.message);
}
