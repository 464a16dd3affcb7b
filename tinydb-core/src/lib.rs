//! `tinydb-core`: the single-process SQL engine — lexer, parser,
//! expression evaluator, storage engine, catalog/persistence and
//! executor described in spec.md. Hosts (such as `tinydb-cli`) talk to
//! exactly one type here: [`Engine`].

pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod schema;
pub mod storage;
pub mod value;

use std::sync::Mutex;

pub use config::EngineConfig;
pub use error::{Error, ErrorKind, HostError, Result};
pub use executor::StatementResult;
pub use storage::Catalog;

/// The host-facing entry point. Wraps a `Catalog` behind one coarse
/// exclusive lock, held for the full duration of a statement (spec.md §5:
/// "the statement is the commit boundary").
pub struct Engine {
    catalog: Mutex<Catalog>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mut catalog = Catalog::load(config.data_dir)?;
        if !catalog.databases.contains_key(&config.default_database) {
            catalog.create_database(config.default_database.clone())?;
            catalog.persist_catalog()?;
            catalog.persist_database(&config.default_database)?;
        }
        if catalog.current.is_none() {
            catalog.use_database(&config.default_database)?;
            catalog.persist_catalog()?;
        }
        Ok(Engine {
            catalog: Mutex::new(catalog),
        })
    }

    /// Parse and run one SQL statement to completion. No suspension
    /// points, no partial effects on failure (spec.md §5/§4.4).
    pub fn execute(&self, sql: &str) -> Result<StatementResult> {
        let command = parser::parse(sql)?;
        log::debug!("executing command: {command:?}");
        let mut catalog = self.catalog.lock().expect("catalog lock poisoned");
        let result = executor::execute(&mut catalog, command);
        match &result {
            Ok(_) => log::debug!("statement committed"),
            Err(e) => log::debug!("statement failed: {e}"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_in(dir: &std::path::Path) -> Engine {
        Engine::new(EngineConfig::new(dir)).unwrap()
    }

    #[test]
    fn engine_starts_with_default_database_selected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let result = engine.execute("CREATE TABLE t (id INT PRIMARY KEY)").unwrap();
        assert!(matches!(result, StatementResult::Message(_)));
    }

    #[test]
    fn insert_then_select_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        engine.execute("CREATE TABLE t (id INT PRIMARY KEY, n STRING)").unwrap();
        engine.execute("INSERT INTO t VALUES (1, 'a')").unwrap();
        let result = engine.execute("SELECT id, n FROM t").unwrap();
        match result {
            StatementResult::Rows { rows, .. } => assert_eq!(rows.len(), 1),
            _ => panic!("expected rows"),
        }
    }
}
