//! Engine configuration (spec.md §4.8, ambient addition): constructed
//! programmatically by the host, the way the teacher layers CLI overrides
//! onto a config struct rather than mandating an on-disk format of its own.

use std::path::PathBuf;

use tinydb_helpers::Config;

/// Where the engine keeps its catalog and which database a fresh
/// `Engine` starts in.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub default_database: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            data_dir: std::env::var("TINYDB_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./tinydb-data")),
            default_database: "default".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        EngineConfig::default().config(|c| c.data_dir = data_dir.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_database_name_is_default() {
        assert_eq!(EngineConfig::default().default_database, "default");
    }
}
