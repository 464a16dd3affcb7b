//! The on-disk registry of all databases (spec.md §6): `catalog.json` plus
//! one `<db_name>.json` file per database, written atomically via a
//! temp-sibling-then-rename.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use tinydb_helpers::IndexMap;

use crate::error::Error;
use crate::schema::ColumnDefinition;
use crate::storage::database::Database;
use crate::storage::table::Table;
use crate::value::{value_from_json, value_to_json};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    schema_version: u32,
    databases: Vec<String>,
    current_database: Option<String>,
}

/// Root container: map database_name -> Database, a current-database
/// pointer for session-style execution, and the directory its files live
/// under (spec.md §3).
#[derive(Debug, Clone)]
pub struct Catalog {
    pub databases: IndexMap<String, Database>,
    pub current: Option<String>,
    data_dir: PathBuf,
}

impl Catalog {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Catalog {
            databases: IndexMap::default(),
            current: None,
            data_dir: data_dir.into(),
        }
    }

    fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.json")
    }

    fn database_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.json"))
    }

    /// Load a catalog from `data_dir`, or start an empty one if no
    /// `catalog.json` exists there yet (first run).
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let data_dir = data_dir.into();
        let mut catalog = Catalog::new(data_dir.clone());
        let catalog_path = catalog.catalog_path();
        if !catalog_path.exists() {
            return Ok(catalog);
        }
        let raw = fs::read_to_string(&catalog_path)?;
        let file: CatalogFile = serde_json::from_str(&raw)?;
        for name in &file.databases {
            let db = load_database(&catalog.database_path(name))?;
            catalog.databases.insert(name.clone(), db);
        }
        catalog.current = file.current_database;
        Ok(catalog)
    }

    pub fn persist_catalog(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.data_dir)?;
        let file = CatalogFile {
            schema_version: SCHEMA_VERSION,
            databases: self.databases.keys().cloned().collect(),
            current_database: self.current.clone(),
        };
        write_atomic(&self.catalog_path(), &serde_json::to_vec_pretty(&file)?)
    }

    pub fn persist_database(&self, name: &str) -> Result<(), Error> {
        let db = self
            .databases
            .get(name)
            .ok_or_else(|| Error::not_found(format!("database `{name}` does not exist")))?;
        fs::create_dir_all(&self.data_dir)?;
        write_atomic(&self.database_path(name), &serde_json::to_vec_pretty(&database_to_json(db))?)
    }

    pub fn create_database(&mut self, name: String) -> Result<(), Error> {
        if self.databases.contains_key(&name) {
            return Err(Error::semantic(format!("database `{name}` already exists")));
        }
        self.databases.insert(name.clone(), Database::new(name));
        Ok(())
    }

    pub fn drop_database(&mut self, name: &str) -> Result<(), Error> {
        if name == "default" {
            return Err(Error::constraint("the reserved `default` database cannot be dropped"));
        }
        if self.databases.shift_remove(name).is_none() {
            return Err(Error::not_found(format!("database `{name}` does not exist")));
        }
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        let path = self.database_path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn use_database(&mut self, name: &str) -> Result<(), Error> {
        if !self.databases.contains_key(name) {
            return Err(Error::not_found(format!("database `{name}` does not exist")));
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    pub fn current_database(&self) -> Result<&Database, Error> {
        let name = self
            .current
            .as_deref()
            .ok_or_else(|| Error::semantic("no database selected; run USE <name> first"))?;
        self.databases
            .get(name)
            .ok_or_else(|| Error::not_found(format!("database `{name}` does not exist")))
    }

    pub fn current_database_mut(&mut self) -> Result<&mut Database, Error> {
        let name = self
            .current
            .clone()
            .ok_or_else(|| Error::semantic("no database selected; run USE <name> first"))?;
        self.databases
            .get_mut(&name)
            .ok_or_else(|| Error::not_found(format!("database `{name}` does not exist")))
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn database_to_json(db: &Database) -> serde_json::Value {
    let mut tables = serde_json::Map::new();
    for (table_name, table) in &db.tables {
        let columns: Vec<serde_json::Value> = table
            .columns
            .iter()
            .map(|c| serde_json::to_value(c).unwrap_or(serde_json::Value::Null))
            .collect();
        let rows: Vec<serde_json::Value> = table
            .rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (k, v) in row {
                    obj.insert(k.clone(), value_to_json(v));
                }
                serde_json::Value::Object(obj)
            })
            .collect();
        tables.insert(
            table_name.clone(),
            json!({ "name": table_name, "columns": columns, "rows": rows }),
        );
    }
    json!({ "name": db.name, "tables": tables })
}

fn load_database(path: &Path) -> Result<Database, Error> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let name = parsed
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::semantic(format!("database file {} missing `name`", path.display())))?
        .to_string();
    let mut db = Database::new(name);
    let tables = parsed
        .get("tables")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();
    for (table_name, table_json) in tables {
        let columns: Vec<ColumnDefinition> = serde_json::from_value(
            table_json.get("columns").cloned().unwrap_or(serde_json::Value::Array(vec![])),
        )?;
        let mut table = Table::new(table_name.clone(), columns.clone());
        if let Some(rows) = table_json.get("rows").and_then(|v| v.as_array()) {
            for row_json in rows {
                let obj = row_json.as_object().cloned().unwrap_or_default();
                let mut row = crate::storage::table::Row::default();
                for col in &columns {
                    let raw_value = obj.get(&col.name).cloned().unwrap_or(serde_json::Value::Null);
                    row.insert(col.name.clone(), value_from_json(&raw_value, col.data_type)?);
                }
                table.insert_unchecked(row);
            }
        }
        db.tables.insert(table_name, table);
    }
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn drop_database_rejects_the_reserved_default_name() {
        let mut catalog = Catalog::new(std::env::temp_dir());
        catalog.create_database("default".to_string()).unwrap();
        let err = catalog.drop_database("default").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintError);
        assert!(catalog.databases.contains_key("default"));
    }

    #[test]
    fn drop_database_allows_non_default_names() {
        let mut catalog = Catalog::new(std::env::temp_dir());
        catalog.create_database("shop".to_string()).unwrap();
        catalog.drop_database("shop").unwrap();
        assert!(!catalog.databases.contains_key("shop"));
    }
}
