//! Column/table schema shared between the parser (which builds it from
//! `CREATE TABLE`) and the storage engine (which enforces it).

use serde::{Deserialize, Serialize};

use crate::value::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "NO ACTION")]
    NoAction,
}

impl Default for ReferentialAction {
    fn default() -> Self {
        ReferentialAction::Restrict
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    #[serde(rename = "table")]
    pub target_table: String,
    #[serde(rename = "column")]
    pub target_column: String,
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default)]
    pub on_update: ReferentialAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub is_primary_key: bool,
    pub is_unique: bool,
    #[serde(rename = "foreign_key")]
    pub foreign_key: Option<ForeignKey>,
}

impl ColumnDefinition {
    /// PK implies NOT NULL and UNIQUE (spec.md §3).
    pub fn is_effectively_unique(&self) -> bool {
        self.is_primary_key || self.is_unique
    }

    pub fn not_null(&self) -> bool {
        self.is_primary_key
    }
}
