//! A single table: columns, dense row vector and one hash index per
//! column (spec.md §3/§4.4).

use std::collections::HashMap;

use tinydb_helpers::IndexMap;

use crate::error::Error;
use crate::eval::Binding;
use crate::schema::ColumnDefinition;
use crate::value::Value;

pub type Row = IndexMap<String, Value>;

/// Hash map from a column's values to the positions of rows carrying
/// them. `Null` values are never inserted (spec.md's invariants only
/// speak of *present* values, and SQL `UNIQUE` permits repeated `NULL`s).
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    pub unique: bool,
    map: HashMap<Value, Vec<usize>>,
}

impl ColumnIndex {
    pub fn positions(&self, value: &Value) -> &[usize] {
        self.map.get(value).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub rows: Vec<Row>,
    indexes: IndexMap<String, ColumnIndex>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        let mut indexes = IndexMap::default();
        for col in &columns {
            indexes.insert(
                col.name.clone(),
                ColumnIndex {
                    unique: col.is_effectively_unique(),
                    map: HashMap::new(),
                },
            );
        }
        Table {
            name: name.into(),
            columns,
            rows: Vec::new(),
            indexes,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pk_column(&self) -> &ColumnDefinition {
        self.columns
            .iter()
            .find(|c| c.is_primary_key)
            .expect("table invariant: exactly one PRIMARY KEY column")
    }

    pub fn index(&self, column: &str) -> Option<&ColumnIndex> {
        self.indexes.get(column)
    }

    pub fn rows_matching(&self, column: &str, value: &Value) -> Vec<usize> {
        if value.is_null() {
            return Vec::new();
        }
        self.index(column)
            .map(|idx| idx.positions(value).to_vec())
            .unwrap_or_default()
    }

    pub fn position_of_pk(&self, pk_value: &Value) -> Option<usize> {
        let pk_col = self.pk_column().name.clone();
        self.rows_matching(&pk_col, pk_value).first().copied()
    }

    /// Coerce a full, column-ordered value list into a `Row`, rejecting
    /// type mismatches and Null-in-PK (spec.md §4.4 insert validation,
    /// minus the uniqueness/FK checks, which need sibling tables).
    pub fn prepare_row(&self, values: &[Value]) -> Result<Row, Error> {
        if values.len() != self.columns.len() {
            return Err(Error::semantic(format!(
                "table `{}` has {} columns but {} values were supplied",
                self.name,
                self.columns.len(),
                values.len()
            )));
        }
        let mut row = Row::default();
        for (col, value) in self.columns.iter().zip(values) {
            if value.is_null() && col.not_null() {
                return Err(Error::constraint(format!(
                    "column `{}` is the primary key and cannot be NULL",
                    col.name
                )));
            }
            let coerced = value.coerce_to(col.data_type, &col.name)?;
            row.insert(col.name.clone(), coerced);
        }
        Ok(row)
    }

    /// Check PK/UNIQUE indexes for a prospective row, excluding
    /// `exclude_pos` (the row being updated, if any).
    pub fn check_unique_constraints(
        &self,
        row: &Row,
        exclude_pos: Option<usize>,
    ) -> Result<(), Error> {
        for col in &self.columns {
            if !col.is_effectively_unique() {
                continue;
            }
            let Some(value) = row.get(&col.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let positions = self.rows_matching(&col.name, value);
            let conflict = positions.iter().any(|p| Some(*p) != exclude_pos);
            if conflict {
                let label = if col.is_primary_key { "PRIMARY KEY" } else { "UNIQUE" };
                return Err(Error::constraint(format!(
                    "{label} constraint violated on `{}`.`{}` = {value}",
                    self.name, col.name
                )));
            }
        }
        Ok(())
    }

    pub fn insert_unchecked(&mut self, row: Row) {
        let pos = self.rows.len();
        for (col, index) in self.indexes.iter_mut() {
            if let Some(v) = row.get(col) {
                if !v.is_null() {
                    index.map.entry(v.clone()).or_default().push(pos);
                }
            }
        }
        self.rows.push(row);
    }

    pub fn rebuild_indexes(&mut self) {
        for index in self.indexes.values_mut() {
            index.map.clear();
        }
        for (pos, row) in self.rows.iter().enumerate() {
            for (col, index) in self.indexes.iter_mut() {
                if let Some(v) = row.get(col) {
                    if !v.is_null() {
                        index.map.entry(v.clone()).or_default().push(pos);
                    }
                }
            }
        }
    }

    pub fn remove_by_pk(&mut self, pk_values: &std::collections::HashSet<Value>) -> usize {
        let pk_col = self.pk_column().name.clone();
        let before = self.rows.len();
        self.rows
            .retain(|row| !pk_values.contains(row.get(&pk_col).unwrap_or(&Value::Null)));
        self.rebuild_indexes();
        before - self.rows.len()
    }

    pub fn set_column_at(&mut self, pos: usize, column: &str, value: Value) {
        if let Some(row) = self.rows.get_mut(pos) {
            row.insert(column.to_string(), value);
        }
    }

    pub fn binding_for_row(&self, pos: usize) -> Binding {
        Binding::for_table(
            &self.name,
            self.rows[pos]
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }

    /// Invariant check used by tests: the PK index cardinality equals the
    /// row count, and no index entry points past the end of `rows`.
    #[cfg(test)]
    pub fn assert_invariants(&self) {
        let pk_col = self.pk_column().name.clone();
        let pk_index = self.index(&pk_col).unwrap();
        let total: usize = pk_index.map.values().map(Vec::len).sum();
        assert_eq!(total, self.rows.len());
    }
}
