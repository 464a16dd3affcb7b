//! One named database: a set of tables plus the cross-table orchestration
//! (FK validation, cascade planning) that a single `Table` cannot do on its
//! own (spec.md §4.4).

use std::collections::{HashMap, HashSet};

use tinydb_helpers::IndexMap;

use crate::ast::UpdateValue;
use crate::error::Error;
use crate::eval::{self, Binding};
use crate::schema::{ColumnDefinition, ReferentialAction};
use crate::storage::table::{Row, Table};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Database {
    pub name: String,
    pub tables: IndexMap<String, Table>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// One step of a fully-planned cascade, computed before any row is
/// mutated so a `RESTRICT` failure discovered three hops down aborts the
/// whole statement (spec.md §4.4: "delete is atomic: either the whole
/// cascade succeeds or no row changes").
#[derive(Debug, Clone)]
enum CascadeStep {
    Delete { table: String, pk: Value },
    SetNull { table: String, pk: Value, column: String },
    UpdateFk { table: String, pk: Value, column: String, new_value: Value },
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Database {
            name: name.into(),
            tables: IndexMap::default(),
        }
    }

    pub fn table(&self, name: &str) -> Result<&Table, Error> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::not_found(format!("table `{name}` does not exist")))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table, Error> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("table `{name}` does not exist")))
    }

    pub fn create_table(&mut self, name: String, columns: Vec<ColumnDefinition>) -> Result<(), Error> {
        if self.tables.contains_key(&name) {
            return Err(Error::semantic(format!("table `{name}` already exists")));
        }
        for col in &columns {
            if let Some(fk) = &col.foreign_key {
                let target = self
                    .tables
                    .get(&fk.target_table)
                    .ok_or_else(|| Error::not_found(format!(
                        "foreign key on `{name}`.`{}` references unknown table `{}`",
                        col.name, fk.target_table
                    )))?;
                let target_col = target.column(&fk.target_column).ok_or_else(|| {
                    Error::not_found(format!(
                        "foreign key on `{name}`.`{}` references unknown column `{}`.`{}`",
                        col.name, fk.target_table, fk.target_column
                    ))
                })?;
                if !target_col.is_effectively_unique() {
                    return Err(Error::semantic(format!(
                        "foreign key target `{}`.`{}` must be PRIMARY KEY or UNIQUE",
                        fk.target_table, fk.target_column
                    )));
                }
            }
        }
        let table = Table::new(name.clone(), columns);
        self.tables.insert(name.clone(), table);
        if let Err(e) = self.detect_fk_cycle() {
            self.tables.shift_remove(&name);
            return Err(e);
        }
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<(), Error> {
        if !self.tables.contains_key(name) {
            return Err(Error::not_found(format!("table `{name}` does not exist")));
        }
        for (other_name, other) in &self.tables {
            if other_name == name {
                continue;
            }
            for col in &other.columns {
                if let Some(fk) = &col.foreign_key {
                    if fk.target_table == name {
                        return Err(Error::constraint(format!(
                            "cannot drop `{name}`: referenced by `{other_name}`.`{}`",
                            col.name
                        )));
                    }
                }
            }
        }
        self.tables.shift_remove(name);
        Ok(())
    }

    /// DFS over the FK graph, reporting the cycle as a table-name path
    /// (spec.md §4.4: "CREATE TABLE that would introduce an FK cycle is
    /// rejected").
    fn detect_fk_cycle(&self) -> Result<(), Error> {
        let mut marks: HashMap<String, Mark> = HashMap::new();
        let names: Vec<String> = self.tables.keys().cloned().collect();
        for start in names {
            if marks.contains_key(&start) {
                continue;
            }
            let mut path = Vec::new();
            self.visit_fk(&start, &mut marks, &mut path)?;
        }
        Ok(())
    }

    fn visit_fk(
        &self,
        name: &str,
        marks: &mut HashMap<String, Mark>,
        path: &mut Vec<String>,
    ) -> Result<(), Error> {
        marks.insert(name.to_string(), Mark::Visiting);
        path.push(name.to_string());
        if let Some(table) = self.tables.get(name) {
            for col in &table.columns {
                if let Some(fk) = &col.foreign_key {
                    match marks.get(&fk.target_table) {
                        Some(Mark::Visiting) => {
                            let mut cycle = path.clone();
                            cycle.push(fk.target_table.clone());
                            return Err(Error::CircularFK { path: cycle });
                        }
                        Some(Mark::Done) => {}
                        None => self.visit_fk(&fk.target_table, marks, path)?,
                    }
                }
            }
        }
        path.pop();
        marks.insert(name.to_string(), Mark::Done);
        Ok(())
    }

    pub fn insert(&mut self, table_name: &str, values: Vec<Value>) -> Result<(), Error> {
        let row = {
            let table = self.table(table_name)?;
            let row = table.prepare_row(&values)?;
            table.check_unique_constraints(&row, None)?;
            row
        };
        self.validate_foreign_keys(table_name, &row)?;
        self.table_mut(table_name)?.insert_unchecked(row);
        Ok(())
    }

    fn validate_foreign_keys(&self, table_name: &str, row: &Row) -> Result<(), Error> {
        let table = self.table(table_name)?;
        for col in &table.columns {
            let Some(fk) = &col.foreign_key else { continue };
            let Some(value) = row.get(&col.name) else { continue };
            if value.is_null() {
                continue;
            }
            let target = self.table(&fk.target_table)?;
            if target.rows_matching(&fk.target_column, value).is_empty() {
                return Err(Error::constraint(format!(
                    "foreign key violation: `{table_name}`.`{}` = {value} has no match in `{}`.`{}`",
                    col.name, fk.target_table, fk.target_column
                )));
            }
        }
        Ok(())
    }

    pub fn delete(&mut self, table_name: &str, predicate_positions: Vec<usize>) -> Result<usize, Error> {
        let mut plan = Vec::new();
        let mut visited: HashSet<(String, Value)> = HashSet::new();
        let seed_rows: Vec<Row> = {
            let table = self.table(table_name)?;
            predicate_positions
                .iter()
                .map(|&p| table.rows[p].clone())
                .collect()
        };
        for row in seed_rows {
            self.schedule_delete(table_name, &row, &mut plan, &mut visited)?;
        }
        let root_deletes = plan
            .iter()
            .filter(|s| matches!(s, CascadeStep::Delete { table, .. } if table == table_name))
            .count();
        self.apply_cascade(plan);
        Ok(root_deletes)
    }

    fn schedule_delete(
        &self,
        table_name: &str,
        row: &Row,
        plan: &mut Vec<CascadeStep>,
        visited: &mut HashSet<(String, Value)>,
    ) -> Result<(), Error> {
        let table = self.table(table_name)?;
        let pk_col = table.pk_column().name.clone();
        let pk_value = row.get(&pk_col).cloned().unwrap_or(Value::Null);
        let key = (table_name.to_string(), pk_value.clone());
        if visited.contains(&key) {
            return Ok(());
        }
        visited.insert(key);
        plan.push(CascadeStep::Delete {
            table: table_name.to_string(),
            pk: pk_value,
        });

        for (child_name, child) in &self.tables {
            for col in &child.columns {
                let Some(fk) = &col.foreign_key else { continue };
                if fk.target_table != table_name {
                    continue;
                }
                let Some(target_value) = row.get(&fk.target_column) else { continue };
                if target_value.is_null() {
                    continue;
                }
                let positions = child.rows_matching(&col.name, target_value);
                if positions.is_empty() {
                    continue;
                }
                match fk.on_delete {
                    ReferentialAction::Restrict | ReferentialAction::NoAction => {
                        log::warn!(
                            "delete from `{table_name}` rejected: referenced by `{child_name}`.`{}`",
                            col.name
                        );
                        return Err(Error::constraint(format!(
                            "cannot delete from `{table_name}`: referenced by `{child_name}`.`{}`",
                            col.name
                        )));
                    }
                    ReferentialAction::Cascade => {
                        for pos in positions {
                            let child_row = child.rows[pos].clone();
                            self.schedule_delete(child_name, &child_row, plan, visited)?;
                        }
                    }
                    ReferentialAction::SetNull => {
                        if col.is_primary_key {
                            return Err(Error::constraint(format!(
                                "cannot SET NULL on primary key `{child_name}`.`{}`",
                                col.name
                            )));
                        }
                        let child_pk_col = child.pk_column().name.clone();
                        for pos in positions {
                            let child_pk = child.rows[pos]
                                .get(&child_pk_col)
                                .cloned()
                                .unwrap_or(Value::Null);
                            plan.push(CascadeStep::SetNull {
                                table: child_name.clone(),
                                pk: child_pk,
                                column: col.name.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_cascade(&mut self, plan: Vec<CascadeStep>) {
        let mut set_nulls: HashMap<String, Vec<(Value, String)>> = HashMap::new();
        let mut deletes: HashMap<String, HashSet<Value>> = HashMap::new();
        let mut updates: HashMap<String, Vec<(Value, String, Value)>> = HashMap::new();
        let touched: HashSet<&String> = plan
            .iter()
            .map(|step| match step {
                CascadeStep::SetNull { table, .. }
                | CascadeStep::Delete { table, .. }
                | CascadeStep::UpdateFk { table, .. } => table,
            })
            .collect();
        if touched.len() > 1 {
            log::warn!("referential action cascades across {} tables", touched.len());
        }
        for step in plan {
            match step {
                CascadeStep::SetNull { table, pk, column } => {
                    set_nulls.entry(table).or_default().push((pk, column));
                }
                CascadeStep::Delete { table, pk } => {
                    deletes.entry(table).or_default().insert(pk);
                }
                CascadeStep::UpdateFk { table, pk, column, new_value } => {
                    updates.entry(table).or_default().push((pk, column, new_value));
                }
            }
        }
        for (table_name, ops) in set_nulls {
            if let Some(table) = self.tables.get_mut(&table_name) {
                for (pk, column) in ops {
                    if let Some(pos) = table.position_of_pk(&pk) {
                        table.set_column_at(pos, &column, Value::Null);
                    }
                }
                table.rebuild_indexes();
            }
        }
        for (table_name, ops) in updates {
            if let Some(table) = self.tables.get_mut(&table_name) {
                for (pk, column, new_value) in ops {
                    if let Some(pos) = table.position_of_pk(&pk) {
                        table.set_column_at(pos, &column, new_value);
                    }
                }
                table.rebuild_indexes();
            }
        }
        for (table_name, pks) in deletes {
            if let Some(table) = self.tables.get_mut(&table_name) {
                table.remove_by_pk(&pks);
            }
        }
    }

    /// Follows ON UPDATE actions for every effectively-unique column whose
    /// value changed in `old_row` -> `new_row`, recursing into children
    /// whose own FK-target column is itself unique (spec.md §4.4 "CASCADE
    /// on update ... recurse").
    fn plan_update_cascade(
        &self,
        table_name: &str,
        old_row: &Row,
        new_row: &Row,
        plan: &mut Vec<CascadeStep>,
        visited: &mut HashSet<(String, String, Value)>,
    ) -> Result<(), Error> {
        let table = self.table(table_name)?;
        for col in &table.columns {
            if !col.is_effectively_unique() {
                continue;
            }
            let old_v = old_row.get(&col.name).cloned().unwrap_or(Value::Null);
            let new_v = new_row.get(&col.name).cloned().unwrap_or(Value::Null);
            if old_v.is_null() || old_v == new_v {
                continue;
            }
            let marker = (table_name.to_string(), col.name.clone(), old_v.clone());
            if visited.contains(&marker) {
                continue;
            }
            visited.insert(marker);

            for (child_name, child) in &self.tables {
                for ccol in &child.columns {
                    let Some(fk) = &ccol.foreign_key else { continue };
                    if fk.target_table != table_name || fk.target_column != col.name {
                        continue;
                    }
                    let positions = child.rows_matching(&ccol.name, &old_v);
                    if positions.is_empty() {
                        continue;
                    }
                    match fk.on_update {
                        ReferentialAction::Restrict | ReferentialAction::NoAction => {
                            return Err(Error::constraint(format!(
                                "cannot update `{table_name}`.`{}`: referenced by `{child_name}`.`{}`",
                                col.name, ccol.name
                            )));
                        }
                        ReferentialAction::Cascade => {
                            let child_pk_col = child.pk_column().name.clone();
                            for pos in positions {
                                let child_pk = child.rows[pos]
                                    .get(&child_pk_col)
                                    .cloned()
                                    .unwrap_or(Value::Null);
                                plan.push(CascadeStep::UpdateFk {
                                    table: child_name.clone(),
                                    pk: child_pk,
                                    column: ccol.name.clone(),
                                    new_value: new_v.clone(),
                                });
                                if ccol.is_effectively_unique() {
                                    let mut grandchild_new = child.rows[pos].clone();
                                    grandchild_new.insert(ccol.name.clone(), new_v.clone());
                                    self.plan_update_cascade(
                                        child_name,
                                        &child.rows[pos],
                                        &grandchild_new,
                                        plan,
                                        visited,
                                    )?;
                                }
                            }
                        }
                        ReferentialAction::SetNull => {
                            if ccol.is_primary_key {
                                return Err(Error::constraint(format!(
                                    "cannot SET NULL on primary key `{child_name}`.`{}`",
                                    ccol.name
                                )));
                            }
                            let child_pk_col = child.pk_column().name.clone();
                            for pos in positions {
                                let child_pk = child.rows[pos]
                                    .get(&child_pk_col)
                                    .cloned()
                                    .unwrap_or(Value::Null);
                                plan.push(CascadeStep::SetNull {
                                    table: child_name.clone(),
                                    pk: child_pk,
                                    column: ccol.name.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn update(
        &mut self,
        table_name: &str,
        positions: Vec<usize>,
        assignments: &[(String, UpdateValue)],
    ) -> Result<usize, Error> {
        let mut prepared: Vec<(usize, Row, Row)> = Vec::new();
        {
            let table = self.table(table_name)?;
            for pos in &positions {
                let binding = table.binding_for_row(*pos);
                let old_row = table.rows[*pos].clone();
                let mut new_row = old_row.clone();
                for (col_name, value) in assignments {
                    let col = table.column(col_name).ok_or_else(|| {
                        Error::not_found(format!("column `{col_name}` does not exist"))
                    })?;
                    let raw = eval_update_value(value, &binding)?;
                    if raw.is_null() && col.not_null() {
                        return Err(Error::constraint(format!(
                            "column `{col_name}` is the primary key and cannot be NULL"
                        )));
                    }
                    let coerced = raw.coerce_to(col.data_type, col_name)?;
                    new_row.insert(col_name.clone(), coerced);
                }
                table.check_unique_constraints(&new_row, Some(*pos))?;
                prepared.push((*pos, old_row, new_row));
            }
        }
        for (_, _, row) in &prepared {
            self.validate_foreign_keys(table_name, row)?;
        }
        let mut cascade_plan = Vec::new();
        let mut visited = HashSet::new();
        for (_, old_row, new_row) in &prepared {
            self.plan_update_cascade(table_name, old_row, new_row, &mut cascade_plan, &mut visited)?;
        }
        let table = self.table_mut(table_name)?;
        for (pos, _, row) in &prepared {
            table.rows[*pos] = row.clone();
        }
        table.rebuild_indexes();
        let affected = prepared.len();
        self.apply_cascade(cascade_plan);
        Ok(affected)
    }

    pub fn scan(&self, table_name: &str) -> Result<Vec<Binding>, Error> {
        let table = self.table(table_name)?;
        Ok((0..table.rows.len()).map(|p| table.binding_for_row(p)).collect())
    }
}

fn eval_update_value(value: &UpdateValue, binding: &Binding) -> Result<Value, Error> {
    match value {
        UpdateValue::Literal(lit) => Ok(eval::eval_expr(&crate::ast::Expr::Literal(lit.clone()), binding)?),
        UpdateValue::DatetimeCall { func, args } => {
            eval::eval_expr(&crate::ast::Expr::DatetimeCall { func: *func, args: args.clone() }, binding)
        }
    }
}
