//! The per-command planner (spec.md §4.5): turns a `Command` AST node into
//! a `StatementResult` against a `Catalog`, handling the fixed SELECT
//! pipeline (FROM -> join -> WHERE -> GROUP BY -> aggregate -> HAVING ->
//! projection -> DISTINCT -> ORDER BY -> LIMIT/OFFSET, spec.md §9).

use std::cmp::Ordering;
use std::collections::HashMap;

use itertools::Itertools as _;
use tinydb_helpers::IndexMap;

use crate::ast::{
    AggArg, Command, Expr, JoinType, OrderByItem, OrderDirection, SelectItem, SelectStmt,
};
use crate::error::Error;
use crate::eval::{self, Binding};
use crate::schema::ColumnDefinition;
use crate::storage::catalog::Catalog;
use crate::storage::database::Database;
use crate::value::{self, Value};

pub type ResultRow = IndexMap<String, Value>;

#[derive(Debug, Clone)]
pub enum StatementResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<ResultRow>,
    },
    Affected(usize),
    Message(String),
}

pub fn execute(catalog: &mut Catalog, command: Command) -> Result<StatementResult, Error> {
    match command {
        Command::CreateDatabase { name } => {
            catalog.create_database(name.clone())?;
            catalog.persist_catalog()?;
            catalog.persist_database(&name)?;
            Ok(StatementResult::Message(format!("database `{name}` created")))
        }
        Command::DropDatabase { name } => {
            catalog.drop_database(&name)?;
            catalog.persist_catalog()?;
            Ok(StatementResult::Message(format!("database `{name}` dropped")))
        }
        Command::UseDatabase { name } => {
            catalog.use_database(&name)?;
            catalog.persist_catalog()?;
            Ok(StatementResult::Message(format!("using database `{name}`")))
        }
        Command::ShowDatabases => {
            let rows = catalog
                .databases
                .keys()
                .map(|name| {
                    let mut row = ResultRow::default();
                    row.insert("name".to_string(), Value::Text(name.clone()));
                    row
                })
                .collect();
            Ok(StatementResult::Rows {
                columns: vec!["name".to_string()],
                rows,
            })
        }
        Command::CreateTable { name, columns } => {
            let current = current_name(catalog)?;
            catalog.current_database_mut()?.create_table(name.clone(), columns)?;
            catalog.persist_database(&current)?;
            Ok(StatementResult::Message(format!("table `{name}` created")))
        }
        Command::DropTable { name } => {
            let current = current_name(catalog)?;
            catalog.current_database_mut()?.drop_table(&name)?;
            catalog.persist_database(&current)?;
            Ok(StatementResult::Message(format!("table `{name}` dropped")))
        }
        Command::ShowTables => {
            let db = catalog.current_database()?;
            let rows = db
                .tables
                .keys()
                .map(|name| {
                    let mut row = ResultRow::default();
                    row.insert("name".to_string(), Value::Text(name.clone()));
                    row
                })
                .collect();
            Ok(StatementResult::Rows {
                columns: vec!["name".to_string()],
                rows,
            })
        }
        Command::Describe { table } => describe_table(catalog, &table),
        Command::Insert { table, columns, values } => {
            let current = current_name(catalog)?;
            let db = catalog.current_database_mut()?;
            let ordered = order_insert_values(db, &table, columns, values)?;
            db.insert(&table, ordered)?;
            catalog.persist_database(&current)?;
            Ok(StatementResult::Affected(1))
        }
        Command::Update { table, assignments, filter } => {
            let current = current_name(catalog)?;
            let db = catalog.current_database_mut()?;
            let positions = matching_positions(db, &table, filter.as_ref())?;
            let n = db.update(&table, positions, &assignments)?;
            catalog.persist_database(&current)?;
            Ok(StatementResult::Affected(n))
        }
        Command::Delete { table, filter } => {
            let current = current_name(catalog)?;
            let db = catalog.current_database_mut()?;
            let positions = matching_positions(db, &table, filter.as_ref())?;
            let n = db.delete(&table, positions)?;
            catalog.persist_database(&current)?;
            Ok(StatementResult::Affected(n))
        }
        Command::Select(stmt) => {
            let db = catalog.current_database()?;
            run_select(db, &stmt)
        }
    }
}

fn current_name(catalog: &Catalog) -> Result<String, Error> {
    catalog
        .current
        .clone()
        .ok_or_else(|| Error::semantic("no database selected; run USE <name> first"))
}

fn matching_positions(db: &Database, table_name: &str, filter: Option<&Expr>) -> Result<Vec<usize>, Error> {
    let table = db.table(table_name)?;
    let mut positions = Vec::new();
    for pos in 0..table.rows.len() {
        let binding = table.binding_for_row(pos);
        let keep = match filter {
            Some(expr) => eval::eval_expr(expr, &binding)?.is_truthy(),
            None => true,
        };
        if keep {
            positions.push(pos);
        }
    }
    Ok(positions)
}

fn order_insert_values(
    db: &Database,
    table: &str,
    columns: Option<Vec<String>>,
    values: Vec<crate::ast::Literal>,
) -> Result<Vec<Value>, Error> {
    let table_def = db.table(table)?;
    let literal_values: Vec<Value> = values.into_iter().map(literal_to_value).collect();
    match columns {
        None => Ok(literal_values),
        Some(names) => {
            if names.len() != literal_values.len() {
                return Err(Error::semantic(format!(
                    "INSERT into `{table}` names {} columns but supplies {} values",
                    names.len(),
                    literal_values.len()
                )));
            }
            let mut by_name: HashMap<&str, Value> = HashMap::new();
            for (name, value) in names.iter().zip(literal_values) {
                by_name.insert(name.as_str(), value);
            }
            table_def
                .columns
                .iter()
                .map(|col| Ok(by_name.remove(col.name.as_str()).unwrap_or(Value::Null)))
                .collect()
        }
    }
}

fn literal_to_value(lit: crate::ast::Literal) -> Value {
    match lit {
        crate::ast::Literal::Null => Value::Null,
        crate::ast::Literal::Integer(i) => Value::Integer(i),
        crate::ast::Literal::Float(f) => Value::Float(f),
        crate::ast::Literal::Bool(b) => Value::Bool(b),
        crate::ast::Literal::String(s) => Value::Text(s),
    }
}

fn describe_table(catalog: &Catalog, table: &str) -> Result<StatementResult, Error> {
    let db = catalog.current_database()?;
    let t = db.table(table)?;
    let rows = t.columns.iter().map(describe_row).collect();
    Ok(StatementResult::Rows {
        columns: vec!["name".to_string(), "type".to_string(), "constraints".to_string()],
        rows,
    })
}

fn describe_row(col: &ColumnDefinition) -> ResultRow {
    let mut constraints = Vec::new();
    if col.is_primary_key {
        constraints.push("PRIMARY KEY".to_string());
    }
    if col.is_unique && !col.is_primary_key {
        constraints.push("UNIQUE".to_string());
    }
    if let Some(fk) = &col.foreign_key {
        constraints.push(format!("REFERENCES {}({})", fk.target_table, fk.target_column));
    }
    let mut row = ResultRow::default();
    row.insert("name".to_string(), Value::Text(col.name.clone()));
    row.insert("type".to_string(), Value::Text(col.data_type.name().to_string()));
    row.insert("constraints".to_string(), Value::Text(constraints.iter().join(", ")));
    row
}

fn select_has_aggregate(stmt: &SelectStmt) -> bool {
    stmt.items.iter().any(|i| matches!(i, SelectItem::Aggregate { .. }))
        || stmt.having.is_some() && expr_has_aggregate(stmt.having.as_ref().unwrap())
}

fn expr_has_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::Aggregate(_) => true,
        Expr::And(a, b) | Expr::Or(a, b) => expr_has_aggregate(a) || expr_has_aggregate(b),
        Expr::Not(e) | Expr::IsNull { expr: e, .. } => expr_has_aggregate(e),
        Expr::Comparison { left, right, .. } => expr_has_aggregate(left) || expr_has_aggregate(right),
        Expr::Between { expr, low, high, .. } => {
            expr_has_aggregate(expr) || expr_has_aggregate(low) || expr_has_aggregate(high)
        }
        Expr::In { expr, list, .. } => expr_has_aggregate(expr) || list.iter().any(expr_has_aggregate),
        Expr::Like { expr, pattern, .. } => expr_has_aggregate(expr) || expr_has_aggregate(pattern),
        _ => false,
    }
}

fn run_select(db: &Database, stmt: &SelectStmt) -> Result<StatementResult, Error> {
    let has_aggregate = select_has_aggregate(stmt);

    if has_aggregate && stmt.join.is_some() {
        return Err(Error::feature(
            "aggregate combined with JOIN is not supported (AggregateWithJoin)",
        ));
    }

    let joined = build_relation(db, stmt)?;
    let filtered: Vec<Binding> = joined
        .into_iter()
        .filter_map(|binding| match stmt.filter.as_ref() {
            None => Some(Ok(binding)),
            Some(expr) => match eval::eval_expr(expr, &binding) {
                Ok(v) if v.is_truthy() => Some(Ok(binding)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            },
        })
        .collect::<Result<Vec<_>, _>>()?;

    let should_group = has_aggregate || !stmt.group_by.is_empty() || stmt.having.is_some();
    let (columns, mut rows) = if should_group {
        run_aggregate(stmt, filtered)?
    } else {
        run_plain(db, stmt, filtered)?
    };

    if stmt.distinct {
        dedup_rows(&mut rows);
    }

    apply_order_by(&mut rows, &stmt.order_by)?;

    let start = stmt.offset.unwrap_or(0) as usize;
    let rows: Vec<ResultRow> = if start >= rows.len() {
        Vec::new()
    } else {
        let end = match stmt.limit {
            Some(limit) => (start + limit as usize).min(rows.len()),
            None => rows.len(),
        };
        rows[start..end].to_vec()
    };

    Ok(StatementResult::Rows { columns, rows })
}

/// Builds one `Binding` per logical row out of `FROM` (and its `JOIN`, if
/// any), per the equi-join family in spec.md §4.5.
fn build_relation(db: &Database, stmt: &SelectStmt) -> Result<Vec<Binding>, Error> {
    let left_bindings = db.scan(&stmt.from)?;
    let Some(join) = &stmt.join else {
        return Ok(left_bindings);
    };

    let right_table = db.table(&join.right_table)?;
    let right_bindings: Vec<Binding> = (0..right_table.rows.len())
        .map(|p| right_table.binding_for_row(p))
        .collect();
    let right_null_row = Binding::for_table(
        &join.right_table,
        right_table.columns.iter().map(|c| (c.name.clone(), Value::Null)),
    );
    let left_table = db.table(&stmt.from)?;
    let left_null_row = Binding::for_table(
        &stmt.from,
        left_table.columns.iter().map(|c| (c.name.clone(), Value::Null)),
    );

    let mut out = Vec::new();
    let mut right_matched = vec![false; right_bindings.len()];

    for left in &left_bindings {
        let left_value = left.resolve(&join.left_on)?;
        let mut any_match = false;
        for (ri, right) in right_bindings.iter().enumerate() {
            let right_value = right.resolve(&join.right_on)?;
            let eq = eval::compare_values(crate::ast::CompareOp::Eq, &left_value, &right_value);
            if eq.is_truthy() {
                any_match = true;
                right_matched[ri] = true;
                out.push(Binding::join(left, right));
            }
        }
        if !any_match && matches!(join.join_type, JoinType::Left | JoinType::Full) {
            out.push(Binding::join(left, &right_null_row));
        }
    }

    if matches!(join.join_type, JoinType::Right | JoinType::Full) {
        for (ri, right) in right_bindings.iter().enumerate() {
            if !right_matched[ri] {
                out.push(Binding::join(&left_null_row, right));
            }
        }
    }

    Ok(out)
}

fn run_plain(db: &Database, stmt: &SelectStmt, rows: Vec<Binding>) -> Result<(Vec<String>, Vec<ResultRow>), Error> {
    let star_columns = star_expansion(db, stmt)?;
    let mut columns = Vec::new();
    for item in &stmt.items {
        match item {
            SelectItem::Star => columns.extend(star_columns.iter().cloned()),
            SelectItem::Column { column, alias } => {
                columns.push(alias.clone().unwrap_or_else(|| column.column.clone()));
            }
            SelectItem::Aggregate { .. } => {
                return Err(Error::semantic("aggregate in non-aggregate query"));
            }
        }
    }

    let mut out = Vec::with_capacity(rows.len());
    for binding in &rows {
        let mut row = ResultRow::default();
        for item in &stmt.items {
            match item {
                SelectItem::Star => {
                    for name in &star_columns {
                        let value = binding
                            .get_by_name(name)
                            .ok_or_else(|| Error::not_found(format!("column `{name}` not found")))?;
                        row.insert(name.clone(), value);
                    }
                }
                SelectItem::Column { column, alias } => {
                    let label = alias.clone().unwrap_or_else(|| column.column.clone());
                    row.insert(label, binding.resolve(column)?);
                }
                SelectItem::Aggregate { .. } => unreachable!(),
            }
        }
        out.push(row);
    }
    Ok((columns, out))
}

fn star_expansion(db: &Database, stmt: &SelectStmt) -> Result<Vec<String>, Error> {
    let left = db.table(&stmt.from)?;
    let mut names: Vec<String> = left.columns.iter().map(|c| c.name.clone()).collect();
    if let Some(join) = &stmt.join {
        let right = db.table(&join.right_table)?;
        names.extend(right.columns.iter().map(|c| c.name.clone()));
    }
    Ok(names)
}

fn run_aggregate(stmt: &SelectStmt, rows: Vec<Binding>) -> Result<(Vec<String>, Vec<ResultRow>), Error> {
    for item in &stmt.items {
        if let SelectItem::Column { column, .. } = item {
            let in_group = stmt.group_by.iter().any(|g| g.column == column.column);
            if !in_group {
                return Err(Error::semantic(format!(
                    "column `{}` must appear in GROUP BY (NonGroupedColumn)",
                    column
                )));
            }
        }
    }

    let mut agg_calls = Vec::new();
    for item in &stmt.items {
        if let SelectItem::Aggregate { call, .. } = item {
            agg_calls.push(call.clone());
        }
    }
    if let Some(having) = &stmt.having {
        collect_aggregates(having, &mut agg_calls);
    }

    let mut groups: IndexMap<Vec<Value>, Vec<Binding>> = IndexMap::default();
    for binding in rows {
        let mut key = Vec::with_capacity(stmt.group_by.len());
        for col in &stmt.group_by {
            key.push(binding.resolve(col)?);
        }
        groups.entry(key).or_default().push(binding);
    }
    if groups.is_empty() && stmt.group_by.is_empty() {
        groups.insert(Vec::new(), Vec::new());
    }

    let mut columns = Vec::new();
    for item in &stmt.items {
        match item {
            SelectItem::Column { column, alias } => {
                columns.push(alias.clone().unwrap_or_else(|| column.column.clone()));
            }
            SelectItem::Aggregate { call, alias } => {
                columns.push(alias.clone().unwrap_or_else(|| call.auto_alias()));
            }
            SelectItem::Star => {
                return Err(Error::feature("SELECT * is not supported with aggregates"));
            }
        }
    }

    let mut out = Vec::new();
    for (key, group_rows) in groups {
        let mut group_binding = Binding::new();
        for (col, value) in stmt.group_by.iter().zip(&key) {
            group_binding.put(col.column.clone(), value.clone());
        }
        for call in &agg_calls {
            let values: Vec<Value> = match &call.arg {
                AggArg::Star => Vec::new(),
                AggArg::Column(col) => group_rows
                    .iter()
                    .map(|b| b.resolve(col))
                    .collect::<Result<_, _>>()?,
            };
            let value = eval::compute_aggregate(call.func, &call.arg, &values, group_rows.len())?;
            group_binding.put(call.auto_alias(), value);
        }

        if let Some(having) = &stmt.having {
            if !eval::eval_expr(having, &group_binding)?.is_truthy() {
                continue;
            }
        }

        let mut row = ResultRow::default();
        for item in &stmt.items {
            match item {
                SelectItem::Column { column, alias } => {
                    let label = alias.clone().unwrap_or_else(|| column.column.clone());
                    let value = group_binding
                        .get_by_name(&column.column)
                        .ok_or_else(|| Error::not_found(format!("column `{}` not found", column)))?;
                    row.insert(label, value);
                }
                SelectItem::Aggregate { call, alias } => {
                    let label = alias.clone().unwrap_or_else(|| call.auto_alias());
                    let value = group_binding.get_by_name(&call.auto_alias()).ok_or_else(|| {
                        Error::semantic(format!("aggregate {} missing from group", call.auto_alias()))
                    })?;
                    row.insert(label, value);
                }
                SelectItem::Star => unreachable!(),
            }
        }
        out.push(row);
    }

    Ok((columns, out))
}

fn collect_aggregates(expr: &Expr, out: &mut Vec<crate::ast::AggregateCall>) {
    match expr {
        Expr::Aggregate(call) => out.push(call.clone()),
        Expr::And(a, b) | Expr::Or(a, b) => {
            collect_aggregates(a, out);
            collect_aggregates(b, out);
        }
        Expr::Not(e) | Expr::IsNull { expr: e, .. } => collect_aggregates(e, out),
        Expr::Comparison { left, right, .. } => {
            collect_aggregates(left, out);
            collect_aggregates(right, out);
        }
        Expr::Between { expr, low, high, .. } => {
            collect_aggregates(expr, out);
            collect_aggregates(low, out);
            collect_aggregates(high, out);
        }
        Expr::In { expr, list, .. } => {
            collect_aggregates(expr, out);
            for item in list {
                collect_aggregates(item, out);
            }
        }
        Expr::Like { expr, pattern, .. } => {
            collect_aggregates(expr, out);
            collect_aggregates(pattern, out);
        }
        _ => {}
    }
}

/// DISTINCT dedup: ordered-tuple equality, Null equals Null (spec.md §4.5
/// step 3 / §9).
fn dedup_rows(rows: &mut Vec<ResultRow>) {
    let mut seen: Vec<ResultRow> = Vec::new();
    rows.retain(|row| {
        let duplicate = seen.iter().any(|existing| rows_group_equal(existing, row));
        if !duplicate {
            seen.push(row.clone());
        }
        !duplicate
    });
}

fn rows_group_equal(a: &ResultRow, b: &ResultRow) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|(k, v)| b.get(k).map(|bv| eval::group_equal(v, bv)).unwrap_or(false))
}

/// Stable multi-key sort; ASC default, Nulls sort last in ASC / first in
/// DESC (spec.md §4.5 step 4).
fn apply_order_by(rows: &mut [ResultRow], order_by: &[OrderByItem]) -> Result<(), Error> {
    if order_by.is_empty() {
        return Ok(());
    }
    let mut err = None;
    rows.sort_by(|a, b| {
        for item in order_by {
            let av = lookup_order_key(a, &item.key);
            let bv = lookup_order_key(b, &item.key);
            let (Some(av), Some(bv)) = (av, bv) else {
                err.get_or_insert_with(|| {
                    Error::not_found(format!("ORDER BY key `{}` not found in projection", item.key))
                });
                return Ordering::Equal;
            };
            let ord = order_key_cmp(av, bv, item.direction);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    match err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// `ORDER BY` may spell a key qualified (`t.col`) even though the
/// projection stores it under its bare alias (spec.md §4.5: "ORDER BY may
/// reference projection aliases").
fn lookup_order_key<'a>(row: &'a ResultRow, key: &str) -> Option<&'a Value> {
    row.get(key).or_else(|| key.rsplit('.').next().and_then(|bare| row.get(bare)))
}

fn order_key_cmp(a: &Value, b: &Value, dir: OrderDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => if dir == OrderDirection::Asc { Ordering::Greater } else { Ordering::Less },
        (false, true) => if dir == OrderDirection::Asc { Ordering::Less } else { Ordering::Greater },
        (false, false) => {
            let ord = value::total_cmp(a, b).unwrap_or(Ordering::Equal);
            if dir == OrderDirection::Asc { ord } else { ord.reverse() }
        }
    }
}
