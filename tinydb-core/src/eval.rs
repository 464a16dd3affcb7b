//! Expression evaluator (spec.md §4.3): three-valued logic, comparison
//! rules, `LIKE`/`BETWEEN`/`IN`, column resolution and datetime builtins.

use std::cmp::Ordering;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::ast::{AggArg, AggFunc, ColumnRef, CompareOp, DatetimeFunc, Expr, Literal};
use crate::error::Error;
use crate::value::{self, Value};

/// The name -> value map exposed to the evaluator for one logical row
/// (spec.md glossary: "row binding"), possibly a joined pair. Every entry
/// is stored once unqualified (`col`) and once per owning relation
/// (`table.col`); a bare lookup that finds more than one unqualified entry
/// is ambiguous.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    entries: Vec<(Option<String>, String, Value)>,
}

impl Binding {
    pub fn new() -> Self {
        Binding::default()
    }

    /// Build a binding for a single relation's row: every column present
    /// both bare and as `table.col` (spec.md §4.5 step 1).
    pub fn for_table(table: &str, row: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut entries = Vec::new();
        for (col, val) in row {
            entries.push((None, col.clone(), val.clone()));
            entries.push((Some(table.to_string()), col, val));
        }
        Binding { entries }
    }

    /// Merge two relations' bindings for a joined row. Deliberately keeps
    /// both sides' unqualified entries even when they collide on name --
    /// that collision is exactly what makes the bare reference ambiguous
    /// downstream (spec.md §4.5: "if the same bare name exists on both
    /// sides, qualified form is required").
    pub fn join(left: &Binding, right: &Binding) -> Self {
        let mut entries = left.entries.clone();
        entries.extend(right.entries.iter().cloned());
        Binding { entries }
    }

    /// Insert a synthetic flat entry (group-by column or aggregate
    /// auto-alias) with no table qualifier.
    pub fn put(&mut self, name: impl Into<String>, value: Value) {
        self.entries.push((None, name.into(), value));
    }

    pub fn get_by_name(&self, name: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(table, col, _)| table.is_none() && col == name)
            .map(|(_, _, v)| v.clone())
    }

    pub fn resolve(&self, col_ref: &ColumnRef) -> Result<Value, Error> {
        if let Some(table) = &col_ref.table {
            let mut matches = self
                .entries
                .iter()
                .filter(|(t, c, _)| t.as_deref() == Some(table.as_str()) && c == &col_ref.column);
            if let Some((_, _, v)) = matches.next() {
                if matches.next().is_some() {
                    return Err(Error::AmbiguousColumn {
                        column: col_ref.to_string(),
                    });
                }
                return Ok(v.clone());
            }
            // Parser-emitted qualified names may need to resolve against a
            // binding keyed only by bare names; strip the qualifier and
            // retry once (spec.md §4.3).
            return self.resolve(&ColumnRef::bare(col_ref.column.clone()));
        }
        let mut matches = self
            .entries
            .iter()
            .filter(|(t, c, _)| t.is_none() && c == &col_ref.column);
        match (matches.next(), matches.next()) {
            (Some((_, _, v)), None) => Ok(v.clone()),
            (Some(_), Some(_)) => Err(Error::AmbiguousColumn {
                column: col_ref.column.clone(),
            }),
            (None, _) => Err(Error::not_found(format!(
                "column `{}` not found",
                col_ref.column
            ))),
        }
    }
}

fn truthy(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

pub fn tv_and(a: Value, b: Value) -> Value {
    match (truthy(&a), truthy(&b)) {
        (Some(false), _) | (_, Some(false)) => Value::Bool(false),
        (Some(true), Some(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

pub fn tv_or(a: Value, b: Value) -> Value {
    match (truthy(&a), truthy(&b)) {
        (Some(true), _) | (_, Some(true)) => Value::Bool(true),
        (Some(false), Some(false)) => Value::Bool(false),
        _ => Value::Null,
    }
}

pub fn tv_not(a: Value) -> Value {
    match truthy(&a) {
        Some(b) => Value::Bool(!b),
        None => Value::Null,
    }
}

/// A number a `Value` can be compared as, for the cross-type comparison
/// rules of spec.md §4.3 ("String<->number: parse ... Bool<->int:
/// TRUE=1, FALSE=0").
fn comparable_number(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(_) | Value::Float(_) | Value::Bool(_) => v.as_f64(),
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// The three-valued SQL `=`/`<`/... family. Distinct from
/// `value::total_cmp`, which is a strict typed order used by ORDER BY/
/// MIN/MAX and never produces Null.
pub fn compare_values(op: CompareOp, a: &Value, b: &Value) -> Value {
    if a.is_null() || b.is_null() {
        return Value::Null;
    }
    let ordering = match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.as_str().cmp(y.as_str())),
        (Value::Date(x), Value::Date(y)) => x.partial_cmp(y),
        (Value::Time(x), Value::Time(y)) => x.partial_cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.partial_cmp(y),
        _ => match (comparable_number(a), comparable_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => return Value::Null,
        },
    };
    match ordering {
        Some(ord) => Value::Bool(matches_ordering(op, ord)),
        None => Value::Null,
    }
}

fn matches_ordering(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
    }
}

/// `%` any run, `_` any one char, matched by compiling the pattern to a
/// regex (teacher pattern: `fancy_regex::escape` over literal runs, as in
/// `crates/lib-core/src/parser/lexer.rs`'s own SQL-pattern-to-regex path),
/// case-insensitive for ASCII text to match typical SQL collation.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let case_insensitive = text.is_ascii() && pattern.is_ascii();
    let mut regex_src = String::from("(?s)^");
    if case_insensitive {
        regex_src.push_str("(?i)");
    }
    for ch in pattern.chars() {
        match ch {
            '%' => regex_src.push_str(".*"),
            '_' => regex_src.push('.'),
            other => regex_src.push_str(&fancy_regex::escape(&other.to_string())),
        }
    }
    regex_src.push('$');
    fancy_regex::Regex::new(&regex_src)
        .ok()
        .and_then(|re| re.is_match(text).ok())
        .unwrap_or(false)
}

pub fn eval_expr(expr: &Expr, binding: &Binding) -> Result<Value, Error> {
    Ok(match expr {
        Expr::Literal(lit) => literal_value(lit),
        Expr::Column(col) => binding.resolve(col)?,
        Expr::Aggregate(call) => binding.get_by_name(&call.auto_alias()).ok_or_else(|| {
            Error::semantic(format!(
                "aggregate {} is not available in this context",
                call.auto_alias()
            ))
        })?,
        Expr::DatetimeCall { func, args } => eval_datetime(*func, args, binding)?,
        Expr::And(l, r) => tv_and(eval_expr(l, binding)?, eval_expr(r, binding)?),
        Expr::Or(l, r) => tv_or(eval_expr(l, binding)?, eval_expr(r, binding)?),
        Expr::Not(e) => tv_not(eval_expr(e, binding)?),
        Expr::Comparison { op, left, right } => {
            compare_values(*op, &eval_expr(left, binding)?, &eval_expr(right, binding)?)
        }
        Expr::IsNull { expr, negated } => {
            let is_null = eval_expr(expr, binding)?.is_null();
            Value::Bool(is_null != *negated)
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let v = eval_expr(expr, binding)?;
            let lo = eval_expr(low, binding)?;
            let hi = eval_expr(high, binding)?;
            let ge = compare_values(CompareOp::Ge, &v, &lo);
            let le = compare_values(CompareOp::Le, &v, &hi);
            let result = tv_and(ge, le);
            if *negated {
                tv_not(result)
            } else {
                result
            }
        }
        Expr::In {
            expr,
            list,
            negated,
        } => {
            let v = eval_expr(expr, binding)?;
            let mut acc = Value::Bool(false);
            for item in list {
                let candidate = eval_expr(item, binding)?;
                let eq = compare_values(CompareOp::Eq, &v, &candidate);
                acc = tv_or(acc, eq);
            }
            if *negated {
                tv_not(acc)
            } else {
                acc
            }
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => {
            let v = eval_expr(expr, binding)?;
            let p = eval_expr(pattern, binding)?;
            let result = match (&v, &p) {
                (Value::Null, _) | (_, Value::Null) => Value::Null,
                (Value::Text(text), Value::Text(pat)) => Value::Bool(like_match(text, pat)),
                _ => {
                    return Err(Error::type_error("LIKE requires string operands"));
                }
            };
            if *negated {
                tv_not(result)
            } else {
                result
            }
        }
    })
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Integer(i) => Value::Integer(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::String(s) => Value::Text(s.clone()),
    }
}

fn eval_datetime(func: DatetimeFunc, args: &[Expr], binding: &Binding) -> Result<Value, Error> {
    let values: Vec<Value> = args
        .iter()
        .map(|a| eval_expr(a, binding))
        .collect::<Result<_, _>>()?;
    if values.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    Ok(match func {
        DatetimeFunc::Now => Value::DateTime(now_datetime()),
        DatetimeFunc::CurrentDate => Value::Date(now_datetime().date()),
        DatetimeFunc::CurrentTime => Value::Time(now_datetime().time()),
        DatetimeFunc::DateOf => match date_of(values.first()) {
            Some(d) => Value::Date(d),
            None => Value::Null,
        },
        DatetimeFunc::TimeOf => match time_of(values.first()) {
            Some(t) => Value::Time(t),
            None => Value::Null,
        },
        DatetimeFunc::Year => match date_of(values.first()) {
            Some(d) => Value::Integer(chrono::Datelike::year(&d) as i64),
            None => Value::Null,
        },
        DatetimeFunc::Month => match date_of(values.first()) {
            Some(d) => Value::Integer(chrono::Datelike::month(&d) as i64),
            None => Value::Null,
        },
        DatetimeFunc::Day => match date_of(values.first()) {
            Some(d) => Value::Integer(chrono::Datelike::day(&d) as i64),
            None => Value::Null,
        },
        DatetimeFunc::Hour => match time_of(values.first()) {
            Some(t) => Value::Integer(value::hour_of(t)),
            None => Value::Null,
        },
        DatetimeFunc::Minute => match time_of(values.first()) {
            Some(t) => Value::Integer(value::minute_of(t)),
            None => Value::Null,
        },
        DatetimeFunc::Second => match time_of(values.first()) {
            Some(t) => Value::Integer(value::second_of(t)),
            None => Value::Null,
        },
        DatetimeFunc::DateAdd | DatetimeFunc::DateSub => {
            let Some(days) = values.get(1).and_then(as_i64) else {
                return Err(Error::type_error(format!(
                    "{:?} expects an integer day count",
                    func
                )));
            };
            let signed = if matches!(func, DatetimeFunc::DateSub) {
                -days
            } else {
                days
            };
            match values.first() {
                Some(Value::DateTime(dt)) => {
                    Value::DateTime(*dt + chrono::Duration::days(signed))
                }
                other => match date_of(other) {
                    Some(d) => Value::Date(value::date_add(d, signed)),
                    None => Value::Null,
                },
            }
        }
        DatetimeFunc::DateDiff => {
            match (date_of(values.first()), date_of(values.get(1))) {
                (Some(a), Some(b)) => Value::Integer(value::datediff(a, b)),
                _ => Value::Null,
            }
        }
        DatetimeFunc::DayOfWeek => match date_of(values.first()) {
            Some(d) => Value::Integer(value::day_of_week(d)),
            None => Value::Null,
        },
        DatetimeFunc::DayName => match date_of(values.first()) {
            Some(d) => Value::Text(value::day_name(d).to_string()),
            None => Value::Null,
        },
    })
}

fn now_datetime() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Accepts a `Date`/`DateTime` value directly, or a `Text` value parsed as
/// a date literal (spec.md §9: datetime builtins are permissive about
/// string arguments, returning Null rather than erroring on a bad one).
fn date_of(v: Option<&Value>) -> Option<NaiveDate> {
    match v {
        Some(Value::Date(d)) => Some(*d),
        Some(Value::DateTime(dt)) => Some(dt.date()),
        Some(Value::Text(s)) => value::parse_date(s),
        _ => None,
    }
}

fn time_of(v: Option<&Value>) -> Option<NaiveTime> {
    match v {
        Some(Value::Time(t)) => Some(*t),
        Some(Value::DateTime(dt)) => Some(dt.time()),
        Some(Value::Text(s)) => value::parse_time(s),
        _ => None,
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Integer(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}

/// COUNT/SUM/AVG/MIN/MAX over one group's already-projected values
/// (spec.md §4.5). `group_len` backs `COUNT(*)`.
pub fn compute_aggregate(
    func: AggFunc,
    arg: &AggArg,
    values: &[Value],
    group_len: usize,
) -> Result<Value, Error> {
    if func == AggFunc::Count && matches!(arg, AggArg::Star) {
        return Ok(Value::Integer(group_len as i64));
    }
    let non_null: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
    Ok(match func {
        AggFunc::Count => Value::Integer(non_null.len() as i64),
        AggFunc::Sum | AggFunc::Avg => {
            if non_null.is_empty() {
                return Ok(Value::Null);
            }
            let mut sum = 0.0f64;
            let mut all_integer = true;
            for v in &non_null {
                match v {
                    Value::Integer(i) => sum += *i as f64,
                    Value::Float(f) => {
                        all_integer = false;
                        sum += f;
                    }
                    _ => {
                        return Err(Error::type_error(
                            "SUM/AVG require a numeric column".to_string(),
                        ));
                    }
                }
            }
            if func == AggFunc::Avg {
                Value::Float(sum / non_null.len() as f64)
            } else if all_integer {
                Value::Integer(sum as i64)
            } else {
                Value::Float(sum)
            }
        }
        AggFunc::Min | AggFunc::Max => {
            if non_null.is_empty() {
                return Ok(Value::Null);
            }
            let mut best = non_null[0].clone();
            for v in &non_null[1..] {
                let better = match value::total_cmp(v, &best) {
                    Some(Ordering::Less) => func == AggFunc::Min,
                    Some(Ordering::Greater) => func == AggFunc::Max,
                    _ => false,
                };
                if better {
                    best = (*v).clone();
                }
            }
            best
        }
    })
}

/// Equality used by DISTINCT and GROUP BY: unlike `compare_values`, Null
/// equals Null here (spec.md §9 "NULL semantics pitfalls").
pub fn group_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        _ => value::total_cmp(a, b) == Some(Ordering::Equal),
    }
}
