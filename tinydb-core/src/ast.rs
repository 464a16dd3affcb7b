//! The typed command + expression AST the parser (spec.md §4.2) produces.

use crate::schema::ColumnDefinition;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A bare or table-qualified column reference (spec.md §4.2: "Qualified
/// column references `table.col` are accepted everywhere a column is
/// legal").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn bare(column: impl Into<String>) -> Self {
        ColumnRef {
            table: None,
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.table {
            Some(t) => write!(f, "{t}.{}", self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggArg {
    Star,
    Column(ColumnRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub func: AggFunc,
    pub arg: AggArg,
}

impl AggregateCall {
    /// Auto-alias key per spec.md §6: `COUNT(*)`, `SUM(amount)`.
    pub fn auto_alias(&self) -> String {
        let arg = match &self.arg {
            AggArg::Star => "*".to_string(),
            AggArg::Column(c) => c.to_string(),
        };
        format!("{}({arg})", self.func.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatetimeFunc {
    Now,
    CurrentDate,
    CurrentTime,
    DateOf,
    TimeOf,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    DateAdd,
    DateSub,
    DateDiff,
    DayOfWeek,
    DayName,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Column(ColumnRef),
    Aggregate(AggregateCall),
    DatetimeCall {
        func: DatetimeFunc,
        args: Vec<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Comparison {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
}

/// The right-hand side of an `UPDATE ... SET col = <rhs>` assignment:
/// restricted to a literal or a datetime-function result (spec.md §4.2,
/// no column arithmetic in scope).
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateValue {
    Literal(Literal),
    DatetimeCall {
        func: DatetimeFunc,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub right_table: String,
    pub left_on: ColumnRef,
    pub right_on: ColumnRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Star,
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    Aggregate {
        call: AggregateCall,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    /// A bare name here may resolve against a projection alias (spec.md
    /// §4.5: "ORDER BY may reference projection aliases") before falling
    /// back to a relation column.
    pub key: String,
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: String,
    pub join: Option<JoinClause>,
    pub filter: Option<Expr>,
    pub group_by: Vec<ColumnRef>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateDatabase {
        name: String,
    },
    DropDatabase {
        name: String,
    },
    UseDatabase {
        name: String,
    },
    ShowDatabases,
    CreateTable {
        name: String,
        columns: Vec<ColumnDefinition>,
    },
    DropTable {
        name: String,
    },
    ShowTables,
    Describe {
        table: String,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Literal>,
    },
    Select(SelectStmt),
    Update {
        table: String,
        assignments: Vec<(String, UpdateValue)>,
        filter: Option<Expr>,
    },
    Delete {
        table: String,
        filter: Option<Expr>,
    },
}
