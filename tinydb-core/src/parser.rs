//! Recursive-descent parser (spec.md §4.2): token stream -> `Command`.

use crate::ast::*;
use crate::error::Error;
use crate::lexer::{CompOp, Keyword, Lexer, Token, TokenKind};
use crate::schema::{ColumnDefinition, ForeignKey, ReferentialAction};

pub fn parse(src: &str) -> Result<Command, Error> {
    log::trace!("parsing statement: {src}");
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(tokens);
    let command = parser.parse_command()?;
    parser.expect_end()?;
    Ok(command)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, expected: impl Into<String>) -> Error {
        let tok = self.current();
        Error::SyntaxError {
            expected: expected.into(),
            found: describe(&tok.kind),
            position: tok.position,
        }
    }

    fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(self.kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<(), Error> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.err(format!("{kw:?}")))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, Error> {
        match self.kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.err("an identifier")),
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), Error> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.err(describe(&kind)))
        }
    }

    fn expect_end(&mut self) -> Result<(), Error> {
        self.eat(&TokenKind::Semicolon);
        if matches!(self.kind(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.err("end of statement"))
        }
    }

    fn parse_command(&mut self) -> Result<Command, Error> {
        log::trace!("parse_command: dispatching on {:?}", self.kind());
        match self.kind().clone() {
            TokenKind::Keyword(Keyword::Create) => self.parse_create(),
            TokenKind::Keyword(Keyword::Drop) => self.parse_drop(),
            TokenKind::Keyword(Keyword::Use) => {
                self.advance();
                self.expect_keyword(Keyword::Database)?;
                let name = self.expect_identifier()?;
                Ok(Command::UseDatabase { name })
            }
            TokenKind::Keyword(Keyword::Show) => self.parse_show(),
            TokenKind::Keyword(Keyword::Describe) => {
                self.advance();
                let table = self.expect_identifier()?;
                Ok(Command::Describe { table })
            }
            TokenKind::Keyword(Keyword::Insert) => self.parse_insert(),
            TokenKind::Keyword(Keyword::Select) => Ok(Command::Select(self.parse_select()?)),
            TokenKind::Keyword(Keyword::Update) => self.parse_update(),
            TokenKind::Keyword(Keyword::Delete) => self.parse_delete(),
            _ => Err(self.err("a SQL statement")),
        }
    }

    // ---- DDL ----

    fn parse_create(&mut self) -> Result<Command, Error> {
        self.advance();
        if self.eat_keyword(Keyword::Database) {
            let name = self.expect_identifier()?;
            return Ok(Command::CreateDatabase { name });
        }
        self.expect_keyword(Keyword::Table)?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_def()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        self.expect(TokenKind::RParen)?;

        let pk_count = columns.iter().filter(|c| c.is_primary_key).count();
        if pk_count != 1 {
            return Err(Error::semantic(format!(
                "table `{name}` must declare exactly one PRIMARY KEY column, found {pk_count}"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for c in &columns {
            if !seen.insert(c.name.clone()) {
                return Err(Error::semantic(format!(
                    "duplicate column name `{}` in table `{name}`",
                    c.name
                )));
            }
        }
        Ok(Command::CreateTable { name, columns })
    }

    fn parse_column_def(&mut self) -> Result<ColumnDefinition, Error> {
        let name = self.expect_identifier()?;
        let data_type = self.parse_data_type()?;
        let mut is_primary_key = false;
        let mut is_unique = false;
        let mut foreign_key = None;
        loop {
            if self.eat_keyword(Keyword::Primary) {
                self.expect_keyword(Keyword::Key)?;
                is_primary_key = true;
            } else if self.eat_keyword(Keyword::Unique) {
                is_unique = true;
            } else if self.eat_keyword(Keyword::References) {
                let target_table = self.expect_identifier()?;
                self.expect(TokenKind::LParen)?;
                let target_column = self.expect_identifier()?;
                self.expect(TokenKind::RParen)?;
                let mut on_delete = ReferentialAction::Restrict;
                let mut on_update = ReferentialAction::Restrict;
                while self.eat_keyword(Keyword::On) {
                    if self.eat_keyword(Keyword::Delete) {
                        on_delete = self.parse_referential_action()?;
                    } else if self.eat_keyword(Keyword::Update) {
                        on_update = self.parse_referential_action()?;
                    } else {
                        return Err(self.err("DELETE or UPDATE"));
                    }
                }
                foreign_key = Some(ForeignKey {
                    target_table,
                    target_column,
                    on_delete,
                    on_update,
                });
            } else {
                break;
            }
        }
        Ok(ColumnDefinition {
            name,
            data_type,
            is_primary_key,
            is_unique,
            foreign_key,
        })
    }

    fn parse_data_type(&mut self) -> Result<crate::value::DataType, Error> {
        use crate::value::DataType;
        let dt = match self.kind() {
            TokenKind::Keyword(Keyword::Int) => DataType::Int,
            TokenKind::Keyword(Keyword::Float) => DataType::Float,
            TokenKind::Keyword(Keyword::StringTy) => DataType::String,
            TokenKind::Keyword(Keyword::Bool) => DataType::Bool,
            TokenKind::Keyword(Keyword::Date) => DataType::Date,
            TokenKind::Keyword(Keyword::Time) => DataType::Time,
            TokenKind::Keyword(Keyword::DateTime) => DataType::DateTime,
            _ => return Err(self.err("a column type")),
        };
        self.advance();
        Ok(dt)
    }

    fn parse_referential_action(&mut self) -> Result<ReferentialAction, Error> {
        if self.eat_keyword(Keyword::Cascade) {
            Ok(ReferentialAction::Cascade)
        } else if self.eat_keyword(Keyword::Restrict) {
            Ok(ReferentialAction::Restrict)
        } else if self.eat_keyword(Keyword::No) {
            self.expect_keyword(Keyword::Action)?;
            Ok(ReferentialAction::NoAction)
        } else if self.eat_keyword(Keyword::Set) {
            self.expect_keyword(Keyword::Null)?;
            Ok(ReferentialAction::SetNull)
        } else {
            Err(self.err("CASCADE, RESTRICT, NO ACTION or SET NULL"))
        }
    }

    fn parse_drop(&mut self) -> Result<Command, Error> {
        self.advance();
        if self.eat_keyword(Keyword::Database) {
            let name = self.expect_identifier()?;
            Ok(Command::DropDatabase { name })
        } else {
            self.expect_keyword(Keyword::Table)?;
            let name = self.expect_identifier()?;
            Ok(Command::DropTable { name })
        }
    }

    fn parse_show(&mut self) -> Result<Command, Error> {
        self.advance();
        if self.eat_keyword(Keyword::Databases) {
            Ok(Command::ShowDatabases)
        } else {
            self.expect_keyword(Keyword::Tables)?;
            Ok(Command::ShowTables)
        }
    }

    // ---- DML ----

    fn parse_insert(&mut self) -> Result<Command, Error> {
        self.advance();
        self.expect_keyword(Keyword::Into)?;
        let table = self.expect_identifier()?;
        let columns = if self.eat(&TokenKind::LParen) {
            let mut cols = Vec::new();
            loop {
                cols.push(self.expect_identifier()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
            self.expect(TokenKind::RParen)?;
            Some(cols)
        } else {
            None
        };
        self.expect_keyword(Keyword::Values)?;
        self.expect(TokenKind::LParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        self.expect(TokenKind::RParen)?;
        Ok(Command::Insert {
            table,
            columns,
            values,
        })
    }

    fn parse_literal(&mut self) -> Result<Literal, Error> {
        let negative = self.eat(&TokenKind::Minus);
        match self.kind().clone() {
            TokenKind::Number(raw) => {
                self.advance();
                Ok(parse_number_literal(&raw, negative))
            }
            TokenKind::String(s) if !negative => {
                self.advance();
                Ok(Literal::String(s))
            }
            TokenKind::Keyword(Keyword::True) if !negative => {
                self.advance();
                Ok(Literal::Bool(true))
            }
            TokenKind::Keyword(Keyword::False) if !negative => {
                self.advance();
                Ok(Literal::Bool(false))
            }
            TokenKind::Keyword(Keyword::Null) if !negative => {
                self.advance();
                Ok(Literal::Null)
            }
            _ => Err(self.err("a literal")),
        }
    }

    fn parse_update(&mut self) -> Result<Command, Error> {
        self.advance();
        let table = self.expect_identifier()?;
        self.expect_keyword(Keyword::Set)?;
        let mut assignments = Vec::new();
        loop {
            let col = self.expect_identifier()?;
            self.expect(TokenKind::Equals)?;
            let value = self.parse_update_value()?;
            assignments.push((col, value));
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        let filter = self.parse_optional_where()?;
        Ok(Command::Update {
            table,
            assignments,
            filter,
        })
    }

    fn parse_update_value(&mut self) -> Result<UpdateValue, Error> {
        if let Some(func) = self.peek_datetime_func() {
            self.advance();
            let args = self.parse_call_args()?;
            Ok(UpdateValue::DatetimeCall { func, args })
        } else {
            Ok(UpdateValue::Literal(self.parse_literal()?))
        }
    }

    fn parse_delete(&mut self) -> Result<Command, Error> {
        self.advance();
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_identifier()?;
        let filter = self.parse_optional_where()?;
        Ok(Command::Delete { table, filter })
    }

    fn parse_optional_where(&mut self) -> Result<Option<Expr>, Error> {
        if self.eat_keyword(Keyword::Where) {
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
    }

    // ---- SELECT ----

    fn parse_select(&mut self) -> Result<SelectStmt, Error> {
        log::trace!("parse_select: entering SELECT grammar");
        self.advance();
        let distinct = self.eat_keyword(Keyword::Distinct);
        let items = self.parse_select_items()?;
        self.expect_keyword(Keyword::From)?;
        let from = self.expect_identifier()?;
        let join = self.parse_optional_join()?;
        let filter = self.parse_optional_where()?;
        let group_by = self.parse_optional_group_by()?;
        let having = if self.eat_keyword(Keyword::Having) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let order_by = self.parse_optional_order_by()?;
        let (limit, offset) = self.parse_optional_limit_offset()?;
        Ok(SelectStmt {
            distinct,
            items,
            from,
            join,
            filter,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_items(&mut self) -> Result<Vec<SelectItem>, Error> {
        if self.eat(&TokenKind::Star) {
            return Ok(vec![SelectItem::Star]);
        }
        let mut items = Vec::new();
        loop {
            items.push(self.parse_select_item()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        Ok(items)
    }

    fn parse_select_item(&mut self) -> Result<SelectItem, Error> {
        if let Some(call) = self.try_parse_aggregate_call()? {
            let alias = self.parse_optional_alias()?;
            return Ok(SelectItem::Aggregate { call, alias });
        }
        let column = self.parse_column_ref()?;
        let alias = self.parse_optional_alias()?;
        Ok(SelectItem::Column { column, alias })
    }

    fn parse_optional_alias(&mut self) -> Result<Option<String>, Error> {
        if self.eat_keyword(Keyword::As) {
            Ok(Some(self.expect_identifier()?))
        } else {
            Ok(None)
        }
    }

    fn agg_func_for_keyword(&self) -> Option<AggFunc> {
        match self.kind() {
            TokenKind::Keyword(Keyword::Count) => Some(AggFunc::Count),
            TokenKind::Keyword(Keyword::Sum) => Some(AggFunc::Sum),
            TokenKind::Keyword(Keyword::Avg) => Some(AggFunc::Avg),
            TokenKind::Keyword(Keyword::Min) => Some(AggFunc::Min),
            TokenKind::Keyword(Keyword::Max) => Some(AggFunc::Max),
            _ => None,
        }
    }

    fn try_parse_aggregate_call(&mut self) -> Result<Option<AggregateCall>, Error> {
        let Some(func) = self.agg_func_for_keyword() else {
            return Ok(None);
        };
        self.advance();
        self.expect(TokenKind::LParen)?;
        let arg = if func == AggFunc::Count && self.eat(&TokenKind::Star) {
            AggArg::Star
        } else if self.eat(&TokenKind::Star) {
            return Err(Error::semantic(format!(
                "{}(*) is not supported; only COUNT(*) accepts *",
                func.name()
            )));
        } else {
            AggArg::Column(self.parse_column_ref()?)
        };
        self.expect(TokenKind::RParen)?;
        Ok(Some(AggregateCall { func, arg }))
    }

    fn parse_column_ref(&mut self) -> Result<ColumnRef, Error> {
        let first = self.expect_identifier()?;
        if self.eat(&TokenKind::Dot) {
            let column = self.expect_identifier()?;
            Ok(ColumnRef {
                table: Some(first),
                column,
            })
        } else {
            Ok(ColumnRef::bare(first))
        }
    }

    fn parse_optional_join(&mut self) -> Result<Option<JoinClause>, Error> {
        let join_type = match self.kind() {
            TokenKind::Keyword(Keyword::Inner) => {
                self.advance();
                JoinType::Inner
            }
            TokenKind::Keyword(Keyword::Left) => {
                self.advance();
                self.eat_keyword(Keyword::Outer);
                JoinType::Left
            }
            TokenKind::Keyword(Keyword::Right) => {
                self.advance();
                self.eat_keyword(Keyword::Outer);
                JoinType::Right
            }
            TokenKind::Keyword(Keyword::Full) => {
                self.advance();
                self.eat_keyword(Keyword::Outer);
                JoinType::Full
            }
            TokenKind::Keyword(Keyword::Join) => JoinType::Inner,
            _ => return Ok(None),
        };
        self.finish_join(join_type)
    }

    fn finish_join(&mut self, join_type: JoinType) -> Result<Option<JoinClause>, Error> {
        self.expect_keyword(Keyword::Join)?;
        let right_table = self.expect_identifier()?;
        self.expect_keyword(Keyword::On)?;
        let left_on = self.parse_column_ref()?;
        self.expect(TokenKind::Equals)?;
        let right_on = self.parse_column_ref()?;
        Ok(Some(JoinClause {
            join_type,
            right_table,
            left_on,
            right_on,
        }))
    }

    fn parse_optional_group_by(&mut self) -> Result<Vec<ColumnRef>, Error> {
        if !self.eat_keyword(Keyword::Group) {
            return Ok(Vec::new());
        }
        self.expect_keyword(Keyword::By)?;
        let mut cols = Vec::new();
        loop {
            cols.push(self.parse_column_ref()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        Ok(cols)
    }

    fn parse_optional_order_by(&mut self) -> Result<Vec<OrderByItem>, Error> {
        if !self.eat_keyword(Keyword::Order) {
            return Ok(Vec::new());
        }
        self.expect_keyword(Keyword::By)?;
        let mut items = Vec::new();
        loop {
            let key = self.parse_column_ref()?.to_string();
            let direction = if self.eat_keyword(Keyword::Desc) {
                OrderDirection::Desc
            } else {
                self.eat_keyword(Keyword::Asc);
                OrderDirection::Asc
            };
            items.push(OrderByItem { key, direction });
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        Ok(items)
    }

    fn parse_optional_limit_offset(&mut self) -> Result<(Option<u64>, Option<u64>), Error> {
        let limit = if self.eat_keyword(Keyword::Limit) {
            Some(self.expect_u64()?)
        } else {
            None
        };
        let offset = if self.eat_keyword(Keyword::Offset) {
            Some(self.expect_u64()?)
        } else {
            None
        };
        Ok((limit, offset))
    }

    fn expect_u64(&mut self) -> Result<u64, Error> {
        match self.kind().clone() {
            TokenKind::Number(raw) if !raw.contains('.') => {
                self.advance();
                raw.parse::<u64>()
                    .map_err(|_| self.err("a non-negative integer"))
            }
            _ => Err(self.err("a non-negative integer")),
        }
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Expr, Error> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_not()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, Error> {
        if self.eat_keyword(Keyword::Not) {
            Ok(Expr::Not(Box::new(self.parse_not()?)))
        } else {
            self.parse_predicate()
        }
    }

    fn parse_predicate(&mut self) -> Result<Expr, Error> {
        let left = self.parse_primary()?;

        if self.eat_keyword(Keyword::Is) {
            let negated = self.eat_keyword(Keyword::Not);
            self.expect_keyword(Keyword::Null)?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        if let TokenKind::Comparison(op) = self.kind() {
            let op = compare_op(*op);
            self.advance();
            let right = self.parse_primary()?;
            return Ok(Expr::Comparison {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        if self.eat(&TokenKind::Equals) {
            let right = self.parse_primary()?;
            return Ok(Expr::Comparison {
                op: CompareOp::Eq,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        let negated = self.is_keyword(Keyword::Not) && self.next_is_predicate_keyword();
        if negated {
            self.advance();
        }
        if self.eat_keyword(Keyword::Between) {
            let low = self.parse_primary()?;
            self.expect_keyword(Keyword::And)?;
            let high = self.parse_primary()?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            });
        }
        if self.eat_keyword(Keyword::In) {
            self.expect(TokenKind::LParen)?;
            let mut list = Vec::new();
            loop {
                list.push(self.parse_primary()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::In {
                expr: Box::new(left),
                list,
                negated,
            });
        }
        if self.eat_keyword(Keyword::Like) {
            let pattern = self.parse_primary()?;
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            });
        }

        Ok(left)
    }

    /// Disambiguates a local `NOT BETWEEN/IN/LIKE` modifier (consumed here)
    /// from a general prefix `NOT` (consumed one level up in `parse_not`).
    fn next_is_predicate_keyword(&self) -> bool {
        matches!(
            self.tokens.get(self.pos + 1).map(|t| &t.kind),
            Some(TokenKind::Keyword(Keyword::Between))
                | Some(TokenKind::Keyword(Keyword::In))
                | Some(TokenKind::Keyword(Keyword::Like))
        )
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        if self.eat(&TokenKind::LParen) {
            let inner = self.parse_expr()?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }
        if let Some(call) = self.try_parse_aggregate_call()? {
            return Ok(Expr::Aggregate(call));
        }
        if let Some(func) = self.peek_datetime_func() {
            self.advance();
            let args = self.parse_call_args()?;
            return Ok(Expr::DatetimeCall { func, args });
        }
        let negative = self.eat(&TokenKind::Minus);
        match self.kind().clone() {
            TokenKind::Number(raw) => {
                self.advance();
                Ok(Expr::Literal(literal_from_number(&raw, negative)))
            }
            TokenKind::String(s) if !negative => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::Keyword(Keyword::True) if !negative => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            TokenKind::Keyword(Keyword::False) if !negative => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            TokenKind::Keyword(Keyword::Null) if !negative => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::Identifier(_) if !negative => Ok(Expr::Column(self.parse_column_ref()?)),
            _ => Err(self.err("a literal, column reference or function call")),
        }
    }

    fn peek_datetime_func(&self) -> Option<DatetimeFunc> {
        match self.kind() {
            TokenKind::Keyword(Keyword::Now) => Some(DatetimeFunc::Now),
            TokenKind::Keyword(Keyword::CurrentDate) => Some(DatetimeFunc::CurrentDate),
            TokenKind::Keyword(Keyword::CurrentTime) => Some(DatetimeFunc::CurrentTime),
            TokenKind::Keyword(Keyword::Date) => Some(DatetimeFunc::DateOf),
            TokenKind::Keyword(Keyword::Time) => Some(DatetimeFunc::TimeOf),
            TokenKind::Keyword(Keyword::Year) => Some(DatetimeFunc::Year),
            TokenKind::Keyword(Keyword::Month) => Some(DatetimeFunc::Month),
            TokenKind::Keyword(Keyword::Day) => Some(DatetimeFunc::Day),
            TokenKind::Keyword(Keyword::Hour) => Some(DatetimeFunc::Hour),
            TokenKind::Keyword(Keyword::Minute) => Some(DatetimeFunc::Minute),
            TokenKind::Keyword(Keyword::Second) => Some(DatetimeFunc::Second),
            TokenKind::Keyword(Keyword::DateAdd) => Some(DatetimeFunc::DateAdd),
            TokenKind::Keyword(Keyword::DateSub) => Some(DatetimeFunc::DateSub),
            TokenKind::Keyword(Keyword::DateDiff) => Some(DatetimeFunc::DateDiff),
            TokenKind::Keyword(Keyword::DayOfWeek) => Some(DatetimeFunc::DayOfWeek),
            TokenKind::Keyword(Keyword::DayName) => Some(DatetimeFunc::DayName),
            _ => None,
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, Error> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.kind(), TokenKind::RParen) {
            loop {
                args.push(self.parse_primary()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }
}

fn compare_op(op: CompOp) -> CompareOp {
    match op {
        CompOp::Lt => CompareOp::Lt,
        CompOp::Gt => CompareOp::Gt,
        CompOp::Le => CompareOp::Le,
        CompOp::Ge => CompareOp::Ge,
        CompOp::Ne => CompareOp::Ne,
    }
}

fn parse_number_literal(raw: &str, negative: bool) -> Literal {
    literal_from_number(raw, negative)
}

fn literal_from_number(raw: &str, negative: bool) -> Literal {
    if raw.contains('.') {
        let v: f64 = raw.parse().unwrap_or(0.0);
        Literal::Float(if negative { -v } else { v })
    } else {
        match raw.parse::<i64>() {
            Ok(v) => Literal::Integer(if negative { -v } else { v }),
            Err(_) => {
                let v: f64 = raw.parse().unwrap_or(0.0);
                Literal::Float(if negative { -v } else { v })
            }
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(s) => format!("number `{s}`"),
        TokenKind::String(s) => format!("string '{s}'"),
        TokenKind::Identifier(s) => format!("identifier `{s}`"),
        TokenKind::Keyword(k) => format!("keyword {k:?}"),
        TokenKind::Comparison(op) => format!("`{op}`"),
        TokenKind::Equals => "`=`".into(),
        TokenKind::Comma => "`,`".into(),
        TokenKind::Dot => "`.`".into(),
        TokenKind::LParen => "`(`".into(),
        TokenKind::RParen => "`)`".into(),
        TokenKind::Semicolon => "`;`".into(),
        TokenKind::Star => "`*`".into(),
        TokenKind::Minus => "`-`".into(),
        TokenKind::Eof => "end of input".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table_with_fk() {
        let cmd = parse(
            "CREATE TABLE o (id INT PRIMARY KEY, u_id INT REFERENCES u(id) ON DELETE CASCADE)",
        )
        .unwrap();
        match cmd {
            Command::CreateTable { name, columns } => {
                assert_eq!(name, "o");
                assert_eq!(columns.len(), 2);
                let fk = columns[1].foreign_key.as_ref().unwrap();
                assert_eq!(fk.on_delete, ReferentialAction::Cascade);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn rejects_two_primary_keys() {
        assert!(parse("CREATE TABLE t (a INT PRIMARY KEY, b INT PRIMARY KEY)").is_err());
    }

    #[test]
    fn parses_insert_with_negative_number() {
        let cmd = parse("INSERT INTO t VALUES (-5, 'x')").unwrap();
        match cmd {
            Command::Insert { values, .. } => {
                assert_eq!(values[0], Literal::Integer(-5));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn parses_select_with_group_having_order() {
        let cmd = parse(
            "SELECT uid, SUM(amt) AS s FROM ord GROUP BY uid HAVING SUM(amt) > 10 ORDER BY s DESC",
        )
        .unwrap();
        match cmd {
            Command::Select(stmt) => {
                assert_eq!(stmt.group_by.len(), 1);
                assert!(stmt.having.is_some());
                assert_eq!(stmt.order_by[0].direction, OrderDirection::Desc);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn parses_left_join() {
        let cmd =
            parse("SELECT u.n, o.id FROM u LEFT JOIN o ON u.id = o.u_id ORDER BY u.n").unwrap();
        match cmd {
            Command::Select(stmt) => {
                let join = stmt.join.unwrap();
                assert_eq!(join.join_type, JoinType::Left);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn parses_not_between() {
        let cmd = parse("SELECT * FROM t WHERE x NOT BETWEEN 1 AND 5").unwrap();
        match cmd {
            Command::Select(stmt) => match stmt.filter.unwrap() {
                Expr::Between { negated, .. } => assert!(negated),
                _ => panic!("expected Between"),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn parses_general_not_prefix() {
        let cmd = parse("SELECT * FROM t WHERE NOT (a = 1)").unwrap();
        match cmd {
            Command::Select(stmt) => assert!(matches!(stmt.filter.unwrap(), Expr::Not(_))),
            _ => panic!(),
        }
    }

    #[test]
    fn parses_update_multi_column() {
        let cmd = parse("UPDATE t SET a = 1, b = 'x' WHERE id = 2").unwrap();
        match cmd {
            Command::Update { assignments, .. } => assert_eq!(assignments.len(), 2),
            _ => panic!(),
        }
    }

    #[test]
    fn parses_datetime_predicate() {
        let cmd = parse("SELECT id FROM e WHERE YEAR(d) = 2025").unwrap();
        assert!(matches!(cmd, Command::Select(_)));
    }
}
