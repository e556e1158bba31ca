use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::limits::{MAX_IN_CLAUSE_IDS, MAX_PAGE_SIZE};
use crate::model::*;

pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    CreateUser {
        id: Ulid,
        name: String,
    },
    DeleteUser {
        id: Ulid,
    },
    CreateItem {
        id: Ulid,
        owner_id: Ulid,
        name: String,
        available: bool,
    },
    SetItemAvailable {
        item_id: Ulid,
        actor_id: Ulid,
        available: bool,
    },
    RequestBooking {
        id: Ulid,
        item_id: Ulid,
        booker_id: Ulid,
        start: Ms,
        end: Ms,
    },
    DecideBooking {
        booking_id: Ulid,
        actor_id: Ulid,
        approve: bool,
    },
    AddComment {
        id: Ulid,
        item_id: Ulid,
        author_id: Ulid,
        text: String,
    },
    SelectBookingById {
        booking_id: Ulid,
        requester_id: Ulid,
    },
    SelectBookingsByOwner {
        owner_id: Ulid,
        filter: StateFilter,
        offset: usize,
        limit: usize,
    },
    SelectBookingsByBooker {
        booker_id: Ulid,
        filter: StateFilter,
        offset: usize,
        limit: usize,
    },
    SelectItems {
        owner_id: Ulid,
    },
    SelectAvailability {
        item_ids: Vec<Ulid>,
    },
    CanComment {
        user_id: Ulid,
        item_id: Ulid,
    },
    Listen {
        channel: String,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    if trimmed.to_uppercase().starts_with("LISTEN ") {
        let channel = trimmed[7..].trim().trim_matches(';').to_string();
        return Ok(Command::Listen { channel });
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "users" => {
            if values.len() < 2 {
                return Err(SqlError::WrongArity("users", 2, values.len()));
            }
            Ok(Command::CreateUser {
                id: parse_ulid(&values[0])?,
                name: parse_string(&values[1])?,
            })
        }
        "items" => {
            if values.len() < 4 {
                return Err(SqlError::WrongArity("items", 4, values.len()));
            }
            Ok(Command::CreateItem {
                id: parse_ulid(&values[0])?,
                owner_id: parse_ulid(&values[1])?,
                name: parse_string(&values[2])?,
                available: parse_bool(&values[3])?,
            })
        }
        "bookings" => {
            if values.len() < 5 {
                return Err(SqlError::WrongArity("bookings", 5, values.len()));
            }
            Ok(Command::RequestBooking {
                id: parse_ulid(&values[0])?,
                item_id: parse_ulid(&values[1])?,
                booker_id: parse_ulid(&values[2])?,
                start: parse_i64(&values[3])?,
                end: parse_i64(&values[4])?,
            })
        }
        "comments" => {
            if values.len() < 4 {
                return Err(SqlError::WrongArity("comments", 4, values.len()));
            }
            Ok(Command::AddComment {
                id: parse_ulid(&values[0])?,
                item_id: parse_ulid(&values[1])?,
                author_id: parse_ulid(&values[2])?,
                text: parse_string(&values[3])?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "users" => Ok(Command::DeleteUser { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let filters = collect_filters(selection)?;

    match table.as_str() {
        // UPDATE items SET available = b WHERE id = '…' AND owner_id = '…'
        "items" => {
            let available = assignment_bool(assignments, "available")?;
            Ok(Command::SetItemAvailable {
                item_id: filters.require_ulid("id")?,
                actor_id: filters.require_ulid("owner_id")?,
                available,
            })
        }
        // UPDATE bookings SET approved = b WHERE id = '…' AND owner_id = '…'
        "bookings" => {
            let approve = assignment_bool(assignments, "approved")?;
            Ok(Command::DecideBooking {
                booking_id: filters.require_ulid("id")?,
                actor_id: filters.require_ulid("owner_id")?,
                approve,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = collect_filters(&select.selection)?;

    match table.as_str() {
        "bookings" => parse_select_bookings(&filters),
        "items" => Ok(Command::SelectItems {
            owner_id: filters.require_ulid("owner_id")?,
        }),
        "availability" => {
            let item_ids = match filters
                .in_lists
                .iter()
                .find(|(col, _)| col == "item_id")
            {
                Some((_, ids)) => ids.clone(),
                None => filters
                    .ulid("item_id")?
                    .map(|id| vec![id])
                    .ok_or(SqlError::MissingFilter("item_id"))?,
            };
            if item_ids.is_empty() {
                return Err(SqlError::MissingFilter("item_id"));
            }
            if item_ids.len() > MAX_IN_CLAUSE_IDS {
                return Err(SqlError::InvalidArgument(format!(
                    "too many item ids (max {MAX_IN_CLAUSE_IDS})"
                )));
            }
            Ok(Command::SelectAvailability { item_ids })
        }
        "can_comment" => Ok(Command::CanComment {
            user_id: filters.require_ulid("user_id")?,
            item_id: filters.require_ulid("item_id")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// `WHERE id = …` fetches one booking (requester_id is the acting user for
/// visibility masking). `WHERE owner_id = …` or `WHERE booker_id = …` lists,
/// with optional `state`, `"offset"` and `"limit"` pseudo-columns.
fn parse_select_bookings(filters: &Filters) -> Result<Command, SqlError> {
    if let Some(booking_id) = filters.ulid("id")? {
        return Ok(Command::SelectBookingById {
            booking_id,
            requester_id: filters.require_ulid("requester_id")?,
        });
    }

    let filter = match filters.string("state")? {
        Some(s) => StateFilter::parse(&s)
            .ok_or_else(|| SqlError::InvalidArgument(format!("unsupported state: {s}")))?,
        None => StateFilter::All,
    };
    let offset = match filters.i64("offset")? {
        Some(n) if n < 0 => return Err(SqlError::InvalidArgument("offset must be >= 0".into())),
        Some(n) => n as usize,
        None => 0,
    };
    let limit = match filters.i64("limit")? {
        Some(n) if n < 1 || n as usize > MAX_PAGE_SIZE => {
            return Err(SqlError::InvalidArgument(format!(
                "limit must be 1..={MAX_PAGE_SIZE}"
            )));
        }
        Some(n) => n as usize,
        None => DEFAULT_PAGE_LIMIT,
    };

    if let Some(owner_id) = filters.ulid("owner_id")? {
        Ok(Command::SelectBookingsByOwner {
            owner_id,
            filter,
            offset,
            limit,
        })
    } else if let Some(booker_id) = filters.ulid("booker_id")? {
        Ok(Command::SelectBookingsByBooker {
            booker_id,
            filter,
            offset,
            limit,
        })
    } else {
        Err(SqlError::MissingFilter("owner_id or booker_id"))
    }
}

// ── WHERE clause ──────────────────────────────────────────────

/// Flattened conjunction of a WHERE clause: `col = value` pairs plus
/// `col IN (…)` ULID lists. Anything else in the clause is an error, so a
/// silently ignored predicate can never widen a result set.
#[derive(Default)]
struct Filters {
    eq: Vec<(String, Expr)>,
    in_lists: Vec<(String, Vec<Ulid>)>,
}

impl Filters {
    fn get(&self, col: &str) -> Option<&Expr> {
        self.eq.iter().find(|(c, _)| c == col).map(|(_, e)| e)
    }

    fn ulid(&self, col: &str) -> Result<Option<Ulid>, SqlError> {
        self.get(col).map(parse_ulid).transpose()
    }

    fn require_ulid(&self, col: &'static str) -> Result<Ulid, SqlError> {
        self.ulid(col)?.ok_or(SqlError::MissingFilter(col))
    }

    fn i64(&self, col: &str) -> Result<Option<i64>, SqlError> {
        self.get(col).map(parse_i64).transpose()
    }

    fn string(&self, col: &str) -> Result<Option<String>, SqlError> {
        self.get(col).map(parse_string).transpose()
    }
}

fn collect_filters(selection: &Option<Expr>) -> Result<Filters, SqlError> {
    let mut filters = Filters::default();
    if let Some(expr) = selection {
        walk_conjunction(expr, &mut filters)?;
    }
    Ok(filters)
}

fn walk_conjunction(expr: &Expr, filters: &mut Filters) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            walk_conjunction(left, filters)?;
            walk_conjunction(right, filters)?;
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Parse(format!("expected column, got {left}")))?;
            filters.eq.push((col, (**right).clone()));
        }
        Expr::InList {
            expr: col_expr,
            list,
            negated: false,
        } => {
            let col = expr_column_name(col_expr)
                .ok_or_else(|| SqlError::Parse(format!("expected column, got {col_expr}")))?;
            let ids = list.iter().map(parse_ulid).collect::<Result<Vec<_>, _>>()?;
            filters.in_lists.push((col, ids));
        }
        Expr::Nested(inner) => walk_conjunction(inner, filters)?,
        other => return Err(SqlError::Unsupported(format!("WHERE clause: {other}"))),
    }
    Ok(())
}

fn assignment_bool(assignments: &[ast::Assignment], col: &str) -> Result<bool, SqlError> {
    for a in assignments {
        let ast::AssignmentTarget::ColumnName(name) = &a.target else {
            continue;
        };
        if object_name_last(name).as_deref() == Some(col) {
            return parse_bool(&a.value);
        }
    }
    Err(SqlError::MissingFilter("assignment"))
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let filters = collect_filters(selection)?;
    filters.require_ulid("id")
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) => Ok(s.clone()),
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
    /// Syntactically fine, semantically invalid: unknown state filter,
    /// out-of-range offset/limit. Distinguished from Parse so the wire
    /// can report invalid_parameter_value instead of syntax_error.
    InvalidArgument(String),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::InvalidArgument(s) => write!(f, "invalid argument: {s}"),
        }
    }
}

impl std::error::Error for SqlError {}
