use std::collections::HashMap;

use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;
use crate::money::{parse_cents, Cents};

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertBranch {
        id: Ulid,
        name: String,
    },
    InsertRoomType {
        room_type: RoomType,
    },
    DeleteRoomType {
        name: String,
    },
    InsertRoom {
        id: Ulid,
        branch_id: Ulid,
        room_type: String,
        number: String,
    },
    InsertBooking {
        branch: String,
        pax: u32,
        check_in: NaiveDate,
        check_out: NaiveDate,
        rooms: Vec<RoomRequest>,
        guest_id: Option<Ulid>,
    },
    CancelBooking {
        id: Ulid,
    },
    CheckIn {
        booking_id: Ulid,
    },
    CheckOut {
        booking_id: Ulid,
    },
    InsertBill {
        booking_id: Ulid,
        service_total: Cents,
        tax_rate_bps: u32,
    },
    InsertPayment {
        booking_id: Ulid,
        method: PaymentMethod,
        amount: Cents,
    },
    SelectBill {
        booking_id: Ulid,
    },
    SelectPayments {
        booking_id: Ulid,
    },
    SelectBookings {
        id: Option<Ulid>,
    },
    SelectBookedRooms {
        booking_id: Ulid,
    },
    SelectAvailability {
        branch: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    SelectOccupiedRooms {
        branch: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    SelectBranches,
    SelectRoomTypes,
    SelectRooms {
        branch: Option<String>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    if stmts.len() > 1 {
        return Err(SqlError::Unsupported("multiple statements".into()));
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;

    match table.as_str() {
        "branches" => {
            let row = Row::from_insert(insert, "branches", &["id", "name"])?;
            Ok(Command::InsertBranch {
                id: parse_ulid_expr(row.required("id")?)?,
                name: parse_string_expr(row.required("name")?)?,
            })
        }
        "room_types" => {
            let row = Row::from_insert(insert, "room_types", &["name", "capacity", "base_price", "amenities"])?;
            Ok(Command::InsertRoomType {
                room_type: RoomType {
                    name: parse_string_expr(row.required("name")?)?,
                    capacity: parse_u32(row.required("capacity")?)?,
                    base_price: parse_money_expr(row.required("base_price")?)?,
                    amenities: row.optional("amenities").map(parse_string_expr).transpose()?,
                },
            })
        }
        "rooms" => {
            let row = Row::from_insert(insert, "rooms", &["id", "branch_id", "room_type", "number"])?;
            Ok(Command::InsertRoom {
                id: parse_ulid_expr(row.required("id")?)?,
                branch_id: parse_ulid_expr(row.required("branch_id")?)?,
                room_type: parse_string_expr(row.required("room_type")?)?,
                number: parse_string_expr(row.required("number")?)?,
            })
        }
        "bookings" => {
            let row = Row::from_insert(
                insert,
                "bookings",
                &["branch", "pax", "check_in", "check_out", "rooms", "guest_id"],
            )?;
            Ok(Command::InsertBooking {
                branch: parse_string_expr(row.required("branch")?)?,
                pax: parse_u32(row.required("pax")?)?,
                check_in: parse_date_expr(row.required("check_in")?)?,
                check_out: parse_date_expr(row.required("check_out")?)?,
                rooms: parse_room_list(&parse_string_expr(row.required("rooms")?)?)?,
                guest_id: row.optional("guest_id").map(parse_ulid_expr).transpose()?,
            })
        }
        "check_ins" => {
            let row = Row::from_insert(insert, "check_ins", &["booking_id"])?;
            Ok(Command::CheckIn {
                booking_id: parse_ulid_expr(row.required("booking_id")?)?,
            })
        }
        "check_outs" => {
            let row = Row::from_insert(insert, "check_outs", &["booking_id"])?;
            Ok(Command::CheckOut {
                booking_id: parse_ulid_expr(row.required("booking_id")?)?,
            })
        }
        "bills" => {
            let row = Row::from_insert(insert, "bills", &["booking_id", "service_total", "tax_rate_bps"])?;
            Ok(Command::InsertBill {
                booking_id: parse_ulid_expr(row.required("booking_id")?)?,
                service_total: row.optional("service_total").map(parse_money_expr).transpose()?.unwrap_or(0),
                tax_rate_bps: row.optional("tax_rate_bps").map(parse_u32).transpose()?.unwrap_or(0),
            })
        }
        "payments" => {
            let row = Row::from_insert(insert, "payments", &["booking_id", "method", "amount"])?;
            let method_name = parse_string_expr(row.required("method")?)?;
            let method = PaymentMethod::parse(&method_name)
                .ok_or_else(|| SqlError::Parse(format!("unknown payment method: {method_name}")))?;
            Ok(Command::InsertPayment {
                booking_id: parse_ulid_expr(row.required("booking_id")?)?,
                method,
                amount: parse_money_expr(row.required("amount")?)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = eq_filters(delete.selection.as_ref())?;
    let allowed: &[&str] = match table.as_str() {
        "bookings" => &["id"],
        "room_types" => &["name"],
        _ => &[],
    };
    check_filters(&table, &filters, allowed)?;

    match table.as_str() {
        "bookings" => Ok(Command::CancelBooking {
            id: parse_ulid_expr(filter(&filters, "id")?)?,
        }),
        "room_types" => Ok(Command::DeleteRoomType {
            name: parse_string_expr(filter(&filters, "name")?)?,
        }),
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
    let filters = eq_filters(select.selection.as_ref())?;
    let allowed: &[&str] = match table.as_str() {
        "bills" | "payments" | "booked_rooms" => &["booking_id"],
        "bookings" => &["id"],
        "availability" | "occupied_rooms" => &["branch", "check_in", "check_out"],
        "rooms" => &["branch"],
        _ => &[],
    };
    check_filters(&table, &filters, allowed)?;

    match table.as_str() {
        "bills" => Ok(Command::SelectBill {
            booking_id: parse_ulid_expr(filter(&filters, "booking_id")?)?,
        }),
        "payments" => Ok(Command::SelectPayments {
            booking_id: parse_ulid_expr(filter(&filters, "booking_id")?)?,
        }),
        "bookings" => Ok(Command::SelectBookings {
            id: filters.get("id").copied().map(parse_ulid_expr).transpose()?,
        }),
        "booked_rooms" => Ok(Command::SelectBookedRooms {
            booking_id: parse_ulid_expr(filter(&filters, "booking_id")?)?,
        }),
        "availability" | "occupied_rooms" => {
            let branch = parse_string_expr(filter(&filters, "branch")?)?;
            let check_in = parse_date_expr(filter(&filters, "check_in")?)?;
            let check_out = parse_date_expr(filter(&filters, "check_out")?)?;
            if table == "availability" {
                Ok(Command::SelectAvailability { branch, check_in, check_out })
            } else {
                Ok(Command::SelectOccupiedRooms { branch, check_in, check_out })
            }
        }
        "branches" => Ok(Command::SelectBranches),
        "room_types" => Ok(Command::SelectRoomTypes),
        "rooms" => Ok(Command::SelectRooms {
            branch: filters.get("branch").copied().map(parse_string_expr).transpose()?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// What a statement reads or writes, without validating its values.
/// Used to describe result columns before parameters are bound.
#[derive(Debug, PartialEq, Eq)]
pub enum StatementTarget {
    Select(String),
    Insert(String),
    Delete(String),
}

pub fn statement_target(sql: &str) -> Option<StatementTarget> {
    let stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql).ok()?;
    match stmts.first()? {
        Statement::Insert(insert) => insert_table_name(insert).ok().map(StatementTarget::Insert),
        Statement::Delete(delete) => delete_table_name(delete).ok().map(StatementTarget::Delete),
        Statement::Query(query) => match query.body.as_ref() {
            SetExpr::Select(select) => select
                .from
                .first()
                .and_then(|t| table_factor_name(&t.relation).ok())
                .map(StatementTarget::Select),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a room request list such as `Single:1, Double:2`. A bare type name
/// asks for one room.
pub fn parse_room_list(s: &str) -> Result<Vec<RoomRequest>, SqlError> {
    let mut rooms = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, quantity) = match part.rsplit_once(':') {
            Some((name, qty)) => {
                let quantity = qty
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| SqlError::Parse(format!("bad room quantity in {part:?}")))?;
                (name.trim(), quantity)
            }
            None => (part, 1),
        };
        if name.is_empty() {
            return Err(SqlError::Parse(format!("missing room type in {part:?}")));
        }
        rooms.push(RoomRequest {
            room_type: name.to_string(),
            quantity,
        });
    }
    if rooms.is_empty() {
        return Err(SqlError::Parse("rooms must name at least one room type".into()));
    }
    Ok(rooms)
}

// ── Helpers ───────────────────────────────────────────────────

/// One VALUES row keyed by column name. Without a column list the values
/// are matched to the table's columns in order.
struct Row {
    values: HashMap<String, Expr>,
}

impl Row {
    fn from_insert(
        insert: &ast::Insert,
        table: &'static str,
        positional: &[&'static str],
    ) -> Result<Self, SqlError> {
        let rows = insert_rows(insert)?;
        if rows.len() > 1 {
            return Err(SqlError::Unsupported(format!("multi-row INSERT into {table}")));
        }
        let values = &rows[0];

        let columns: Vec<String> = if insert.columns.is_empty() {
            if values.len() > positional.len() {
                return Err(SqlError::WrongArity(table, positional.len(), values.len()));
            }
            positional.iter().take(values.len()).map(|c| c.to_string()).collect()
        } else {
            if insert.columns.len() != values.len() {
                return Err(SqlError::WrongArity(table, insert.columns.len(), values.len()));
            }
            let columns: Vec<String> = insert.columns.iter().map(|c| c.value.to_lowercase()).collect();
            if let Some(unknown) = columns.iter().find(|c| !positional.contains(&c.as_str())) {
                return Err(SqlError::UnknownColumn(table.to_string(), unknown.clone()));
            }
            columns
        };

        Ok(Self {
            values: columns.into_iter().zip(values.iter().cloned()).collect(),
        })
    }

    fn required(&self, column: &'static str) -> Result<&Expr, SqlError> {
        self.optional(column).ok_or(SqlError::MissingColumn(column))
    }

    /// Absent and NULL both read as `None`.
    fn optional(&self, column: &str) -> Option<&Expr> {
        self.values
            .get(column)
            .filter(|e| !matches!(extract_value(e), Some(Value::Null)))
    }
}

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

fn insert_rows(insert: &ast::Insert) -> Result<&[Vec<Expr>], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(&values.rows)
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

/// Collect `column = value` terms joined by AND. Anything else in the WHERE
/// clause is rejected rather than silently ignored.
fn eq_filters(selection: Option<&Expr>) -> Result<HashMap<String, &Expr>, SqlError> {
    fn walk<'a>(expr: &'a Expr, out: &mut HashMap<String, &'a Expr>) -> Result<(), SqlError> {
        match expr {
            Expr::BinaryOp { left, op: ast::BinaryOperator::And, right } => {
                walk(left, out)?;
                walk(right, out)
            }
            Expr::BinaryOp { left, op: ast::BinaryOperator::Eq, right } => {
                let col = expr_column_name(left)
                    .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
                out.insert(col, right.as_ref());
                Ok(())
            }
            Expr::Nested(inner) => walk(inner, out),
            other => Err(SqlError::Unsupported(format!("filter {other}"))),
        }
    }

    let mut out = HashMap::new();
    if let Some(expr) = selection {
        walk(expr, &mut out)?;
    }
    Ok(out)
}

/// Filters are keyed by column; one the table does not know is an error.
fn check_filters(table: &str, filters: &HashMap<String, &Expr>, allowed: &[&str]) -> Result<(), SqlError> {
    match filters.keys().find(|col| !allowed.contains(&col.as_str())) {
        Some(col) => Err(SqlError::UnknownColumn(table.to_string(), col.clone())),
        None => Ok(()),
    }
}

fn filter<'a>(filters: &HashMap<String, &'a Expr>, column: &'static str) -> Result<&'a Expr, SqlError> {
    filters.get(column).copied().ok_or(SqlError::MissingFilter(column))
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

fn parse_string_expr(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(Value::Number(s, _)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string_expr(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID {s:?}: {e}")))
}

fn parse_date_expr(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string_expr(expr)?;
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Expr::UnaryOp { op: ast::UnaryOperator::Minus, expr } = expr {
        let v = parse_i64_expr(expr)?;
        return v.checked_neg().ok_or_else(|| SqlError::Parse(format!("integer -{v} out of range")));
    }
    let s = parse_string_expr(expr)?;
    s.trim().parse().map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of range")))
}

/// Money literals are decimal major units: `120`, `120.5`, `'120.50'`.
fn parse_money_expr(expr: &Expr) -> Result<Cents, SqlError> {
    if let Expr::UnaryOp { op: ast::UnaryOperator::Minus, expr } = expr {
        let v = parse_money_expr(expr)?;
        return v.checked_neg().ok_or_else(|| SqlError::Parse(format!("amount -{v} out of range")));
    }
    let s = parse_string_expr(expr)?;
    parse_cents(&s).map_err(|e| SqlError::Parse(format!("bad amount {s:?}: {e}")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str),
    MissingFilter(&'static str),
    UnknownColumn(String, String),
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
            SqlError::MissingColumn(col) => write!(f, "missing column: {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::UnknownColumn(t, col) => write!(f, "{t}: unknown column {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parse_insert_branch() {
        let cmd = parse_sql(&format!("INSERT INTO branches (id, name) VALUES ('{ID}', 'Colombo')")).unwrap();
        assert_eq!(
            cmd,
            Command::InsertBranch {
                id: Ulid::from_string(ID).unwrap(),
                name: "Colombo".into()
            }
        );
    }

    #[test]
    fn parse_insert_room_type_with_decimal_price() {
        let sql = "INSERT INTO room_types (name, capacity, base_price, amenities) VALUES ('Deluxe', 2, 250.50, 'sea view')";
        match parse_sql(sql).unwrap() {
            Command::InsertRoomType { room_type } => {
                assert_eq!(room_type.name, "Deluxe");
                assert_eq!(room_type.capacity, 2);
                assert_eq!(room_type.base_price, 25_050);
                assert_eq!(room_type.amenities.as_deref(), Some("sea view"));
            }
            cmd => panic!("expected InsertRoomType, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_room_type_without_amenities() {
        let sql = "INSERT INTO room_types VALUES ('Single', 1, '80')";
        match parse_sql(sql).unwrap() {
            Command::InsertRoomType { room_type } => {
                assert_eq!(room_type.base_price, 8_000);
                assert_eq!(room_type.amenities, None);
            }
            cmd => panic!("expected InsertRoomType, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_by_column_name() {
        let sql = "INSERT INTO bookings (check_in, check_out, branch, rooms, pax) \
                   VALUES ('2025-06-01', '2025-06-03', 'Branch 1', 'Single:1, Double:1', 3)";
        match parse_sql(sql).unwrap() {
            Command::InsertBooking { branch, pax, check_in, check_out, rooms, guest_id } => {
                assert_eq!(branch, "Branch 1");
                assert_eq!(pax, 3);
                assert_eq!(check_in, date("2025-06-01"));
                assert_eq!(check_out, date("2025-06-03"));
                assert_eq!(rooms.len(), 2);
                assert_eq!(rooms[1], RoomRequest { room_type: "Double".into(), quantity: 1 });
                assert_eq!(guest_id, None);
            }
            cmd => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_missing_rooms() {
        let sql = "INSERT INTO bookings (branch, pax, check_in, check_out) VALUES ('B', 1, '2025-06-01', '2025-06-02')";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingColumn("rooms"))));
    }

    #[test]
    fn parse_bad_date_rejected() {
        let sql = "INSERT INTO bookings VALUES ('B', 1, '2025-13-01', '2025-06-02', 'Single')";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_payment() {
        let sql = format!("INSERT INTO payments (booking_id, method, amount) VALUES ('{ID}', 'credit card', 99.95)");
        match parse_sql(&sql).unwrap() {
            Command::InsertPayment { method, amount, .. } => {
                assert_eq!(method, PaymentMethod::Card);
                assert_eq!(amount, 9_995);
            }
            cmd => panic!("expected InsertPayment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_negative_payment_keeps_sign() {
        let sql = format!("INSERT INTO payments (booking_id, method, amount) VALUES ('{ID}', 'cash', -5)");
        match parse_sql(&sql).unwrap() {
            Command::InsertPayment { amount, .. } => assert_eq!(amount, -500),
            cmd => panic!("expected InsertPayment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_payment_unknown_method() {
        let sql = format!("INSERT INTO payments VALUES ('{ID}', 'cheque', 10)");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_bill_defaults() {
        let sql = format!("INSERT INTO bills (booking_id) VALUES ('{ID}')");
        match parse_sql(&sql).unwrap() {
            Command::InsertBill { service_total, tax_rate_bps, .. } => {
                assert_eq!((service_total, tax_rate_bps), (0, 0));
            }
            cmd => panic!("expected InsertBill, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_status_inserts_and_cancel() {
        assert!(matches!(
            parse_sql(&format!("INSERT INTO check_ins (booking_id) VALUES ('{ID}')")).unwrap(),
            Command::CheckIn { .. }
        ));
        assert!(matches!(
            parse_sql(&format!("INSERT INTO check_outs VALUES ('{ID}')")).unwrap(),
            Command::CheckOut { .. }
        ));
        assert!(matches!(
            parse_sql(&format!("DELETE FROM bookings WHERE id = '{ID}'")).unwrap(),
            Command::CancelBooking { .. }
        ));
    }

    #[test]
    fn parse_delete_room_type() {
        let cmd = parse_sql("DELETE FROM room_types WHERE name = 'Suite'").unwrap();
        assert_eq!(cmd, Command::DeleteRoomType { name: "Suite".into() });
    }

    #[test]
    fn parse_select_availability() {
        let sql = "SELECT * FROM availability WHERE branch = 'Branch 1' AND check_in = '2025-06-01' AND check_out = '2025-06-03'";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectAvailability {
                branch: "Branch 1".into(),
                check_in: date("2025-06-01"),
                check_out: date("2025-06-03"),
            }
        );
    }

    #[test]
    fn parse_select_occupied_requires_dates() {
        let sql = "SELECT * FROM occupied_rooms WHERE branch = 'Branch 1'";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingFilter("check_in"))));
    }

    #[test]
    fn parse_select_bill_and_bookings() {
        assert!(matches!(
            parse_sql(&format!("SELECT * FROM bills WHERE booking_id = '{ID}'")).unwrap(),
            Command::SelectBill { .. }
        ));
        assert_eq!(parse_sql("SELECT * FROM bookings").unwrap(), Command::SelectBookings { id: None });
        assert_eq!(
            parse_sql("SELECT * FROM rooms WHERE branch = 'Kandy'").unwrap(),
            Command::SelectRooms { branch: Some("Kandy".into()) }
        );
    }

    #[test]
    fn non_equality_filter_rejected() {
        let sql = format!("SELECT * FROM bills WHERE booking_id = '{ID}' OR 1 = 1");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn unknown_insert_column_rejected() {
        let sql = "INSERT INTO room_types (name, capacity, base_price, colour) VALUES ('Deluxe', 2, 250, 'red')";
        match parse_sql(sql) {
            Err(SqlError::UnknownColumn(table, col)) => assert_eq!((table.as_str(), col.as_str()), ("room_types", "colour")),
            other => panic!("expected UnknownColumn, got {other:?}"),
        }
    }

    #[test]
    fn unknown_filter_column_rejected() {
        let sql = format!("SELECT * FROM bills WHERE booking_id = '{ID}' AND status = 'Paid'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn(..))));
        assert!(matches!(
            parse_sql("SELECT * FROM rooms WHERE brnch = 'Kandy'"),
            Err(SqlError::UnknownColumn(..))
        ));
        assert!(matches!(
            parse_sql("SELECT * FROM branches WHERE name = 'Kandy'"),
            Err(SqlError::UnknownColumn(..))
        ));
        assert!(matches!(
            parse_sql(&format!("DELETE FROM bookings WHERE id = '{ID}' AND pax = 2")),
            Err(SqlError::UnknownColumn(..))
        ));
    }

    #[test]
    fn negating_the_smallest_integer_is_an_error() {
        let sql = "INSERT INTO room_types VALUES ('Odd', -'-9223372036854775808', 10)";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
        let sql = format!("INSERT INTO payments VALUES ('{ID}', 'cash', -'-92233720368547758.08')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn room_list_parsing() {
        let rooms = parse_room_list("Single:2, Deluxe").unwrap();
        assert_eq!(
            rooms,
            vec![
                RoomRequest { room_type: "Single".into(), quantity: 2 },
                RoomRequest { room_type: "Deluxe".into(), quantity: 1 },
            ]
        );
        assert!(parse_room_list("").is_err());
        assert!(parse_room_list("Single:x").is_err());
        assert!(parse_room_list(":2").is_err());
    }

    #[test]
    fn statement_target_sees_through_placeholders() {
        assert_eq!(
            statement_target("SELECT * FROM bills WHERE booking_id = $1"),
            Some(StatementTarget::Select("bills".into()))
        );
        assert_eq!(
            statement_target("INSERT INTO payments (booking_id, method, amount) VALUES ($1, $2, $3)"),
            Some(StatementTarget::Insert("payments".into()))
        );
        assert_eq!(statement_target("not sql"), None);
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO foobar (id) VALUES ('{ID}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
