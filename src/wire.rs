use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tracing::debug;
use ulid::Ulid;

use crate::auth::{Actor, HoteldAuthSource};
use crate::engine::{Engine, EngineError, ErrorClass};
use crate::model::*;
use crate::money::format_cents;
use crate::observability::{self, command_label};
use crate::sql::{self, Command, StatementTarget};

pub struct HoteldHandler {
    engine: Arc<Engine>,
    query_parser: Arc<HoteldQueryParser>,
}

impl HoteldHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(HoteldQueryParser),
        }
    }

    fn resolve_actor<C: ClientInfo>(&self, client: &C) -> PgWireResult<Actor> {
        let user = client.metadata().get("user").map(String::as_str).unwrap_or_default();
        Actor::parse(user).ok_or_else(|| permission_denied(format!("unknown user {user:?}")))
    }

    async fn run(&self, actor: Actor, query: &str) -> PgWireResult<Vec<Response>> {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(actor, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        if let Err(ref e) = result {
            debug!(command = label, error = %e, "query failed");
        }
        result
    }

    /// Staff only see their own branch. A branch name that does not resolve
    /// is left for the engine to report.
    fn check_branch_name(&self, actor: Actor, branch: &str) -> PgWireResult<()> {
        if let Actor::Staff { branch_id } = actor
            && self.engine.branch_id_by_name(branch).is_some_and(|id| id != branch_id)
        {
            return Err(permission_denied(format!("staff may not act on branch {branch}")));
        }
        Ok(())
    }

    async fn execute_command(&self, actor: Actor, cmd: Command) -> PgWireResult<Vec<Response>> {
        let engine = &self.engine;
        match cmd {
            Command::InsertBranch { id, name } => {
                require_admin(actor)?;
                engine.create_branch(id, name).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::InsertRoomType { room_type } => {
                require_admin(actor)?;
                engine.create_room_type(room_type).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteRoomType { name } => {
                require_admin(actor)?;
                engine.delete_room_type(&name).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertRoom { id, branch_id, room_type, number } => {
                require_admin(actor)?;
                engine
                    .create_room(id, branch_id, room_type, number)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::InsertBooking { branch, pax, check_in, check_out, rooms, guest_id } => {
                let guest_id = match (actor, guest_id) {
                    (Actor::Guest { guest_id: own }, None) => own,
                    (Actor::Guest { guest_id: own }, Some(g)) if g == own => own,
                    (Actor::Guest { .. }, Some(_)) => {
                        return Err(permission_denied("guests may only book for themselves".into()));
                    }
                    (_, Some(g)) => g,
                    (_, None) => return Err(sql_err(sql::SqlError::MissingColumn("guest_id"))),
                };
                self.check_branch_name(actor, &branch)?;
                let receipt = engine
                    .create_booking(BookingRequest {
                        guest_id,
                        branch_name: branch,
                        number_of_pax: pax,
                        check_in,
                        check_out,
                        booking_date: chrono::Utc::now().date_naive(),
                        rooms,
                    })
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows_response(booking_receipt_schema(), vec![receipt], |enc, r| {
                    enc.encode_field(&r.booking_id.to_string())?;
                    enc.encode_field(&r.message)
                })])
            }
            Command::CancelBooking { id } => {
                let scope = branch_scope(actor)?;
                engine
                    .set_booking_status(id, scope, BookingStatus::Cancelled)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::CheckIn { booking_id } => {
                let scope = branch_scope(actor)?;
                engine
                    .set_booking_status(booking_id, scope, BookingStatus::CheckedIn)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::CheckOut { booking_id } => {
                let scope = branch_scope(actor)?;
                engine
                    .set_booking_status(booking_id, scope, BookingStatus::CheckedOut)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::InsertBill { booking_id, service_total, tax_rate_bps } => {
                let scope = branch_scope(actor)?;
                let bill = engine
                    .issue_bill(booking_id, scope, service_total, tax_rate_bps)
                    .await
                    .map_err(engine_err)?;
                let ledger = BillLedger { bill, payments: Vec::new() };
                Ok(vec![rows_response(bill_schema(), vec![ledger], encode_bill)])
            }
            Command::InsertPayment { booking_id, method, amount } => {
                let scope = branch_scope(actor)?;
                let receipt = engine
                    .pay_bill(booking_id, scope, method, amount)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows_response(payment_receipt_schema(), vec![receipt], |enc, r| {
                    enc.encode_field(&r.payment.reference)?;
                    enc.encode_field(&format_cents(r.payment.paid_amount))?;
                    enc.encode_field(&format_cents(r.bill.due_amount))?;
                    enc.encode_field(&r.bill.status.as_str().to_string())
                })])
            }
            Command::SelectBill { booking_id } => {
                let scope = branch_scope(actor)?;
                let ledger = engine
                    .get_bill_by_booking(booking_id, scope)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows_response(bill_schema(), vec![ledger], encode_bill)])
            }
            Command::SelectPayments { booking_id } => {
                let scope = branch_scope(actor)?;
                let ledger = engine
                    .get_bill_by_booking(booking_id, scope)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows_response(payments_schema(), ledger.payments, |enc, p| {
                    enc.encode_field(&p.id.to_string())?;
                    enc.encode_field(&p.bill_id.to_string())?;
                    enc.encode_field(&p.method.as_str().to_string())?;
                    enc.encode_field(&format_cents(p.paid_amount))?;
                    enc.encode_field(&p.payment_date.to_rfc3339())?;
                    enc.encode_field(&p.reference)
                })])
            }
            Command::SelectBookings { id } => {
                let scope = booking_scope(actor);
                let bookings = match id {
                    Some(id) => engine.booking(id, scope).await.into_iter().collect(),
                    None => engine.list_bookings(scope).await,
                };
                Ok(vec![rows_response(bookings_schema(), bookings, |enc, b| {
                    enc.encode_field(&b.id.to_string())?;
                    enc.encode_field(&b.guest_id.to_string())?;
                    enc.encode_field(&b.branch_id.to_string())?;
                    enc.encode_field(&b.booking_date.to_string())?;
                    enc.encode_field(&b.stay.check_in.to_string())?;
                    enc.encode_field(&b.stay.check_out.to_string())?;
                    enc.encode_field(&(b.number_of_rooms as i32))?;
                    enc.encode_field(&(b.number_of_pax as i32))?;
                    enc.encode_field(&b.status.as_str().to_string())
                })])
            }
            Command::SelectBookedRooms { booking_id } => {
                let booked = engine
                    .booking(booking_id, booking_scope(actor))
                    .await
                    .map(|b| b.booked_rooms)
                    .unwrap_or_default();
                let rows: Vec<(BookedRoom, Option<RoomInfo>)> = booked
                    .into_iter()
                    .map(|b| {
                        let info = engine.room(&b.room_id);
                        (b, info)
                    })
                    .collect();
                Ok(vec![rows_response(booked_rooms_schema(), rows, |enc, (b, info)| {
                    enc.encode_field(&b.id.to_string())?;
                    enc.encode_field(&b.booking_id.to_string())?;
                    enc.encode_field(&b.room_id.to_string())?;
                    enc.encode_field(&info.as_ref().map(|i| i.number.clone()))?;
                    enc.encode_field(&info.as_ref().map(|i| i.room_type.clone()))?;
                    enc.encode_field(&b.stay.check_in.to_string())?;
                    enc.encode_field(&b.stay.check_out.to_string())?;
                    enc.encode_field(&b.status.as_str().to_string())
                })])
            }
            Command::SelectAvailability { branch, check_in, check_out } => {
                let avail = engine
                    .availability_by_type(&branch, check_in, check_out)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows_response(availability_schema(), avail, |enc, a| {
                    enc.encode_field(&a.room_type)?;
                    enc.encode_field(&(a.capacity as i32))?;
                    enc.encode_field(&format_cents(a.base_price))?;
                    enc.encode_field(&(a.total_rooms as i32))?;
                    enc.encode_field(&(a.free_rooms as i32))
                })])
            }
            Command::SelectOccupiedRooms { branch, check_in, check_out } => {
                branch_scope(actor)?;
                self.check_branch_name(actor, &branch)?;
                let occupied = engine
                    .occupied_rooms(&branch, check_in, check_out)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows_response(occupied_rooms_schema(), occupied, |enc, o| {
                    enc.encode_field(&o.room_id.to_string())?;
                    enc.encode_field(&o.number)?;
                    enc.encode_field(&o.room_type)?;
                    enc.encode_field(&o.booking_id.to_string())?;
                    enc.encode_field(&o.stay.check_in.to_string())?;
                    enc.encode_field(&o.stay.check_out.to_string())?;
                    enc.encode_field(&o.status.as_str().to_string())
                })])
            }
            Command::SelectBranches => {
                Ok(vec![rows_response(branches_schema(), engine.list_branches(), |enc, b| {
                    enc.encode_field(&b.id.to_string())?;
                    enc.encode_field(&b.name)
                })])
            }
            Command::SelectRoomTypes => {
                let types = engine.list_room_types().await;
                Ok(vec![rows_response(room_types_schema(), types, |enc, t| {
                    enc.encode_field(&t.name)?;
                    enc.encode_field(&(t.capacity as i32))?;
                    enc.encode_field(&format_cents(t.base_price))?;
                    enc.encode_field(&t.amenities)
                })])
            }
            Command::SelectRooms { branch } => {
                let branch_id = match branch {
                    Some(name) => match engine.branch_id_by_name(&name) {
                        Some(id) => Some(id),
                        None => return Err(engine_err(EngineError::BranchNotFound(name))),
                    },
                    None => None,
                };
                Ok(vec![rows_response(rooms_schema(), engine.list_rooms(branch_id), |enc, r| {
                    enc.encode_field(&r.id.to_string())?;
                    enc.encode_field(&r.branch_id.to_string())?;
                    enc.encode_field(&r.room_type)?;
                    enc.encode_field(&r.number)
                })])
            }
        }
    }
}

// ── Authorization ────────────────────────────────────────────────

fn require_admin(actor: Actor) -> PgWireResult<()> {
    match actor {
        Actor::Admin => Ok(()),
        _ => Err(permission_denied("admin only".into())),
    }
}

/// Branch restriction for front-desk operations. Guests have no access.
fn branch_scope(actor: Actor) -> PgWireResult<Option<Ulid>> {
    match actor {
        Actor::Admin => Ok(None),
        Actor::Staff { branch_id } => Ok(Some(branch_id)),
        Actor::Guest { .. } => Err(permission_denied("staff only".into())),
    }
}

fn booking_scope(actor: Actor) -> BookingScope {
    match actor {
        Actor::Admin => BookingScope::All,
        Actor::Staff { branch_id } => BookingScope::Branch(branch_id),
        Actor::Guest { guest_id } => BookingScope::Guest(guest_id),
    }
}

// ── Result sets ──────────────────────────────────────────────────

fn text(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn int(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT4, FieldFormat::Text)
}

fn booking_receipt_schema() -> Vec<FieldInfo> {
    vec![text("booking_id"), text("message")]
}

fn payment_receipt_schema() -> Vec<FieldInfo> {
    vec![text("reference"), text("paid_amount"), text("due_amount"), text("bill_status")]
}

fn bill_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("booking_id"),
        text("branch_id"),
        text("room_total"),
        text("service_total"),
        text("sub_total"),
        text("tax_amount"),
        text("grand_total"),
        text("due_amount"),
        text("status"),
        text("issued_on"),
        text("payments"),
    ]
}

fn payments_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("bill_id"),
        text("method"),
        text("paid_amount"),
        text("payment_date"),
        text("reference"),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("guest_id"),
        text("branch_id"),
        text("booking_date"),
        text("check_in"),
        text("check_out"),
        int("number_of_rooms"),
        int("number_of_pax"),
        text("status"),
    ]
}

fn booked_rooms_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("booking_id"),
        text("room_id"),
        text("room_number"),
        text("room_type"),
        text("check_in"),
        text("check_out"),
        text("status"),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        text("room_type"),
        int("capacity"),
        text("base_price"),
        int("total_rooms"),
        int("free_rooms"),
    ]
}

fn occupied_rooms_schema() -> Vec<FieldInfo> {
    vec![
        text("room_id"),
        text("number"),
        text("room_type"),
        text("booking_id"),
        text("check_in"),
        text("check_out"),
        text("status"),
    ]
}

fn branches_schema() -> Vec<FieldInfo> {
    vec![text("id"), text("name")]
}

fn room_types_schema() -> Vec<FieldInfo> {
    vec![text("name"), int("capacity"), text("base_price"), text("amenities")]
}

fn rooms_schema() -> Vec<FieldInfo> {
    vec![text("id"), text("branch_id"), text("room_type"), text("number")]
}

/// Columns a statement will return, for Describe before it runs.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    match sql::statement_target(sql) {
        Some(StatementTarget::Select(table)) => match table.as_str() {
            "bills" => bill_schema(),
            "payments" => payments_schema(),
            "bookings" => bookings_schema(),
            "booked_rooms" => booked_rooms_schema(),
            "availability" => availability_schema(),
            "occupied_rooms" => occupied_rooms_schema(),
            "branches" => branches_schema(),
            "room_types" => room_types_schema(),
            "rooms" => rooms_schema(),
            _ => vec![],
        },
        Some(StatementTarget::Insert(table)) => match table.as_str() {
            "bookings" => booking_receipt_schema(),
            "payments" => payment_receipt_schema(),
            "bills" => bill_schema(),
            _ => vec![],
        },
        _ => vec![],
    }
}

fn rows_response<T>(
    schema: Vec<FieldInfo>,
    items: Vec<T>,
    encode: impl Fn(&mut DataRowEncoder, &T) -> PgWireResult<()>,
) -> Response {
    let schema = Arc::new(schema);
    let rows: Vec<PgWireResult<_>> = items
        .iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn encode_bill(enc: &mut DataRowEncoder, ledger: &BillLedger) -> PgWireResult<()> {
    let bill = &ledger.bill;
    let payments: Vec<serde_json::Value> = ledger
        .payments
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id.to_string(),
                "method": p.method.as_str(),
                "paid_amount": format_cents(p.paid_amount),
                "payment_date": p.payment_date.to_rfc3339(),
                "reference": p.reference,
            })
        })
        .collect();
    enc.encode_field(&bill.id.to_string())?;
    enc.encode_field(&bill.booking_id.to_string())?;
    enc.encode_field(&bill.branch_id.to_string())?;
    enc.encode_field(&format_cents(bill.room_total))?;
    enc.encode_field(&format_cents(bill.service_total))?;
    enc.encode_field(&format_cents(bill.sub_total))?;
    enc.encode_field(&format_cents(bill.tax_amount))?;
    enc.encode_field(&format_cents(bill.grand_total))?;
    enc.encode_field(&format_cents(bill.due_amount))?;
    enc.encode_field(&bill.status.as_str().to_string())?;
    enc.encode_field(&bill.issued_on.to_string())?;
    enc.encode_field(&serde_json::Value::Array(payments).to_string())
}

#[async_trait]
impl SimpleQueryHandler for HoteldHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let actor = self.resolve_actor(client)?;
        self.run(actor, query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct HoteldQueryParser;

#[async_trait]
impl QueryParser for HoteldQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for HoteldHandler {
    type Statement = String;
    type QueryParser = HoteldQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let actor = self.resolve_actor(client)?;
        let sql = substitute_params(portal);
        self.run(actor, &sql)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "XX000".into(),
                "statement produced no response".into(),
            ))))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(param_types, result_schema(&target.statement)))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(&target.statement.statement)))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    bind_params(&portal.statement.statement, portal.parameters.as_slice())
}

/// One left-to-right pass: placeholders inside quoted literals, or inside
/// an already substituted value, are left alone. An index with no bound
/// value stays verbatim.
fn bind_params<P: AsRef<[u8]>>(sql: &str, params: &[Option<P>]) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut in_quote = false;
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                in_quote = !in_quote;
                i += 1;
            }
            b'$' if !in_quote => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                let bound = sql[start..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| params.get(idx));
                if let Some(param) = bound {
                    out.push_str(&sql[copied..i]);
                    match param {
                        Some(value) => {
                            let text = String::from_utf8_lossy(value.as_ref());
                            out.push('\'');
                            out.push_str(&text.replace('\'', "''"));
                            out.push('\'');
                        }
                        None => out.push_str("NULL"),
                    }
                    copied = end;
                }
                i = end.max(start);
            }
            _ => i += 1,
        }
    }
    out.push_str(&sql[copied..]);
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct HoteldFactory {
    handler: Arc<HoteldHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<HoteldAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl HoteldFactory {
    pub fn new(engine: Arc<Engine>, password: String) -> Self {
        let auth_source = HoteldAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(HoteldHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for HoteldFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = HoteldFactory::new(engine, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

/// SQLSTATE for an engine failure.
fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::LockTimeout(_) => "55P03",
        EngineError::WalError(_) => "58030",
        _ => match e.class() {
            ErrorClass::Validation => "22023",
            ErrorClass::BusinessRule | ErrorClass::Infra => "P0001",
        },
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        sqlstate(&e).into(),
        e.to_string(),
    )))
}

fn sql_err(e: sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

fn permission_denied(msg: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42501".into(),
        format!("permission denied: {msg}"),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn sqlstates_follow_error_class() {
        let d = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(sqlstate(&EngineError::InvalidDateRange { check_in: d, check_out: d }), "22023");
        assert_eq!(sqlstate(&EngineError::NoRoomsAvailable("Deluxe".into())), "P0001");
        assert_eq!(sqlstate(&EngineError::OverpaymentRejected { amount: 2, due: 1 }), "P0001");
        assert_eq!(sqlstate(&EngineError::LockTimeout("bill")), "55P03");
        assert_eq!(sqlstate(&EngineError::WalError("disk full".into())), "58030");
    }

    #[test]
    fn count_params_finds_highest() {
        assert_eq!(count_params("SELECT * FROM bills WHERE booking_id = $1"), 1);
        assert_eq!(count_params("INSERT INTO payments VALUES ($1, $3, $2)"), 3);
        assert_eq!(count_params("SELECT * FROM branches"), 0);
    }

    #[test]
    fn bound_values_are_not_rescanned() {
        let sql = "INSERT INTO payments (booking_id, method, amount) VALUES ($1, $2, $3)";
        let params = [Some("01ARZ3NDEKTSV4RRFFQ69G5FAV"), Some("cash $1"), Some("10")];
        assert_eq!(
            bind_params(sql, &params),
            "INSERT INTO payments (booking_id, method, amount) VALUES \
             ('01ARZ3NDEKTSV4RRFFQ69G5FAV', 'cash $1', '10')"
        );
    }

    #[test]
    fn binding_skips_quoted_text_and_escapes_values() {
        let params = [Some("O'Hara"), None];
        assert_eq!(
            bind_params("SELECT * FROM rooms WHERE branch = $1 AND x = '$2' AND y = $2", &params),
            "SELECT * FROM rooms WHERE branch = 'O''Hara' AND x = '$2' AND y = NULL"
        );
        assert_eq!(bind_params("VALUES ($12, $)", &params), "VALUES ($12, $)");
    }

    #[test]
    fn describe_matches_target_table() {
        assert_eq!(result_schema("SELECT * FROM availability WHERE branch = $1").len(), 5);
        assert_eq!(result_schema("INSERT INTO bookings VALUES ($1, $2, $3, $4, $5)").len(), 2);
        assert!(result_schema("INSERT INTO check_ins VALUES ($1)").is_empty());
    }

    #[test]
    fn scopes_follow_actor() {
        let id = Ulid::new();
        assert_eq!(branch_scope(Actor::Admin).unwrap(), None);
        assert_eq!(branch_scope(Actor::Staff { branch_id: id }).unwrap(), Some(id));
        assert!(branch_scope(Actor::Guest { guest_id: id }).is_err());
        assert_eq!(booking_scope(Actor::Guest { guest_id: id }), BookingScope::Guest(id));
        assert!(require_admin(Actor::Staff { branch_id: id }).is_err());
    }
}
