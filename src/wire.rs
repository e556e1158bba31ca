use std::fmt::Debug;
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
use ulid::Ulid;

use crate::auth::LenditAuthSource;
use crate::engine::{now_ms, Engine, EngineError};
use crate::model::*;
use crate::observability::{self, command_label};
use crate::sql::{self, Command};
use crate::tenant::TenantManager;

pub struct LenditHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<LenditQueryParser>,
}

impl LenditHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(LenditQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    async fn run_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(engine, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::CreateUser { id, name } => {
                engine.create_user(id, name).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteUser { id } => {
                engine.delete_user(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::CreateItem {
                id,
                owner_id,
                name,
                available,
            } => {
                engine
                    .create_item(id, owner_id, name, available)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::SetItemAvailable {
                item_id,
                actor_id,
                available,
            } => {
                engine
                    .set_item_available(item_id, actor_id, available)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::RequestBooking {
                id,
                item_id,
                booker_id,
                start,
                end,
            } => {
                let info = engine
                    .request_booking(id, item_id, booker_id, Span::new(start, end))
                    .await
                    .map_err(engine_err)?;
                Ok(vec![booking_rows(vec![info])])
            }
            Command::DecideBooking {
                booking_id,
                actor_id,
                approve,
            } => {
                let info = engine
                    .decide_booking(booking_id, actor_id, approve)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![booking_rows(vec![info])])
            }
            Command::AddComment {
                id,
                item_id,
                author_id,
                text,
            } => {
                engine
                    .add_comment(id, item_id, author_id, text)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::SelectBookingById {
                booking_id,
                requester_id,
            } => {
                let info = engine
                    .booking_by_id(booking_id, requester_id)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![booking_rows(vec![info])])
            }
            Command::SelectBookingsByOwner {
                owner_id,
                filter,
                offset,
                limit,
            } => {
                let infos = engine
                    .bookings_by_owner(owner_id, filter, now_ms(), offset, limit)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![booking_rows(infos)])
            }
            Command::SelectBookingsByBooker {
                booker_id,
                filter,
                offset,
                limit,
            } => {
                let infos = engine
                    .bookings_by_booker(booker_id, filter, now_ms(), offset, limit)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![booking_rows(infos)])
            }
            Command::SelectItems { owner_id } => {
                let items = engine
                    .items_by_owner(owner_id, now_ms())
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(item_schema());
                let rows: Vec<PgWireResult<_>> = items
                    .into_iter()
                    .map(|item| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&item.id.to_string())?;
                        encoder.encode_field(&item.owner_id.to_string())?;
                        encoder.encode_field(&item.name)?;
                        encoder.encode_field(&item.available)?;
                        encode_booking_ref(&mut encoder, &item.last)?;
                        encode_booking_ref(&mut encoder, &item.next)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectAvailability { item_ids } => {
                let summaries = engine.availability_for_items(&item_ids, now_ms()).await;

                let schema = Arc::new(availability_schema());
                let rows: Vec<PgWireResult<_>> = summaries
                    .into_iter()
                    .map(|summary| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&summary.item_id.to_string())?;
                        encode_booking_ref(&mut encoder, &summary.last)?;
                        encode_booking_ref(&mut encoder, &summary.next)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::CanComment { user_id, item_id } => {
                let allowed = engine
                    .can_comment(user_id, item_id, now_ms())
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(can_comment_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&allowed)?;
                let rows = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::Listen { channel } => {
                let item_id_str = channel.strip_prefix("item_").ok_or_else(|| {
                    PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        format!("invalid channel: {channel} (expected item_{{id}})"),
                    )))
                })?;
                let _item_id = Ulid::from_string(item_id_str).map_err(|e| {
                    PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        format!("bad ULID in channel: {e}"),
                    )))
                })?;
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
        }
    }
}

// ── Row schemas ──────────────────────────────────────────────────

fn varchar(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn booking_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("item_id"),
        varchar("booker_id"),
        FieldInfo::new("start".into(), None, None, Type::INT8, FieldFormat::Text),
        FieldInfo::new("end".into(), None, None, Type::INT8, FieldFormat::Text),
        varchar("status"),
    ]
}

fn item_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("owner_id"),
        varchar("name"),
        FieldInfo::new("available".into(), None, None, Type::BOOL, FieldFormat::Text),
        varchar("last_booking_id"),
        varchar("last_booker_id"),
        varchar("next_booking_id"),
        varchar("next_booker_id"),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        varchar("item_id"),
        varchar("last_booking_id"),
        varchar("last_booker_id"),
        varchar("next_booking_id"),
        varchar("next_booker_id"),
    ]
}

fn can_comment_schema() -> Vec<FieldInfo> {
    vec![FieldInfo::new(
        "can_comment".into(),
        None,
        None,
        Type::BOOL,
        FieldFormat::Text,
    )]
}

fn encode_booking_ref(
    encoder: &mut DataRowEncoder,
    r: &Option<BookingRef>,
) -> PgWireResult<()> {
    encoder.encode_field(&r.map(|b| b.booking_id.to_string()))?;
    encoder.encode_field(&r.map(|b| b.booker_id.to_string()))?;
    Ok(())
}

fn booking_rows(infos: Vec<BookingInfo>) -> Response {
    let schema = Arc::new(booking_schema());
    let rows: Vec<PgWireResult<_>> = infos
        .into_iter()
        .map(|info| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&info.id.to_string())?;
            encoder.encode_field(&info.item_id.to_string())?;
            encoder.encode_field(&info.booker_id.to_string())?;
            encoder.encode_field(&info.start)?;
            encoder.encode_field(&info.end)?;
            encoder.encode_field(&info.status.to_string())?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

/// Best-effort result schema for Describe on the extended protocol; the
/// statement has not been through the real parser yet at that point.
fn sniff_schema(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if !upper.contains("SELECT") && !upper.contains("INSERT INTO BOOKINGS") {
        if upper.contains("UPDATE BOOKINGS") {
            return booking_schema();
        }
        return vec![];
    }
    if upper.contains("AVAILABILITY") {
        availability_schema()
    } else if upper.contains("CAN_COMMENT") {
        can_comment_schema()
    } else if upper.contains("BOOKINGS") {
        booking_schema()
    } else if upper.contains("ITEMS") {
        item_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for LenditHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.run_command(&engine, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct LenditQueryParser;

#[async_trait]
impl QueryParser for LenditQueryParser {
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
        Ok(sniff_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for LenditHandler {
    type Statement = String;
    type QueryParser = LenditQueryParser;

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
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.run_command(&engine, cmd).await?;
        Ok(responses.remove(0))
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
        Ok(DescribeStatementResponse::new(
            param_types,
            sniff_schema(&target.statement),
        ))
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
        Ok(DescribePortalResponse::new(sniff_schema(
            &target.statement.statement,
        )))
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
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    if n > max {
                        max = n;
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct LenditFactory {
    handler: Arc<LenditHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<LenditAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl LenditFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = LenditAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(LenditHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for LenditFactory {
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
    socket: tokio::net::TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = LenditFactory::new(tenant_manager, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: EngineError) -> PgWireError {
    let code = match &e {
        EngineError::NotFound(_) => "P0002",
        EngineError::Forbidden(_) => "42501",
        EngineError::InvalidState(_) => "55000",
        EngineError::InvalidArgument(_) => "22023",
        EngineError::AlreadyExists(_) => "23505",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::WalError(_) => "58030",
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    // Semantically invalid values are not syntax errors
    let code = match &e {
        crate::sql::SqlError::InvalidArgument(_) => "22023",
        _ => "42601",
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        e.to_string(),
    )))
}
