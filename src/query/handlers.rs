//! SQL gateway handlers
//!
//! POST /api/query executes whatever statement the operator submits, exactly
//! as given, against the shared pool. The only gate is a valid session token;
//! DDL, DML, and function calls are all allowed. Results come back as JSON
//! rows plus column metadata, a row count, and wall-clock duration.

use axum::extract::{Extension, Json};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, Either, Executor, PgConnection, Postgres, Row, TypeInfo, ValueRef};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::models::{type_oid, FieldInfo, QueryRequest, QueryResponse, TableInfo};
use crate::auth::AuthedUser;
use crate::common::{ApiError, AppState};

/// POST /api/query
/// Executes an arbitrary SQL statement with positional bind parameters
pub async fn execute_query(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if req.sql.trim().is_empty() {
        return Err(ApiError::BadRequest("SQL required".to_string()));
    }

    debug!(
        user_id = %authed.id,
        params = req.params.len(),
        "Executing SQL statement"
    );

    let start = Instant::now();

    let (rows, affected, fields) = match state.config.statement_timeout_ms {
        Some(ms) => {
            // Scoped timeout: SET LOCAL dies with the transaction, so the
            // pooled connection comes back clean.
            let mut tx = state.db.begin().await.map_err(ApiError::DatabaseError)?;
            sqlx::query(&format!("SET LOCAL statement_timeout = {}", ms))
                .execute(&mut *tx)
                .await
                .map_err(ApiError::DatabaseError)?;
            let out = run_statement(&mut *tx, &req.sql, &req.params).await?;
            tx.commit().await.map_err(ApiError::DatabaseError)?;
            out
        }
        None => {
            let mut conn = state.db.acquire().await.map_err(ApiError::DatabaseError)?;
            run_statement(&mut *conn, &req.sql, &req.params).await?
        }
    };

    let duration = start.elapsed().as_millis();
    let row_count = if rows.is_empty() {
        affected
    } else {
        rows.len() as u64
    };

    info!(
        user_id = %authed.id,
        row_count = row_count,
        duration_ms = duration as u64,
        "SQL statement executed"
    );

    Ok(Json(QueryResponse {
        rows: rows.iter().map(row_to_json).collect(),
        fields,
        row_count,
        duration,
    }))
}

/// GET /api/tables
/// Lists user tables with schema and approximate row counts
pub async fn list_tables(
    Extension(state): Extension<Arc<AppState>>,
    _authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tables = sqlx::query_as::<_, TableInfo>(
        r#"
        SELECT
            t.table_name::text AS table_name,
            t.table_schema::text AS table_schema,
            (SELECT reltuples::bigint FROM pg_class WHERE relname = t.table_name) AS approx_rows
        FROM information_schema.tables t
        WHERE t.table_schema NOT IN ('pg_catalog', 'information_schema')
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::DatabaseError)?;

    Ok(Json(serde_json::json!({ "rows": tables })))
}

// ---- Helper Functions ----

/// Run one statement on a dedicated connection, collecting both returned rows
/// and the rows-affected counters that row-less statements report.
async fn run_statement(
    conn: &mut PgConnection,
    sql: &str,
    params: &[Value],
) -> Result<(Vec<PgRow>, u64, Vec<FieldInfo>), ApiError> {
    let mut rows: Vec<PgRow> = Vec::new();
    let mut affected: u64 = 0;

    {
        let query = bind_json_params(sqlx::query(sql), params);
        let mut stream = query.fetch_many(&mut *conn);

        use futures_util::TryStreamExt;
        while let Some(item) = stream.try_next().await.map_err(ApiError::DatabaseError)? {
            match item {
                Either::Left(result) => affected += result.rows_affected(),
                Either::Right(row) => rows.push(row),
            }
        }
    }

    let fields = if let Some(first) = rows.first() {
        first.columns().iter().map(field_info).collect()
    } else {
        // No rows came back; a SELECT can still describe its columns.
        match conn.describe(sql).await {
            Ok(desc) => desc.columns().iter().map(field_info).collect(),
            Err(e) => {
                debug!(error = %e, "Statement describe failed, returning empty field list");
                Vec::new()
            }
        }
    };

    Ok((rows, affected, fields))
}

fn field_info(column: &sqlx::postgres::PgColumn) -> FieldInfo {
    let type_name = column.type_info().name().to_string();
    FieldInfo {
        name: column.name().to_string(),
        data_type_id: type_oid(&type_name),
        data_type: type_name,
    }
}

/// Bind a JSON parameter list positionally
fn bind_json_params<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = bind_json_value(query, param);
    }
    query
}

/// Bind one JSON value, choosing the bind type from its shape. Arrays and
/// objects go over the wire as jsonb. Also used by the worker's bulk insert.
pub(crate) fn bind_json_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(sqlx::types::Json(other)),
    }
}

/// Convert one result row to a JSON object keyed by column name
fn row_to_json(row: &PgRow) -> Value {
    let mut object = Map::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        object.insert(
            column.name().to_string(),
            decode_column(row, idx, type_name),
        );
    }
    Value::Object(object)
}

/// Decode a single column to JSON by its Postgres type. Exact numerics come
/// back as strings, the same way the node-postgres driver reports them.
fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Err(e) => {
            warn!(error = %e, column = idx, "Failed to read raw column value");
            return Value::Null;
        }
        _ => {}
    }

    match type_name {
        "BOOL" => json_or_null(row.try_get::<bool, _>(idx).map(Value::Bool)),
        "INT2" => json_or_null(row.try_get::<i16, _>(idx).map(|v| Value::from(v as i64))),
        "INT4" => json_or_null(row.try_get::<i32, _>(idx).map(|v| Value::from(v as i64))),
        "INT8" | "OID" => json_or_null(row.try_get::<i64, _>(idx).map(Value::from)),
        "FLOAT4" => json_or_null(row.try_get::<f32, _>(idx).map(|v| Value::from(v as f64))),
        "FLOAT8" => json_or_null(row.try_get::<f64, _>(idx).map(Value::from)),
        "NUMERIC" => json_or_null(
            row.try_get::<rust_decimal::Decimal, _>(idx)
                .map(numeric_to_json),
        ),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            json_or_null(row.try_get::<String, _>(idx).map(Value::String))
        }
        "TIMESTAMPTZ" => json_or_null(
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
                .map(|v| Value::String(v.to_rfc3339())),
        ),
        "TIMESTAMP" => json_or_null(
            row.try_get::<chrono::NaiveDateTime, _>(idx)
                .map(|v| Value::String(v.to_string())),
        ),
        "DATE" => json_or_null(
            row.try_get::<chrono::NaiveDate, _>(idx)
                .map(|v| Value::String(v.to_string())),
        ),
        "TIME" => json_or_null(
            row.try_get::<chrono::NaiveTime, _>(idx)
                .map(|v| Value::String(v.to_string())),
        ),
        "UUID" => json_or_null(
            row.try_get::<uuid::Uuid, _>(idx)
                .map(|v| Value::String(v.to_string())),
        ),
        "JSON" | "JSONB" => json_or_null(row.try_get::<Value, _>(idx)),
        "BYTEA" => json_or_null(row.try_get::<Vec<u8>, _>(idx).map(|bytes| {
            let mut hex = String::with_capacity(2 + bytes.len() * 2);
            hex.push_str("\\x");
            for b in &bytes {
                hex.push_str(&format!("{:02x}", b));
            }
            Value::String(hex)
        })),
        _ => row
            .try_get::<String, _>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// NUMERIC values keep full precision as strings; JSON numbers would round
/// them through f64.
fn numeric_to_json(value: rust_decimal::Decimal) -> Value {
    Value::String(value.to_string())
}

fn json_or_null(result: Result<Value, sqlx::Error>) -> Value {
    match result {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Failed to decode column value");
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_numeric_values_serialize_as_exact_strings() {
        let d = rust_decimal::Decimal::from_str("12.50").unwrap();
        assert_eq!(numeric_to_json(d), Value::String("12.50".to_string()));

        let d = rust_decimal::Decimal::from_str("-0.000000001").unwrap();
        assert_eq!(numeric_to_json(d), Value::String("-0.000000001".to_string()));
    }
}
