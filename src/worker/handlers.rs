//! Job handlers
//!
//! One function per task type. Handler errors propagate to the claim loop,
//! which schedules a retry or moves the job to `failed_jobs` once the budget
//! is spent.

use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::query::handlers::bind_json_value;
use crate::queue::models::BackgroundJob;

/// Upper bound on rows per INSERT statement inside a bulk insert transaction
const BULK_INSERT_CHUNK: usize = 1000;

/// Postgres caps bind parameters per statement at u16::MAX
const MAX_BIND_PARAMS: usize = 65535;

/// Dispatch a claimed job by its task-type tag.
///
/// Types without a registered handler (including the dispatcher's "default")
/// complete as a success no-op; retrying them could never make them succeed.
pub async fn run_job(pool: &PgPool, job: &BackgroundJob) -> anyhow::Result<()> {
    match job.job_type.as_str() {
        "bulk_insert" => {
            let written = bulk_insert(pool, &job.data).await?;
            info!(job_id = job.id, rows_written = written, "Bulk insert completed");
            Ok(())
        }
        "rpc_trigger" => {
            rpc_trigger(pool, &job.data).await?;
            info!(job_id = job.id, "RPC trigger completed");
            Ok(())
        }
        other => {
            warn!(job_id = job.id, job_type = %other, "No handler for job type, completing as no-op");
            Ok(())
        }
    }
}

#[derive(Deserialize)]
struct BulkInsertPayload {
    table: String,
    rows: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
struct RpcTriggerPayload {
    #[serde(rename = "functionName")]
    function_name: String,
    #[serde(default)]
    params: Value,
}

/// Insert a list of row objects into a named table as batched multi-row
/// INSERT statements inside a single transaction, returning the number of
/// rows written. The column set is taken from the first row; an empty row
/// list is a success with zero rows written.
pub async fn bulk_insert(pool: &PgPool, data: &Value) -> anyhow::Result<u64> {
    let payload: BulkInsertPayload =
        serde_json::from_value(data.clone()).context("invalid bulk_insert payload")?;

    if payload.rows.is_empty() {
        debug!(table = %payload.table, "bulk_insert with empty row list, nothing to do");
        return Ok(0);
    }

    let table = quoted_identifier(&payload.table)?;
    let columns: Vec<String> = payload.rows[0].keys().cloned().collect();
    if columns.is_empty() {
        bail!("bulk_insert rows must have at least one column");
    }
    let quoted_columns: Vec<String> = columns
        .iter()
        .map(|c| quoted_identifier(c))
        .collect::<anyhow::Result<_>>()?;

    let mut tx = pool.begin().await?;
    let mut written: u64 = 0;

    for chunk in payload.rows.chunks(rows_per_chunk(columns.len())) {
        let sql = build_insert_sql(&table, &quoted_columns, chunk.len());

        let mut query = sqlx::query(&sql);
        let null = Value::Null;
        for row in chunk {
            for column in &columns {
                query = bind_json_value(query, row.get(column).unwrap_or(&null));
            }
        }

        let result = query.execute(&mut *tx).await?;
        written += result.rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}

/// Invoke a named database function with one bound parameter.
///
/// The name is resolved against the catalog first; only functions that
/// actually exist outside the system schemas can be called, and the call is
/// issued with a quoted identifier and a bind parameter, never by splicing
/// caller text into SQL.
pub async fn rpc_trigger(pool: &PgPool, data: &Value) -> anyhow::Result<()> {
    let payload: RpcTriggerPayload =
        serde_json::from_value(data.clone()).context("invalid rpc_trigger payload")?;

    let known: i64 = sqlx::query_scalar(
        r"
        SELECT COUNT(*) FROM information_schema.routines
        WHERE routine_type = 'FUNCTION'
          AND routine_schema NOT IN ('pg_catalog', 'information_schema')
          AND routine_name = $1
        ",
    )
    .bind(&payload.function_name)
    .fetch_one(pool)
    .await?;

    if known == 0 {
        bail!("unknown database function {}", payload.function_name);
    }

    let function = quoted_identifier(&payload.function_name)?;
    let sql = format!("SELECT {}($1)", function);

    bind_json_value(sqlx::query(&sql), &payload.params)
        .execute(pool)
        .await?;

    Ok(())
}

/// Rows per INSERT chunk for a given column count. Each row binds `width`
/// parameters, so wide rows shrink the chunk to stay under the wire cap.
fn rows_per_chunk(width: usize) -> usize {
    (MAX_BIND_PARAMS / width.max(1)).clamp(1, BULK_INSERT_CHUNK)
}

/// Validate and double-quote a SQL identifier. Only unqualified names of
/// letters, digits, and underscores are accepted.
fn quoted_identifier(name: &str) -> anyhow::Result<String> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        bail!("invalid identifier {:?}", name);
    }

    Ok(format!("\"{}\"", name))
}

/// Build a multi-row INSERT with positional placeholders:
/// `INSERT INTO "t" ("a","b") VALUES ($1,$2),($3,$4)`
fn build_insert_sql(table: &str, quoted_columns: &[String], row_count: usize) -> String {
    let mut sql = format!("INSERT INTO {} ({}) VALUES ", table, quoted_columns.join(","));

    let width = quoted_columns.len();
    for row in 0..row_count {
        if row > 0 {
            sql.push(',');
        }
        sql.push('(');
        for col in 0..width {
            if col > 0 {
                sql.push(',');
            }
            sql.push('$');
            sql.push_str(&(row * width + col + 1).to_string());
        }
        sql.push(')');
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unregistered_job_type_completes_as_noop() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        // "default" is what the dispatcher assigns when taskType is absent;
        // it must complete, not burn through the retry budget.
        let job = BackgroundJob {
            id: 1,
            job_type: "default".to_string(),
            data: serde_json::json!({}),
            retries: 0,
            last_retry: None,
            created_at: chrono::Utc::now(),
        };
        assert!(run_job(&pool, &job).await.is_ok());

        let job = BackgroundJob {
            job_type: "no_such_handler".to_string(),
            ..job
        };
        assert!(run_job(&pool, &job).await.is_ok());
    }

    #[test]
    fn test_rows_per_chunk_respects_bind_param_cap() {
        // Narrow rows keep the row-count ceiling
        assert_eq!(rows_per_chunk(1), BULK_INSERT_CHUNK);
        assert_eq!(rows_per_chunk(2), BULK_INSERT_CHUNK);
        // Wide rows shrink the chunk so rows * width stays under the cap
        assert_eq!(rows_per_chunk(100), 655);
        assert!(rows_per_chunk(100) * 100 <= MAX_BIND_PARAMS);
        assert_eq!(rows_per_chunk(1600), 40);
        assert!(rows_per_chunk(1600) * 1600 <= MAX_BIND_PARAMS);
        // Degenerate widths never produce a zero-row chunk
        assert_eq!(rows_per_chunk(0), BULK_INSERT_CHUNK);
        assert_eq!(rows_per_chunk(MAX_BIND_PARAMS + 1), 1);
    }

    #[test]
    fn test_quoted_identifier_accepts_plain_names() {
        assert_eq!(quoted_identifier("users").unwrap(), "\"users\"");
        assert_eq!(quoted_identifier("my_table_2").unwrap(), "\"my_table_2\"");
    }

    #[test]
    fn test_quoted_identifier_rejects_injection_attempts() {
        assert!(quoted_identifier("users; DROP TABLE users").is_err());
        assert!(quoted_identifier("pg_sleep(10)--").is_err());
        assert!(quoted_identifier("a\"b").is_err());
        assert!(quoted_identifier("").is_err());
        assert!(quoted_identifier("1abc").is_err());
    }

    #[test]
    fn test_build_insert_sql_placeholders() {
        let cols = vec!["\"a\"".to_string(), "\"b\"".to_string()];
        let sql = build_insert_sql("\"t\"", &cols, 3);
        assert_eq!(
            sql,
            "INSERT INTO \"t\" (\"a\",\"b\") VALUES ($1,$2),($3,$4),($5,$6)"
        );
    }

    #[test]
    fn test_build_insert_sql_single_row_single_column() {
        let cols = vec!["\"x\"".to_string()];
        let sql = build_insert_sql("\"t\"", &cols, 1);
        assert_eq!(sql, "INSERT INTO \"t\" (\"x\") VALUES ($1)");
    }

    #[test]
    fn test_bulk_insert_payload_parses() {
        let data = serde_json::json!({
            "table": "measurements",
            "rows": [{"v": 1}, {"v": 2}],
        });
        let payload: BulkInsertPayload = serde_json::from_value(data).unwrap();
        assert_eq!(payload.table, "measurements");
        assert_eq!(payload.rows.len(), 2);
    }

    #[test]
    fn test_rpc_trigger_payload_parses() {
        let data = serde_json::json!({"functionName": "recompute_stats", "params": 7});
        let payload: RpcTriggerPayload = serde_json::from_value(data).unwrap();
        assert_eq!(payload.function_name, "recompute_stats");
        assert_eq!(payload.params, serde_json::json!(7));
    }
}
