//! SQL gateway data models

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// POST /api/query request body
#[derive(Deserialize, Debug)]
pub struct QueryRequest {
    #[serde(default)]
    pub sql: String,
    /// Ordered bind values, matched positionally to `$1..$n`
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Metadata for one selected column
#[derive(Serialize, Debug, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    /// Postgres type OID where known, mirroring the wire protocol's RowDescription
    #[serde(rename = "dataTypeID")]
    pub data_type_id: Option<u32>,
    #[serde(rename = "dataType")]
    pub data_type: String,
}

/// POST /api/query response body
#[derive(Serialize, Debug)]
pub struct QueryResponse {
    pub rows: Vec<Value>,
    pub fields: Vec<FieldInfo>,
    #[serde(rename = "rowCount")]
    pub row_count: u64,
    /// Wall-clock execution time in milliseconds
    pub duration: u128,
}

/// One entry in the GET /api/tables listing
#[derive(sqlx::FromRow, Serialize, Debug)]
pub struct TableInfo {
    pub table_name: String,
    pub table_schema: String,
    pub approx_rows: Option<i64>,
}

/// Static name-to-OID map for the common built-in Postgres types, so the
/// response can carry the same numeric type ids the wire protocol reports.
pub fn type_oid(type_name: &str) -> Option<u32> {
    let oid = match type_name {
        "BOOL" => 16,
        "BYTEA" => 17,
        "CHAR" => 18,
        "NAME" => 19,
        "INT8" => 20,
        "INT2" => 21,
        "INT4" => 23,
        "TEXT" => 25,
        "OID" => 26,
        "JSON" => 114,
        "FLOAT4" => 700,
        "FLOAT8" => 701,
        "BPCHAR" => 1042,
        "VARCHAR" => 1043,
        "DATE" => 1082,
        "TIME" => 1083,
        "TIMESTAMP" => 1114,
        "TIMESTAMPTZ" => 1184,
        "INTERVAL" => 1186,
        "NUMERIC" => 1700,
        "UUID" => 2950,
        "JSONB" => 3802,
        _ => return None,
    };
    Some(oid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_oid_covers_common_types() {
        assert_eq!(type_oid("INT4"), Some(23));
        assert_eq!(type_oid("TEXT"), Some(25));
        assert_eq!(type_oid("TIMESTAMPTZ"), Some(1184));
        assert_eq!(type_oid("JSONB"), Some(3802));
    }

    #[test]
    fn test_type_oid_unknown_type() {
        assert_eq!(type_oid("CIRCLE"), None);
        assert_eq!(type_oid("INT4[]"), None);
    }

    #[test]
    fn test_query_request_defaults() {
        let req: QueryRequest = serde_json::from_str(r#"{"sql":"SELECT 1"}"#).unwrap();
        assert_eq!(req.sql, "SELECT 1");
        assert!(req.params.is_empty());

        let empty: QueryRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.sql.is_empty());
    }
}
