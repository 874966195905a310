//! Job queue data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// POST /api/enqueue request body
#[derive(Deserialize, Debug)]
pub struct EnqueueRequest {
    #[serde(rename = "taskType")]
    pub task_type: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

/// A queued job row, claimed and resolved by the worker
#[derive(FromRow, Serialize, Debug)]
pub struct BackgroundJob {
    pub id: i64,
    pub job_type: String,
    pub data: Value,
    pub retries: i32,
    pub last_retry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A terminally failed job, retained for operator inspection
#[derive(FromRow, Serialize, Debug)]
pub struct FailedJob {
    pub id: i64,
    pub job_type: String,
    pub data: Value,
    pub retries: i32,
    pub error: String,
    pub created_at: DateTime<Utc>,
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_request_task_type_optional() {
        let req: EnqueueRequest =
            serde_json::from_str(r#"{"payload":{"table":"t","rows":[]}}"#).unwrap();
        assert!(req.task_type.is_none());
        assert_eq!(req.payload["table"], "t");
    }

    #[test]
    fn test_enqueue_request_full() {
        let req: EnqueueRequest =
            serde_json::from_str(r#"{"taskType":"rpc_trigger","payload":{"functionName":"f"}}"#)
                .unwrap();
        assert_eq!(req.task_type.as_deref(), Some("rpc_trigger"));
    }

    #[test]
    fn test_enqueue_request_payload_defaults_to_null() {
        let req: EnqueueRequest = serde_json::from_str(r#"{"taskType":"noop"}"#).unwrap();
        assert!(req.payload.is_null());
    }
}
