//! Wire-format tests for the response envelope and demo models.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

mod envelope_tests {
    use super::*;
    use tollgate::envelope::{Envelope, ErrorBody, json_error, json_success};

    #[test]
    fn test_success_shape() {
        let value = serde_json::to_value(json_success(json!({"id": 1}))).unwrap();
        assert_eq!(value, json!({"success": true, "data": {"id": 1}}));
    }

    #[test]
    fn test_error_shape_omits_absent_fields() {
        let value = serde_json::to_value(json_error("Not Found", None, None)).unwrap();
        assert_eq!(value, json!({"success": false, "error": {"message": "Not Found"}}));
    }

    #[test]
    fn test_error_shape_with_code_and_details() {
        let envelope = json_error(
            "Validation failed",
            Some("ERR_VALIDATION"),
            Some(json!({"body": []})),
        );
        let value = serde_json::to_value(envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "error": {"message": "Validation failed", "code": "ERR_VALIDATION", "details": {"body": []}}
            })
        );
    }

    #[test]
    fn test_error_body_deserializes_from_wire() {
        let body: ErrorBody =
            serde_json::from_value(json!({"message": "Unauthorized", "code": "ERR_UNAUTHORIZED"}))
                .unwrap();
        assert_eq!(body.message, "Unauthorized");
        assert_eq!(body.code.as_deref(), Some("ERR_UNAUTHORIZED"));
        assert!(body.details.is_none());
    }

    #[test]
    fn test_success_with_unit_data_is_null() {
        let envelope: Envelope<()> = json_success(());
        let value = serde_json::to_value(envelope).unwrap();
        assert_eq!(value, json!({"success": true, "data": null}));
    }
}

mod model_tests {
    use super::*;
    use tollgate::models::{CreateMessageRequest, HealthResponse, ItemResponse, MessageAccepted};

    #[test]
    fn test_create_message_request_ignores_unknown_fields() {
        let request: CreateMessageRequest =
            serde_json::from_value(json!({"message": "hello", "extra": 1})).unwrap();
        assert_eq!(request.message, "hello");
    }

    #[test]
    fn test_create_message_request_requires_message() {
        assert!(serde_json::from_value::<CreateMessageRequest>(json!({})).is_err());
    }

    #[test]
    fn test_message_accepted_serialization() {
        let id = Uuid::new_v4();
        let accepted = MessageAccepted {
            id,
            message: "hi there".to_string(),
            author: None,
            request_id: Some("rid".to_string()),
            received_at: Utc::now(),
        };

        let value = serde_json::to_value(&accepted).unwrap();
        assert_eq!(value["id"], json!(id.to_string()));
        assert_eq!(value["author"], json!(null));
        assert_eq!(value["request_id"], json!("rid"));
    }

    #[test]
    fn test_health_response_roundtrip_fields() {
        let health = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            uptime_seconds: 5,
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&health).unwrap();
        assert_eq!(value["status"], json!("healthy"));
        assert_eq!(value["uptime_seconds"], json!(5));
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_item_response() {
        let item = ItemResponse {
            id: 42,
            flag: "yes".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"id": 42, "flag": "yes"})
        );
    }
}

mod schema_tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tollgate::schema::{FieldRule, Issue, ObjectSchema, PathSegment, Schema, SerdeSchema};

    #[derive(Debug, Serialize, Deserialize)]
    struct Page {
        #[serde(default = "default_size")]
        size: u32,
    }

    fn default_size() -> u32 {
        20
    }

    #[test]
    fn test_serde_schema_applies_defaults() {
        let schema = SerdeSchema::<Page>::new();
        assert_eq!(schema.safe_parse(&json!({})).unwrap(), json!({"size": 20}));
    }

    #[test]
    fn test_serde_schema_error_is_root_issue() {
        let schema = SerdeSchema::<Page>::new();
        let issues = schema.safe_parse(&json!({"size": "big"})).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].path.is_empty());
    }

    #[test]
    fn test_issue_path_wire_format() {
        let issue = Issue::new(
            vec![PathSegment::from("items"), PathSegment::from(2usize)],
            "Required",
        );
        assert_eq!(
            serde_json::to_value(&issue).unwrap(),
            json!({"path": ["items", 2], "message": "Required"})
        );
    }

    #[test]
    fn test_nested_array_issue_paths() {
        let schema = ObjectSchema::new().field(
            "tags",
            FieldRule::array(FieldRule::string().min_len(2)),
        );
        let issues = schema
            .safe_parse(&json!({"tags": ["ok", "x", 3]}))
            .unwrap_err();

        let paths: Vec<_> = issues.iter().map(|i| i.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                vec![PathSegment::from("tags"), PathSegment::from(1usize)],
                vec![PathSegment::from("tags"), PathSegment::from(2usize)],
            ]
        );
    }
}
