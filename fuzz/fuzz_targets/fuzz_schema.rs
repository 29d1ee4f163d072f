//! Fuzz testing for schema parsing.
//!
//! Feeds arbitrary JSON documents through an object schema covering every
//! field rule. Parsing must never panic, and a successful parse must be
//! stable: parsing the output again yields the same value.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_schema -- -max_total_time=60
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};
use tollgate::schema::{FieldRule, ObjectSchema, Schema};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let schema = ObjectSchema::new()
        .field("name", FieldRule::string().min_len(1).max_len(64))
        .field("count", FieldRule::integer().min(0).max(1000).optional())
        .field("ratio", FieldRule::number().optional())
        .field("enabled", FieldRule::boolean().default(json!(false)))
        .field("tags", FieldRule::array(FieldRule::string()).optional())
        .field("extra", FieldRule::any().optional());

    match schema.safe_parse(&input) {
        Ok(parsed) => {
            assert_eq!(schema.safe_parse(&parsed), Ok(parsed.clone()));
        }
        Err(issues) => assert!(!issues.is_empty()),
    }
});
