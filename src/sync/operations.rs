use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

/// A read request for a single thing instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThingQuery {
    /// Name of the thing definition
    pub thing: String,
    /// Caller-supplied identity key
    pub key: String,
}

impl ThingQuery {
    pub fn new(thing: &str, key: &str) -> Self {
        Self {
            thing: thing.to_string(),
            key: key.to_string(),
        }
    }
}

/// An invocation of an action definition.
///
/// Carries the payload applied optimistically to the local cache and sent
/// to the remote boundary, plus a content hash so re-issuing the same
/// invocation is recognizable on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInvocation {
    /// Name of the action definition
    pub action: String,
    /// Payload field values, keyed by field name
    pub payload: HashMap<String, JsonValue>,
    /// Content hash identifying this invocation
    pub idempotency_hash: String,
}

impl ActionInvocation {
    pub fn new(action: &str, payload: HashMap<String, JsonValue>) -> Self {
        let idempotency_hash = invocation_hash(action, &payload);
        Self {
            action: action.to_string(),
            payload,
            idempotency_hash,
        }
    }
}

/// Sha256 over the action name and its payload in sorted field order
fn invocation_hash(action: &str, payload: &HashMap<String, JsonValue>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(action.as_bytes());
    let mut fields: Vec<&String> = payload.keys().collect();
    fields.sort();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update(payload[field].to_string().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_invocations_share_a_hash() {
        let mut payload = HashMap::new();
        payload.insert("url".to_string(), serde_json::json!("https://example.com"));
        payload.insert("title".to_string(), serde_json::json!("Example"));

        let first = ActionInvocation::new("add_bookmark", payload.clone());
        let second = ActionInvocation::new("add_bookmark", payload.clone());
        assert_eq!(first.idempotency_hash, second.idempotency_hash);

        payload.insert("title".to_string(), serde_json::json!("Changed"));
        let third = ActionInvocation::new("add_bookmark", payload);
        assert_ne!(first.idempotency_hash, third.idempotency_hash);
    }
}
