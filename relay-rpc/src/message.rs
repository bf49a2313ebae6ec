// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The two wire-level JSON shapes: the request object a caller sends and the
//! response object the dispatcher returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{"name": string, "parameters": array}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub name: String,
    pub parameters: Vec<Value>,
}

/// Either `{"error_flag": false, "return_value": <json>}` or
/// `{"error_flag": true, "error_msg": string}`. Deliberately not one
/// `#[serde(untagged)]` enum over a shared struct: the two variants share no
/// field beyond `error_flag`, and hand-rolled `to_value`/`from_value` keep
/// the exact key set `spec.md` §6 specifies.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResponse {
    Success(Value),
    Failure(String),
}

impl RpcResponse {
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            RpcResponse::Success(value) => serde_json::json!({
                "error_flag": false,
                "return_value": value,
            }),
            RpcResponse::Failure(message) => serde_json::json!({
                "error_flag": true,
                "error_msg": message,
            }),
        }
    }

    /// Reconstructs a response from its wire form, used by the client side
    /// and by tests that round-trip a frame.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let error_flag = value.get("error_flag")?.as_bool()?;
        if error_flag {
            let message = value.get("error_msg")?.as_str()?.to_string();
            Some(RpcResponse::Failure(message))
        } else {
            let return_value = value.get("return_value")?.clone();
            Some(RpcResponse::Success(return_value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn success_round_trips_through_value() {
        let response = RpcResponse::Success(serde_json::json!([1, 2, 3]));
        let value = response.to_value();
        assert_eq!(value["error_flag"], false);
        assert_eq!(RpcResponse::from_value(&value), Some(response));
    }

    #[test]
    fn failure_round_trips_through_value() {
        let response = RpcResponse::Failure("Target method NOT found".to_string());
        let value = response.to_value();
        assert_eq!(value["error_flag"], true);
        assert_eq!(RpcResponse::from_value(&value), Some(response));
    }
}
