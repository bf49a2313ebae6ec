// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! Sample procedures registered on a fresh [`Dispatcher`], matching the
//! scenario E1 fixture in `spec.md` §8 (`int_sort`) plus a couple of small
//! procedures useful for exercising the other error paths end to end.

use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::Dispatcher;

/// `int_sort([[3,4,2,1]]) -> [1,2,3,4]`. The sole parameter is an array of
/// integers; the result is that array sorted ascending.
fn int_sort(params: &[Value]) -> Result<Value, String> {
    let array = params
        .first()
        .and_then(Value::as_array)
        .ok_or("int_sort expects one array parameter")?;

    let mut numbers: Vec<i64> = Vec::with_capacity(array.len());
    for element in array {
        let n = element
            .as_i64()
            .ok_or("int_sort expects an array of integers")?;
        numbers.push(n);
    }
    numbers.sort_unstable();
    Ok(Value::from(numbers))
}

/// `echo([value]) -> value`. Useful for smoke-testing the framing layer
/// without depending on `int_sort`'s validation.
fn echo(params: &[Value]) -> Result<Value, String> {
    params
        .first()
        .cloned()
        .ok_or_else(|| "echo expects one parameter".to_string())
}

/// `add([a, b]) -> a + b`, integers only.
fn add(params: &[Value]) -> Result<Value, String> {
    let a = params
        .first()
        .and_then(Value::as_i64)
        .ok_or("add expects two integer parameters")?;
    let b = params
        .get(1)
        .and_then(Value::as_i64)
        .ok_or("add expects two integer parameters")?;
    Ok(Value::from(a + b))
}

/// Builds a [`Dispatcher`] with every sample procedure registered.
#[must_use]
pub fn standard_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register("int_sort", Arc::new(int_sort));
    dispatcher.register("echo", Arc::new(echo));
    dispatcher.register("add", Arc::new(add));
    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{RpcRequest, RpcResponse};
    use pretty_assertions::assert_eq;

    #[test]
    fn int_sort_matches_scenario_e1() {
        let dispatcher = standard_dispatcher();
        let request = RpcRequest {
            name: "int_sort".to_string(),
            parameters: vec![serde_json::json!([3, 4, 2, 1, 4, 5, 3, 2])],
        };
        assert_eq!(
            dispatcher.dispatch(&request),
            RpcResponse::Success(serde_json::json!([1, 2, 2, 3, 3, 4, 4, 5]))
        );
    }

    #[test]
    fn int_sort_rejects_non_array_parameter() {
        let dispatcher = standard_dispatcher();
        let request = RpcRequest {
            name: "int_sort".to_string(),
            parameters: vec![Value::from(5)],
        };
        match dispatcher.dispatch(&request) {
            RpcResponse::Failure(_) => {}
            other => panic!("expected a Failure response, got {other:?}"),
        }
    }

    #[test]
    fn add_sums_two_integers() {
        let dispatcher = standard_dispatcher();
        let request = RpcRequest {
            name: "add".to_string(),
            parameters: vec![Value::from(2), Value::from(40)],
        };
        assert_eq!(dispatcher.dispatch(&request), RpcResponse::Success(Value::from(42)));
    }
}
