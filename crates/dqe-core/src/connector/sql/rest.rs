//! Shared plumbing for the REST-family SQL connectors (Snowflake, Databricks,
//! BigQuery, Trino). Each speaks a different HTTP query API, but all of them
//! submit a SQL string as a JSON body and get a JSON result set back, so this
//! module centralizes the pieces that are genuinely shared: the client
//! builder, a bearer-auth header, and `serde_json::Value` -> [`Value`]
//! conversion used once each row is pulled out of whatever wire shape the
//! dialect wraps its columns in.

use std::time::Duration;

use reqwest::Client;

use crate::connector::Value;
use crate::error::{Error, Result};

/// REST query endpoints get the outbound HTTP timeout a dialect-family
/// connector can reasonably impose on itself; the *alert* dispatcher's
/// 30-second timeout is a separate, unrelated budget.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::ConnectionFailed(e.to_string()))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

/// Raise a driver-level error to [`Error::ConnectionFailed`] unless the
/// response status is 2xx, in which case parse the body as JSON.
pub async fn json_or_err(resp: reqwest::Response) -> Result<serde_json::Value> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
    if !status.is_success() {
        return Err(Error::ConnectionFailed(format!("HTTP {status}: {body}")));
    }
    serde_json::from_str(&body).map_err(|e| Error::ConnectionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_to_value_converts_primitives() {
        assert_eq!(json_to_value(&serde_json::json!(null)), Value::Null);
        assert_eq!(json_to_value(&serde_json::json!(true)), Value::Bool(true));
        assert_eq!(json_to_value(&serde_json::json!(42)), Value::Int(42));
        assert_eq!(json_to_value(&serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(json_to_value(&serde_json::json!("x")), Value::Text("x".to_owned()));
    }

    #[test]
    fn bearer_formats_header() {
        assert_eq!(bearer("tok"), "Bearer tok");
    }
}
