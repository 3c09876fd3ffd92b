//! HTTP collaborator behind the `http.get()` builtin.

use crate::error::{EvalError, EvalErrorKind};
use crate::value::{Object, Value};
use std::collections::HashMap;
use std::time::Duration;

/// A fetched response, independent of the transport that produced it.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON; unparseable bodies come back as `null`.
    pub fn json_parsed(&self) -> Value {
        match serde_json::from_str::<serde_json::Value>(&self.body) {
            Ok(parsed) => json_to_value(parsed),
            Err(_) => Value::Null,
        }
    }

    /// Builds the response object exposed to scripts.
    pub fn into_value(self) -> Value {
        let json = self.json_parsed();
        let mut obj = Object::new("Response");
        obj.set("status", Value::Number(self.status as f64));
        obj.set("ok", Value::Bool(self.ok()));
        obj.set("body", Value::String(self.body));
        obj.set("json", json);
        Value::Object(obj)
    }
}

pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, EvalError>;
}

/// Blocking reqwest transport, optionally sending a bearer token.
pub struct ReqwestClient {
    pub auth_token: Option<String>,
}

impl ReqwestClient {
    pub fn new(auth_token: Option<String>) -> Self {
        Self { auth_token }
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, EvalError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                EvalError::new(
                    EvalErrorKind::HttpError,
                    format!("failed to build http client: {}", e),
                    None,
                )
            })?;

        let mut request = client.get(url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| {
            let kind = if e.is_timeout() {
                EvalErrorKind::Timeout
            } else {
                EvalErrorKind::HttpError
            };
            EvalError::new(kind, format!("GET {} failed: {}", url, e), None)
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_lowercase(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response.text().map_err(|e| {
            EvalError::new(
                EvalErrorKind::HttpError,
                format!("failed to read body from {}: {}", url, e),
                None,
            )
        })?;

        Ok(HttpResponse {
            status,
            body,
            headers,
        })
    }
}

/// Converts a `serde_json::Value` into a script [`Value`].
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i as f64)
            } else if let Some(f) = n.as_f64() {
                Value::Number(f)
            } else {
                Value::Null
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => {
            let mut dict = Object::new("Dict");
            for (k, v) in obj {
                dict.set(k, json_to_value(v));
            }
            Value::Object(dict)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.to_string(),
            headers: HashMap::new(),
        }
    }

    #[test]
    fn ok_is_2xx() {
        assert!(response(200, "").ok());
        assert!(response(204, "").ok());
        assert!(!response(301, "").ok());
        assert!(!response(404, "").ok());
    }

    #[test]
    fn json_parsing() {
        let value = response(200, r#"{"count": 3, "names": ["a", "b"]}"#).json_parsed();
        let Value::Object(obj) = value else { panic!() };
        assert_eq!(obj.get("count"), Some(&Value::Number(3.0)));
        let Some(Value::Array(names)) = obj.get("names") else {
            panic!()
        };
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn invalid_json_is_null() {
        assert_eq!(response(200, "not json").json_parsed(), Value::Null);
    }

    #[test]
    fn into_value_exposes_status_body_json() {
        let value = response(503, "down").into_value();
        let Value::Object(obj) = value else { panic!() };
        assert_eq!(obj.get("status"), Some(&Value::Number(503.0)));
        assert_eq!(obj.get("ok"), Some(&Value::Bool(false)));
        assert_eq!(obj.get("body"), Some(&Value::String("down".into())));
        assert_eq!(obj.get("json"), Some(&Value::Null));
    }
}
