//! Routes file: a JSON array of mock endpoints turned into a MultipleHandler.
//!
//! ```json
//! [
//!   { "method": "GET",  "path": "/users/*", "response": { "id": "{0}" } },
//!   { "method": "POST", "path": "/users",   "status": 201, "echo": true }
//! ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use fakehttp_core::{JsonHandler, MultipleHandler, Route};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoutesError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One entry of the routes file.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RouteSpec {
    pub method: String,
    pub path: String,
    #[serde(default = "default_status")]
    pub status: u16,
    /// Returned as-is, with `{N}` in strings replaced by the Nth path parameter.
    #[serde(default)]
    pub response: Value,
    /// Decode the JSON request body and send it back.
    #[serde(default)]
    pub echo: bool,
}

fn default_status() -> u16 {
    200
}

impl RouteSpec {
    pub fn into_route(self) -> Box<dyn Route> {
        let handler = JsonHandler::new(self.method, self.path).with_response_code(self.status);
        if self.echo {
            return Box::new(handler.with_request_body(Value::Null));
        }
        let template = self.response;
        Box::new(handler.with_response_fn(move |_, params, _| Ok(Some(fill(&template, params)))))
    }
}

pub fn load(path: &Path) -> Result<Vec<RouteSpec>, RoutesError> {
    let raw = fs::read(path).map_err(|source| RoutesError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| RoutesError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Build the dispatcher; entries without a method or path are skipped with a warning.
pub fn build(specs: Vec<RouteSpec>) -> MultipleHandler {
    let mut handler = MultipleHandler::default();
    for spec in specs {
        if spec.method.is_empty() || spec.path.is_empty() {
            tracing::warn!(method = %spec.method, path = %spec.path, "route needs both method and path, skipped");
            continue;
        }
        tracing::info!(method = %spec.method, path = %spec.path, status = spec.status, "route");
        handler.add_handler(spec.into_route());
    }
    handler
}

/// Substitute `{N}` placeholders in every string of `template`.
fn fill(template: &Value, params: &[String]) -> Value {
    match template {
        Value::String(s) => {
            let mut out = s.clone();
            for (i, param) in params.iter().enumerate() {
                out = out.replace(&format!("{{{i}}}"), param);
            }
            Value::String(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| fill(v, params)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), fill(v, params)))
                .collect(),
        ),
        other => other.clone(),
    }
}
