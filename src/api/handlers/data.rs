//! Data ingest and query handlers

use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::net::SocketAddr;

use crate::api::server::AppState;

/// Accept a submission, store it and broadcast it to listeners
pub async fn ingest_data(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let source = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let payload = decode_payload(content_type, &body);

    Json(state.relay.ingest(payload, source))
}

/// Return the current history, newest first
pub async fn list_data(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.relay.snapshot())
}

/// Turn a request body into a stored payload. Never fails.
pub fn decode_payload(content_type: Option<&str>, body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Object(Map::new());
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/x-www-form-urlencoded" {
        return decode_form(body);
    }

    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Deepest bracket nesting expanded in form keys; the rest stays literal
const FORM_MAX_DEPTH: usize = 5;

/// Decode a urlencoded body into nested JSON
///
/// `a=1&a=2` gives `{"a": ["1", "2"]}`, `a[]=1` gives `{"a": ["1"]}` and
/// `a[b][c]=1` gives `{"a": {"b": {"c": "1"}}}`.
fn decode_form(body: &[u8]) -> Value {
    let mut fields = Map::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        let path = split_form_key(&key);
        insert_form_value(&mut fields, &path, value.into_owned());
    }
    Value::Object(fields)
}

fn split_form_key(key: &str) -> Vec<String> {
    let open = match key.find('[') {
        Some(open) if open > 0 => open,
        _ => return vec![key.to_string()],
    };

    let mut path = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while path.len() <= FORM_MAX_DEPTH && rest.starts_with('[') {
        match rest.find(']') {
            Some(close) => {
                path.push(rest[1..close].to_string());
                rest = &rest[close + 1..];
            }
            None => break,
        }
    }

    if path.len() == 1 {
        return vec![key.to_string()];
    }
    if !rest.is_empty() {
        path.push(rest.to_string());
    }
    path
}

fn insert_form_value(fields: &mut Map<String, Value>, path: &[String], value: String) {
    let (name, rest) = match path.split_first() {
        Some(split) => split,
        None => return,
    };

    // `name=v` or `name[]=v`
    if rest.is_empty() || (rest.len() == 1 && rest[0].is_empty()) {
        let leaf = Value::String(value);
        match fields.get_mut(name) {
            None if rest.is_empty() => {
                fields.insert(name.clone(), leaf);
            }
            None => {
                fields.insert(name.clone(), Value::Array(vec![leaf]));
            }
            Some(Value::Array(items)) => items.push(leaf),
            Some(existing) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, leaf]);
            }
        }
        return;
    }

    // Scalar already stored under this name; keep both by falling back to the raw key
    if matches!(fields.get(name), Some(existing) if !existing.is_object()) {
        let raw = std::iter::once(name.clone())
            .chain(rest.iter().map(|segment| format!("[{}]", segment)))
            .collect::<String>();
        insert_form_value(fields, &[raw], value);
        return;
    }

    if let Value::Object(children) = fields
        .entry(name.clone())
        .or_insert_with(|| Value::Object(Map::new()))
    {
        insert_form_value(children, rest, value);
    }
}
