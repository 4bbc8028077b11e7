use std::str::FromStr;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::AppError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

pub fn respond(req: &Request, result: Result<Value, AppError>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            if e.is_upstream() {
                error!(method = %req.method, error = %e, "request failed");
            } else {
                debug!(method = %req.method, code = e.code(), error = %e, "request rejected");
            }
            err(&req.id, e.code(), e.to_string(), e.details())
        }
    }
}

pub fn require_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, AppError> {
    req.params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::bad_params(format!("missing params.{key}")))
}

/// Absent and `null` both read as `None`; any other non-string is rejected.
pub fn opt_string(req: &Request, key: &str) -> Result<Option<String>, AppError> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(AppError::bad_params(format!("params.{key} must be a string"))),
    }
}

/// Money arrives as a JSON number or a decimal string.
pub fn require_decimal(req: &Request, key: &str) -> Result<Decimal, AppError> {
    let raw = match req.params.get(key) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(AppError::bad_params(format!("params.{key} must be a number"))),
        None => return Err(AppError::bad_params(format!("missing params.{key}"))),
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| AppError::bad_params(format!("params.{key} is not a valid amount")))
}

pub fn require_db(state: &AppState) -> Result<&Connection, AppError> {
    state.db.as_ref().ok_or(AppError::NoWorkspace)
}
