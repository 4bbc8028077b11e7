use serde_json::{json, Value};

use crate::cache::QueryKey;
use crate::error::AppError;
use crate::ipc::helpers::{require_db, respond};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use crate::store;

fn stats(state: &mut AppState) -> Result<Value, AppError> {
    let conn = require_db(state)?;
    state.session.require("You must be signed in to view the dashboard.")?;
    state
        .cache
        .borrow_mut()
        .get_or_load(QueryKey::DashboardStats, || {
            let accounts = store::accounts(conn)?;
            Ok(json!({ "stats": ledger::dashboard_stats(&accounts) }))
        })
}

fn class_summary(state: &mut AppState) -> Result<Value, AppError> {
    let conn = require_db(state)?;
    state.session.require("You must be signed in to view the dashboard.")?;
    state
        .cache
        .borrow_mut()
        .get_or_load(QueryKey::ClassSummary, || {
            let accounts = store::accounts(conn)?;
            Ok(json!({ "classes": ledger::class_summary(&accounts) }))
        })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "dashboard.stats" => stats(state),
        "classes.summary" => class_summary(state),
        _ => return None,
    };
    Some(respond(req, result))
}
