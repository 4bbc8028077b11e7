use serde_json::{json, Value};

use crate::error::AppError;
use crate::ipc::helpers::{opt_string, require_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::session::SIGN_IN_ROUTE;

fn sign_in(state: &mut AppState, req: &Request) -> Result<Value, AppError> {
    let actor_id = require_str(req, "actorId")?;
    let email = opt_string(req, "email")?;
    let session = state.session.sign_in(actor_id, email.as_deref())?;
    Ok(json!({ "session": session }))
}

fn sign_out(state: &mut AppState) -> Result<Value, AppError> {
    let ended = state.session.sign_out();
    Ok(json!({ "signedOut": ended, "redirect": SIGN_IN_ROUTE }))
}

fn current(state: &AppState) -> Result<Value, AppError> {
    Ok(json!({ "session": state.session.current() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.signIn" => sign_in(state, req),
        "auth.signOut" => sign_out(state),
        "auth.session" => current(state),
        _ => return None,
    };
    Some(respond(req, result))
}
