use chrono::Local;
use serde_json::{json, Value};

use crate::admission::{self, PaymentDraft};
use crate::error::AppError;
use crate::ipc::helpers::{opt_string, require_db, require_decimal, require_str, respond};
use crate::ipc::types::{AppState, Request};

fn create(state: &mut AppState, req: &Request) -> Result<Value, AppError> {
    let conn = require_db(state)?;
    let draft = PaymentDraft {
        student_id: require_str(req, "studentId")?.to_string(),
        amount: require_decimal(req, "amount")?,
        payment_date: require_str(req, "paymentDate")?.to_string(),
        payment_method: opt_string(req, "paymentMethod")?,
        notes: opt_string(req, "notes")?,
    };
    // "Future" is judged against the operator's calendar day.
    let today = Local::now().date_naive();
    let receipt = admission::admit_payment(
        conn,
        state.session.current(),
        &mut state.cache.borrow_mut(),
        &draft,
        &state.config.limits,
        today,
    )?;
    Ok(json!(receipt))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "payments.create" => Some(respond(req, create(state, req))),
        _ => None,
    }
}
