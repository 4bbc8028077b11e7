use serde_json::{json, Value};

use crate::admission::{self, StudentDraft};
use crate::cache::QueryKey;
use crate::error::AppError;
use crate::ipc::helpers::{opt_string, require_db, require_decimal, require_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::{StudentAccount, StudentDetail, StudentStatus};
use crate::store::{self, StudentFilter};

fn list(state: &mut AppState, req: &Request) -> Result<Value, AppError> {
    let conn = require_db(state)?;
    state.session.require("You must be signed in to view students.")?;
    let search = opt_string(req, "search")?
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let key = QueryKey::StudentList {
        search: search.clone(),
    };
    state.cache.borrow_mut().get_or_load(key, || {
        let filter = StudentFilter {
            active_only: true,
            search: Some(search).filter(|s| !s.is_empty()),
        };
        let students = store::list_students(conn, &filter)?;
        let mut paid = store::paid_by_student(conn)?;
        let accounts: Vec<StudentAccount> = students
            .into_iter()
            .map(|s| {
                let total_paid = paid.remove(&s.id).unwrap_or_default();
                StudentAccount::new(s, total_paid)
            })
            .collect();
        Ok(json!({ "students": accounts }))
    })
}

fn get(state: &mut AppState, req: &Request) -> Result<Value, AppError> {
    let conn = require_db(state)?;
    state.session.require("You must be signed in to view students.")?;
    let student_id = require_str(req, "studentId")?.to_string();

    let key = QueryKey::StudentDetail {
        student_id: student_id.clone(),
    };
    state.cache.borrow_mut().get_or_load(key, || {
        let student =
            store::find_student(conn, &student_id)?.ok_or(AppError::NotFound("student"))?;
        let payments = store::payments_for(conn, &student.id)?;
        Ok(json!({ "student": StudentDetail::new(student, payments) }))
    })
}

fn create(state: &mut AppState, req: &Request) -> Result<Value, AppError> {
    let conn = require_db(state)?;
    let draft = StudentDraft {
        student_name: require_str(req, "studentName")?.to_string(),
        class_name: require_str(req, "className")?.to_string(),
        total_fees: require_decimal(req, "totalFees")?,
        parent_name: opt_string(req, "parentName")?,
        parent_contact: opt_string(req, "parentContact")?,
    };
    let student = admission::admit_student(
        conn,
        state.session.current(),
        &mut state.cache.borrow_mut(),
        &draft,
        &state.config.limits,
    )?;
    Ok(json!({ "student": student }))
}

fn set_status(state: &mut AppState, req: &Request) -> Result<Value, AppError> {
    let conn = require_db(state)?;
    let student_id = require_str(req, "studentId")?;
    let raw = require_str(req, "status")?;
    let status = StudentStatus::parse(raw)
        .ok_or_else(|| AppError::bad_params(format!("unknown status: {raw}")))?;
    let student = admission::set_student_status(
        conn,
        state.session.current(),
        &mut state.cache.borrow_mut(),
        student_id,
        status,
    )?;
    Ok(json!({ "student": student }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => list(state, req),
        "students.get" => get(state, req),
        "students.create" => create(state, req),
        "students.setStatus" => set_status(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
