//! Reads and writes against the `students` and `payments` tables.
//!
//! Everything here is plain row access; derived fee figures are computed by
//! [`crate::ledger`] from what these functions return.

use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger::AccountSnapshot;
use crate::model::{Payment, Student, StudentStatus};

const STUDENT_COLUMNS: &str = "id, student_name, class_name, total_fees, parent_name, \
                               parent_contact, status, created_by, created_at";
const PAYMENT_COLUMNS: &str =
    "id, student_id, amount, payment_date, payment_method, notes, created_by, created_at";

pub struct NewStudent<'a> {
    pub student_name: &'a str,
    pub class_name: &'a str,
    pub total_fees: Decimal,
    pub parent_name: Option<&'a str>,
    pub parent_contact: Option<&'a str>,
}

pub struct NewPayment<'a> {
    pub student_id: &'a str,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: Option<&'a str>,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub active_only: bool,
    pub search: Option<String>,
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let status: String = row.get(6)?;
    Ok(Student {
        id: row.get(0)?,
        student_name: row.get(1)?,
        class_name: row.get(2)?,
        total_fees: decimal_at(row, 3)?,
        parent_name: row.get(4)?,
        parent_contact: row.get(5)?,
        status: StudentStatus::from_stored(&status),
        created_by: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        student_id: row.get(1)?,
        amount: decimal_at(row, 2)?,
        payment_date: row.get(3)?,
        payment_method: row.get(4)?,
        notes: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn insert_student(
    conn: &Connection,
    new: &NewStudent<'_>,
    created_by: &str,
) -> Result<Student, AppError> {
    let student = Student {
        id: Uuid::new_v4().to_string(),
        student_name: new.student_name.to_string(),
        class_name: new.class_name.to_string(),
        total_fees: new.total_fees.normalize(),
        parent_name: new.parent_name.map(str::to_string),
        parent_contact: new.parent_contact.map(str::to_string),
        status: StudentStatus::Active,
        created_by: Some(created_by.to_string()),
        created_at: now_stamp(),
    };
    conn.execute(
        "INSERT INTO students(id, student_name, class_name, total_fees, parent_name,
                              parent_contact, status, created_by, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &student.id,
            &student.student_name,
            &student.class_name,
            student.total_fees.to_string(),
            &student.parent_name,
            &student.parent_contact,
            student.status.as_str(),
            &student.created_by,
            &student.created_at,
        ),
    )
    .map_err(AppError::insert("students"))?;
    Ok(student)
}

pub fn insert_payment(
    conn: &Connection,
    new: &NewPayment<'_>,
    created_by: &str,
) -> Result<Payment, AppError> {
    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        student_id: new.student_id.to_string(),
        amount: new.amount.normalize(),
        payment_date: new.payment_date,
        payment_method: new.payment_method.map(str::to_string),
        notes: new.notes.map(str::to_string),
        created_by: Some(created_by.to_string()),
        created_at: now_stamp(),
    };
    conn.execute(
        "INSERT INTO payments(id, student_id, amount, payment_date, payment_method,
                              notes, created_by, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &payment.id,
            &payment.student_id,
            payment.amount.to_string(),
            payment.payment_date,
            &payment.payment_method,
            &payment.notes,
            &payment.created_by,
            &payment.created_at,
        ),
    )
    .map_err(AppError::insert("payments"))?;
    Ok(payment)
}

pub fn find_student(conn: &Connection, student_id: &str) -> Result<Option<Student>, AppError> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
    let student = conn
        .query_row(&sql, [student_id], student_from_row)
        .optional()?;
    Ok(student)
}

/// Payments of one student, newest payment date first.
pub fn payments_for(conn: &Connection, student_id: &str) -> Result<Vec<Payment>, AppError> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments
         WHERE student_id = ?
         ORDER BY payment_date DESC, created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let payments = stmt
        .query_map([student_id], payment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(payments)
}

/// Sum of recorded payments per student id.
pub fn paid_by_student(conn: &Connection) -> Result<HashMap<String, Decimal>, AppError> {
    let mut stmt = conn.prepare("SELECT student_id, amount FROM payments")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, decimal_at(row, 1)?)))?;
    let mut paid: HashMap<String, Decimal> = HashMap::new();
    for row in rows {
        let (student_id, amount) = row?;
        *paid.entry(student_id).or_insert(Decimal::ZERO) += amount;
    }
    Ok(paid)
}

/// Students ordered by name. The search is a substring match on the
/// Unicode lowercase of the name; SQLite's own `LIKE` only folds ASCII.
pub fn list_students(conn: &Connection, filter: &StudentFilter) -> Result<Vec<Student>, AppError> {
    let mut sql = format!("SELECT {STUDENT_COLUMNS} FROM students");
    if filter.active_only {
        sql.push_str(" WHERE status = 'active'");
    }
    sql.push_str(" ORDER BY student_name, created_at");

    let mut stmt = conn.prepare(&sql)?;
    let students = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let needle = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    Ok(match needle {
        Some(needle) => students
            .into_iter()
            .filter(|s| s.student_name.to_lowercase().contains(&needle))
            .collect(),
        None => students,
    })
}

pub fn set_status(
    conn: &Connection,
    student_id: &str,
    status: StudentStatus,
) -> Result<Option<Student>, AppError> {
    let changed = conn.execute(
        "UPDATE students SET status = ?, updated_at = ? WHERE id = ?",
        (status.as_str(), now_stamp(), student_id),
    )?;
    if changed == 0 {
        return Ok(None);
    }
    find_student(conn, student_id)
}

/// Every student reduced to its fee position.
pub fn accounts(conn: &Connection) -> Result<Vec<AccountSnapshot>, AppError> {
    let paid = paid_by_student(conn)?;
    let students = list_students(conn, &StudentFilter::default())?;
    Ok(students
        .into_iter()
        .map(|s| AccountSnapshot {
            total_paid: paid.get(&s.id).copied().unwrap_or(Decimal::ZERO),
            active: s.status == StudentStatus::Active,
            class_name: s.class_name,
            total_fees: s.total_fees,
        })
        .collect())
}
