//! Validation and persistence of new students and payments.
//!
//! Field checks run before any database access. A payment is then checked
//! against the student's current balance, the actor is required, and only
//! then is the row written and the affected cached views evicted.

use chrono::NaiveDate;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::cache::{Mutation, QueryCache};
use crate::error::AppError;
use crate::ledger;
use crate::model::{Payment, Student, StudentStatus};
use crate::session::Session;
use crate::store::{self, NewPayment, NewStudent};

/// Upper bounds on form input.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionLimits {
    pub payment_ceiling: Decimal,
    pub fee_ceiling: Decimal,
    pub student_name_max: usize,
    pub class_name_max: usize,
    pub parent_name_max: usize,
    pub parent_contact_max: usize,
    pub payment_method_max: usize,
    pub notes_max: usize,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            payment_ceiling: Decimal::from(100_000),
            fee_ceiling: Decimal::from(1_000_000),
            student_name_max: 100,
            class_name_max: 50,
            parent_name_max: 100,
            parent_contact_max: 50,
            payment_method_max: 50,
            notes_max: 500,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaymentDraft {
    pub student_id: String,
    pub amount: Decimal,
    pub payment_date: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidPayment {
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentDraft {
    pub student_name: String,
    pub class_name: String,
    pub total_fees: Decimal,
    pub parent_name: Option<String>,
    pub parent_contact: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidStudent {
    pub student_name: String,
    pub class_name: String,
    pub total_fees: Decimal,
    pub parent_name: Option<String>,
    pub parent_contact: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment: Payment,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

/// Trims an optional field; blank becomes `None`.
fn optional_text(
    value: Option<&str>,
    max: usize,
    too_long: &str,
) -> Result<Option<String>, AppError> {
    let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if v.chars().count() > max {
        return Err(AppError::validation(too_long));
    }
    Ok(Some(v.to_string()))
}

fn required_text(value: &str, max: usize, missing: &str, too_long: &str) -> Result<String, AppError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::validation(missing));
    }
    if v.chars().count() > max {
        return Err(AppError::validation(too_long));
    }
    Ok(v.to_string())
}

pub fn validate_payment(
    draft: &PaymentDraft,
    limits: &AdmissionLimits,
    today: NaiveDate,
) -> Result<ValidPayment, AppError> {
    if draft.amount <= Decimal::ZERO {
        return Err(AppError::validation("Amount must be positive"));
    }
    if draft.amount > limits.payment_ceiling {
        return Err(AppError::validation("Amount exceeds maximum"));
    }
    let payment_date = NaiveDate::parse_from_str(draft.payment_date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation("Invalid payment date"))?;
    if payment_date > today {
        return Err(AppError::validation("Cannot use future dates"));
    }
    Ok(ValidPayment {
        amount: draft.amount,
        payment_date,
        payment_method: optional_text(
            draft.payment_method.as_deref(),
            limits.payment_method_max,
            "Payment method too long",
        )?,
        notes: optional_text(draft.notes.as_deref(), limits.notes_max, "Notes too long")?,
    })
}

/// Rejects an amount above a still-positive balance. Once a student is
/// settled (balance <= 0) any amount is accepted.
pub fn check_balance(amount: Decimal, balance: Decimal) -> Result<(), AppError> {
    if amount > balance && balance > Decimal::ZERO {
        return Err(AppError::validation("Amount exceeds remaining balance."));
    }
    Ok(())
}

pub fn validate_student(
    draft: &StudentDraft,
    limits: &AdmissionLimits,
) -> Result<ValidStudent, AppError> {
    let student_name = required_text(
        &draft.student_name,
        limits.student_name_max,
        "Student name is required",
        "Student name too long",
    )?;
    let class_name = required_text(
        &draft.class_name,
        limits.class_name_max,
        "Class name is required",
        "Class name too long",
    )?;
    if draft.total_fees <= Decimal::ZERO {
        return Err(AppError::validation("Total fees must be positive"));
    }
    if draft.total_fees > limits.fee_ceiling {
        return Err(AppError::validation("Total fees exceed maximum"));
    }
    Ok(ValidStudent {
        student_name,
        class_name,
        total_fees: draft.total_fees,
        parent_name: optional_text(
            draft.parent_name.as_deref(),
            limits.parent_name_max,
            "Parent name too long",
        )?,
        parent_contact: optional_text(
            draft.parent_contact.as_deref(),
            limits.parent_contact_max,
            "Parent contact too long",
        )?,
    })
}

/// Records a payment.
///
/// The balance read and the insert share one `IMMEDIATE` transaction, so
/// two concurrent writers against the same workspace cannot both pass the
/// balance check on the same stale figure.
pub fn admit_payment(
    conn: &Connection,
    session: Option<&Session>,
    cache: &mut QueryCache,
    draft: &PaymentDraft,
    limits: &AdmissionLimits,
    today: NaiveDate,
) -> Result<PaymentReceipt, AppError> {
    let valid = validate_payment(draft, limits, today)?;

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let student =
        store::find_student(&tx, &draft.student_id)?.ok_or(AppError::NotFound("student"))?;
    let prior = store::payments_for(&tx, &student.id)?;
    let balance = ledger::balance(student.total_fees, prior.iter().map(|p| p.amount));
    check_balance(valid.amount, balance)?;

    let actor = session.ok_or_else(|| AppError::auth("You must be signed in to record a payment."))?;

    let payment = store::insert_payment(
        &tx,
        &NewPayment {
            student_id: &student.id,
            amount: valid.amount,
            payment_date: valid.payment_date,
            payment_method: valid.payment_method.as_deref(),
            notes: valid.notes.as_deref(),
        },
        &actor.actor_id,
    )?;
    tx.commit()?;

    let balance = balance - payment.amount;
    info!(
        student = %student.id,
        payment = %payment.id,
        amount = %payment.amount,
        %balance,
        "payment recorded"
    );
    cache.invalidate(&Mutation::PaymentRecorded {
        student_id: student.id,
    });
    Ok(PaymentReceipt { payment, balance })
}

pub fn admit_student(
    conn: &Connection,
    session: Option<&Session>,
    cache: &mut QueryCache,
    draft: &StudentDraft,
    limits: &AdmissionLimits,
) -> Result<Student, AppError> {
    let valid = validate_student(draft, limits)?;
    let actor = session.ok_or_else(|| AppError::auth("You must be signed in to add a student."))?;

    let student = store::insert_student(
        conn,
        &NewStudent {
            student_name: &valid.student_name,
            class_name: &valid.class_name,
            total_fees: valid.total_fees,
            parent_name: valid.parent_name.as_deref(),
            parent_contact: valid.parent_contact.as_deref(),
        },
        &actor.actor_id,
    )?;
    info!(student = %student.id, class = %student.class_name, "student added");
    cache.invalidate(&Mutation::StudentAdded);
    Ok(student)
}

/// Soft-deactivates or reactivates a student. Students are never deleted.
pub fn set_student_status(
    conn: &Connection,
    session: Option<&Session>,
    cache: &mut QueryCache,
    student_id: &str,
    status: StudentStatus,
) -> Result<Student, AppError> {
    session.ok_or_else(|| AppError::auth("You must be signed in to update a student."))?;
    let student =
        store::set_status(conn, student_id, status)?.ok_or(AppError::NotFound("student"))?;
    info!(student = %student.id, status = status.as_str(), "student status changed");
    cache.invalidate(&Mutation::StudentStatusChanged {
        student_id: student.id.clone(),
    });
    Ok(student)
}
