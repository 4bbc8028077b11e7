use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{self, BalanceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
}

impl StudentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    /// Anything not explicitly active is treated as inactive.
    pub fn from_stored(s: &str) -> Self {
        if s == "active" {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub student_name: String,
    pub class_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_fees: Decimal,
    pub parent_name: Option<String>,
    pub parent_contact: Option<String>,
    pub status: StudentStatus,
    pub created_by: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub student_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
}

/// A student row together with its derived fee position.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAccount {
    #[serde(flatten)]
    pub student: Student,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_paid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub balance_status: BalanceStatus,
}

impl StudentAccount {
    pub fn new(student: Student, total_paid: Decimal) -> Self {
        let balance = student.total_fees - total_paid;
        Self {
            student,
            total_paid,
            balance,
            balance_status: ledger::balance_status(balance),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetail {
    #[serde(flatten)]
    pub account: StudentAccount,
    pub payments: Vec<Payment>,
}

impl StudentDetail {
    pub fn new(student: Student, payments: Vec<Payment>) -> Self {
        let paid = ledger::total_paid(payments.iter().map(|p| p.amount));
        Self {
            account: StudentAccount::new(student, paid),
            payments,
        }
    }
}
