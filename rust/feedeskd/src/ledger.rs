use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Balances strictly below this (and above zero) are shown as "Almost Paid".
pub const ALMOST_PAID_BELOW: Decimal = Decimal::ONE_HUNDRED;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

pub fn total_paid<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().fold(Decimal::ZERO, |sum, a| sum + a)
}

/// Outstanding fee amount. Negative when the student has overpaid.
pub fn balance<I>(total_fees: Decimal, amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    total_fees - total_paid(amounts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BalanceStatus {
    Paid,
    AlmostPaid,
    Pending,
}

impl BalanceStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Paid => "Paid",
            Self::AlmostPaid => "Almost Paid",
            Self::Pending => "Pending",
        }
    }
}

pub fn balance_status(balance: Decimal) -> BalanceStatus {
    if balance <= Decimal::ZERO {
        BalanceStatus::Paid
    } else if balance < ALMOST_PAID_BELOW {
        BalanceStatus::AlmostPaid
    } else {
        BalanceStatus::Pending
    }
}

/// `100 * paid / fees`, or 0 when there are no fees to collect. Not clamped.
pub fn collection_percent(paid: Decimal, fees: Decimal) -> Decimal {
    if fees.is_zero() {
        return Decimal::ZERO;
    }
    HUNDRED * paid / fees
}

/// Percentage as shown on the dashboard: clamped to [0, 100], one decimal.
pub fn display_percent(percent: Decimal) -> Decimal {
    percent.clamp(Decimal::ZERO, HUNDRED).round_dp(1)
}

/// One student's fee position, already reduced from its payment rows.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub class_name: String,
    pub total_fees: Decimal,
    pub total_paid: Decimal,
    pub active: bool,
}

impl AccountSnapshot {
    pub fn balance(&self) -> Decimal {
        self.total_fees - self.total_paid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummaryRow {
    pub class_name: String,
    pub student_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_fees: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_paid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub collection_percent: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub collection_percent_display: Decimal,
}

/// Per-class totals over the active students, ordered by class label
/// (plain string order, so "Grade 10" sorts before "Grade 2").
pub fn class_summary<'a, I>(accounts: I) -> Vec<ClassSummaryRow>
where
    I: IntoIterator<Item = &'a AccountSnapshot>,
{
    let mut by_class: BTreeMap<&str, (usize, Decimal, Decimal)> = BTreeMap::new();
    for account in accounts.into_iter().filter(|a| a.active) {
        let entry = by_class
            .entry(account.class_name.as_str())
            .or_insert((0, Decimal::ZERO, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += account.total_fees;
        entry.2 += account.total_paid;
    }

    by_class
        .into_iter()
        .map(|(class_name, (student_count, total_fees, total_paid))| {
            let percent = collection_percent(total_paid, total_fees);
            ClassSummaryRow {
                class_name: class_name.to_string(),
                student_count,
                total_fees,
                total_paid,
                balance: total_fees - total_paid,
                collection_percent: percent,
                collection_percent_display: display_percent(percent),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: usize,
    pub active_students: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_fees: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_paid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_pending: Decimal,
    pub pending_count: usize,
}

/// Headline figures across every student, active or not.
pub fn dashboard_stats(accounts: &[AccountSnapshot]) -> DashboardStats {
    let total_fees = accounts.iter().map(|a| a.total_fees).sum::<Decimal>();
    let total_paid = accounts.iter().map(|a| a.total_paid).sum::<Decimal>();
    DashboardStats {
        total_students: accounts.len(),
        active_students: accounts.iter().filter(|a| a.active).count(),
        total_fees,
        total_paid,
        total_pending: total_fees - total_paid,
        pending_count: accounts
            .iter()
            .filter(|a| a.balance() > Decimal::ZERO)
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn account(class: &str, fees: i64, paid: i64, active: bool) -> AccountSnapshot {
        AccountSnapshot {
            class_name: class.to_string(),
            total_fees: d(fees),
            total_paid: d(paid),
            active,
        }
    }

    #[test]
    fn balance_is_zero_when_fully_paid() {
        assert_eq!(balance(d(500), [d(200), d(300)]), Decimal::ZERO);
        assert_eq!(balance(d(500), [d(200)]), d(300));
        assert_eq!(balance(d(500), [d(600)]), d(-100));
        assert_eq!(balance(d(500), Vec::new()), d(500));
    }

    #[test]
    fn balance_status_thresholds() {
        assert_eq!(balance_status(d(-5)), BalanceStatus::Paid);
        assert_eq!(balance_status(Decimal::ZERO), BalanceStatus::Paid);
        assert_eq!(balance_status(d(99)), BalanceStatus::AlmostPaid);
        assert_eq!(balance_status(d(100)), BalanceStatus::Pending);
        assert_eq!(BalanceStatus::AlmostPaid.label(), "Almost Paid");
    }

    #[test]
    fn collection_percent_guards_zero_fees_and_is_not_clamped() {
        assert_eq!(collection_percent(d(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(collection_percent(d(50), d(200)), d(25));
        assert_eq!(collection_percent(d(300), d(200)), d(150));
        assert_eq!(display_percent(d(150)), d(100));
    }

    #[test]
    fn class_summary_skips_inactive_students() {
        let rows = class_summary(&[
            account("Grade 5A", 100, 50, true),
            account("Grade 5A", 100, 100, true),
            account("Grade 5A", 1000, 0, false),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].student_count, 2);
        assert_eq!(rows[0].total_fees, d(200));
        assert_eq!(rows[0].total_paid, d(150));
        assert_eq!(rows[0].balance, d(50));
        assert_eq!(rows[0].collection_percent, d(75));
    }

    #[test]
    fn dashboard_stats_counts_pending_over_all_students() {
        let stats = dashboard_stats(&[
            account("A", 100, 100, true),
            account("A", 100, 40, true),
            account("B", 300, 0, false),
        ]);
        assert_eq!(stats.total_students, 3);
        assert_eq!(stats.active_students, 2);
        assert_eq!(stats.total_fees, d(500));
        assert_eq!(stats.total_paid, d(140));
        assert_eq!(stats.total_pending, d(360));
        assert_eq!(stats.pending_count, 2);
    }
}
