//! Ledger engine: balance, fee bucketing, and exam-period eligibility
//!
//! The `LedgerEngine` derives a student's [`AccountStatement`] from the fee
//! breakdown and the ordered payment history, applies new payments, and
//! promotes in-flight payment statuses through an external settlement hook.
//!
//! # Allocation model
//!
//! Fee lines tagged with an exam period are assessed against that period; an
//! untagged line is split equally across all three. Posted payments are
//! allocated in waterfall order Prelim -> Midterm -> Finals: each period's
//! due is its net assessment minus whatever payment value reaches it,
//! floored at zero, with the excess carried to the next period and finally
//! recorded as overpayment credit. The balance therefore never goes
//! negative.
//!
//! # Numeric semantics
//!
//! All accumulation is full-precision `Decimal`; two-place rounding happens
//! only when amounts are formatted for the flat files or the presentation
//! layer.

use crate::core::cache::RecordCache;
use crate::types::{
    AccountStatement, BalanceRecord, ExamPeriod, PaymentChannel, PaymentReceipt, PaymentStatus,
    PaymentTransaction, PeriodDue, RegistrarError, StudentId,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Verdict of the external settlement hook for one in-flight transaction
///
/// The ledger exposes status promotion but does not decide it: settlement
/// conditions (cashier confirmation, gateway callback, elapsed time) live
/// with the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementDecision {
    /// Advance the transaction one step toward posted
    Settle,

    /// Reject the transaction; it stays in the history for audit
    Reject,

    /// Leave the transaction untouched for now
    Defer,
}

/// Computes statements and applies payments over the record cache
pub struct LedgerEngine {
    cache: Arc<RecordCache>,
}

impl LedgerEngine {
    /// Create a ledger over a shared record cache
    pub fn new(cache: Arc<RecordCache>) -> Self {
        LedgerEngine { cache }
    }

    /// Compute the account statement for one student
    ///
    /// Loads the fee breakdown and payment history through the cache and
    /// folds them into totals, per-period dues, and overpayment credit.
    /// A student with no fee lines gets an all-zero statement.
    ///
    /// # Errors
    ///
    /// Returns an error only if an underlying table scan fails; an unknown
    /// identifier produces an empty statement, not an error.
    pub fn statement(&self, id: &StudentId) -> Result<AccountStatement, RegistrarError> {
        let fees = self.cache.fees(id)?;
        let payments = self.cache.payments(id)?;

        let mut total_assessed = Decimal::ZERO;
        let mut credits_applied = Decimal::ZERO;
        // Net assessment per period, in billing order.
        let mut buckets = [Decimal::ZERO; 3];
        let three = Decimal::from(3);

        for fee in &fees {
            if fee.amount.is_sign_negative() {
                credits_applied += -fee.amount;
            } else {
                total_assessed += fee.amount;
            }
            match fee.period {
                Some(period) => {
                    buckets[period_index(period)] += fee.amount;
                }
                None => {
                    // Untagged lines are assessed equally across periods;
                    // the division stays full-precision.
                    let share = fee.amount / three;
                    for bucket in buckets.iter_mut() {
                        *bucket += share;
                    }
                }
            }
        }

        let total_paid: Decimal = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Posted)
            .map(|p| p.amount)
            .sum();

        // Waterfall: payment value flows through the periods in order; each
        // period keeps what it needs and passes the rest along.
        let mut carry = total_paid;
        let mut period_dues = [PeriodDue {
            period: ExamPeriod::Prelim,
            assessed: Decimal::ZERO,
            due: Decimal::ZERO,
            eligible: true,
        }; 3];
        for (i, period) in ExamPeriod::ALL.into_iter().enumerate() {
            let assessed = buckets[i];
            let shortfall = assessed - carry;
            let due = if shortfall > Decimal::ZERO {
                carry = Decimal::ZERO;
                shortfall
            } else {
                carry = -shortfall;
                Decimal::ZERO
            };
            period_dues[i] = PeriodDue {
                period,
                assessed,
                due,
                eligible: due.is_zero(),
            };
        }
        let overpayment = carry;
        let balance: Decimal = period_dues.iter().map(|p| p.due).sum();

        Ok(AccountStatement {
            id: id.clone(),
            total_assessed,
            credits_applied,
            total_paid,
            balance,
            overpayment,
            period_dues,
            payment_history: payments,
        })
    }

    /// Remaining due for one exam period
    pub fn exam_period_due(
        &self,
        id: &StudentId,
        period: ExamPeriod,
    ) -> Result<Decimal, RegistrarError> {
        Ok(self.statement(id)?.period_due(period).due)
    }

    /// Apply a payment and return the receipt
    ///
    /// Validates the amount and the identifier, creates the transaction
    /// (`Posted` for the cashier channel, `InProgress` for asynchronous
    /// ones), appends it to the log, refreshes the balance table, and
    /// returns the recomputed balance figures.
    ///
    /// Each call appends a fresh transaction: duplicate detection by
    /// reference is a caller responsibility, not enforced here.
    ///
    /// # Errors
    ///
    /// * `RegistrarError::InvalidAmount` if `amount <= 0`
    /// * `RegistrarError::RecordNotFound` if no student record exists
    pub fn apply_payment(
        &self,
        id: &StudentId,
        amount: Decimal,
        channel: PaymentChannel,
        reference: &str,
        timestamp: NaiveDateTime,
    ) -> Result<PaymentReceipt, RegistrarError> {
        if amount <= Decimal::ZERO {
            return Err(RegistrarError::invalid_amount(amount, id.as_str()));
        }
        if !self.cache.contains_student(id)? {
            return Err(RegistrarError::record_not_found(id.as_str()));
        }

        let status = if channel.is_asynchronous() {
            PaymentStatus::InProgress
        } else {
            PaymentStatus::Posted
        };
        let transaction = PaymentTransaction {
            timestamp,
            channel,
            reference: reference.to_string(),
            amount,
            id: id.clone(),
            status,
        };

        self.cache.append_payment(transaction.clone())?;
        let statement = self.refresh_balance(id)?;
        log::debug!(
            "payment {} for {}: {} via {}, balance now {}",
            reference,
            id,
            amount,
            channel,
            statement.balance
        );

        Ok(PaymentReceipt {
            transaction,
            balance: statement.balance,
            overpayment: statement.overpayment,
        })
    }

    /// Walk non-terminal transactions and apply the settlement hook
    ///
    /// `Settle` advances one step along the state machine (`Pending ->
    /// InProgress`, `InProgress -> Posted`); `Reject` terminates the
    /// transaction as rejected; `Defer` leaves it untouched. Changed
    /// transactions are persisted and the balance table refreshed. Nothing
    /// is ever removed from the history.
    ///
    /// # Returns
    ///
    /// The transactions whose status changed, with their new statuses.
    pub fn update_payment_statuses(
        &self,
        id: &StudentId,
        mut confirm: impl FnMut(&PaymentTransaction) -> SettlementDecision,
    ) -> Result<Vec<PaymentTransaction>, RegistrarError> {
        let history = self.cache.payments(id)?;
        let mut changed = Vec::new();

        for payment in history.iter().filter(|p| !p.status.is_terminal()) {
            let next = match confirm(payment) {
                SettlementDecision::Defer => continue,
                SettlementDecision::Reject => PaymentStatus::Rejected,
                SettlementDecision::Settle => match payment.status {
                    PaymentStatus::Pending => PaymentStatus::InProgress,
                    _ => PaymentStatus::Posted,
                },
            };
            if !payment.status.can_transition_to(next) {
                return Err(RegistrarError::illegal_transition(
                    &payment.status.to_string(),
                    &next.to_string(),
                    &payment.reference,
                ));
            }
            self.cache.set_payment_status(id, &payment.reference, next)?;
            let mut updated = payment.clone();
            updated.status = next;
            changed.push(updated);
        }

        if !changed.is_empty() {
            self.refresh_balance(id)?;
        }
        Ok(changed)
    }

    /// Recompute the statement and rewrite the student's balance line
    fn refresh_balance(&self, id: &StudentId) -> Result<AccountStatement, RegistrarError> {
        let statement = self.statement(id)?;
        self.cache.upsert_balance(BalanceRecord {
            id: id.clone(),
            amount_due: statement.total_assessed,
            remaining_balance: statement.balance,
            paid_amount: statement.total_paid,
        })?;
        Ok(statement)
    }
}

fn period_index(period: ExamPeriod) -> usize {
    ExamPeriod::ALL
        .iter()
        .position(|p| *p == period)
        .expect("period ordering is fixed")
}
