//! Payment and ledger types for the Registrar Ledger
//!
//! This module defines the payment transaction with its settlement state
//! machine, the fee-breakdown line, the ordered exam periods, and the
//! derived account statement the ledger engine computes.

use crate::types::StudentId;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Payment channel a transaction arrived through
///
/// The cashier window settles immediately; bank and online channels settle
/// asynchronously and enter the history as in-progress until confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentChannel {
    /// Over-the-counter cashier payment, settles immediately
    Cashier,

    /// Bank deposit slip, settles once the cashier confirms the deposit
    BankDeposit,

    /// Online payment gateway, settles on gateway callback
    Online,
}

impl PaymentChannel {
    /// Whether payments through this channel settle asynchronously
    ///
    /// Asynchronous channels create transactions with
    /// [`PaymentStatus::InProgress`]; the cashier channel posts immediately.
    pub fn is_asynchronous(&self) -> bool {
        !matches!(self, PaymentChannel::Cashier)
    }
}

impl FromStr for PaymentChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cashier" => Ok(PaymentChannel::Cashier),
            "bank deposit" | "bank" => Ok(PaymentChannel::BankDeposit),
            "online" => Ok(PaymentChannel::Online),
            other => Err(format!("Invalid payment channel '{}'", other)),
        }
    }
}

impl fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentChannel::Cashier => "Cashier",
            PaymentChannel::BankDeposit => "Bank Deposit",
            PaymentChannel::Online => "Online",
        };
        f.write_str(name)
    }
}

/// Settlement state of a payment transaction
///
/// State machine: `Pending -> InProgress -> Posted` (terminal) or
/// `Pending -> Rejected` (terminal). No transition ever removes a
/// transaction from the history; rejected transactions remain visible for
/// audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Recorded but not yet handed to the channel
    Pending,

    /// Handed to an asynchronous channel, awaiting confirmation
    InProgress,

    /// Settled; counts toward the running balance (terminal)
    Posted,

    /// Refused by the channel or cashier; kept for audit (terminal)
    Rejected,
}

impl PaymentStatus {
    /// Whether this status is terminal (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Posted | PaymentStatus::Rejected)
    }

    /// Whether a transition from `self` to `next` is legal
    ///
    /// Legal transitions: `Pending -> InProgress`, `Pending -> Rejected`,
    /// `InProgress -> Posted`, `InProgress -> Rejected`.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::InProgress)
                | (PaymentStatus::Pending, PaymentStatus::Rejected)
                | (PaymentStatus::InProgress, PaymentStatus::Posted)
                | (PaymentStatus::InProgress, PaymentStatus::Rejected)
        )
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "in-progress" | "in progress" => Ok(PaymentStatus::InProgress),
            "posted" => Ok(PaymentStatus::Posted),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(format!("Invalid payment status '{}'", other)),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::InProgress => "in-progress",
            PaymentStatus::Posted => "posted",
            PaymentStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// One payment transaction in the append-only payment log
///
/// Transactions are never deleted or reordered; only the `status` field
/// advances along the settlement state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTransaction {
    /// When the payment was recorded
    pub timestamp: NaiveDateTime,

    /// Channel the payment arrived through
    pub channel: PaymentChannel,

    /// Channel-assigned reference string
    ///
    /// Opaque to the core. Duplicate detection by reference is a caller
    /// responsibility; each `apply_payment` call appends a fresh entry.
    pub reference: String,

    /// Payment amount, always positive
    pub amount: Decimal,

    /// Owning student
    pub id: StudentId,

    /// Settlement status
    pub status: PaymentStatus,
}

/// Exam period, the billing and eligibility checkpoint
///
/// Periods are ordered: assessments and payments are allocated in
/// `Prelim -> Midterm -> Finals` order, with excess carried forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExamPeriod {
    Prelim,
    Midterm,
    Finals,
}

impl ExamPeriod {
    /// All periods in billing order
    pub const ALL: [ExamPeriod; 3] = [ExamPeriod::Prelim, ExamPeriod::Midterm, ExamPeriod::Finals];
}

impl FromStr for ExamPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prelim" => Ok(ExamPeriod::Prelim),
            "midterm" => Ok(ExamPeriod::Midterm),
            "finals" => Ok(ExamPeriod::Finals),
            other => Err(format!("Invalid exam period '{}'", other)),
        }
    }
}

impl fmt::Display for ExamPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExamPeriod::Prelim => "PRELIM",
            ExamPeriod::Midterm => "MIDTERM",
            ExamPeriod::Finals => "FINALS",
        };
        f.write_str(name)
    }
}

/// One fee-breakdown line
///
/// Charges carry positive amounts; payments and credits already reflected
/// in the breakdown carry negative amounts (parenthesized on disk). A line
/// without an explicit period is assessed equally across all three periods.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeBreakdown {
    /// Owning student
    pub id: StudentId,

    /// Posting date string, stored verbatim
    pub date_posted: String,

    /// Human-readable description of the charge or credit
    pub description: String,

    /// Signed amount: charges positive, credits negative
    pub amount: Decimal,

    /// Exam period the line is assessed against, if tagged
    pub period: Option<ExamPeriod>,

    /// Sequence number assigned in load order, for stable display ordering
    pub sequence: usize,
}

/// Per-period view inside an [`AccountStatement`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodDue {
    /// The exam period
    pub period: ExamPeriod,

    /// Amount assessed against this period
    pub assessed: Decimal,

    /// Remaining amount due, floored at zero
    pub due: Decimal,

    /// Whether the student is cleared for this period's exam (`due == 0`)
    pub eligible: bool,
}

/// Derived account statement for one student
///
/// Computed, never stored: rebuilt from the fee breakdown and the payment
/// history on each ledger read after a mutation.
///
/// Invariant: `balance == total_assessed - posted_payments - credits_applied`,
/// floored at zero; the excess is recorded as `overpayment`, so the balance
/// never goes negative.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountStatement {
    /// The student this statement describes
    pub id: StudentId,

    /// Sum of all positive fee-breakdown lines
    pub total_assessed: Decimal,

    /// Sum of negative fee-breakdown lines, as a positive credit figure
    pub credits_applied: Decimal,

    /// Sum of posted payment transactions
    pub total_paid: Decimal,

    /// Remaining balance, never negative
    pub balance: Decimal,

    /// Credit carried once payments exceed the assessment
    pub overpayment: Decimal,

    /// Per-period due amounts in billing order
    pub period_dues: [PeriodDue; 3],

    /// Full payment history in chronological (load) order
    pub payment_history: Vec<PaymentTransaction>,
}

impl AccountStatement {
    /// The due entry for one exam period
    pub fn period_due(&self, period: ExamPeriod) -> &PeriodDue {
        // ALL and period_dues share the same billing order
        &self.period_dues[ExamPeriod::ALL
            .iter()
            .position(|p| *p == period)
            .expect("period ordering is fixed")]
    }
}

/// One line of the balance table, positional CSV read by index
///
/// The balance table is a denormalized running summary kept alongside the
/// payment log so other tooling can read the balance without replaying the
/// history. The ledger rewrites the owning student's line after each
/// payment.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRecord {
    /// Owning student
    pub id: StudentId,

    /// Total assessed amount
    pub amount_due: Decimal,

    /// Remaining balance after posted payments
    pub remaining_balance: Decimal,

    /// Sum of posted payments
    pub paid_amount: Decimal,
}

/// Result of a successful payment application
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    /// The transaction that was created and appended
    pub transaction: PaymentTransaction,

    /// Balance after the payment
    pub balance: Decimal,

    /// Overpayment credit after the payment
    pub overpayment: Decimal,
}
