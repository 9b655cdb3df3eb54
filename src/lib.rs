//! Registrar Ledger Library
//! # Overview
//!
//! This library provides the record cache and ledger engine behind a
//! student-records application: flat-file tables, a thread-safe lazily
//! initialized cache over them, and a ledger that derives balances and
//! exam-period eligibility from an append-only payment log
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (StudentRecord, PaymentTransaction, etc.)
//! - [`io`] - Flat-file persistence:
//!   - [`io::record_store`] - Append, scan, and rewrite of the CSV tables
//!   - [`io::table_format`] - Line-level parsing and formatting rules
//! - [`core`] - Business logic components:
//!   - [`core::cache`] - Lazily initialized per-table record cache
//!   - [`core::ledger`] - Balance, allocation, and eligibility computation
//!   - [`core::engine`] - The facade the presentation layer calls
//!
//! # Ledger Model
//!
//! Balances are never stored as authoritative state; they are derived:
//!
//! - **Fees** are assessed charges, optionally tagged to an exam period;
//!   untagged fees split equally across the three periods
//! - **Payments** are append-only; only `posted` payments count toward
//!   the balance, and they allocate to periods in chronological order
//!   (prelim first, then midterm, then finals)
//! - **Credits** (negative fee lines) reduce the assessed total
//! - **Overpayment** beyond the assessed total is reported, never lost
//!
//! # Payment Lifecycle
//!
//! Each transaction carries a status: `pending` -> `in-progress` ->
//! `posted`, with `rejected` reachable from either non-terminal state.
//! Cashier payments post immediately; asynchronous channels (bank
//! deposit, online) enter the ledger in-flight and settle later.

// Module declarations
pub mod core;
pub mod io;
pub mod types;

pub use crate::core::{LedgerEngine, RecordCache, RegistrarEngine, SettlementDecision};
pub use io::{RecordStore, TableKind};
pub use types::{
    AccountStatement, AttendanceRecord, AttendanceStatus, BalanceRecord, ExamPeriod, FeeBreakdown,
    GradeRecord, PaymentChannel, PaymentReceipt, PaymentStatus, PaymentTransaction, PeriodDue,
    RegistrarError, StudentId, StudentRecord,
};
