//! Shared domain types for the Registrar Ledger
//!
//! Re-exports the student identity types, academic records, payment/ledger
//! types, and the error taxonomy.

pub mod academic;
pub mod error;
pub mod payment;
pub mod student;

pub use academic::{AttendanceRecord, AttendanceStatus, GradeRecord};
pub use error::RegistrarError;
pub use payment::{
    AccountStatement, BalanceRecord, ExamPeriod, FeeBreakdown, PaymentChannel, PaymentReceipt,
    PaymentStatus, PaymentTransaction, PeriodDue,
};
pub use student::{StudentId, StudentRecord, STUDENT_ID_LEN};
