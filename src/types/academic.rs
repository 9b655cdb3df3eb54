//! Academic record types for the Registrar Ledger
//!
//! Attendance and grade records are append-only facts keyed by student
//! identifier. Attendance is immutable once created except for the remark
//! field; grade slots distinguish "unset" from zero.

use crate::types::StudentId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Attendance status, a small closed set
///
/// Parsing is case-insensitive; `Display` renders the canonical form used
/// in the attendance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(format!("Invalid attendance status '{}'", other)),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Excused => "Excused",
        };
        f.write_str(name)
    }
}

/// One attendance entry for one subject meeting
///
/// Immutable once created except for `remark`, which the owning student may
/// edit through [`crate::core::RegistrarEngine::update_remark`].
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    /// Owning student
    pub id: StudentId,

    /// Subject code (e.g. "CS101")
    pub subject_code: String,

    /// Subject display name
    pub subject_name: String,

    /// Meeting date; `MM/dd/yyyy` on disk
    pub date: NaiveDate,

    /// Attendance status for the meeting
    pub status: AttendanceStatus,

    /// Free-text remark, the only mutable field
    pub remark: Option<String>,
}

/// One grade line for one subject in one semester
///
/// The four numeric slots are `Option<Decimal>`: an empty field in the grade
/// table means the grade has not been encoded yet, which is a valid state
/// distinct from a grade of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    /// Owning student
    pub id: StudentId,

    /// Subject code
    pub subject_code: String,

    /// Subject display name
    pub subject_name: String,

    /// Preliminary-period grade, if encoded
    pub prelim: Option<Decimal>,

    /// Midterm-period grade, if encoded
    pub midterm: Option<Decimal>,

    /// Tentative final grade, if encoded
    pub tentative_final: Option<Decimal>,

    /// Final grade, if encoded
    pub final_grade: Option<Decimal>,

    /// Semester label (e.g. "1st Sem 2025-2026"), stored verbatim
    pub semester: String,

    /// Subject status string (e.g. "PASSED", "INC"), stored verbatim
    pub status: String,
}
