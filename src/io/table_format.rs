//! Flat-file table format handling
//!
//! This module centralizes the line-level format of every record table,
//! providing:
//! - Header/blank-line detection
//! - Per-table parse functions from `csv::StringRecord` to domain types
//! - Per-table field formatting for the append and rewrite paths
//! - Amount parsing/formatting (two-place rendering, parenthesized negatives)
//!
//! All functions are pure (no I/O) for easy testing. Parsing is permissive
//! about *presence* (optional trailing fields may be missing) but strict
//! about *content*: a field that fails its type conversion makes the whole
//! line an error, which the store then skips and logs.

use crate::types::{
    AttendanceRecord, AttendanceStatus, BalanceRecord, ExamPeriod, FeeBreakdown, GradeRecord,
    PaymentChannel, PaymentStatus, PaymentTransaction, RegistrarError, StudentId, StudentRecord,
};
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use rust_decimal::Decimal;
use std::str::FromStr;

/// On-disk date format for attendance and fee lines
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// On-disk timestamp format for the payment log
pub const DATETIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// First-field values that mark a header line (compared case-insensitively)
const HEADER_MARKERS: &[&str] = &["id", "student id", "studentid", "datetime", "date"];

/// Whether a record is a blank line or a header line to be skipped
///
/// A record is skippable if every field is empty, or if its first field
/// matches one of the known header markers.
pub fn is_header_or_blank(record: &StringRecord) -> bool {
    if record.iter().all(|field| field.trim().is_empty()) {
        return true;
    }
    match record.get(0) {
        Some(first) => {
            let first = first.trim().to_lowercase();
            HEADER_MARKERS.contains(&first.as_str())
        }
        None => true,
    }
}

/// Parse a formatted currency amount
///
/// Accepts plain decimals, thousands separators, and accountant-style
/// parenthesized negatives: `6,830.00` and `(250.00)` both parse.
///
/// # Arguments
///
/// * `raw` - The formatted amount string
///
/// # Returns
///
/// * `Ok(Decimal)` - The parsed amount, negative if parenthesized
/// * `Err(String)` - Description of the parse failure
pub fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    let (body, negate) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (&trimmed[1..trimmed.len() - 1], true)
    } else {
        (trimmed, false)
    };
    let cleaned: String = body.chars().filter(|c| *c != ',').collect();
    let value = Decimal::from_str(cleaned.trim())
        .map_err(|_| format!("Invalid amount '{}'", raw.trim()))?;
    Ok(if negate { -value } else { value })
}

/// Format an amount with two decimal places
///
/// Negative amounts render parenthesized, matching the fee-breakdown
/// convention for credits. Rounding to two places happens here and only
/// here; internal arithmetic stays full-precision.
pub fn format_amount(amount: Decimal) -> String {
    if amount.is_sign_negative() {
        format!("({:.2})", -amount)
    } else {
        format!("{:.2}", amount)
    }
}

/// Field value at `index`, trimmed, or a parse error naming the field
fn field<'r>(
    record: &'r StringRecord,
    index: usize,
    name: &str,
    line: Option<u64>,
) -> Result<&'r str, RegistrarError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| RegistrarError::parse_error(line, format!("Missing field '{}'", name)))
}

/// Optional trailing field: present and non-empty, or `None`
fn optional_field(record: &StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse one student-table line
///
/// Format: `id,lastName,firstName,middleName,dob,password[|profileBlob]`.
/// The optional profile blob rides after a `|` inside the final field and is
/// carried verbatim.
pub fn parse_student(record: &StringRecord, line: Option<u64>) -> Result<StudentRecord, RegistrarError> {
    let id = StudentId::parse(field(record, 0, "id", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e.to_string()))?;
    let last_name = field(record, 1, "lastName", line)?.to_string();
    let first_name = field(record, 2, "firstName", line)?.to_string();
    let middle_name = field(record, 3, "middleName", line)?.to_string();
    let date_of_birth = field(record, 4, "dob", line)?.to_string();
    let credential = field(record, 5, "password", line)?;

    let (password, profile) = match credential.split_once('|') {
        Some((pw, blob)) => (pw.to_string(), Some(blob.to_string())),
        None => (credential.to_string(), None),
    };
    if password.is_empty() {
        return Err(RegistrarError::parse_error(line, "Empty password field"));
    }

    Ok(StudentRecord {
        id,
        last_name,
        first_name,
        middle_name,
        date_of_birth,
        password,
        profile,
    })
}

/// Format a student record back into its table fields
pub fn format_student(student: &StudentRecord) -> Vec<String> {
    let credential = match &student.profile {
        Some(blob) => format!("{}|{}", student.password, blob),
        None => student.password.clone(),
    };
    vec![
        student.id.to_string(),
        student.last_name.clone(),
        student.first_name.clone(),
        student.middle_name.clone(),
        student.date_of_birth.clone(),
        credential,
    ]
}

/// Parse one attendance-table line
///
/// Format: `id,subjectCode,subjectName,MM/dd/yyyy,status[,remark]`.
pub fn parse_attendance(
    record: &StringRecord,
    line: Option<u64>,
) -> Result<AttendanceRecord, RegistrarError> {
    let id = StudentId::parse(field(record, 0, "id", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e.to_string()))?;
    let subject_code = field(record, 1, "subjectCode", line)?.to_string();
    let subject_name = field(record, 2, "subjectName", line)?.to_string();
    let raw_date = field(record, 3, "date", line)?;
    let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
        .map_err(|_| RegistrarError::parse_error(line, format!("Invalid date '{}'", raw_date)))?;
    let status: AttendanceStatus = field(record, 4, "status", line)?
        .parse()
        .map_err(|e: String| RegistrarError::parse_error(line, e))?;
    let remark = optional_field(record, 5);

    Ok(AttendanceRecord {
        id,
        subject_code,
        subject_name,
        date,
        status,
        remark,
    })
}

/// Format an attendance record back into its table fields
pub fn format_attendance(attendance: &AttendanceRecord) -> Vec<String> {
    let mut fields = vec![
        attendance.id.to_string(),
        attendance.subject_code.clone(),
        attendance.subject_name.clone(),
        attendance.date.format(DATE_FORMAT).to_string(),
        attendance.status.to_string(),
    ];
    if let Some(remark) = &attendance.remark {
        fields.push(remark.clone());
    }
    fields
}

/// Parse an optional numeric grade field: empty means "not yet encoded"
fn parse_grade_slot(
    record: &StringRecord,
    index: usize,
    name: &str,
    line: Option<u64>,
) -> Result<Option<Decimal>, RegistrarError> {
    let raw = field(record, index, name, line)?;
    if raw.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(raw)
        .map(Some)
        .map_err(|_| RegistrarError::parse_error(line, format!("Invalid {} grade '{}'", name, raw)))
}

/// Parse one grade-table line
///
/// Format: `id,code,name,prelim,midterm,tentativeFinal,final,semester,status`.
/// Empty numeric fields are unset grades, a valid state distinct from zero.
pub fn parse_grade(record: &StringRecord, line: Option<u64>) -> Result<GradeRecord, RegistrarError> {
    let id = StudentId::parse(field(record, 0, "id", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e.to_string()))?;

    Ok(GradeRecord {
        id,
        subject_code: field(record, 1, "subjectCode", line)?.to_string(),
        subject_name: field(record, 2, "subjectName", line)?.to_string(),
        prelim: parse_grade_slot(record, 3, "prelim", line)?,
        midterm: parse_grade_slot(record, 4, "midterm", line)?,
        tentative_final: parse_grade_slot(record, 5, "tentativeFinal", line)?,
        final_grade: parse_grade_slot(record, 6, "final", line)?,
        semester: field(record, 7, "semester", line)?.to_string(),
        status: field(record, 8, "status", line)?.to_string(),
    })
}

/// Parse one payment-log line
///
/// Format: `dateTime,channel,reference,formattedAmount,id[,status]`. The
/// historical five-field form carries no status; it reads as `posted` so
/// files written by earlier tooling stay byte-compatible.
pub fn parse_payment(
    record: &StringRecord,
    line: Option<u64>,
) -> Result<PaymentTransaction, RegistrarError> {
    let raw_ts = field(record, 0, "dateTime", line)?;
    let timestamp = NaiveDateTime::parse_from_str(raw_ts, DATETIME_FORMAT).map_err(|_| {
        RegistrarError::parse_error(line, format!("Invalid timestamp '{}'", raw_ts))
    })?;
    let channel: PaymentChannel = field(record, 1, "channel", line)?
        .parse()
        .map_err(|e: String| RegistrarError::parse_error(line, e))?;
    let reference = field(record, 2, "reference", line)?.to_string();
    let amount = parse_amount(field(record, 3, "amount", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e))?;
    let id = StudentId::parse(field(record, 4, "id", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e.to_string()))?;
    let status = match optional_field(record, 5) {
        Some(raw) => raw
            .parse()
            .map_err(|e: String| RegistrarError::parse_error(line, e))?,
        None => PaymentStatus::Posted,
    };

    Ok(PaymentTransaction {
        timestamp,
        channel,
        reference,
        amount,
        id,
        status,
    })
}

/// Format a payment transaction back into its log fields
pub fn format_payment(payment: &PaymentTransaction) -> Vec<String> {
    vec![
        payment.timestamp.format(DATETIME_FORMAT).to_string(),
        payment.channel.to_string(),
        payment.reference.clone(),
        format_amount(payment.amount),
        payment.id.to_string(),
        payment.status.to_string(),
    ]
}

/// Parse one fee-table line
///
/// Format: `id,datePosted,description,amount[,period]`. A blank period means
/// the charge is assessed equally across all three exam periods. The
/// sequence number is assigned by the store in load order.
pub fn parse_fee(
    record: &StringRecord,
    line: Option<u64>,
    sequence: usize,
) -> Result<FeeBreakdown, RegistrarError> {
    let id = StudentId::parse(field(record, 0, "id", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e.to_string()))?;
    let date_posted = field(record, 1, "datePosted", line)?.to_string();
    let description = field(record, 2, "description", line)?.to_string();
    let amount = parse_amount(field(record, 3, "amount", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e))?;
    let period = match optional_field(record, 4) {
        Some(raw) => Some(
            raw.parse::<ExamPeriod>()
                .map_err(|e| RegistrarError::parse_error(line, e))?,
        ),
        None => None,
    };

    Ok(FeeBreakdown {
        id,
        date_posted,
        description,
        amount,
        period,
        sequence,
    })
}

/// Parse one balance-table line
///
/// Positional CSV read by index: `id,amountDue,remainingBalance,paidAmount`.
/// Trailing columns beyond the fourth are ignored.
pub fn parse_balance(
    record: &StringRecord,
    line: Option<u64>,
) -> Result<BalanceRecord, RegistrarError> {
    let id = StudentId::parse(field(record, 0, "id", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e.to_string()))?;
    let amount_due = parse_amount(field(record, 1, "amountDue", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e))?;
    let remaining_balance = parse_amount(field(record, 2, "remainingBalance", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e))?;
    let paid_amount = parse_amount(field(record, 3, "paidAmount", line)?)
        .map_err(|e| RegistrarError::parse_error(line, e))?;

    Ok(BalanceRecord {
        id,
        amount_due,
        remaining_balance,
        paid_amount,
    })
}

/// Format a balance record back into its table fields
pub fn format_balance(balance: &BalanceRecord) -> Vec<String> {
    vec![
        balance.id.to_string(),
        format_amount(balance.amount_due),
        format_amount(balance.remaining_balance),
        format_amount(balance.paid_amount),
    ]
}
