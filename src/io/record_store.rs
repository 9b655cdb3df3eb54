//! Flat-file record store
//!
//! The `RecordStore` locates the backing table file for each entity type,
//! scans it into typed records, and performs the two kinds of writes the
//! system needs: single-line appends (payment log, new account) and
//! whole-file rewrites with one line transformed (password/profile update,
//! balance refresh, payment-status promotion).
//!
//! # Parsing discipline
//!
//! Scans are permissive: a line that fails field-count or type validation is
//! counted, logged at `warn`, and skipped; one malformed record never
//! aborts loading of the remaining table. A missing table file reads as an
//! empty table, not an error. Load order is preserved, which matters for
//! payment-history chronology.
//!
//! # Durability
//!
//! Writes are synchronous with no atomic-rename step; a crash mid-rewrite
//! can truncate the file. This is an accepted risk for the single-process
//! consumer this store serves.

use crate::io::table_format::{
    self, is_header_or_blank, parse_attendance, parse_balance, parse_fee, parse_grade,
    parse_payment, parse_student,
};
use crate::types::{
    AttendanceRecord, BalanceRecord, FeeBreakdown, GradeRecord, PaymentStatus, PaymentTransaction,
    RegistrarError, StudentId, StudentRecord,
};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// How many parent directories the data-directory search may climb
const MAX_UPWARD_HOPS: usize = 3;

/// The entity tables the store knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Students,
    Attendance,
    Grades,
    Payments,
    Fees,
    Balances,
}

impl TableKind {
    /// All tables, in a fixed order used for counters and invalidation
    pub const ALL: [TableKind; 6] = [
        TableKind::Students,
        TableKind::Attendance,
        TableKind::Grades,
        TableKind::Payments,
        TableKind::Fees,
        TableKind::Balances,
    ];

    /// On-disk file name of the table
    pub fn file_name(&self) -> &'static str {
        match self {
            TableKind::Students => "students.csv",
            TableKind::Attendance => "attendance.csv",
            TableKind::Grades => "grades.csv",
            TableKind::Payments => "payments.csv",
            TableKind::Fees => "fees.csv",
            TableKind::Balances => "balances.csv",
        }
    }

    /// Header line written when the table file is created
    fn header(&self) -> &'static [&'static str] {
        match self {
            TableKind::Students => &["id", "lastName", "firstName", "middleName", "dob", "password"],
            TableKind::Attendance => &["id", "subjectCode", "subjectName", "date", "status", "remark"],
            TableKind::Grades => &[
                "id", "subjectCode", "subjectName", "prelim", "midterm", "tentativeFinal",
                "final", "semester", "status",
            ],
            TableKind::Payments => &["dateTime", "channel", "reference", "amount", "id", "status"],
            TableKind::Fees => &["id", "datePosted", "description", "amount", "period"],
            TableKind::Balances => &["id", "amountDue", "remainingBalance", "paidAmount"],
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Flat-file record store rooted at a resolved data directory
///
/// Thread-compatible: all methods take `&self`; callers that need mutation
/// ordering (store write paired with a cache update) serialize through the
/// cache's critical section.
#[derive(Debug)]
pub struct RecordStore {
    data_dir: PathBuf,
    scan_counts: [AtomicU64; 6],
}

impl RecordStore {
    /// Open a store, resolving the data directory
    ///
    /// The given path is used if it contains any known table file; otherwise
    /// up to three parent directories are searched. If no directory holds a
    /// table, the given path itself is used when it exists (a fresh install
    /// has no tables yet; every table reads as empty until first write).
    ///
    /// # Arguments
    ///
    /// * `start` - The working directory to resolve from
    ///
    /// # Errors
    ///
    /// Returns `RegistrarError::DataDirNotFound` if neither the given path
    /// nor any searched parent exists as a directory holding table files.
    pub fn open(start: &Path) -> Result<Self, RegistrarError> {
        let data_dir = Self::resolve_data_dir(start)?;
        log::debug!("record store rooted at {}", data_dir.display());
        Ok(RecordStore {
            data_dir,
            scan_counts: Default::default(),
        })
    }

    fn resolve_data_dir(start: &Path) -> Result<PathBuf, RegistrarError> {
        let mut candidate = Some(start);
        for _ in 0..=MAX_UPWARD_HOPS {
            match candidate {
                Some(dir) => {
                    if TableKind::ALL.iter().any(|t| dir.join(t.file_name()).is_file()) {
                        return Ok(dir.to_path_buf());
                    }
                    candidate = dir.parent();
                }
                None => break,
            }
        }
        if start.is_dir() {
            return Ok(start.to_path_buf());
        }
        Err(RegistrarError::DataDirNotFound {
            start: start.display().to_string(),
        })
    }

    /// The resolved data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Full path of one table file
    pub fn table_path(&self, kind: TableKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    /// Number of completed file scans for one table
    ///
    /// Lazy initialization should trigger exactly one scan per table; this
    /// probe lets tests verify that.
    pub fn scan_count(&self, kind: TableKind) -> u64 {
        self.scan_counts[kind.index()].load(Ordering::SeqCst)
    }

    /// Scan one table, applying `parse` to each non-header, non-blank line
    ///
    /// Malformed lines are logged and skipped. A missing file yields an
    /// empty vector. Record order follows file order.
    fn load_table<T>(
        &self,
        kind: TableKind,
        mut parse: impl FnMut(&StringRecord, Option<u64>) -> Result<T, RegistrarError>,
    ) -> Result<Vec<T>, RegistrarError> {
        let path = self.table_path(kind);
        self.scan_counts[kind.index()].fetch_add(1, Ordering::SeqCst);

        if !path.is_file() {
            log::debug!("{} absent, treating as empty table", path.display());
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_path(&path)?;

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    skipped += 1;
                    log::warn!("{}: skipping unreadable line: {}", kind.file_name(), e);
                    continue;
                }
            };
            if is_header_or_blank(&record) {
                continue;
            }
            let line = record.position().map(|pos| pos.line());
            match parse(&record, line) {
                Ok(parsed) => records.push(parsed),
                Err(e) => {
                    skipped += 1;
                    log::warn!("{}: skipping malformed line: {}", kind.file_name(), e);
                }
            }
        }
        if skipped > 0 {
            log::warn!(
                "{}: loaded {} records, skipped {} malformed",
                kind.file_name(),
                records.len(),
                skipped
            );
        }
        Ok(records)
    }

    /// Load all student records in file order
    pub fn load_students(&self) -> Result<Vec<StudentRecord>, RegistrarError> {
        self.load_table(TableKind::Students, parse_student)
    }

    /// Load all attendance records in file order
    pub fn load_attendance(&self) -> Result<Vec<AttendanceRecord>, RegistrarError> {
        self.load_table(TableKind::Attendance, parse_attendance)
    }

    /// Load all grade records in file order
    pub fn load_grades(&self) -> Result<Vec<GradeRecord>, RegistrarError> {
        self.load_table(TableKind::Grades, parse_grade)
    }

    /// Load the payment log in file order (chronology)
    pub fn load_payments(&self) -> Result<Vec<PaymentTransaction>, RegistrarError> {
        self.load_table(TableKind::Payments, parse_payment)
    }

    /// Load all fee-breakdown lines, assigning sequence numbers in load order
    pub fn load_fees(&self) -> Result<Vec<FeeBreakdown>, RegistrarError> {
        let mut sequence = 0usize;
        self.load_table(TableKind::Fees, |record, line| {
            let fee = parse_fee(record, line, sequence)?;
            sequence += 1;
            Ok(fee)
        })
    }

    /// Load all balance-table lines in file order
    pub fn load_balances(&self) -> Result<Vec<BalanceRecord>, RegistrarError> {
        self.load_table(TableKind::Balances, parse_balance)
    }

    /// Open a table file for appending, writing the header if the file is new
    fn open_for_append(&self, kind: TableKind) -> Result<(File, bool), RegistrarError> {
        let path = self.table_path(kind);
        let is_new = !path.is_file();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok((file, is_new))
    }

    /// Append fields as one line to a table file
    fn append_line(&self, kind: TableKind, fields: &[String]) -> Result<(), RegistrarError> {
        let (file, is_new) = self.open_for_append(kind)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(kind.header())?;
        }
        writer.write_record(fields)?;
        writer.flush()?;
        Ok(())
    }

    /// Append one payment transaction to the payment log
    ///
    /// The log is append-only: lines are never edited here except through
    /// [`RecordStore::rewrite_payment_status`], which only advances the
    /// status field.
    pub fn append_payment(&self, payment: &PaymentTransaction) -> Result<(), RegistrarError> {
        self.append_line(TableKind::Payments, &table_format::format_payment(payment))
    }

    /// Append one student record to the student table
    pub fn append_student(&self, student: &StudentRecord) -> Result<(), RegistrarError> {
        self.append_line(TableKind::Students, &table_format::format_student(student))
    }

    /// Append one fee-breakdown line to the fee table
    ///
    /// The period column is always written, empty for an untagged fee, so
    /// the line width matches the header the writer emits on file creation.
    pub fn append_fee(&self, fee: &FeeBreakdown) -> Result<(), RegistrarError> {
        let fields = vec![
            fee.id.to_string(),
            fee.date_posted.clone(),
            fee.description.clone(),
            table_format::format_amount(fee.amount),
            fee.period.map(|p| p.to_string()).unwrap_or_default(),
        ];
        self.append_line(TableKind::Fees, &fields)
    }

    /// Read a whole table as raw records, transform, and write back
    ///
    /// `transform` receives each non-header record and returns the fields to
    /// write in its place, or `None` to keep the record as-is. Header lines
    /// pass through untouched. No atomic rename: a crash mid-write is an
    /// accepted risk of this design.
    fn rewrite_table(
        &self,
        kind: TableKind,
        mut transform: impl FnMut(&StringRecord) -> Option<Vec<String>>,
    ) -> Result<bool, RegistrarError> {
        let path = self.table_path(kind);
        if !path.is_file() {
            return Ok(false);
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut changed = false;
        for result in reader.records() {
            let record = result?;
            if !is_header_or_blank(&record) {
                if let Some(fields) = transform(&record) {
                    rows.push(fields);
                    changed = true;
                    continue;
                }
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        if !changed {
            return Ok(false);
        }

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(true)
    }

    /// Rewrite the student table with one record replaced
    ///
    /// Used by password changes and profile attachment. The matching line is
    /// found by identifier.
    ///
    /// # Errors
    ///
    /// Returns `RegistrarError::RecordNotFound` if no line carries the id.
    pub fn rewrite_student(&self, updated: &StudentRecord) -> Result<(), RegistrarError> {
        let target = updated.id.as_str();
        let replaced = self.rewrite_table(TableKind::Students, |record| {
            if record.get(0).map(str::trim) == Some(target) {
                Some(table_format::format_student(updated))
            } else {
                None
            }
        })?;
        if !replaced {
            return Err(RegistrarError::record_not_found(target));
        }
        Ok(())
    }

    /// Rewrite the balance table with one student's line replaced
    ///
    /// Appends a fresh line when the student has no balance line yet.
    pub fn upsert_balance(&self, balance: &BalanceRecord) -> Result<(), RegistrarError> {
        let target = balance.id.as_str();
        let replaced = self.rewrite_table(TableKind::Balances, |record| {
            if record.get(0).map(str::trim) == Some(target) {
                Some(table_format::format_balance(balance))
            } else {
                None
            }
        })?;
        if !replaced {
            self.append_line(TableKind::Balances, &table_format::format_balance(balance))?;
        }
        Ok(())
    }

    /// Rewrite the attendance table with one record's remark replaced
    ///
    /// The line is matched by owning id, subject code, and date. Attendance
    /// records are otherwise immutable; the remark is the only editable
    /// field.
    ///
    /// # Errors
    ///
    /// Returns `RegistrarError::RecordNotFound` if no line matches.
    pub fn rewrite_attendance_remark(
        &self,
        id: &StudentId,
        subject_code: &str,
        date: chrono::NaiveDate,
        remark: Option<&str>,
    ) -> Result<(), RegistrarError> {
        let date_text = date.format(table_format::DATE_FORMAT).to_string();
        let replaced = self.rewrite_table(TableKind::Attendance, |record| {
            let matches = record.get(0).map(str::trim) == Some(id.as_str())
                && record.get(1).map(str::trim) == Some(subject_code)
                && record.get(3).map(str::trim) == Some(date_text.as_str());
            if !matches {
                return None;
            }
            match parse_attendance(record, None) {
                Ok(mut attendance) => {
                    attendance.remark = remark.map(str::to_string);
                    Some(table_format::format_attendance(&attendance))
                }
                Err(_) => None,
            }
        })?;
        if !replaced {
            return Err(RegistrarError::record_not_found(id.as_str()));
        }
        Ok(())
    }

    /// Rewrite the payment log with one transaction's status advanced
    ///
    /// The line is matched by owning id and reference. Five-field historical
    /// lines are upgraded to the six-field form on rewrite.
    ///
    /// # Errors
    ///
    /// Returns `RegistrarError::RecordNotFound` if no line matches.
    pub fn rewrite_payment_status(
        &self,
        id: &StudentId,
        reference: &str,
        status: PaymentStatus,
    ) -> Result<(), RegistrarError> {
        let replaced = self.rewrite_table(TableKind::Payments, |record| {
            let matches = record.get(4).map(str::trim) == Some(id.as_str())
                && record.get(2).map(str::trim) == Some(reference);
            if !matches {
                return None;
            }
            match parse_payment(record, None) {
                Ok(mut payment) => {
                    payment.status = status;
                    Some(table_format::format_payment(&payment))
                }
                // Malformed matching line: leave it untouched, the scan
                // already skips it.
                Err(_) => None,
            }
        })?;
        if !replaced {
            return Err(RegistrarError::record_not_found(id.as_str()));
        }
        Ok(())
    }
}
