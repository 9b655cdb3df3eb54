//! Registrar engine: the in-process API surface
//!
//! The `RegistrarEngine` is the single object the presentation layer talks
//! to. It owns the record cache (and through it the store) and the ledger,
//! and exposes lookup, authentication, statement, payment, and record-update
//! operations. It is explicitly constructed and passed by reference;
//! nothing here is static.

use crate::core::cache::RecordCache;
use crate::core::ledger::{LedgerEngine, SettlementDecision};
use crate::io::{RecordStore, TableKind};
use crate::types::{
    AccountStatement, AttendanceRecord, ExamPeriod, GradeRecord, PaymentChannel, PaymentReceipt,
    PaymentTransaction, RegistrarError, StudentId, StudentRecord,
};
use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;

/// How many random suffixes account creation tries before giving up
const MAX_ID_ATTEMPTS: u32 = 256;

/// Facade over the cache, store, and ledger
///
/// Construct one per process with [`RegistrarEngine::new`] and share it by
/// reference; all methods take `&self` and are safe to call from the UI
/// event thread and the watcher/timer thread concurrently.
pub struct RegistrarEngine {
    cache: Arc<RecordCache>,
    ledger: LedgerEngine,
}

impl RegistrarEngine {
    /// Open the engine over a data directory
    ///
    /// Resolves the directory (bounded upward search) and wires up the
    /// cache and ledger. No table is scanned until first access.
    ///
    /// # Errors
    ///
    /// Returns `RegistrarError::DataDirNotFound` if the directory cannot be
    /// resolved.
    pub fn new(data_dir: &Path) -> Result<Self, RegistrarError> {
        let store = RecordStore::open(data_dir)?;
        let cache = Arc::new(RecordCache::new(store));
        let ledger = LedgerEngine::new(Arc::clone(&cache));
        Ok(RegistrarEngine { cache, ledger })
    }

    /// The record cache (exposed for probes and advanced callers)
    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// Look up a student by identifier
    ///
    /// A well-formed but unknown identifier yields `Ok(None)`.
    pub fn lookup_student(&self, id: &StudentId) -> Result<Option<StudentRecord>, RegistrarError> {
        self.cache.student(id)
    }

    /// Check a credential against the student record
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if the student exists and the password matches
    /// * `Ok(false)` if the student is unknown or the password differs
    ///
    /// # Errors
    ///
    /// Returns `RegistrarError::EmptyCredential` for an empty password;
    /// an empty credential is rejected at the boundary, never silently
    /// compared.
    pub fn authenticate(&self, id: &StudentId, password: &str) -> Result<bool, RegistrarError> {
        if password.is_empty() {
            return Err(RegistrarError::empty_credential(id.as_str()));
        }
        Ok(self
            .cache
            .student(id)?
            .is_some_and(|student| student.password == password))
    }

    /// Compute the account statement for one student
    pub fn statement(&self, id: &StudentId) -> Result<AccountStatement, RegistrarError> {
        self.ledger.statement(id)
    }

    /// Remaining due for one exam period
    pub fn exam_period_due(
        &self,
        id: &StudentId,
        period: ExamPeriod,
    ) -> Result<Decimal, RegistrarError> {
        self.ledger.exam_period_due(id, period)
    }

    /// Whether the student is cleared for one period's exam
    pub fn is_exam_eligible(
        &self,
        id: &StudentId,
        period: ExamPeriod,
    ) -> Result<bool, RegistrarError> {
        Ok(self.ledger.exam_period_due(id, period)?.is_zero())
    }

    /// Apply a payment, timestamped now
    ///
    /// See [`LedgerEngine::apply_payment`] for validation and settlement
    /// semantics. Duplicate detection by reference is a caller
    /// responsibility.
    pub fn apply_payment(
        &self,
        id: &StudentId,
        amount: Decimal,
        channel: PaymentChannel,
        reference: &str,
    ) -> Result<PaymentReceipt, RegistrarError> {
        self.ledger
            .apply_payment(id, amount, channel, reference, chrono::Local::now().naive_local())
    }

    /// Run the settlement hook over the student's in-flight transactions
    pub fn update_payment_statuses(
        &self,
        id: &StudentId,
        confirm: impl FnMut(&PaymentTransaction) -> SettlementDecision,
    ) -> Result<Vec<PaymentTransaction>, RegistrarError> {
        self.ledger.update_payment_statuses(id, confirm)
    }

    /// Invalidate one cached table, or all of them
    pub fn invalidate(&self, kind: Option<TableKind>) {
        self.cache.invalidate(kind)
    }

    /// Create a new student account with a freshly generated identifier
    ///
    /// The identifier is the given three-digit prefix plus a random
    /// four-digit suffix, retried against the live cache until unique.
    ///
    /// # Errors
    ///
    /// * `RegistrarError::EmptyCredential` for an empty password
    /// * `RegistrarError::InvalidIdentifier` for a malformed prefix
    /// * `RegistrarError::IdentifierExhausted` if no unused suffix is found
    ///   within the attempt budget
    pub fn create_account(
        &self,
        prefix: &str,
        last_name: &str,
        first_name: &str,
        middle_name: &str,
        date_of_birth: &str,
        password: &str,
    ) -> Result<StudentRecord, RegistrarError> {
        if password.is_empty() {
            return Err(RegistrarError::empty_credential(prefix));
        }
        let id = self.generate_id(prefix)?;
        let student = StudentRecord {
            id,
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
            middle_name: middle_name.to_string(),
            date_of_birth: date_of_birth.to_string(),
            password: password.to_string(),
            profile: None,
        };
        self.cache.insert_student(student.clone())?;
        log::debug!("created account {}", student.id);
        Ok(student)
    }

    /// Generate an identifier unique against the live cache
    fn generate_id(&self, prefix: &str) -> Result<StudentId, RegistrarError> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = StudentId::compose(prefix, rng.gen_range(0..10000))?;
            if !self.cache.contains_student(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(RegistrarError::identifier_exhausted(prefix, MAX_ID_ATTEMPTS))
    }

    /// Change a student's password
    ///
    /// The current password must authenticate; the new one must be
    /// non-empty. Store and cache are updated together, so both a warm
    /// lookup and a cold reload observe the new credential.
    pub fn update_password(
        &self,
        id: &StudentId,
        current: &str,
        new: &str,
    ) -> Result<(), RegistrarError> {
        if new.is_empty() {
            return Err(RegistrarError::empty_credential(id.as_str()));
        }
        if !self.authenticate(id, current)? {
            return Err(RegistrarError::authentication_failed(id.as_str()));
        }
        // authenticate() above proved the record exists
        let mut student = self
            .cache
            .student(id)?
            .ok_or_else(|| RegistrarError::record_not_found(id.as_str()))?;
        student.password = new.to_string();
        self.cache.update_student(student)
    }

    /// Attach or replace the student's profile blob
    ///
    /// The blob is pass-through text owned by the presentation layer.
    pub fn attach_profile(&self, id: &StudentId, blob: &str) -> Result<(), RegistrarError> {
        let mut student = self
            .cache
            .student(id)?
            .ok_or_else(|| RegistrarError::record_not_found(id.as_str()))?;
        student.profile = Some(blob.to_string());
        self.cache.update_student(student)
    }

    /// All attendance records for one student
    pub fn attendance(&self, id: &StudentId) -> Result<Vec<AttendanceRecord>, RegistrarError> {
        self.cache.attendance(id)
    }

    /// All grade records for one student
    pub fn grades(&self, id: &StudentId) -> Result<Vec<GradeRecord>, RegistrarError> {
        self.cache.grades(id)
    }

    /// Edit the remark on one attendance record
    pub fn update_remark(
        &self,
        id: &StudentId,
        subject_code: &str,
        date: NaiveDate,
        remark: Option<&str>,
    ) -> Result<(), RegistrarError> {
        self.cache.update_remark(id, subject_code, date, remark)
    }
}
