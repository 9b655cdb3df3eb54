//! Thread-safe record cache with lazy per-table initialization
//!
//! This module provides the `RecordCache`, a per-entity-type mapping from a
//! validated identifier to its parsed record(s), populated on first access
//! from the [`RecordStore`] and invalidated explicitly.
//!
//! # Lazy initialization
//!
//! Each table initializes independently with double-checked locking: an
//! atomic initialized flag is checked first, the exclusive init lock is
//! taken only when the flag is down, and the flag is re-checked under the
//! lock before the single file scan runs. Concurrent first access from any
//! number of threads triggers exactly one scan; steady-state lookups never
//! touch the init lock.
//!
//! # Thread Safety
//!
//! Lookups go straight to a `DashMap` and clone the hit out of the shard
//! lock. Mutations pair the store write with the cache update inside one
//! critical section, so a reader never observes the file carrying a value
//! the cache does not (or vice versa) for longer than that section.

use crate::io::{RecordStore, TableKind};
use crate::types::{
    AttendanceRecord, BalanceRecord, FeeBreakdown, GradeRecord, PaymentStatus, PaymentTransaction,
    RegistrarError, StudentId, StudentRecord,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One lazily-initialized identifier -> records table
///
/// Values are grouped by owning identifier; within one identifier the load
/// order of the file is preserved, which carries payment chronology.
struct LazyTable<V> {
    map: DashMap<StudentId, Vec<V>>,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
}

impl<V: Clone> LazyTable<V> {
    fn new() -> Self {
        LazyTable {
            map: DashMap::new(),
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
        }
    }

    /// Ensure the table is populated, scanning the file at most once
    ///
    /// `loader` runs only if this call wins the initialization race;
    /// `key_of` extracts the grouping identifier from each record.
    fn ensure(
        &self,
        loader: impl FnOnce() -> Result<Vec<V>, RegistrarError>,
        key_of: impl Fn(&V) -> StudentId,
    ) -> Result<(), RegistrarError> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let records = loader()?;
        self.map.clear();
        for record in records {
            self.map.entry(key_of(&record)).or_default().push(record);
        }
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Clone out the records for one identifier; empty if unknown
    fn get(&self, id: &StudentId) -> Vec<V> {
        self.map
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn contains(&self, id: &StudentId) -> bool {
        self.map.contains_key(id)
    }

    /// Append one record to an identifier's group
    fn push(&self, id: StudentId, value: V) {
        self.map.entry(id).or_default().push(value);
    }

    /// Replace an identifier's group with a single record
    fn put_single(&self, id: StudentId, value: V) {
        self.map.insert(id, vec![value]);
    }

    /// Mutate an identifier's group in place
    fn mutate(&self, id: &StudentId, f: impl FnOnce(&mut Vec<V>)) {
        if let Some(mut entry) = self.map.get_mut(id) {
            f(entry.value_mut());
        }
    }

    /// Drop all entries and mark uninitialized; next access rescans
    fn invalidate(&self) {
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.initialized.store(false, Ordering::Release);
        self.map.clear();
    }
}

/// Process-wide record cache over the flat-file store
///
/// Explicitly constructed and passed by reference; there is no static
/// lifecycle. Owns the [`RecordStore`] so every mutation can pair the file
/// write with the cache update.
pub struct RecordCache {
    store: RecordStore,
    students: LazyTable<StudentRecord>,
    attendance: LazyTable<AttendanceRecord>,
    grades: LazyTable<GradeRecord>,
    payments: LazyTable<PaymentTransaction>,
    fees: LazyTable<FeeBreakdown>,
    balances: LazyTable<BalanceRecord>,
    /// Serializes store-write + cache-update pairs across all tables
    write_lock: Mutex<()>,
}

impl RecordCache {
    /// Create a cache over an opened store; no table is scanned yet
    pub fn new(store: RecordStore) -> Self {
        RecordCache {
            store,
            students: LazyTable::new(),
            attendance: LazyTable::new(),
            grades: LazyTable::new(),
            payments: LazyTable::new(),
            fees: LazyTable::new(),
            balances: LazyTable::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_students(&self) -> Result<(), RegistrarError> {
        self.students
            .ensure(|| self.store.load_students(), |s| s.id.clone())
    }

    fn ensure_attendance(&self) -> Result<(), RegistrarError> {
        self.attendance
            .ensure(|| self.store.load_attendance(), |a| a.id.clone())
    }

    fn ensure_grades(&self) -> Result<(), RegistrarError> {
        self.grades
            .ensure(|| self.store.load_grades(), |g| g.id.clone())
    }

    fn ensure_payments(&self) -> Result<(), RegistrarError> {
        self.payments
            .ensure(|| self.store.load_payments(), |p| p.id.clone())
    }

    fn ensure_fees(&self) -> Result<(), RegistrarError> {
        self.fees.ensure(|| self.store.load_fees(), |f| f.id.clone())
    }

    fn ensure_balances(&self) -> Result<(), RegistrarError> {
        self.balances
            .ensure(|| self.store.load_balances(), |b| b.id.clone())
    }

    /// Look up a student by identifier
    ///
    /// Returns `Ok(None)` for a well-formed but unknown identifier; an
    /// unknown id is a not-found result, never an error.
    pub fn student(&self, id: &StudentId) -> Result<Option<StudentRecord>, RegistrarError> {
        self.ensure_students()?;
        Ok(self.students.get(id).into_iter().next())
    }

    /// Whether a student record exists for the identifier
    pub fn contains_student(&self, id: &StudentId) -> Result<bool, RegistrarError> {
        self.ensure_students()?;
        Ok(self.students.contains(id))
    }

    /// All attendance records for one student, in file order
    pub fn attendance(&self, id: &StudentId) -> Result<Vec<AttendanceRecord>, RegistrarError> {
        self.ensure_attendance()?;
        Ok(self.attendance.get(id))
    }

    /// All grade records for one student, in file order
    pub fn grades(&self, id: &StudentId) -> Result<Vec<GradeRecord>, RegistrarError> {
        self.ensure_grades()?;
        Ok(self.grades.get(id))
    }

    /// Full payment history for one student, in chronological (file) order
    pub fn payments(&self, id: &StudentId) -> Result<Vec<PaymentTransaction>, RegistrarError> {
        self.ensure_payments()?;
        Ok(self.payments.get(id))
    }

    /// All fee-breakdown lines for one student, in sequence order
    pub fn fees(&self, id: &StudentId) -> Result<Vec<FeeBreakdown>, RegistrarError> {
        self.ensure_fees()?;
        Ok(self.fees.get(id))
    }

    /// The balance-table line for one student, if any
    pub fn balance(&self, id: &StudentId) -> Result<Option<BalanceRecord>, RegistrarError> {
        self.ensure_balances()?;
        Ok(self.balances.get(id).into_iter().next())
    }

    /// Insert a new student: append to the store, then cache the record
    ///
    /// Both steps run under the write lock so a concurrent reader sees
    /// either the old state or the new, never a torn one.
    pub fn insert_student(&self, student: StudentRecord) -> Result<(), RegistrarError> {
        self.ensure_students()?;
        let _guard = self.write_guard();
        self.store.append_student(&student)?;
        self.students.put_single(student.id.clone(), student);
        Ok(())
    }

    /// Replace a student record: rewrite the store line, refresh the cache
    pub fn update_student(&self, updated: StudentRecord) -> Result<(), RegistrarError> {
        self.ensure_students()?;
        let _guard = self.write_guard();
        self.store.rewrite_student(&updated)?;
        self.students.put_single(updated.id.clone(), updated);
        Ok(())
    }

    /// Append a payment: store first, then push onto the cached history
    pub fn append_payment(&self, payment: PaymentTransaction) -> Result<(), RegistrarError> {
        self.ensure_payments()?;
        let _guard = self.write_guard();
        self.store.append_payment(&payment)?;
        self.payments.push(payment.id.clone(), payment);
        Ok(())
    }

    /// Advance the status of one payment, matched by reference
    pub fn set_payment_status(
        &self,
        id: &StudentId,
        reference: &str,
        status: PaymentStatus,
    ) -> Result<(), RegistrarError> {
        self.ensure_payments()?;
        let _guard = self.write_guard();
        self.store.rewrite_payment_status(id, reference, status)?;
        self.payments.mutate(id, |history| {
            for payment in history.iter_mut().filter(|p| p.reference == reference) {
                payment.status = status;
            }
        });
        Ok(())
    }

    /// Write a balance line and refresh its cache entry
    pub fn upsert_balance(&self, balance: BalanceRecord) -> Result<(), RegistrarError> {
        self.ensure_balances()?;
        let _guard = self.write_guard();
        self.store.upsert_balance(&balance)?;
        self.balances.put_single(balance.id.clone(), balance);
        Ok(())
    }

    /// Edit the remark on one attendance record
    ///
    /// The record is matched by subject code and date; remark is the only
    /// mutable attendance field.
    pub fn update_remark(
        &self,
        id: &StudentId,
        subject_code: &str,
        date: chrono::NaiveDate,
        remark: Option<&str>,
    ) -> Result<(), RegistrarError> {
        self.ensure_attendance()?;
        let _guard = self.write_guard();
        self.store
            .rewrite_attendance_remark(id, subject_code, date, remark)?;
        self.attendance.mutate(id, |records| {
            for record in records
                .iter_mut()
                .filter(|r| r.subject_code == subject_code && r.date == date)
            {
                record.remark = remark.map(str::to_string);
            }
        });
        Ok(())
    }

    /// Clear one table, or all of them, forcing a rescan on next access
    ///
    /// Entry point for callers that know the backing files changed
    /// externally (the presentation layer's change watcher).
    pub fn invalidate(&self, kind: Option<TableKind>) {
        match kind {
            Some(TableKind::Students) => self.students.invalidate(),
            Some(TableKind::Attendance) => self.attendance.invalidate(),
            Some(TableKind::Grades) => self.grades.invalidate(),
            Some(TableKind::Payments) => self.payments.invalidate(),
            Some(TableKind::Fees) => self.fees.invalidate(),
            Some(TableKind::Balances) => self.balances.invalidate(),
            None => {
                for kind in TableKind::ALL {
                    self.invalidate(Some(kind));
                }
            }
        }
    }
}
