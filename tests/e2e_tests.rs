//! End-to-end integration tests
//!
//! These tests exercise the engine against real data directories built with
//! tempfile. Each test:
//! 1. Writes fixture table files into a fresh temp directory
//! 2. Opens a `RegistrarEngine` over that directory
//! 3. Drives the public API (lookup, authenticate, statement, payments)
//! 4. Asserts on returned values and, where a write happened, re-opens a
//!    cold engine to confirm the files agree with the warm cache
//!
//! Coverage:
//! - Account lifecycle (create, authenticate, password change, profile)
//! - Statement math (period buckets, untagged splits, credits, overpayment)
//! - Payment lifecycle (cashier vs asynchronous channels, settlement hook)
//! - Legacy file forms (five-field payment lines, trailing balance columns)
//! - Resilience (missing files, malformed lines skipped)
//! - Lazy initialization (one scan per table under concurrent access)

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use registrar_ledger::{
        ExamPeriod, PaymentChannel, PaymentStatus, RegistrarEngine, RegistrarError,
        SettlementDecision, StudentId, TableKind,
    };
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    const STUDENT_LINE: &str = "2260001,Cruz,Ana,Reyes,03/14/2004,P@ssw0rd1\n";

    /// Build a data directory from (file name, content) pairs and open an
    /// engine over it
    fn engine_with(files: &[(&str, &str)]) -> (TempDir, RegistrarEngine) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in files {
            fs::write(dir.path().join(name), content).expect("Failed to write fixture");
        }
        let engine = RegistrarEngine::new(dir.path()).expect("Failed to open engine");
        (dir, engine)
    }

    fn id(raw: &str) -> StudentId {
        StudentId::parse(raw).unwrap()
    }

    fn dec(raw: &str) -> Decimal {
        raw.parse().unwrap()
    }

    // ---- account lifecycle ------------------------------------------------

    #[test]
    fn test_account_lifecycle() {
        let (dir, engine) = engine_with(&[]);

        let student = engine
            .create_account("226", "Cruz", "Ana", "Reyes", "03/14/2004", "P@ssw0rd1")
            .unwrap();
        assert!(engine.authenticate(&student.id, "P@ssw0rd1").unwrap());

        engine
            .update_password(&student.id, "P@ssw0rd1", "S3cond-pass")
            .unwrap();
        engine
            .attach_profile(&student.id, "course=BSCS;year=2")
            .unwrap();

        // A cold engine reading the same files agrees on every mutation.
        let cold = RegistrarEngine::new(dir.path()).unwrap();
        assert!(cold.authenticate(&student.id, "S3cond-pass").unwrap());
        assert!(!cold.authenticate(&student.id, "P@ssw0rd1").unwrap());
        let reloaded = cold.lookup_student(&student.id).unwrap().unwrap();
        assert_eq!(reloaded.profile.as_deref(), Some("course=BSCS;year=2"));
        assert_eq!(reloaded.last_name, "Cruz");
    }

    #[test]
    fn test_missing_files_mean_empty_tables() {
        let (_dir, engine) = engine_with(&[]);

        assert!(engine.lookup_student(&id("2260001")).unwrap().is_none());
        assert!(engine.attendance(&id("2260001")).unwrap().is_empty());
        assert!(engine.grades(&id("2260001")).unwrap().is_empty());
        let statement = engine.statement(&id("2260001")).unwrap();
        assert_eq!(statement.balance, Decimal::ZERO);
    }

    // ---- statement math ---------------------------------------------------

    #[test]
    fn test_tagged_fees_bucket_into_their_periods() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            (
                "fees.csv",
                "2260001,08/01/2026,Tuition A,6830.00,PRELIM\n\
                 2260001,08/01/2026,Tuition B,5000.00,MIDTERM\n\
                 2260001,08/01/2026,Tuition C,4000.00,FINALS\n",
            ),
        ]);

        let statement = engine.statement(&id("2260001")).unwrap();
        assert_eq!(statement.total_assessed, dec("15830.00"));
        assert_eq!(
            statement.period_due(ExamPeriod::Prelim).assessed,
            dec("6830.00")
        );
        assert_eq!(
            statement.period_due(ExamPeriod::Midterm).assessed,
            dec("5000.00")
        );
        assert_eq!(
            statement.period_due(ExamPeriod::Finals).assessed,
            dec("4000.00")
        );
    }

    #[test]
    fn test_untagged_fee_splits_equally_across_periods() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            ("fees.csv", "2260001,08/01/2026,Misc,3000.00\n"),
        ]);

        let statement = engine.statement(&id("2260001")).unwrap();
        for period in ExamPeriod::ALL {
            assert_eq!(statement.period_due(period).assessed, dec("1000"));
        }
        assert_eq!(statement.total_assessed, dec("3000.00"));
    }

    #[test]
    fn test_credit_line_reduces_what_is_owed() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            (
                "fees.csv",
                "2260001,08/01/2026,Tuition,6000.00,PRELIM\n\
                 2260001,08/05/2026,Scholarship,(1500.00),PRELIM\n",
            ),
        ]);

        let statement = engine.statement(&id("2260001")).unwrap();
        assert_eq!(statement.total_assessed, dec("6000.00"));
        assert_eq!(statement.credits_applied, dec("1500.00"));
        assert_eq!(statement.period_due(ExamPeriod::Prelim).due, dec("4500.00"));
    }

    #[test]
    fn test_posted_payments_waterfall_prelim_first() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            (
                "fees.csv",
                "2260001,08/01/2026,Tuition A,2000.00,PRELIM\n\
                 2260001,08/01/2026,Tuition B,2000.00,MIDTERM\n\
                 2260001,08/01/2026,Tuition C,2000.00,FINALS\n",
            ),
            (
                "payments.csv",
                "08/20/2026 10:00:00,Cashier,OR-1,3000.00,2260001,posted\n",
            ),
        ]);

        let statement = engine.statement(&id("2260001")).unwrap();
        assert_eq!(statement.period_due(ExamPeriod::Prelim).due, Decimal::ZERO);
        assert!(statement.period_due(ExamPeriod::Prelim).eligible);
        assert_eq!(statement.period_due(ExamPeriod::Midterm).due, dec("1000.00"));
        assert!(!statement.period_due(ExamPeriod::Midterm).eligible);
        assert_eq!(statement.period_due(ExamPeriod::Finals).due, dec("2000.00"));
        assert_eq!(statement.balance, dec("3000.00"));
    }

    #[test]
    fn test_overpayment_is_reported_not_lost() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            ("fees.csv", "2260001,08/01/2026,Tuition,1000.00,PRELIM\n"),
            (
                "payments.csv",
                "08/20/2026 10:00:00,Cashier,OR-1,1500.00,2260001,posted\n",
            ),
        ]);

        let statement = engine.statement(&id("2260001")).unwrap();
        assert_eq!(statement.balance, Decimal::ZERO);
        assert_eq!(statement.overpayment, dec("500.00"));
    }

    #[test]
    fn test_legacy_five_field_payment_counts_as_posted() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            ("fees.csv", "2260001,08/01/2026,Tuition,1000.00,PRELIM\n"),
            (
                "payments.csv",
                "08/20/2026 10:00:00,Cashier,OR-1,1000.00,2260001\n",
            ),
        ]);

        let statement = engine.statement(&id("2260001")).unwrap();
        assert_eq!(statement.total_paid, dec("1000.00"));
        assert!(engine.is_exam_eligible(&id("2260001"), ExamPeriod::Prelim).unwrap());
    }

    // ---- payment lifecycle ------------------------------------------------

    #[test]
    fn test_cashier_payment_posts_immediately() {
        let (dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            ("fees.csv", "2260001,08/01/2026,Tuition,2000.00,PRELIM\n"),
        ]);

        let receipt = engine
            .apply_payment(&id("2260001"), dec("2000.00"), PaymentChannel::Cashier, "OR-77")
            .unwrap();
        assert_eq!(receipt.transaction.status, PaymentStatus::Posted);
        assert_eq!(receipt.balance, Decimal::ZERO);

        // The payment log and balance table both survive a cold reload.
        let cold = RegistrarEngine::new(dir.path()).unwrap();
        let statement = cold.statement(&id("2260001")).unwrap();
        assert_eq!(statement.total_paid, dec("2000.00"));
        assert_eq!(statement.balance, Decimal::ZERO);
        let balances = fs::read_to_string(dir.path().join("balances.csv")).unwrap();
        assert!(balances.contains("2260001"));
    }

    #[rstest]
    #[case::bank(PaymentChannel::BankDeposit)]
    #[case::online(PaymentChannel::Online)]
    fn test_asynchronous_payment_starts_in_flight(#[case] channel: PaymentChannel) {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            ("fees.csv", "2260001,08/01/2026,Tuition,2000.00,PRELIM\n"),
        ]);

        let receipt = engine
            .apply_payment(&id("2260001"), dec("2000.00"), channel, "REF-1")
            .unwrap();
        assert_eq!(receipt.transaction.status, PaymentStatus::InProgress);
        // In-flight money does not count toward the balance yet.
        assert_eq!(receipt.balance, dec("2000.00"));
        assert!(!engine.is_exam_eligible(&id("2260001"), ExamPeriod::Prelim).unwrap());
    }

    #[test]
    fn test_settlement_hook_posts_in_flight_payment() {
        let (dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            ("fees.csv", "2260001,08/01/2026,Tuition,2000.00,PRELIM\n"),
        ]);

        engine
            .apply_payment(&id("2260001"), dec("2000.00"), PaymentChannel::Online, "REF-1")
            .unwrap();

        let changed = engine
            .update_payment_statuses(&id("2260001"), |_| SettlementDecision::Settle)
            .unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].status, PaymentStatus::Posted);
        assert!(engine.is_exam_eligible(&id("2260001"), ExamPeriod::Prelim).unwrap());

        let cold = RegistrarEngine::new(dir.path()).unwrap();
        assert!(cold.is_exam_eligible(&id("2260001"), ExamPeriod::Prelim).unwrap());
    }

    #[test]
    fn test_rejected_payment_never_counts() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            ("fees.csv", "2260001,08/01/2026,Tuition,2000.00,PRELIM\n"),
        ]);

        engine
            .apply_payment(&id("2260001"), dec("2000.00"), PaymentChannel::BankDeposit, "REF-1")
            .unwrap();
        let changed = engine
            .update_payment_statuses(&id("2260001"), |_| SettlementDecision::Reject)
            .unwrap();
        assert_eq!(changed[0].status, PaymentStatus::Rejected);

        let statement = engine.statement(&id("2260001")).unwrap();
        assert_eq!(statement.total_paid, Decimal::ZERO);
        assert_eq!(statement.balance, dec("2000.00"));
        // Rejected is terminal: a second sweep finds nothing in flight.
        let again = engine
            .update_payment_statuses(&id("2260001"), |_| SettlementDecision::Settle)
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_deferred_payment_is_left_untouched() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
        ]);

        engine
            .apply_payment(&id("2260001"), dec("100.00"), PaymentChannel::Online, "REF-1")
            .unwrap();
        let changed = engine
            .update_payment_statuses(&id("2260001"), |_| SettlementDecision::Defer)
            .unwrap();
        assert!(changed.is_empty());

        let statement = engine.statement(&id("2260001")).unwrap();
        assert_eq!(statement.payment_history[0].status, PaymentStatus::InProgress);
    }

    #[rstest]
    #[case::zero("0")]
    #[case::negative("-50.00")]
    fn test_non_positive_amount_is_rejected(#[case] amount: &str) {
        let (_dir, engine) = engine_with(&[("students.csv", STUDENT_LINE)]);

        let result =
            engine.apply_payment(&id("2260001"), dec(amount), PaymentChannel::Cashier, "OR-1");
        assert!(matches!(
            result.unwrap_err(),
            RegistrarError::InvalidAmount { .. }
        ));
    }

    #[test]
    fn test_payment_for_unknown_student_is_rejected() {
        let (_dir, engine) = engine_with(&[("students.csv", STUDENT_LINE)]);

        let result = engine.apply_payment(
            &id("9999999"),
            dec("100.00"),
            PaymentChannel::Cashier,
            "OR-1",
        );
        assert!(matches!(
            result.unwrap_err(),
            RegistrarError::RecordNotFound { .. }
        ));
    }

    // ---- resilience -------------------------------------------------------

    #[test]
    fn test_malformed_lines_are_skipped_not_fatal() {
        let (_dir, engine) = engine_with(&[
            (
                "students.csv",
                "Student ID,Last,First,Middle,DOB,Password\n\
                 garbage-line-with-no-commas\n\
                 22,short,id,x,03/14/2004,pw\n\
                 2260001,Cruz,Ana,Reyes,03/14/2004,P@ssw0rd1\n",
            ),
            (
                "payments.csv",
                "not-a-date,Cashier,OR-0,10.00,2260001\n\
                 08/20/2026 10:00:00,Cashier,OR-1,50.00,2260001\n",
            ),
        ]);

        // The one valid student and the one valid payment survive.
        assert!(engine.lookup_student(&id("2260001")).unwrap().is_some());
        let statement = engine.statement(&id("2260001")).unwrap();
        assert_eq!(statement.total_paid, dec("50.00"));
        assert_eq!(statement.payment_history.len(), 1);
    }

    #[test]
    fn test_balance_table_trailing_columns_are_ignored() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            (
                "balances.csv",
                "2260001,5000.00,3000.00,2000.00,extra,columns,here\n",
            ),
        ]);

        let balance = engine.cache().balance(&id("2260001")).unwrap().unwrap();
        assert_eq!(balance.amount_due, dec("5000.00"));
        assert_eq!(balance.remaining_balance, dec("3000.00"));
        assert_eq!(balance.paid_amount, dec("2000.00"));
    }

    // ---- attendance and grades --------------------------------------------

    #[test]
    fn test_attendance_and_remark_update() {
        let (dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            (
                "attendance.csv",
                "2260001,CS101,Intro to Computing,08/18/2026,Absent\n\
                 2260001,CS101,Intro to Computing,08/25/2026,Present\n",
            ),
        ]);

        let date = NaiveDate::from_ymd_opt(2026, 8, 18).unwrap();
        engine
            .update_remark(&id("2260001"), "CS101", date, Some("Medical certificate filed"))
            .unwrap();

        let records = engine.attendance(&id("2260001")).unwrap();
        assert_eq!(records.len(), 2);
        let absent = records.iter().find(|r| r.date == date).unwrap();
        assert_eq!(absent.remark.as_deref(), Some("Medical certificate filed"));

        let cold = RegistrarEngine::new(dir.path()).unwrap();
        let reloaded = cold.attendance(&id("2260001")).unwrap();
        let absent = reloaded.iter().find(|r| r.date == date).unwrap();
        assert_eq!(absent.remark.as_deref(), Some("Medical certificate filed"));
    }

    #[test]
    fn test_grades_with_unencoded_slots() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            (
                "grades.csv",
                "2260001,CS101,Intro to Computing,1.75,,,,1st 2026-2027,Enrolled\n",
            ),
        ]);

        let grades = engine.grades(&id("2260001")).unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].prelim, Some(dec("1.75")));
        assert!(grades[0].midterm.is_none());
        assert!(grades[0].final_grade.is_none());
    }

    // ---- lazy initialization ----------------------------------------------

    #[test]
    fn test_each_table_scans_once_under_concurrent_access() {
        let (_dir, engine) = engine_with(&[
            ("students.csv", STUDENT_LINE),
            (
                "payments.csv",
                "08/20/2026 10:00:00,Cashier,OR-1,50.00,2260001\n",
            ),
        ]);
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    engine.lookup_student(&id("2260001")).unwrap();
                    engine.statement(&id("2260001")).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = engine.cache().store();
        assert_eq!(store.scan_count(TableKind::Students), 1);
        assert_eq!(store.scan_count(TableKind::Payments), 1);
        assert_eq!(store.scan_count(TableKind::Fees), 1);
    }

    #[test]
    fn test_invalidate_forces_one_fresh_scan() {
        let (dir, engine) = engine_with(&[("students.csv", STUDENT_LINE)]);

        assert!(engine.lookup_student(&id("2260001")).unwrap().is_some());
        // Another process appends a row behind the cache's back.
        let mut on_disk = fs::read_to_string(dir.path().join("students.csv")).unwrap();
        on_disk.push_str("2269999,Santos,Ben,Lim,07/02/2003,pw2\n");
        fs::write(dir.path().join("students.csv"), on_disk).unwrap();

        assert!(engine.lookup_student(&id("2269999")).unwrap().is_none());
        engine.invalidate(Some(TableKind::Students));
        assert!(engine.lookup_student(&id("2269999")).unwrap().is_some());
        assert_eq!(engine.cache().store().scan_count(TableKind::Students), 2);
    }
}
