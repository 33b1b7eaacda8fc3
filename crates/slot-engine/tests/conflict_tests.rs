//! Tests for conflict detection against appointments and blocks.

use chrono::{NaiveDate, NaiveDateTime};
use slot_engine::{
    Appointment, AppointmentStatus, Block, BlockType, ConflictChecker, ConflictSource, TimeRange,
};
use uuid::Uuid;

/// Helper to build a clinic-local date-time on 2024-03-04.
fn at(hour: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(hour, min, 0)
        .unwrap()
}

fn range(start: (u32, u32), end: (u32, u32)) -> TimeRange {
    TimeRange::new(at(start.0, start.1), at(end.0, end.1)).unwrap()
}

fn appointment(r: TimeRange, status: AppointmentStatus) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        session_type_id: Uuid::new_v4(),
        start: r.start,
        end: r.end,
        status,
        cancellation_token: Uuid::new_v4().to_string(),
        recurring_series_id: None,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        created_at: r.start,
    }
}

#[test]
fn overlapping_appointment_detected() {
    // Existing 09:00-10:00, candidate 09:30-10:30 → 30-min overlap
    let existing = vec![appointment(range((9, 0), (10, 0)), AppointmentStatus::Confirmed)];
    let checker = ConflictChecker::new(&existing, &[]);

    let conflicts = checker.conflicts(&range((9, 30), (10, 30)));

    assert_eq!(conflicts.len(), 1, "should detect exactly one conflict");
    assert_eq!(conflicts[0].overlap_minutes, 30);
    assert_eq!(
        conflicts[0].source,
        ConflictSource::Appointment { id: existing[0].id }
    );
}

#[test]
fn adjacent_appointment_not_a_conflict() {
    // Existing 09:00-10:00, candidate 10:00-11:00 → adjacent, NOT overlapping
    let existing = vec![appointment(range((9, 0), (10, 0)), AppointmentStatus::Confirmed)];
    let checker = ConflictChecker::new(&existing, &[]);

    assert!(
        !checker.has_conflict(&range((10, 0), (11, 0))),
        "adjacent ranges (end == start) should not be conflicts"
    );
}

#[test]
fn terminal_appointments_never_conflict() {
    let slot = range((9, 0), (10, 0));
    let existing: Vec<Appointment> = [
        AppointmentStatus::Cancelled,
        AppointmentStatus::CancelledLate,
        AppointmentStatus::Attended,
        AppointmentStatus::NoShow,
    ]
    .into_iter()
    .map(|s| appointment(slot, s))
    .collect();
    let checker = ConflictChecker::new(&existing, &[]);

    assert!(!checker.has_conflict(&slot));
}

#[test]
fn scheduled_appointment_occupies() {
    let slot = range((9, 0), (10, 0));
    let existing = vec![appointment(slot, AppointmentStatus::Scheduled)];

    assert!(ConflictChecker::new(&existing, &[]).has_conflict(&slot));
}

#[test]
fn block_conflict_detected() {
    let blocks = vec![Block::new(range((12, 0), (13, 0)), BlockType::Break, None)];
    let checker = ConflictChecker::new(&[], &blocks);

    let conflicts = checker.conflicts(&range((11, 30), (12, 30)));

    assert_eq!(conflicts.len(), 1);
    assert_eq!(
        conflicts[0].source,
        ConflictSource::Block {
            id: blocks[0].id,
            block_type: BlockType::Break
        }
    );
}

#[test]
fn excluded_appointment_is_ignored() {
    let slot = range((9, 0), (10, 0));
    let existing = vec![appointment(slot, AppointmentStatus::Confirmed)];
    let checker = ConflictChecker::new(&existing, &[]).excluding(Some(existing[0].id));

    assert!(
        !checker.has_conflict(&range((9, 30), (10, 30))),
        "an appointment being rescheduled must not conflict with itself"
    );
}

#[test]
fn fully_contained_candidate_correct_overlap() {
    // Existing 09:00-12:00 (3 hours), candidate 10:00-11:00 (fully inside)
    let existing = vec![appointment(range((9, 0), (12, 0)), AppointmentStatus::Confirmed)];
    let conflicts = ConflictChecker::new(&existing, &[]).conflicts(&range((10, 0), (11, 0)));

    assert_eq!(
        conflicts[0].overlap_minutes, 60,
        "overlap should be the duration of the smaller range (60 min)"
    );
}

#[test]
fn check_many_reports_indices_in_order() {
    let existing = vec![appointment(range((9, 0), (10, 0)), AppointmentStatus::Confirmed)];
    let blocks = vec![Block::new(range((14, 0), (15, 0)), BlockType::Holiday, None)];
    let checker = ConflictChecker::new(&existing, &blocks);

    let candidates = vec![
        range((8, 0), (9, 0)),   // free (adjacent)
        range((9, 0), (10, 0)),  // appointment
        range((11, 0), (12, 0)), // free
        range((14, 30), (15, 30)), // block
    ];

    assert_eq!(checker.check_many(&candidates), vec![1, 3]);
}

#[test]
fn first_conflicts_prefers_appointments() {
    let slot = range((9, 0), (10, 0));
    let existing = vec![appointment(slot, AppointmentStatus::Confirmed)];
    let blocks = vec![Block::new(slot, BlockType::Holiday, None)];
    let checker = ConflictChecker::new(&existing, &blocks);

    let found = checker.first_conflicts(&[slot]);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, 0);
    assert!(matches!(found[0].1.source, ConflictSource::Appointment { .. }));
}

#[test]
fn empty_inputs_produce_no_conflicts() {
    let checker = ConflictChecker::new(&[], &[]);
    assert!(checker.check_many(&[range((9, 0), (10, 0))]).is_empty());
    assert!(checker.check_many(&[]).is_empty());
}
