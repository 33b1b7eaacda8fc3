//! Integration tests for patient records and appointment history.

use std::sync::Arc;

use booking_engine::{
    AdminBookingRequest, BookingEngine, BookingError, BookingPolicy, Config, FixedClock,
    PatientInfo,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use slot_engine::{AppointmentStatus, SessionType};

fn policy() -> BookingPolicy {
    Config::from_toml_str("[policy]\ntimezone = \"UTC\"")
        .unwrap()
        .policy()
        .unwrap()
}

fn at(d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

/// Monday 08:00-12:00 open, clock at 2024-01-10 08:00.
fn setup() -> (BookingEngine, SessionType) {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap()));
    let engine = BookingEngine::in_memory(policy(), clock).unwrap();
    engine
        .create_window(
            Weekday::Mon,
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        )
        .unwrap();
    let session = engine.create_session_type("Therapy", 50, 20_000).unwrap();
    (engine, session)
}

fn book(engine: &BookingEngine, session: &SessionType, start: NaiveDateTime, who: &PatientInfo) {
    engine
        .create_admin_booking(&AdminBookingRequest {
            session_type_id: session.id,
            start,
            patient: who.clone(),
            status: None,
        })
        .unwrap();
}

fn names(patients: &[booking_engine::Patient]) -> Vec<&str> {
    patients.iter().map(|p| p.name.as_str()).collect()
}

// ============================================================================
// Listing and search
// ============================================================================

#[test]
fn active_patients_sorted_by_name() {
    let (engine, _) = setup();
    engine
        .find_or_create_patient(&PatientInfo::new("Carla Dias", "3"))
        .unwrap();
    engine
        .find_or_create_patient(&PatientInfo::new("ana Souza", "1"))
        .unwrap();
    engine
        .find_or_create_patient(&PatientInfo::new("Bruno Lima", "2"))
        .unwrap();

    assert_eq!(
        names(&engine.active_patients().unwrap()),
        vec!["ana Souza", "Bruno Lima", "Carla Dias"]
    );
}

#[test]
fn search_ignores_case_and_skips_inactive() {
    let (engine, _) = setup();
    let ana = engine
        .find_or_create_patient(&PatientInfo::new("Ana Souza", "1"))
        .unwrap();
    engine
        .find_or_create_patient(&PatientInfo::new("Mariana Souza", "2"))
        .unwrap();
    engine
        .find_or_create_patient(&PatientInfo::new("Bruno Lima", "3"))
        .unwrap();

    assert_eq!(
        names(&engine.search_patients("ANA").unwrap()),
        vec!["Ana Souza", "Mariana Souza"]
    );
    assert_eq!(engine.search_patients("souza").unwrap().len(), 2);
    assert!(engine.search_patients("xyz").unwrap().is_empty());

    engine.deactivate_patient(ana.id).unwrap();
    assert_eq!(
        names(&engine.search_patients("ana").unwrap()),
        vec!["Mariana Souza"]
    );
}

#[test]
fn blank_search_lists_everyone_active() {
    let (engine, _) = setup();
    engine
        .find_or_create_patient(&PatientInfo::new("Ana", "1"))
        .unwrap();
    assert_eq!(engine.search_patients("  ").unwrap().len(), 1);
}

// ============================================================================
// Update and deactivate
// ============================================================================

#[test]
fn update_replaces_contact_details() {
    let (engine, _) = setup();
    let ana = engine
        .find_or_create_patient(&PatientInfo::new("Ana", "1").with_email("ana@old.example"))
        .unwrap();

    let updated = engine
        .update_patient(ana.id, &PatientInfo::new(" Ana Souza ", "+55 11 5"))
        .unwrap();
    assert_eq!(updated.id, ana.id);
    assert_eq!(updated.name, "Ana Souza");
    assert_eq!(updated.phone, "+55 11 5");
    assert_eq!(updated.email, None);
    assert_eq!(updated.created_at, ana.created_at);
    assert_eq!(engine.patient(ana.id).unwrap(), updated);

    // The new phone now finds the same record.
    let again = engine
        .find_or_create_patient(&PatientInfo::new("Someone", "+55 11 5"))
        .unwrap();
    assert_eq!(again.id, ana.id);
}

#[test]
fn update_to_a_taken_phone_rejected() {
    let (engine, _) = setup();
    let ana = engine
        .find_or_create_patient(&PatientInfo::new("Ana", "1"))
        .unwrap();
    engine
        .find_or_create_patient(&PatientInfo::new("Bruno", "2"))
        .unwrap();

    let err = engine
        .update_patient(ana.id, &PatientInfo::new("Ana", "2"))
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    assert_eq!(engine.patient(ana.id).unwrap().phone, "1");
}

#[test]
fn update_with_blank_name_rejected() {
    let (engine, _) = setup();
    let ana = engine
        .find_or_create_patient(&PatientInfo::new("Ana", "1"))
        .unwrap();
    let err = engine
        .update_patient(ana.id, &PatientInfo::new("  ", "1"))
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
}

#[test]
fn unknown_patient_not_found() {
    let (engine, _) = setup();
    let id = uuid::Uuid::new_v4();
    assert!(matches!(
        engine.update_patient(id, &PatientInfo::new("Ana", "1")),
        Err(BookingError::NotFound { .. })
    ));
    assert!(matches!(
        engine.deactivate_patient(id),
        Err(BookingError::NotFound { .. })
    ));
    assert!(matches!(
        engine.patient_appointments(id),
        Err(BookingError::NotFound { .. })
    ));
}

#[test]
fn deactivated_patient_keeps_appointments_and_returns_on_booking() {
    let (engine, session) = setup();
    let info = PatientInfo::new("Ana", "1");
    book(&engine, &session, at(15, 8), &info);
    let ana = engine.find_or_create_patient(&info).unwrap();

    let deactivated = engine.deactivate_patient(ana.id).unwrap();
    assert!(!deactivated.active);
    assert!(engine.active_patients().unwrap().is_empty());
    assert_eq!(engine.patient_appointments(ana.id).unwrap().len(), 1);

    book(&engine, &session, at(22, 8), &info);
    let back = engine.patient(ana.id).unwrap();
    assert!(back.active);
    assert_eq!(engine.patient_appointments(ana.id).unwrap().len(), 2);
}

// ============================================================================
// History
// ============================================================================

#[test]
fn history_is_most_recent_first_and_includes_cancelled() {
    let (engine, session) = setup();
    let ana = PatientInfo::new("Ana", "1");
    let bruno = PatientInfo::new("Bruno", "2");
    book(&engine, &session, at(15, 8), &ana);
    book(&engine, &session, at(29, 8), &ana);
    book(&engine, &session, at(22, 8), &ana);
    book(&engine, &session, at(15, 10), &bruno);

    let patient = engine.find_or_create_patient(&ana).unwrap();
    let first = engine.patient_appointments(patient.id).unwrap();
    engine.cancel_by_admin(first[0].id, None).unwrap();

    let history = engine.patient_appointments(patient.id).unwrap();
    let starts: Vec<_> = history.iter().map(|a| a.start).collect();
    assert_eq!(starts, vec![at(29, 8), at(22, 8), at(15, 8)]);
    assert_eq!(history[0].status, AppointmentStatus::Cancelled);
    assert!(history.iter().all(|a| a.patient_id == patient.id));
}
