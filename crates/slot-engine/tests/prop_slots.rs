//! Property-based tests for slot generation and series expansion.
//!
//! These tests verify invariants that should hold for *any* calendar, not
//! just the specific examples in `slots_tests.rs`.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use proptest::prelude::*;
use slot_engine::{
    expand, generate_slots, Appointment, AppointmentStatus, AvailabilityCalendar,
    AvailabilityWindow, Block, BlockType, ConflictChecker, Frequency, RecurrenceRule, SlotQuery,
    TimeRange,
};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A date in 2024-2026. Day capped at 28 to avoid invalid month/day combos.
fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (2024i32..=2026, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_weekday() -> impl Strategy<Value = Weekday> {
    (0u8..7).prop_map(|n| Weekday::try_from(n).unwrap())
}

/// Quarter-hour aligned `(start, end)` minutes of the day with start < end.
fn arb_span() -> impl Strategy<Value = (u32, u32)> {
    (0u32..92, 1u32..=32).prop_map(|(q, len)| {
        let start = q * 15;
        let end = (start + len * 15).min(24 * 60 - 15);
        (start, end.max(start + 15))
    })
}

fn arb_window() -> impl Strategy<Value = (Weekday, (u32, u32), bool)> {
    (arb_weekday(), arb_span(), prop::bool::weighted(0.85))
}

fn arb_duration() -> impl Strategy<Value = u32> {
    prop_oneof![Just(30u32), Just(45), Just(50), Just(60), Just(90), 15u32..=120]
}

fn arb_step() -> impl Strategy<Value = Option<u32>> {
    prop_oneof![Just(None), (5u32..=60).prop_map(Some)]
}

fn arb_status() -> impl Strategy<Value = AppointmentStatus> {
    prop_oneof![
        Just(AppointmentStatus::Scheduled),
        Just(AppointmentStatus::Confirmed),
        Just(AppointmentStatus::Cancelled),
        Just(AppointmentStatus::CancelledLate),
        Just(AppointmentStatus::Attended),
        Just(AppointmentStatus::NoShow),
    ]
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn minute_of_day(m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap()
}

fn on(date: NaiveDate, m: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(m))
}

fn build_calendar(
    date: NaiveDate,
    windows: &[(Weekday, (u32, u32), bool)],
    blocks: &[(u32, u32)],
) -> AvailabilityCalendar {
    let windows = windows
        .iter()
        .map(|(day, (s, e), active)| {
            let mut w = AvailabilityWindow::new(*day, minute_of_day(*s), minute_of_day(*e)).unwrap();
            w.active = *active;
            w
        })
        .collect();
    let blocks = blocks
        .iter()
        .map(|(s, e)| Block::new(TimeRange::new(on(date, *s), on(date, *e)).unwrap(), BlockType::Break, None))
        .collect();
    AvailabilityCalendar::new(windows, blocks)
}

fn build_appointments(date: NaiveDate, specs: &[((u32, u32), AppointmentStatus)]) -> Vec<Appointment> {
    specs
        .iter()
        .map(|((s, e), status)| Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            session_type_id: Uuid::new_v4(),
            start: on(date, *s),
            end: on(date, *e),
            status: *status,
            cancellation_token: Uuid::new_v4().to_string(),
            recurring_series_id: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: on(date, 0),
        })
        .collect()
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Property 1: Generated slots never overlap and are strictly chronological
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn slots_never_overlap(
        date in arb_date(),
        windows in prop::collection::vec(arb_window(), 0..5),
        duration in arb_duration(),
        step in arb_step(),
    ) {
        let calendar = build_calendar(date, &windows, &[]);
        let query = SlotQuery::new(date, duration).unwrap().with_step(step).unwrap();

        let slots = generate_slots(&calendar, &[], &query);

        for pair in slots.windows(2) {
            prop_assert!(
                pair[0].end <= pair[1].date_time,
                "slots overlap or are out of order: {:?} / {:?}",
                pair[0],
                pair[1]
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Property 2: Every slot sits inside one active window of the date's weekday
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn slots_inside_a_single_active_window(
        date in arb_date(),
        windows in prop::collection::vec(arb_window(), 0..5),
        duration in arb_duration(),
        step in arb_step(),
    ) {
        let calendar = build_calendar(date, &windows, &[]);
        let query = SlotQuery::new(date, duration).unwrap().with_step(step).unwrap();

        for slot in generate_slots(&calendar, &[], &query) {
            prop_assert_eq!(slot.date_time.date().weekday(), date.weekday());
            prop_assert!(calendar.covers(&slot.range()), "slot {:?} escapes every window", slot);
            prop_assert_eq!(slot.range().duration_minutes(), i64::from(duration));
        }
    }
}

// ---------------------------------------------------------------------------
// Property 3: No generated slot conflicts with the data it was generated from
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn generated_slots_have_no_conflict(
        date in arb_date(),
        windows in prop::collection::vec(arb_window(), 1..4),
        blocks in prop::collection::vec(arb_span(), 0..3),
        booked in prop::collection::vec((arb_span(), arb_status()), 0..6),
        duration in arb_duration(),
    ) {
        let calendar = build_calendar(date, &windows, &blocks);
        let appointments = build_appointments(date, &booked);
        let query = SlotQuery::new(date, duration).unwrap();

        let slots = generate_slots(&calendar, &appointments, &query);
        let checker = ConflictChecker::new(&appointments, calendar.blocks());

        for slot in slots {
            prop_assert!(
                !checker.has_conflict(&slot.range()),
                "slot {:?} conflicts with existing data",
                slot
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Property 4: Series occurrences are spaced exactly one or two weeks apart
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn series_spacing_matches_frequency(
        start in arb_date(),
        weekday in arb_weekday(),
        minute in 0u32..(24 * 60),
        biweekly in any::<bool>(),
        weeks in 0i64..40,
    ) {
        let frequency = if biweekly { Frequency::Biweekly } else { Frequency::Weekly };
        let rule = RecurrenceRule {
            day_of_week: weekday,
            start_time: minute_of_day(minute),
            frequency,
            start_date: start,
            end_date: None,
        };
        let horizon = start + Duration::weeks(weeks);

        let occurrences = expand(&rule, horizon).unwrap();
        let gap = Duration::weeks(i64::from(frequency.interval_weeks()));

        for o in &occurrences {
            prop_assert_eq!(o.weekday(), weekday);
            prop_assert_eq!(o.time(), rule.start_time);
            prop_assert!(o.date() >= start && o.date() <= horizon);
        }
        for pair in occurrences.windows(2) {
            prop_assert_eq!(pair[1] - pair[0], gap);
        }
    }
}
