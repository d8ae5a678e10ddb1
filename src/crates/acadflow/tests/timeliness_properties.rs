//! Property tests for timeliness classification

use acadflow::engine::target_variant;
use acadflow::models::PhaseVariant;
use acadflow::timeliness::{classify, TimelinessWindow, Verdict};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 23, 59, 59).unwrap()
}

fn rank(verdict: Verdict) -> u8 {
    match verdict {
        Verdict::OnTime => 0,
        Verdict::Late => 1,
        Verdict::Overdue => 2,
    }
}

fn arb_variant() -> impl Strategy<Value = PhaseVariant> {
    prop_oneof![
        Just(PhaseVariant::Normal),
        Just(PhaseVariant::Late),
        Just(PhaseVariant::Overdue),
    ]
}

fn arb_verdict() -> impl Strategy<Value = Verdict> {
    prop_oneof![Just(Verdict::OnTime), Just(Verdict::Late), Just(Verdict::Overdue)]
}

proptest! {
    /// ON_TIME up to the deadline, OVERDUE only past the grace period under a lock, LATE otherwise
    #[test]
    fn classify_matches_definition(
        offset_secs in -2_000_000i64..2_000_000,
        grace in 0i64..10_000,
        lock in any::<bool>(),
    ) {
        let window = TimelinessWindow::new(base(), grace, lock);
        let submitted = base() + Duration::seconds(offset_secs);

        let expected = if submitted <= base() {
            Verdict::OnTime
        } else if submitted > base() + Duration::minutes(grace) && lock {
            Verdict::Overdue
        } else {
            Verdict::Late
        };
        prop_assert_eq!(classify(submitted, &window), expected);
    }

    /// Submitting later never yields a milder verdict
    #[test]
    fn classify_is_monotonic(
        a in -2_000_000i64..2_000_000,
        b in -2_000_000i64..2_000_000,
        grace in 0i64..10_000,
        lock in any::<bool>(),
    ) {
        let window = TimelinessWindow::new(base(), grace, lock);
        let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
        let first = classify(base() + Duration::seconds(earlier), &window);
        let second = classify(base() + Duration::seconds(later), &window);
        prop_assert!(rank(first) <= rank(second));
    }

    /// Without a lock nothing is ever OVERDUE
    #[test]
    fn no_lock_never_overdue(offset_secs in any::<i32>(), grace in 0i64..100_000) {
        let window = TimelinessWindow::new(base(), grace, false);
        let submitted = base() + Duration::seconds(i64::from(offset_secs));
        prop_assert_ne!(classify(submitted, &window), Verdict::Overdue);
    }

    /// Automatic transitions only ever move towards overdue
    #[test]
    fn target_variant_never_regresses(current in arb_variant(), verdict in arb_verdict()) {
        if let Some(target) = target_variant(current, verdict) {
            prop_assert!(target.rank() > current.rank());
            prop_assert_ne!(verdict, Verdict::OnTime);
        }
    }
}
