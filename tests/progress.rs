//! Course progress matching and the completion prompt.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use walk_tracker::geo_utils::offset_meters;
use walk_tracker::synthetic::{straight_course, SimulatedWalk};
use walk_tracker::{GeoPoint, ProgressConfig, ProgressMatcher, ProgressOutcome};

fn course() -> Vec<GeoPoint> {
    straight_course(GeoPoint::new(37.5665, 126.978), 20, 15.0)
}

#[test]
fn test_progress_index_monotonic_for_any_order() {
    let course = course();
    let mut positions = SimulatedWalk { step_meters: 4.0, noise_meters: 6.0, seed: 5 }.along(&course);

    for seed in 0..5 {
        positions.shuffle(&mut StdRng::seed_from_u64(seed));
        let mut matcher = ProgressMatcher::new(course.clone(), ProgressConfig::default());
        let mut last = matcher.progress_index();
        assert_eq!(last, -1);

        for p in &positions {
            matcher.update(p);
            let now = matcher.progress_index();
            assert!(now >= last, "index went back from {} to {}", last, now);
            last = now;
        }
    }
}

#[test]
fn test_backtracking_keeps_progress() {
    let course = course();
    let mut matcher = ProgressMatcher::new(course.clone(), ProgressConfig::default());

    assert_eq!(matcher.update(&course[10]), ProgressOutcome::Advanced { index: 10 });
    assert_eq!(matcher.update(&course[3]), ProgressOutcome::Unchanged { index: 10 });
    assert_eq!(matcher.completed_path().len(), 11);
}

#[test]
fn test_off_course_positions_ignored() {
    let course = course();
    let mut matcher = ProgressMatcher::new(course.clone(), ProgressConfig::default());

    let far = offset_meters(&course[5], 0.0, 45.0);
    assert!(matches!(matcher.update(&far), ProgressOutcome::OffCourse { .. }));
    assert_eq!(matcher.progress_index(), -1);

    let near = offset_meters(&course[5], 0.0, 25.0);
    assert_eq!(matcher.update(&near), ProgressOutcome::Advanced { index: 5 });
}

#[test]
fn test_short_reference_disables_matching() {
    for reference in [vec![], vec![GeoPoint::new(37.5, 127.0)]] {
        let mut matcher = ProgressMatcher::new(reference, ProgressConfig::default());
        assert!(!matcher.is_enabled());
        assert_eq!(matcher.update(&GeoPoint::new(37.5, 127.0)), ProgressOutcome::Disabled);
        assert_eq!(matcher.progress_index(), -1);
    }
}

#[test]
fn test_completion_fires_exactly_once() {
    let reference = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0)];
    let mut matcher = ProgressMatcher::new(reference, ProgressConfig::default());
    let half = matcher.reference_meters() * 0.5;

    // About 5.6m short of the end
    let near_end = GeoPoint::new(0.0, 0.99995);
    let prompt = matcher.check_completion(&near_end, half + 1.0).unwrap();
    assert!(prompt.distance_to_end_meters < 20.0);

    for _ in 0..5 {
        assert!(matcher.check_completion(&near_end, half + 1.0).is_none());
    }
    assert!(matcher.completion_fired());
}

#[test]
fn test_completion_requires_half_the_course() {
    let reference = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0)];
    let mut matcher = ProgressMatcher::new(reference, ProgressConfig::default());
    let half = matcher.reference_meters() * 0.5;
    let near_end = GeoPoint::new(0.0, 0.99995);

    assert!(matcher.check_completion(&near_end, half - 1.0).is_none());
    assert!(!matcher.completion_fired());
    assert!(matcher.check_completion(&near_end, half).is_some());
}

#[test]
fn test_completion_requires_being_near_the_end() {
    let course = course();
    let mut matcher = ProgressMatcher::new(course.clone(), ProgressConfig::default());
    let walked = matcher.reference_meters();

    let short_of_end = offset_meters(course.last().unwrap(), -25.0, 0.0);
    assert!(matcher.check_completion(&short_of_end, walked).is_none());
    assert!(matcher.check_completion(course.last().unwrap(), walked).is_some());
}
