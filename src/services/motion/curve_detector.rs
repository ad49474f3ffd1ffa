use crate::constants::{CURVE_BANDS, SHARP_TURN_REDUCTION};
use crate::models::Waypoint;

/// Smoothed speed reduction ahead of turns.
///
/// Each call blends the effective reduction toward the target for the turn at
/// `current`, which yields braking before a curve, holding through it and
/// recovering afterwards without any explicit phases.
#[derive(Debug, Clone)]
pub struct CurveDetector {
    effective: f64,
    alpha: f64,
    recovery_per_tick: f64,
}

impl CurveDetector {
    pub fn new(alpha: f64, recovery_per_tick: f64) -> Self {
        CurveDetector {
            effective: 1.0,
            alpha,
            recovery_per_tick,
        }
    }

    /// Current effective reduction without advancing it.
    pub fn effective(&self) -> f64 {
        self.effective
    }

    /// Advance one tick for the segment `previous -> current`, looking ahead to
    /// `next`. Returns the new effective reduction in (0, 1].
    pub fn detect(&mut self, previous: &Waypoint, current: &Waypoint, next: Option<&Waypoint>) -> f64 {
        let Some(next) = next else {
            self.effective = (self.effective + self.recovery_per_tick).min(1.0);
            return self.effective;
        };

        let target = match turn_angle(previous, current, next) {
            TurnAngle::Degrees(angle) => target_reduction(angle),
            // Zero-length leg: nothing to measure, hold the current value.
            TurnAngle::Undefined => return self.effective,
            // Non-finite geometry (e.g. antipodal points): treat as straight.
            TurnAngle::Unstable => 1.0,
        };

        let blended = self.effective * self.alpha + target * (1.0 - self.alpha);
        if blended.is_finite() {
            self.effective = blended.clamp(SHARP_TURN_REDUCTION, 1.0);
        }
        self.effective
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TurnAngle {
    Degrees(f64),
    Undefined,
    Unstable,
}

/// Absolute heading change at `current`, folded into [0, 180].
pub(crate) fn turn_angle(previous: &Waypoint, current: &Waypoint, next: &Waypoint) -> TurnAngle {
    if previous == current || current == next {
        return TurnAngle::Undefined;
    }
    let (Some(inbound), Some(outbound)) = (previous.bearing_to(current), current.bearing_to(next))
    else {
        return TurnAngle::Unstable;
    };

    let diff = (outbound - inbound).rem_euclid(360.0);
    let folded = if diff > 180.0 { 360.0 - diff } else { diff };
    if folded.is_finite() {
        TurnAngle::Degrees(folded)
    } else {
        TurnAngle::Unstable
    }
}

/// Monotonic band lookup: larger angles map to smaller targets.
pub fn target_reduction(turn_degrees: f64) -> f64 {
    CURVE_BANDS
        .iter()
        .find(|(upper, _)| turn_degrees < *upper)
        .map(|(_, reduction)| *reduction)
        .unwrap_or(SHARP_TURN_REDUCTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(lat: f64, lng: f64) -> Waypoint {
        Waypoint::new(lat, lng).unwrap()
    }

    #[test]
    fn bands_are_monotonic() {
        let angles = [0.0, 19.9, 20.0, 39.9, 45.0, 59.0, 75.0, 89.9, 90.0, 179.0];
        let targets: Vec<f64> = angles.iter().map(|a| target_reduction(*a)).collect();
        assert!(targets.windows(2).all(|w| w[1] <= w[0]), "{:?}", targets);
        assert_eq!(target_reduction(10.0), 1.0);
        assert_eq!(target_reduction(30.0), 0.85);
        assert_eq!(target_reduction(50.0), 0.75);
        assert_eq!(target_reduction(80.0), 0.65);
        assert_eq!(target_reduction(135.0), 0.50);
    }

    #[test]
    fn turn_angle_folds_into_half_circle() {
        let a = wp(0.0, 0.0);
        let b = wp(0.0, 0.001);
        let left = wp(0.001, 0.001);
        let right = wp(-0.001, 0.001);
        let straight = wp(0.0, 0.002);
        let back = wp(0.0, 0.0);

        let TurnAngle::Degrees(l) = turn_angle(&a, &b, &left) else { panic!() };
        let TurnAngle::Degrees(r) = turn_angle(&a, &b, &right) else { panic!() };
        let TurnAngle::Degrees(s) = turn_angle(&a, &b, &straight) else { panic!() };
        let TurnAngle::Degrees(u) = turn_angle(&a, &b, &back) else { panic!() };

        assert!((l - 90.0).abs() < 1e-3);
        assert!((r - 90.0).abs() < 1e-3);
        assert!(s < 1e-6);
        assert!((u - 180.0).abs() < 1e-6);
    }

    #[test]
    fn straight_line_keeps_full_speed() {
        let mut detector = CurveDetector::new(0.85, 0.05);
        let (a, b, c) = (wp(0.0, 0.0), wp(0.0, 0.001), wp(0.0, 0.002));
        for _ in 0..20 {
            assert_eq!(detector.detect(&a, &b, Some(&c)), 1.0);
        }
    }

    #[test]
    fn sharp_turn_blends_down_smoothly() {
        let mut detector = CurveDetector::new(0.85, 0.05);
        let (a, b, c) = (wp(0.0, 0.0), wp(0.0, 0.001), wp(0.001, 0.001));

        let mut previous = detector.effective();
        for _ in 0..40 {
            let value = detector.detect(&a, &b, Some(&c));
            assert!(value <= previous);
            // Never jumps by more than one blend step
            assert!(previous - value <= 0.15 * 0.5 + 1e-12);
            previous = value;
        }
        assert!(previous < 0.66);
        assert!(previous >= 0.5);
    }

    #[test]
    fn final_segment_recovers_at_fixed_rate() {
        let mut detector = CurveDetector::new(0.85, 0.05);
        let (a, b, c) = (wp(0.0, 0.0), wp(0.0, 0.001), wp(0.001, 0.001));
        for _ in 0..30 {
            detector.detect(&a, &b, Some(&c));
        }
        let low = detector.effective();

        let next = detector.detect(&b, &c, None);
        assert!((next - (low + 0.05)).abs() < 1e-12);

        for _ in 0..30 {
            detector.detect(&b, &c, None);
        }
        assert_eq!(detector.effective(), 1.0);
    }

    #[test]
    fn zero_length_leg_holds_previous_value() {
        let mut detector = CurveDetector::new(0.85, 0.05);
        let (a, b, c) = (wp(0.0, 0.0), wp(0.0, 0.001), wp(0.001, 0.001));
        for _ in 0..5 {
            detector.detect(&a, &b, Some(&c));
        }
        let held = detector.effective();
        assert_eq!(detector.detect(&b, &b, Some(&c)), held);
        assert_eq!(detector.detect(&a, &b, Some(&b)), held);
    }

    #[test]
    fn antipodal_points_never_produce_nan() {
        let mut detector = CurveDetector::new(0.85, 0.05);
        let value = detector.detect(&wp(0.0, 0.0), &wp(0.0, 180.0), Some(&wp(0.0, 0.0)));
        assert!(value.is_finite());
        assert!(value > 0.0 && value <= 1.0);

        let value = detector.detect(&wp(90.0, 0.0), &wp(-90.0, 0.0), Some(&wp(90.0, 0.0)));
        assert!(value.is_finite());
    }
}
