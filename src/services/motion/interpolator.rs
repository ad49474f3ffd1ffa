use crate::models::Waypoint;
use rand::distr::{Distribution, StandardUniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A point along a segment, before and after receiver-noise jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedPosition {
    /// Noise-free point; equals the segment end bit-for-bit at fraction 1.
    pub exact: Waypoint,
    /// What gets emitted to consumers.
    pub reported: Waypoint,
    pub fraction: f64,
}

/// Places the simulated device along a segment and adds bounded jitter to the
/// reported point. Jitter never feeds back into distance bookkeeping.
pub struct PositionInterpolator {
    max_jitter_m: f64,
    rng: StdRng,
}

impl PositionInterpolator {
    pub fn new(max_jitter_m: f64, seed: u64) -> Self {
        PositionInterpolator {
            max_jitter_m: max_jitter_m.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn interpolate(
        &mut self,
        segment_start: &Waypoint,
        segment_end: &Waypoint,
        traveled_m: f64,
    ) -> InterpolatedPosition {
        let (exact, fraction) = exact_position(segment_start, segment_end, traveled_m);
        InterpolatedPosition {
            exact,
            reported: self.jitter(&exact),
            fraction,
        }
    }

    fn jitter(&mut self, point: &Waypoint) -> Waypoint {
        if self.max_jitter_m <= 0.0 {
            return *point;
        }
        let u_radius: f64 = StandardUniform.sample(&mut self.rng);
        let u_angle: f64 = StandardUniform.sample(&mut self.rng);
        // sqrt keeps the offsets uniform over the disc instead of piling up at the center
        let radius = self.max_jitter_m * u_radius.sqrt();
        let angle = u_angle * std::f64::consts::TAU;
        point.offset_m(radius * angle.cos(), radius * angle.sin())
    }
}

/// Noise-free position `traveled_m` along the segment and the clamped fraction.
pub fn exact_position(start: &Waypoint, end: &Waypoint, traveled_m: f64) -> (Waypoint, f64) {
    let length = start.distance_m(end);
    let fraction = if length > 0.0 && length.is_finite() {
        (traveled_m / length).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let point = if fraction >= 1.0 {
        *end
    } else if fraction <= 0.0 {
        *start
    } else {
        start.lerp(end, fraction)
    };
    (point, fraction)
}
