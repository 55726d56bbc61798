//! Boustrophedon raster synthesis with velocity-continuous turnarounds.
//!
//! The pattern is built on an abstract pixel grid in units of the scan
//! separation. Rows alternate direction so the dish never retraces a row,
//! and every row-to-row transition gets a turnaround segment: a quadratic
//! ease-out deceleration running past the row end, an 8-step arc connecting
//! the two rows, and the mirrored acceleration into the next row. The mount
//! is therefore never asked for an instantaneous speed change.

use std::f64::consts::PI;

use crate::core::ScanPoint;

/// How far (in separations) the dish overshoots the row end while slowing
/// down before the turn arc. The arc is centered at this overshoot.
const TURN_RUN_OUT: f64 = 2.0;

/// Number of subdivisions of the turn arc.
const ARC_STEPS: usize = 8;

/// Integer shape of the raster grid.
#[derive(Debug, Clone, Copy)]
pub struct RasterShape {
    /// Separations per row; a row carries `x_steps + 1` samples.
    pub x_steps: usize,
    /// Number of rows.
    pub rows: usize,
    /// Samples in each of the deceleration and acceleration phases.
    pub slow_down_steps: usize,
    /// Outward bulge of the turn arc, in separations.
    pub turn_bulge: f64,
}

impl RasterShape {
    /// Total sample count of the raster, including turnarounds.
    pub fn sample_count(&self) -> usize {
        let per_row = self.x_steps + 1;
        let per_turn = 2 * self.slow_down_steps + (ARC_STEPS - 1);
        self.rows * per_row + self.rows.saturating_sub(1) * per_turn
    }
}

/// Rotate a point counterclockwise about the origin by `angle_deg` degrees.
pub fn rotate(x: f64, y: f64, angle_deg: f64) -> (f64, f64) {
    let (sin_a, cos_a) = angle_deg.to_radians().sin_cos();
    (cos_a * x - sin_a * y, sin_a * x + cos_a * y)
}

/// Build the unrotated raster in separation units.
///
/// Row interiors are on-source; the two row-boundary samples and every
/// turnaround sample are off-source. Rows are centered on the origin in
/// both axes.
pub fn build_raster(shape: &RasterShape) -> Vec<ScanPoint> {
    let half_x = shape.x_steps as f64 / 2.0;
    let y_first = -(shape.rows as f64 - 1.0) / 2.0;

    let mut points = Vec::with_capacity(shape.sample_count());
    for j in 0..shape.rows {
        let y = y_first + j as f64;
        // Even rows run with increasing x, odd rows back the other way.
        let direction = if j % 2 == 0 { 1.0 } else { -1.0 };

        for i in 0..=shape.x_steps {
            let x = (-half_x + i as f64) * direction;
            let boundary = i == 0 || i == shape.x_steps;
            points.push(ScanPoint {
                x,
                y,
                on_source: !boundary,
            });
        }

        if j + 1 < shape.rows {
            push_turnaround(&mut points, shape, direction, half_x, y, y + 1.0);
        }
    }
    points
}

/// Quadratic ease-out: distance covered after fraction `t` of the phase,
/// normalized so the full phase covers [`TURN_RUN_OUT`] separations.
fn ease_out(t: f64) -> f64 {
    TURN_RUN_OUT * t * (2.0 - t)
}

fn push_turnaround(
    points: &mut Vec<ScanPoint>,
    shape: &RasterShape,
    side: f64,
    half_x: f64,
    y_from: f64,
    y_to: f64,
) {
    let n = shape.slow_down_steps;
    let off = |x: f64, y: f64| ScanPoint {
        x,
        y,
        on_source: false,
    };

    // Deceleration past the row end, still on the finished row.
    for k in 1..=n {
        let t = k as f64 / n as f64;
        points.push(off(side * (half_x + ease_out(t)), y_from));
    }

    // Arc connecting the two rows, bulging outward past the run-out.
    let y_mid = 0.5 * (y_from + y_to);
    let y_half_span = 0.5 * (y_to - y_from);
    for k in 1..ARC_STEPS {
        let phase = k as f64 * PI / ARC_STEPS as f64;
        let x = side * (half_x + TURN_RUN_OUT + shape.turn_bulge * phase.sin());
        let y = y_mid - y_half_span * phase.cos();
        points.push(off(x, y));
    }

    // Mirrored acceleration into the next row.
    for k in (1..=n).rev() {
        let t = k as f64 / n as f64;
        points.push(off(side * (half_x + ease_out(t)), y_to));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn shape() -> RasterShape {
        RasterShape {
            x_steps: 4,
            rows: 2,
            slow_down_steps: 4,
            turn_bulge: 0.5,
        }
    }

    #[test]
    fn two_row_scenario_spans_expected_range() {
        let points = build_raster(&shape());

        // Two rows, centered on the origin.
        assert_eq!(points.first().unwrap().y, -0.5);
        assert_eq!(points.last().unwrap().y, 0.5);

        // Row samples span x in [-2, 2].
        let xs: Vec<f64> = points.iter().take(5).map(|p| p.x).collect();
        assert_eq!(xs, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn row_boundaries_are_off_source() {
        let points = build_raster(&shape());
        let first_row = &points[..5];
        assert!(!first_row[0].on_source);
        assert!(first_row[1].on_source);
        assert!(first_row[2].on_source);
        assert!(first_row[3].on_source);
        assert!(!first_row[4].on_source);
    }

    #[test]
    fn turnaround_points_are_off_source() {
        let points = build_raster(&shape());
        // Between the two rows: 5 row samples, then 4 + 7 + 4 turn samples.
        for p in &points[5..20] {
            assert!(!p.on_source, "turnaround sample flagged on-source: {p:?}");
        }
    }

    #[test]
    fn sample_count_is_deterministic() {
        let s = shape();
        let expected = 2 * 5 + (2 * 4 + 7);
        assert_eq!(s.sample_count(), expected);
        assert_eq!(build_raster(&s).len(), expected);
        assert_eq!(build_raster(&s).len(), build_raster(&s).len());
    }

    #[test]
    fn alternate_rows_reverse_direction() {
        let points = build_raster(&shape());
        let second_row = &points[20..25];
        let xs: Vec<f64> = second_row.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![2.0, 1.0, 0.0, -1.0, -2.0]);
    }

    #[test]
    fn turnaround_is_velocity_continuous() {
        // No step between consecutive samples may exceed twice the row
        // sample spacing; a discontinuous turn would jump much farther.
        let points = build_raster(&RasterShape {
            x_steps: 6,
            rows: 3,
            slow_down_steps: 4,
            turn_bulge: 0.5,
        });
        for pair in points.windows(2) {
            let dx = pair[1].x - pair[0].x;
            let dy = pair[1].y - pair[0].y;
            let step = (dx * dx + dy * dy).sqrt();
            assert!(step <= 2.0, "discontinuous step of {step} separations");
        }
    }

    proptest! {
        #[test]
        fn rotation_roundtrip(theta in -360.0f64..360.0, x in -10.0f64..10.0, y in -10.0f64..10.0) {
            let (rx, ry) = rotate(x, y, theta);
            let (bx, by) = rotate(rx, ry, -theta);
            prop_assert!((bx - x).abs() < 1e-9);
            prop_assert!((by - y).abs() < 1e-9);
        }

        #[test]
        fn rotation_preserves_radius(theta in -360.0f64..360.0, x in -10.0f64..10.0, y in -10.0f64..10.0) {
            let (rx, ry) = rotate(x, y, theta);
            prop_assert!(((rx * rx + ry * ry) - (x * x + y * y)).abs() < 1e-6);
        }
    }
}
