//! F1 (circle fit, bending plane Z,Y) and F2 (line fit, non-bending
//! plane X,Z) — spec.md §4.3, §4.4 — plus the TDC-to-drift-radius
//! inversion both fits feed into each reconstruction cycle (§4.5).

use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::{DigitizerConfig, FIT_SIGMA_MM, V_SIGNAL_MM_PER_NS};
use crate::error::FitStatus;
use crate::geometry::{Cell, ReadoutEnd};
use crate::helix::{Circle2D, Line2D};
use crate::minimizer::minimize;

/// Resolve the left-right drift ambiguity: of the two candidate
/// positions `center +/- radius`, keep whichever is closer to the
/// current estimate (spec.md §4.5). Without a prior estimate, callers
/// pass `wire_transverse` itself so the "+" side wins deterministically.
pub fn resolve_drift_sign(wire_transverse: f64, drift_radius: f64, predicted: f64) -> f64 {
    let plus = wire_transverse + drift_radius;
    let minus = wire_transverse - drift_radius;
    if (plus - predicted).abs() <= (minus - predicted).abs() {
        plus
    } else {
        minus
    }
}

/// Report attached to a fit result (spec.md §7.4): never silently
/// discarded, always returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub status: FitStatus,
    pub iterations: usize,
    pub chi_square: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleFitResult {
    pub circle: Circle2D,
    pub report: FitReport,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFitResult {
    pub line: Line2D,
    pub report: FitReport,
}

/// Kasa algebraic circle seed: solve the linear least-squares system for
/// `z^2 + y^2 + D*z + E*y + F = 0`.
pub fn fit_circle_kasa(points: &[(f64, f64)]) -> Option<Circle2D> {
    let n = points.len();
    if n < 3 {
        return None;
    }

    let mut ata = Matrix3::zeros();
    let mut atb = Vector3::zeros();
    for &(z, y) in points {
        let row = Vector3::new(z, y, 1.0);
        ata += row * row.transpose();
        atb += row * (-(z * z + y * y));
    }

    let solution = ata.try_inverse()? * atb;
    let (d, e, f) = (solution[0], solution[1], solution[2]);
    let center = Point2::new(-d / 2.0, -e / 2.0);
    let radius_sq = center.x * center.x + center.y * center.y - f;
    if radius_sq <= 0.0 {
        return None;
    }
    Some(Circle2D { center, radius: radius_sq.sqrt() })
}

/// Nonlinear refinement of a circle seed, minimizing the sum of squared
/// impact-parameter residuals (spec.md §4.3).
pub fn refine_circle(seed: Circle2D, points: &[(f64, f64)], max_iterations: usize) -> CircleFitResult {
    if points.len() < 3 {
        return CircleFitResult {
            circle: seed,
            report: FitReport { status: FitStatus::DegenerateInput, iterations: 0, chi_square: 0.0 },
        };
    }

    let objective = |x: &[f64]| -> f64 {
        let circle = Circle2D { center: Point2::new(x[0], x[1]), radius: x[2] };
        points.iter().map(|&(z, y)| (circle.distance_to_point(z, y) / FIT_SIGMA_MM).powi(2)).sum()
    };

    let result = minimize(objective, &[seed.center.x, seed.center.y, seed.radius], 1.0, max_iterations);
    let circle = Circle2D { center: Point2::new(result.x[0], result.x[1]), radius: result.x[2].abs() };

    CircleFitResult {
        circle,
        report: FitReport { status: result.status, iterations: result.iterations, chi_square: result.fval },
    }
}

/// Ordinary least-squares line seed: `x = slope * z + intercept`.
pub fn fit_line_ols(points: &[(f64, f64)]) -> Option<Line2D> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }
    let sum_z: f64 = points.iter().map(|&(z, _)| z).sum();
    let sum_x: f64 = points.iter().map(|&(_, x)| x).sum();
    let sum_zz: f64 = points.iter().map(|&(z, _)| z * z).sum();
    let sum_zx: f64 = points.iter().map(|&(z, x)| z * x).sum();

    let denom = n * sum_zz - sum_z * sum_z;
    if denom.abs() < 1e-9 {
        return None;
    }
    let slope = (n * sum_zx - sum_z * sum_x) / denom;
    let intercept = (sum_x - slope * sum_z) / n;
    Some(Line2D { slope, intercept })
}

/// Nonlinear refinement of a line seed (spec.md §4.4). Linear
/// regression is already optimal under Gaussian noise; this refit
/// exists so the line fit follows the same cycle-by-cycle reweighting
/// pattern as the circle fit once drift radii change between cycles.
pub fn refine_line(seed: Line2D, points: &[(f64, f64)], max_iterations: usize) -> LineFitResult {
    if points.len() < 2 {
        return LineFitResult {
            line: seed,
            report: FitReport { status: FitStatus::DegenerateInput, iterations: 0, chi_square: 0.0 },
        };
    }

    let objective = |x: &[f64]| -> f64 {
        let line = Line2D { slope: x[0], intercept: x[1] };
        points.iter().map(|&(z, val)| (line.distance_to_point(z, val) / FIT_SIGMA_MM).powi(2)).sum()
    };

    let result = minimize(objective, &[seed.slope, seed.intercept], 0.01, max_iterations);
    let line = Line2D { slope: result.x[0], intercept: result.x[1] };

    LineFitResult { line, report: FitReport { status: result.status, iterations: result.iterations, chi_square: result.fval } }
}

/// Invert a wire's TDC into a drift radius (spec.md §4.5).
///
/// `missing_coordinate_point` is the current best 3D estimate of the
/// track at this wire's plane — its projection onto the wire supplies
/// the along-wire coordinate the signal-propagation term needs.
/// `time_of_flight_ns` is the current estimate of how long the particle
/// took to reach the plane; both come from the previous reconstruction
/// cycle's helix (or zero, on the first cycle).
///
/// Falls back to the wire center (zero drift radius) when the inverted
/// value would be negative or non-finite — a TDC below the
/// signal+hit-time floor cannot represent a real drift time.
pub fn invert_tdc_to_drift_radius(
    tdc_ns: f64,
    cell: &Cell,
    missing_coordinate_point: Point3<f64>,
    time_of_flight_ns: f64,
    config: &DigitizerConfig,
) -> f64 {
    let dir = (cell.wire.endpoint_b - cell.wire.endpoint_a) / cell.wire.length;
    let along = (missing_coordinate_point - cell.wire.endpoint_a).dot(&dir);

    let t_signal = if config.include_signal_propagation {
        let readout_distance = match cell.wire.readout_end {
            ReadoutEnd::A => along,
            ReadoutEnd::B => cell.wire.length - along,
        };
        readout_distance.max(0.0) / V_SIGNAL_MM_PER_NS
    } else {
        0.0
    };
    let t_hit = if config.include_hit_time { time_of_flight_ns } else { 0.0 };

    let t_drift = tdc_ns - t_signal - t_hit;
    if !t_drift.is_finite() || t_drift < 0.0 {
        0.0
    } else {
        t_drift * cell.v_drift
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn circle_points(center: Point2<f64>, radius: f64, n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let theta = (i as f64) / (n as f64) * std::f64::consts::PI;
                (center.x + radius * theta.cos(), center.y + radius * theta.sin())
            })
            .collect()
    }

    #[test]
    fn kasa_seed_recovers_exact_circle() {
        let points = circle_points(Point2::new(1000.0, 20.0), 800.0, 12);
        let circle = fit_circle_kasa(&points).expect("enough points");
        assert_relative_eq!(circle.center.x, 1000.0, epsilon = 1e-3);
        assert_relative_eq!(circle.center.y, 20.0, epsilon = 1e-3);
        assert_relative_eq!(circle.radius, 800.0, epsilon = 1e-3);
    }

    #[test]
    fn circle_refine_converges_from_a_perturbed_seed() {
        let points = circle_points(Point2::new(1000.0, 20.0), 800.0, 12);
        let seed = Circle2D { center: Point2::new(990.0, 25.0), radius: 790.0 };
        let result = refine_circle(seed, &points, 2000);
        assert_relative_eq!(result.circle.radius, 800.0, epsilon = 1.0);
    }

    #[test]
    fn line_ols_recovers_exact_line() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64 * 100.0, 5.0 + 0.2 * i as f64 * 100.0)).collect();
        let line = fit_line_ols(&points).expect("enough points");
        assert_relative_eq!(line.slope, 0.2, epsilon = 1e-6);
        assert_relative_eq!(line.intercept, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn drift_sign_resolves_toward_the_prior_estimate() {
        let resolved = resolve_drift_sign(0.0, 2.0, 1.5);
        assert_relative_eq!(resolved, 2.0, epsilon = 1e-9);
        let resolved = resolve_drift_sign(0.0, 2.0, -1.5);
        assert_relative_eq!(resolved, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn negative_inverted_drift_time_falls_back_to_wire_center() {
        use crate::geometry::{Cell, Wire};
        let wire = Wire {
            id: 1,
            endpoint_a: Point3::new(-100.0, 0.0, 0.0),
            endpoint_b: Point3::new(100.0, 0.0, 0.0),
            center: Point3::new(0.0, 0.0, 0.0),
            length: 200.0,
            orientation: 0,
            readout_end: ReadoutEnd::A,
        };
        let cell = Cell { id: 1, wire, transverse_coord: 0.0, width: 10.0, depth: 5.0, v_drift: 0.05, adjacent: Vec::new() };
        let config = DigitizerConfig::default();
        let radius = invert_tdc_to_drift_radius(0.0, &cell, Point3::new(0.0, 0.0, 0.0), 10.0, &config);
        assert_eq!(radius, 0.0);
    }
}
