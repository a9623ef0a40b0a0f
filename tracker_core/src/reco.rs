//! Reconstructor orchestration (spec.md §4.6): seed, iterate TDC
//! inversion and refit for a fixed number of cycles, then combine the
//! circle and line fits into one 3D helix.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::DigitizerConfig;
use crate::digitizer::WireHit;
use crate::error::ReconstructionError;
use crate::fit::{fit_circle_kasa, fit_line_ols, invert_tdc_to_drift_radius, refine_circle, refine_line, resolve_drift_sign, FitReport};
use crate::geometry::GeometryIndex;
use crate::helix::Helix;

const NELDER_MEAD_MAX_ITERATIONS: usize = 500;

/// Everything the reconstructor produced for one event, always emitted
/// 1-to-1 with its input hit collection (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoResult {
    pub helix: Helix,
    pub momentum_gev: Vector3<f64>,
    pub circle_report: FitReport,
    pub line_report: FitReport,
    pub n_cycles: usize,
    pub n_horizontal_hits: usize,
    pub n_vertical_hits: usize,
}

struct ProjectionHit {
    cell_id: u64,
    z: f64,
    wire_transverse: f64,
    tdc_ns: f64,
    true_drift_radius_mm: f64,
}

fn split_by_orientation(hits: &[WireHit], geometry: &GeometryIndex) -> (Vec<ProjectionHit>, Vec<ProjectionHit>) {
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();

    for hit in hits {
        let (plane_id, _) = crate::ids::decode_cell_id(hit.cell_id);
        let Some(plane) = geometry.plane_by_id(plane_id) else { continue };
        let Some(cell) = plane.cell_by_id(hit.cell_id) else { continue };

        let projection = ProjectionHit {
            cell_id: hit.cell_id,
            z: plane.z(),
            wire_transverse: cell.transverse_coord,
            tdc_ns: hit.tdc_ns,
            true_drift_radius_mm: hit.true_drift_radius_mm,
        };
        match cell.wire.orientation {
            0 => horizontal.push(projection),
            _ => vertical.push(projection),
        }
    }

    (horizontal, vertical)
}

/// Run the full reconstruction cycle (spec.md §4.6) over one event's
/// wire hits.
pub fn reconstruct(
    hits: &[WireHit],
    geometry: &GeometryIndex,
    digitizer_config: &DigitizerConfig,
    b_field_tesla: f64,
    n_cycles: usize,
) -> Result<RecoResult, ReconstructionError> {
    let (horizontal, vertical) = split_by_orientation(hits, geometry);
    if horizontal.is_empty() {
        return Err(ReconstructionError::NoHorizontalHits);
    }
    if vertical.is_empty() {
        return Err(ReconstructionError::NoVerticalHits);
    }

    // Cycle 0 seed: invert TDC ignoring signal/hit-time corrections
    // (no track estimate exists yet to supply the missing coordinate).
    // `use_non_smeared_track` bypasses digitization noise entirely and
    // seeds straight from the true drift radius a synthetic digitizer
    // attached to the hit — a validation mode for exercising the fit and
    // minimizer independent of TDC smearing.
    let mut circle_points: Vec<(f64, f64)> = horizontal
        .iter()
        .map(|h| {
            let radius = if digitizer_config.use_non_smeared_track {
                h.true_drift_radius_mm
            } else {
                let cell = geometry.cell_by_global_id(h.cell_id).expect("hit resolves to a cell");
                (h.tdc_ns * cell.v_drift).max(0.0)
            };
            (h.z, resolve_drift_sign(h.wire_transverse, radius, h.wire_transverse))
        })
        .collect();
    let mut line_points: Vec<(f64, f64)> = vertical
        .iter()
        .map(|v| {
            let radius = if digitizer_config.use_non_smeared_track {
                v.true_drift_radius_mm
            } else {
                let cell = geometry.cell_by_global_id(v.cell_id).expect("hit resolves to a cell");
                (v.tdc_ns * cell.v_drift).max(0.0)
            };
            (v.z, resolve_drift_sign(v.wire_transverse, radius, v.wire_transverse))
        })
        .collect();

    let mut circle_seed = fit_circle_kasa(&circle_points).ok_or(ReconstructionError::NoHorizontalHits)?;
    let mut line_seed = fit_line_ols(&line_points).ok_or(ReconstructionError::NoVerticalHits)?;

    let mut circle_fit = refine_circle(circle_seed, &circle_points, NELDER_MEAD_MAX_ITERATIONS);
    let mut line_fit = refine_line(line_seed, &line_points, NELDER_MEAD_MAX_ITERATIONS);

    for _ in 1..n_cycles.max(1) {
        circle_points = horizontal
            .iter()
            .map(|h| {
                let radius = if digitizer_config.use_non_smeared_track {
                    h.true_drift_radius_mm
                } else {
                    let cell = geometry.cell_by_global_id(h.cell_id).expect("hit resolves to a cell");
                    let x_est = line_fit.line.x_at(h.z);
                    let missing = Point3::new(x_est, h.wire_transverse, h.z);
                    invert_tdc_to_drift_radius(h.tdc_ns, cell, missing, 0.0, digitizer_config)
                };
                let predicted_y = circle_y_at_z(&circle_fit.circle, h.z).unwrap_or(h.wire_transverse);
                (h.z, resolve_drift_sign(h.wire_transverse, radius, predicted_y))
            })
            .collect();

        line_points = vertical
            .iter()
            .map(|v| {
                let radius = if digitizer_config.use_non_smeared_track {
                    v.true_drift_radius_mm
                } else {
                    let cell = geometry.cell_by_global_id(v.cell_id).expect("hit resolves to a cell");
                    let y_est = circle_y_at_z(&circle_fit.circle, v.z).unwrap_or(v.wire_transverse);
                    let missing = Point3::new(v.wire_transverse, y_est, v.z);
                    invert_tdc_to_drift_radius(v.tdc_ns, cell, missing, 0.0, digitizer_config)
                };
                let predicted_x = line_fit.line.x_at(v.z);
                (v.z, resolve_drift_sign(v.wire_transverse, radius, predicted_x))
            })
            .collect();

        circle_seed = fit_circle_kasa(&circle_points).unwrap_or(circle_fit.circle);
        line_seed = fit_line_ols(&line_points).unwrap_or(line_fit.line);
        circle_fit = refine_circle(circle_seed, &circle_points, NELDER_MEAD_MAX_ITERATIONS);
        line_fit = refine_line(line_seed, &line_points, NELDER_MEAD_MAX_ITERATIONS);
    }

    if circle_fit.report.status != crate::error::FitStatus::Converged {
        tracing::warn!(status = ?circle_fit.report.status, "circle fit did not converge");
    }
    if line_fit.report.status != crate::error::FitStatus::Converged {
        tracing::warn!(status = ?line_fit.report.status, "line fit did not converge");
    }

    let helix = combine_into_helix(&circle_fit.circle, &line_fit.line, &circle_points);
    let momentum_gev = helix.momentum_at_origin(b_field_tesla);

    Ok(RecoResult {
        helix,
        momentum_gev,
        circle_report: circle_fit.report,
        line_report: line_fit.report,
        n_cycles: n_cycles.max(1),
        n_horizontal_hits: horizontal.len(),
        n_vertical_hits: vertical.len(),
    })
}

/// Solve the bending circle for `y` at a given `z`, picking the branch
/// with the larger `y` (an arbitrary but consistent convention — the
/// ambiguity only matters for the very first cycle's prediction, and is
/// resolved away by subsequent refits).
fn circle_y_at_z(circle: &crate::helix::Circle2D, z: f64) -> Option<f64> {
    let dz = z - circle.center.x;
    let under_sqrt = circle.radius * circle.radius - dz * dz;
    if under_sqrt < 0.0 {
        return None;
    }
    Some(circle.center.y + under_sqrt.sqrt())
}

/// Combine the bending-plane circle and non-bending-plane line into a
/// 3D helix (spec.md §4.6). The vertex is anchored at the
/// lowest-|z| horizontal measurement actually used by the fit, so the
/// helicity and phase derivation never has to invert an ambiguous
/// branch of the circle equation.
///
/// Helicity is fixed to `+1`: a circle/line fit alone cannot
/// distinguish the sign of the charge without an external timing or
/// calorimetric hint, so this reconstructor reports the magnitude-only
/// helix and leaves charge assignment to a downstream consumer that has
/// that information.
fn combine_into_helix(circle: &crate::helix::Circle2D, line: &crate::helix::Line2D, circle_points: &[(f64, f64)]) -> Helix {
    let helicity = 1.0;
    let dip = line.slope.atan();

    let (z0, y0) = circle_points
        .iter()
        .copied()
        .min_by(|a, b| a.0.abs().partial_cmp(&b.0.abs()).unwrap())
        .unwrap_or((0.0, circle.center.y + circle.radius));

    let x0 = line.x_at(z0);
    let origin = Point3::new(x0, y0, z0);

    let sin_phi0 = ((z0 - circle.center.x) / circle.radius).clamp(-1.0, 1.0);
    let cos_phi0 = (helicity * (y0 - circle.center.y) / circle.radius).clamp(-1.0, 1.0);
    let phi0 = sin_phi0.atan2(cos_phi0);

    Helix::new(circle.radius, dip, phi0, helicity, origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometryConfig;
    use crate::digitizer::digitize_from_helix;
    use crate::geometry::{GeometryIndex, Transform2, VolumeNode, VolumeShape};

    fn two_view_geometry() -> GeometryIndex {
        let mut config = GeometryConfig::default();
        config.orientations.insert(0, crate::config::OrientationConfig { angle: 0.0, offset: 0.0, spacing: 10.0, min_length: 10.0, v_drift: 0.05 });
        config.orientations.insert(1, crate::config::OrientationConfig { angle: std::f64::consts::FRAC_PI_2, offset: 0.0, spacing: 10.0, min_length: 10.0, v_drift: 0.05 });

        let mut root = VolumeNode {
            name: "module".into(),
            shape: VolumeShape::BBox { half_x: 600.0, half_y: 300.0, half_z: 300.0 },
            to_parent: Transform2::identity(),
            children: Vec::new(),
        };
        for i in 0..8 {
            let z = 900.0 + (i as f64) * 20.0;
            let kind = if i % 2 == 0 { "drift_plane_0" } else { "drift_plane_1" };
            root.children.push(VolumeNode::leaf(
                kind,
                VolumeShape::BBox { half_x: 500.0, half_y: 250.0, half_z: 5.0 },
                Transform2 { rotation_rad: 0.0, translation: Vector3::new(0.0, 0.0, z) },
            ));
        }
        GeometryIndex::build(&root, &config).unwrap()
    }

    #[test]
    fn reconstructs_a_nearly_straight_track() {
        let geometry = two_view_geometry();
        let helix = Helix::new(50_000.0, 0.02, 0.0, 1.0, Point3::new(0.0, 0.0, 900.0));
        let digitizer_config = DigitizerConfig { include_tdc_smearing: false, ..Default::default() };
        let hits = digitize_from_helix(&helix, &geometry, &digitizer_config, None).unwrap();

        let result = reconstruct(&hits, &geometry, &digitizer_config, 0.6, 3).unwrap();
        assert!(result.n_horizontal_hits > 0);
        assert!(result.n_vertical_hits > 0);
        assert!(result.helix.radius > 1000.0);
    }

    #[test]
    fn non_smeared_track_toggle_seeds_from_the_true_drift_radius() {
        let geometry = two_view_geometry();
        let helix = Helix::new(50_000.0, 0.02, 0.0, 1.0, Point3::new(0.0, 0.0, 900.0));
        let noisy_config = DigitizerConfig { include_tdc_smearing: false, ..Default::default() };
        let hits = digitize_from_helix(&helix, &geometry, &noisy_config, None).unwrap();

        let truth_config = DigitizerConfig { use_non_smeared_track: true, ..Default::default() };
        let result = reconstruct(&hits, &geometry, &truth_config, 0.6, 3).unwrap();
        assert!(result.n_horizontal_hits > 0);
        assert!(result.n_vertical_hits > 0);
    }

    #[test]
    fn missing_one_projection_is_an_error() {
        let geometry = two_view_geometry();
        let only_horizontal: Vec<WireHit> = geometry
            .planes()
            .iter()
            .filter(|p| p.local_id == 0)
            .flat_map(|p| p.cells().iter().map(|c| WireHit { cell_id: c.id, tdc_ns: 5.0, true_drift_radius_mm: 1.0 }))
            .collect();
        let digitizer_config = DigitizerConfig::default();
        let err = reconstruct(&only_horizontal, &geometry, &digitizer_config, 0.6, 3).unwrap_err();
        assert_eq!(err, ReconstructionError::NoVerticalHits);
    }
}
