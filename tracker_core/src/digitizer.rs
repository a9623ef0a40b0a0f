//! Digitization (spec.md §4.2): turn a truth helix or MC energy-deposit
//! segments into per-wire TDC hits.
//!
//! `tdc = t_drift + t_signal + t_hit`, each term individually toggled by
//! [`DigitizerConfig`] (spec.md §6 "Toggles").

use nalgebra::Point3;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use rand_distr::{Distribution, Normal};

use crate::config::{DigitizerConfig, HELIX_Z_WINDOW_MM, SPEED_OF_LIGHT_MM_PER_NS, TDC_SMEARING_SIGMA_NS, V_SIGNAL_MM_PER_NS};
use crate::error::DigitizerError;
use crate::geometry::{Cell, GeometryIndex};
use crate::helix::Helix;

/// One fired wire: its global id and the TDC value the readout
/// electronics would have measured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireHit {
    pub cell_id: u64,
    pub tdc_ns: f64,
    /// Drift radius used to build this hit, kept for tests and for
    /// comparing against the fitter's inverted value.
    pub true_drift_radius_mm: f64,
}

/// A short MC energy-deposit step: a straight segment with the energy
/// deposited along it and the time at its start (spec.md §2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyDepositSegment {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
    pub t0_ns: f64,
    pub energy_deposit_mev: f64,
}

/// Unsigned distance from `point` to the infinite line through the
/// wire's two endpoints, plus the arc-length-like coordinate of the
/// closest point along that line (used for signal-propagation time).
fn point_to_wire_line(point: Point3<f64>, cell: &Cell) -> (f64, f64) {
    let a = cell.wire.endpoint_a;
    let dir = cell.wire.endpoint_b - a;
    let len2 = dir.norm_squared();
    if len2 < 1e-12 {
        return ((point - a).norm(), 0.0);
    }
    let t = (point - a).dot(&dir) / len2;
    let closest = a + dir * t;
    ((point - closest).norm(), t * dir.norm())
}

/// A wire fires when the drift circle of radius `drift_radius` can still
/// reach the far corner of its cell — the cell's half-diagonal, not its
/// half-width, since the cell also extends `depth` along the beam.
fn firing_radius(cell: &Cell) -> f64 {
    0.5 * (cell.width * cell.width + cell.depth * cell.depth).sqrt()
}

fn signal_propagation_time(cell: &Cell, distance_along_wire_from_a: f64) -> f64 {
    let readout_distance = match cell.wire.readout_end {
        crate::geometry::ReadoutEnd::A => distance_along_wire_from_a,
        crate::geometry::ReadoutEnd::B => cell.wire.length - distance_along_wire_from_a,
    };
    readout_distance.max(0.0) / V_SIGNAL_MM_PER_NS
}

/// Minimize `f` over `[lo, hi]` by ternary search, assuming `f` is
/// unimodal on the interval (true near a helix's closest approach to a
/// single wire within the z-window used here).
fn ternary_search_min(mut lo: f64, mut hi: f64, f: impl Fn(f64) -> f64) -> f64 {
    for _ in 0..60 {
        if (hi - lo).abs() < 1e-6 {
            break;
        }
        let m1 = lo + (hi - lo) / 3.0;
        let m2 = hi - (hi - lo) / 3.0;
        if f(m1) < f(m2) {
            hi = m2;
        } else {
            lo = m1;
        }
    }
    (lo + hi) / 2.0
}

fn maybe_smear(tdc: f64, sigma: f64, rng: Option<&mut dyn RngCore>) -> f64 {
    match rng {
        Some(rng) => {
            let normal = Normal::new(0.0, sigma).expect("sigma > 0");
            tdc + normal.sample(rng)
        }
        None => tdc,
    }
}

/// Digitize a truth helix against every wire in `geometry`, restricted
/// to wires whose plane lies within [`HELIX_Z_WINDOW_MM`] of a point the
/// helix actually reaches (spec.md §4.2.1).
pub fn digitize_from_helix(
    helix: &Helix,
    geometry: &GeometryIndex,
    config: &DigitizerConfig,
    mut rng: Option<&mut dyn RngCore>,
) -> Result<Vec<WireHit>, DigitizerError> {
    let mut hits = Vec::new();

    for plane in geometry.planes() {
        let z_lo = plane.z() - HELIX_Z_WINDOW_MM;
        let z_hi = plane.z() + HELIX_Z_WINDOW_MM;

        let phi_lo = helix.phi_from_z(z_lo);
        let phi_hi = helix.phi_from_z(z_hi);
        let (phi_lo, phi_hi) = match (phi_lo, phi_hi) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };

        let s_a = helix.s_from_phi(phi_lo);
        let s_b = helix.s_from_phi(phi_hi);
        let (s_lo, s_hi) = if s_a <= s_b { (s_a, s_b) } else { (s_b, s_a) };

        for cell in plane.cells() {
            let objective = |s: f64| {
                let p = helix.position_at_s(s);
                point_to_wire_line(p, cell).0
            };
            let s_best = ternary_search_min(s_lo, s_hi, objective);
            let point_best = helix.position_at_s(s_best);
            let (drift_radius, along_wire) = point_to_wire_line(point_best, cell);

            if drift_radius > firing_radius(cell) {
                continue;
            }
            if along_wire < 0.0 || along_wire > cell.wire.length {
                continue;
            }

            let t_drift = drift_radius / cell.v_drift;
            let t_signal = if config.include_signal_propagation { signal_propagation_time(cell, along_wire) } else { 0.0 };
            let t_hit = if config.include_hit_time { s_best.abs() / SPEED_OF_LIGHT_MM_PER_NS } else { 0.0 };

            let tdc = t_drift + t_signal + t_hit;
            let tdc = if config.include_tdc_smearing {
                maybe_smear(tdc, TDC_SMEARING_SIGMA_NS, rng.as_mut().map(|r| &mut **r as &mut dyn RngCore))
            } else {
                tdc
            };

            hits.push(WireHit { cell_id: cell.id, tdc_ns: tdc, true_drift_radius_mm: drift_radius });
        }
    }

    if hits.is_empty() {
        tracing::warn!("helix passed no wire within its z-window; no hits produced");
        return Err(DigitizerError::ImpactParameterSearchFailed(0));
    }
    tracing::debug!(n_hits = hits.len(), "digitized helix");
    Ok(hits)
}

/// Digitize a list of MC energy-deposit segments (spec.md §4.2.2): each
/// segment is projected onto every nearby wire, and a wire keeps only
/// its earliest-arriving hit.
pub fn digitize_from_segments(
    segments: &[EnergyDepositSegment],
    geometry: &GeometryIndex,
    config: &DigitizerConfig,
    mut rng: Option<&mut dyn RngCore>,
) -> Result<Vec<WireHit>, DigitizerError> {
    use std::collections::HashMap;
    let mut best: HashMap<u64, WireHit> = HashMap::new();

    for segment in segments {
        let dir = segment.end - segment.start;
        let len = dir.norm();
        if len < 1e-9 {
            return Err(DigitizerError::DegenerateSegment);
        }

        let z_center = (segment.start.z + segment.end.z) / 2.0;

        for plane in geometry.planes() {
            if (plane.z() - z_center).abs() > HELIX_Z_WINDOW_MM {
                continue;
            }
            for cell in plane.cells() {
                let objective = |u: f64| {
                    let p = segment.start + dir * u;
                    point_to_wire_line(p, cell).0
                };
                let u_best = ternary_search_min(0.0, 1.0, objective);
                let point_best = segment.start + dir * u_best;
                let (drift_radius, along_wire) = point_to_wire_line(point_best, cell);

                if drift_radius > firing_radius(cell) {
                    continue;
                }
                if along_wire < 0.0 || along_wire > cell.wire.length {
                    continue;
                }

                let t_drift = drift_radius / cell.v_drift;
                let t_signal = if config.include_signal_propagation { signal_propagation_time(cell, along_wire) } else { 0.0 };
                let t_hit = if config.include_hit_time { segment.t0_ns + u_best * len / SPEED_OF_LIGHT_MM_PER_NS } else { 0.0 };

                let tdc = t_drift + t_signal + t_hit;
                let tdc = if config.include_tdc_smearing {
                    maybe_smear(tdc, TDC_SMEARING_SIGMA_NS, rng.as_mut().map(|r| &mut **r as &mut dyn RngCore))
                } else {
                    tdc
                };

                let candidate = WireHit { cell_id: cell.id, tdc_ns: tdc, true_drift_radius_mm: drift_radius };
                best.entry(cell.id)
                    .and_modify(|existing| {
                        if candidate.tdc_ns < existing.tdc_ns {
                            *existing = candidate;
                        }
                    })
                    .or_insert(candidate);
            }
        }
    }

    Ok(best.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometryConfig;
    use crate::geometry::{GeometryIndex, Transform2, VolumeNode, VolumeShape};
    use nalgebra::Vector3;

    fn single_plane_geometry() -> GeometryIndex {
        let node = VolumeNode::leaf(
            "drift_plane_0",
            VolumeShape::BBox { half_x: 500.0, half_y: 250.0, half_z: 5.0 },
            Transform2 { rotation_rad: 0.0, translation: Vector3::new(0.0, 0.0, 1000.0) },
        );
        GeometryIndex::build(&node, &GeometryConfig::default()).unwrap()
    }

    #[test]
    fn straight_helix_through_plane_produces_hits() {
        let geometry = single_plane_geometry();
        let helix = Helix::new(100_000.0, 0.0, 0.0, 1.0, Point3::new(0.0, 0.0, 1000.0));
        let config = DigitizerConfig { include_tdc_smearing: false, ..Default::default() };
        let hits = digitize_from_helix(&helix, &geometry, &config, None).unwrap();
        assert!(!hits.is_empty());
        for hit in &hits {
            assert!(hit.tdc_ns >= 0.0);
        }
    }

    #[test]
    fn digitizing_far_away_helix_fails_with_no_hits() {
        let geometry = single_plane_geometry();
        let helix = Helix::new(100_000.0, 0.0, 0.0, 1.0, Point3::new(0.0, 0.0, -50_000.0));
        let config = DigitizerConfig::default();
        let result = digitize_from_helix(&helix, &geometry, &config, None);
        assert!(result.is_err());
    }

    #[test]
    fn segment_digitization_keeps_earliest_tdc_per_wire() {
        let geometry = single_plane_geometry();
        let config = DigitizerConfig { include_tdc_smearing: false, ..Default::default() };
        let segments = vec![
            EnergyDepositSegment { start: Point3::new(0.0, 0.0, 998.0), end: Point3::new(0.0, 0.0, 1002.0), t0_ns: 5.0, energy_deposit_mev: 0.3 },
            EnergyDepositSegment { start: Point3::new(0.0, 0.0, 999.0), end: Point3::new(0.0, 0.0, 1001.0), t0_ns: 1.0, energy_deposit_mev: 0.1 },
        ];
        let hits = digitize_from_segments(&segments, &geometry, &config, None).unwrap();
        assert!(!hits.is_empty());
    }
}
