//! Selection (spec.md §4.7): accept an event iff its primary trajectory
//! is a muon or antimuon, its production vertex is inside the fiducial
//! volume, and both projections have enough fired wires. Always emits a
//! 1-to-1 decision for each reconstructed event — never drops a
//! `RecoResult` silently.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::config::{FIDUCIAL_CUT_MM, MIN_HITS_PER_PROJECTION};
use crate::reco::RecoResult;

/// PDG code magnitude for a muon; antimuons carry the negated code
/// (`reconstructionNLLmethod.cpp:1230`, `abs(muon_trj.GetPDGCode()) != 13`).
const MUON_PDG_CODE: i32 = 13;

/// Truth information about the primary track that selection needs: its
/// species and where it started. Read from the MC truth stream (spec.md
/// §6 "list of trajectories"/"list of primaries"), never a reconstructed
/// quantity — this is the particle-species and production-vertex *label*,
/// not detector-response particle ID (the Non-goal spec.md excludes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimaryTrack {
    pub pdg_code: i32,
    pub vertex: Point3<f64>,
}

/// The fiducial extent of one super-module's active volume: symmetric
/// under x -> -x, with an independent, module-dependent height in y
/// (`IsInSMODFiducialVol`, `reconstructionNLLmethod.cpp:265-269`, "pass_x
/// * pass_zy").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiducialVolume {
    pub half_x_active_mm: f64,
    pub half_y_active_mm: f64,
}

impl FiducialVolume {
    /// Both the x and y (height) bounds must pass, each inset by
    /// [`FIDUCIAL_CUT_MM`] from the active extent.
    pub fn contains(&self, vertex: Point3<f64>) -> bool {
        let pass_x = vertex.x.abs() <= self.half_x_active_mm - FIDUCIAL_CUT_MM;
        let pass_y = vertex.y.abs() <= self.half_y_active_mm - FIDUCIAL_CUT_MM;
        pass_x && pass_y
    }
}

/// Why a `RecoResult` was rejected. Always attached to the result it
/// describes rather than replacing it (spec.md §4.7 "always emit 1-to-1").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionVerdict {
    Accepted,
    NotAMuonOrAntimuon,
    OutsideFiducialVolume,
    TooFewHits,
}

/// Evaluate the three gates of spec.md §4.7, in the same order the
/// source short-circuits them: particle species first (cheapest, and
/// available before anything else is even read), then the production
/// vertex against the fiducial volume, then the fired-wire counts.
/// Both the species and vertex checks read truth/input-level quantities
/// that exist independently of `result`, so they happen before R would
/// ever need to run in a pipeline that short-circuits on rejection.
pub fn select(primary: &PrimaryTrack, result: &RecoResult, fiducial: &FiducialVolume) -> SelectionVerdict {
    if primary.pdg_code.abs() != MUON_PDG_CODE {
        return SelectionVerdict::NotAMuonOrAntimuon;
    }
    if !fiducial.contains(primary.vertex) {
        return SelectionVerdict::OutsideFiducialVolume;
    }
    if result.n_horizontal_hits < MIN_HITS_PER_PROJECTION || result.n_vertical_hits < MIN_HITS_PER_PROJECTION {
        return SelectionVerdict::TooFewHits;
    }
    SelectionVerdict::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitStatus;
    use crate::fit::FitReport;
    use crate::helix::Helix;
    use nalgebra::Vector3;

    fn dummy_result(n_horizontal: usize, n_vertical: usize) -> RecoResult {
        RecoResult {
            helix: Helix::new(800.0, 0.1, 0.0, 1.0, Point3::new(0.0, 0.0, 0.0)),
            momentum_gev: Vector3::new(0.0, 0.0, 0.5),
            circle_report: FitReport { status: FitStatus::Converged, iterations: 1, chi_square: 0.0 },
            line_report: FitReport { status: FitStatus::Converged, iterations: 1, chi_square: 0.0 },
            n_cycles: 3,
            n_horizontal_hits: n_horizontal,
            n_vertical_hits: n_vertical,
        }
    }

    fn muon_at(x: f64, y: f64) -> PrimaryTrack {
        PrimaryTrack { pdg_code: 13, vertex: Point3::new(x, y, 0.0) }
    }

    #[test]
    fn fiducial_gate_is_symmetric_under_sign_flip() {
        let fiducial = FiducialVolume { half_x_active_mm: 1000.0, half_y_active_mm: 1000.0 };
        let result = dummy_result(10, 10);
        let positive = select(&muon_at(850.0, 0.0), &result, &fiducial);
        let negative = select(&muon_at(-850.0, 0.0), &result, &fiducial);
        assert_eq!(positive, negative);
    }

    #[test]
    fn rejects_outside_fiducial_inset_in_x() {
        let fiducial = FiducialVolume { half_x_active_mm: 1000.0, half_y_active_mm: 1000.0 };
        let verdict = select(&muon_at(950.0, 0.0), &dummy_result(10, 10), &fiducial);
        assert_eq!(verdict, SelectionVerdict::OutsideFiducialVolume);
    }

    #[test]
    fn rejects_outside_fiducial_inset_in_y() {
        let fiducial = FiducialVolume { half_x_active_mm: 1000.0, half_y_active_mm: 300.0 };
        let verdict = select(&muon_at(0.0, 250.0), &dummy_result(10, 10), &fiducial);
        assert_eq!(verdict, SelectionVerdict::OutsideFiducialVolume);
    }

    #[test]
    fn rejects_too_few_hits() {
        let fiducial = FiducialVolume { half_x_active_mm: 1000.0, half_y_active_mm: 1000.0 };
        let verdict = select(&muon_at(0.0, 0.0), &dummy_result(2, 10), &fiducial);
        assert_eq!(verdict, SelectionVerdict::TooFewHits);
    }

    #[test]
    fn rejects_non_muon_primaries() {
        let fiducial = FiducialVolume { half_x_active_mm: 1000.0, half_y_active_mm: 1000.0 };
        let electron = PrimaryTrack { pdg_code: 11, vertex: Point3::new(0.0, 0.0, 0.0) };
        let verdict = select(&electron, &dummy_result(10, 10), &fiducial);
        assert_eq!(verdict, SelectionVerdict::NotAMuonOrAntimuon);
    }

    #[test]
    fn accepts_an_antimuon_with_a_well_formed_track() {
        let fiducial = FiducialVolume { half_x_active_mm: 1000.0, half_y_active_mm: 1000.0 };
        let antimuon = PrimaryTrack { pdg_code: -13, vertex: Point3::new(0.0, 0.0, 0.0) };
        let verdict = select(&antimuon, &dummy_result(10, 10), &fiducial);
        assert_eq!(verdict, SelectionVerdict::Accepted);
    }
}
