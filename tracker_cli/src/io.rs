//! File formats at the process boundary (spec.md §6).

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracker_core::geometry::{Transform2, VolumeNode, VolumeShape};
use tracker_core::{EnergyDepositSegment, RecoResult, WireHit};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("failed to read `{path}`: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to write `{path}`: {source}")]
    Write { path: String, #[source] source: std::io::Error },
    #[error("failed to parse `{path}` as JSON: {source}")]
    Parse { path: String, #[source] source: serde_json::Error },
}

pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, IoError> {
    let file = File::open(path).map_err(|source| IoError::Read { path: path.display().to_string(), source })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| IoError::Parse { path: path.display().to_string(), source })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let file = File::create(path).map_err(|source| IoError::Write { path: path.display().to_string(), source })?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|source| IoError::Parse { path: path.display().to_string(), source })
}

pub fn read_energy_deposits(path: &Path) -> Result<Vec<EnergyDepositSegment>, IoError> {
    read_json(path)
}

pub fn read_wire_hits(path: &Path) -> Result<Vec<WireHit>, IoError> {
    read_json(path)
}

pub fn read_primary_track(path: &Path) -> Result<tracker_core::PrimaryTrack, IoError> {
    read_json(path)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub context_seed: u64,
    pub verdict: tracker_core::SelectionVerdict,
    pub result: RecoResult,
}

pub fn write_run_summary(path: &Path, summary: &RunSummary) -> Result<(), IoError> {
    write_json(path, summary)
}

/// A small built-in tracker geometry used when `--geometry` is not
/// given: four horizontal and four vertical drift planes spaced along
/// the beam axis, enough to exercise both the circle and line fits.
/// The real hierarchical volume tree comes from an external loader
/// (spec.md §6) this crate does not implement.
pub fn default_geometry_tree() -> VolumeNode {
    let mut root = VolumeNode {
        name: "tracker_module".into(),
        shape: VolumeShape::BBox { half_x: 600.0, half_y: 300.0, half_z: 400.0 },
        to_parent: Transform2::identity(),
        children: Vec::new(),
    };

    for i in 0..16 {
        let z = 900.0 + (i as f64) * 20.0;
        let name = if i % 2 == 0 { "drift_plane_0" } else { "drift_plane_1" };
        root.children.push(VolumeNode::leaf(
            name,
            VolumeShape::BBox { half_x: 500.0, half_y: 250.0, half_z: 5.0 },
            Transform2 { rotation_rad: 0.0, translation: Vector3::new(0.0, 0.0, z) },
        ));
    }

    root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_has_both_orientations() {
        let tree = default_geometry_tree();
        let names: Vec<&str> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"drift_plane_0"));
        assert!(names.contains(&"drift_plane_1"));
    }

    #[test]
    fn run_summary_round_trips_through_json() {
        use nalgebra::{Point3, Vector3};
        use tracker_core::fit::FitReport;
        use tracker_core::Helix;

        let result = RecoResult {
            helix: Helix::new(50_000.0, 0.01, 0.0, 1.0, Point3::new(0.0, 0.0, 0.0)),
            momentum_gev: Vector3::new(0.1, 0.2, 0.3),
            circle_report: FitReport { status: tracker_core::error::FitStatus::Converged, iterations: 10, chi_square: 1.0 },
            line_report: FitReport { status: tracker_core::error::FitStatus::Converged, iterations: 5, chi_square: 0.5 },
            n_cycles: 3,
            n_horizontal_hits: 4,
            n_vertical_hits: 4,
        };
        let summary = RunSummary { context_seed: 7, verdict: tracker_core::SelectionVerdict::Accepted, result };

        let dir = std::env::temp_dir();
        let path = dir.join(format!("tracker_reco_test_{}.json", std::process::id()));
        write_run_summary(&path, &summary).unwrap();
        let reread: RunSummary = read_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(reread.context_seed, 7);
        assert_eq!(reread.result.n_cycles, 3);
    }
}
