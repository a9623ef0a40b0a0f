//! Configuration tables and frozen physical constants (spec.md §6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::OrientationClass;

/// Speed of light in vacuum, in mm/ns (spec.md §6).
pub const SPEED_OF_LIGHT_MM_PER_NS: f64 = 299.792458;

/// Axial magnetic field strength, in tesla (spec.md §6).
pub const MAGNETIC_FIELD_TESLA: f64 = 0.6;

/// `p_perp[GeV] = MOMENTUM_COEFFICIENT * B[T] * R[m]` (spec.md §6).
pub const MOMENTUM_COEFFICIENT: f64 = 0.3;

/// Gaussian TDC smearing sigma, in ns (spec.md §4.2.1).
pub const TDC_SMEARING_SIGMA_NS: f64 = 1.0;

/// Half-window in z used to restrict a helix to the neighbourhood of a
/// wire before searching for the impact parameter (spec.md §4.2.1).
pub const HELIX_Z_WINDOW_MM: f64 = 8.0;

/// Objective-function sigma used by both F1 and F2 (spec.md §4.3, §4.4).
pub const FIT_SIGMA_MM: f64 = 0.2;

/// Per-plane-orientation-class geometry and drift parameters
/// (spec.md §6 "Configuration table").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationConfig {
    /// Wire rotation angle, radians.
    pub angle: f64,
    /// First-wire transverse offset, mm.
    pub offset: f64,
    /// Wire-to-wire pitch, mm.
    pub spacing: f64,
    /// Minimum wire length to keep the cell, mm.
    pub min_length: f64,
    /// Drift velocity, mm/ns.
    pub v_drift: f64,
}

/// The full table, keyed by orientation class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub orientations: HashMap<OrientationClass, OrientationConfig>,
}

impl GeometryConfig {
    pub fn get(&self, orientation: OrientationClass) -> Option<&OrientationConfig> {
        self.orientations.get(&orientation)
    }
}

impl Default for GeometryConfig {
    /// A representative three-orientation drift-plane table: horizontal
    /// (class 0), vertical (class 1), and a stereo class (2) used by
    /// straw planes. Pitch and offsets are typical of a straw-tube
    /// tracker cell (~10 mm pitch); callers load a detector-specific
    /// table from the geometry loader rather than relying on this.
    fn default() -> Self {
        let mut orientations = HashMap::new();
        orientations.insert(
            0,
            OrientationConfig { angle: 0.0, offset: 0.0, spacing: 10.0, min_length: 50.0, v_drift: 0.05 },
        );
        orientations.insert(
            1,
            OrientationConfig {
                angle: std::f64::consts::FRAC_PI_2,
                offset: 0.0,
                spacing: 10.0,
                min_length: 50.0,
                v_drift: 0.05,
            },
        );
        orientations.insert(
            2,
            OrientationConfig { angle: std::f64::consts::FRAC_PI_4, offset: 5.0, spacing: 10.0, min_length: 50.0, v_drift: 0.05 },
        );
        Self { orientations }
    }
}

/// Signal propagation speed along a wire, mm/ns. Not part of the
/// orientation table (uniform across all wires) but kept beside it.
pub const V_SIGNAL_MM_PER_NS: f64 = 200.0;

/// The four digitization toggles (spec.md §6 "Toggles"), always passed
/// by reference — never read from a global (Design Notes §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitizerConfig {
    pub include_signal_propagation: bool,
    pub include_hit_time: bool,
    pub include_tdc_smearing: bool,
    /// Bypass TDC inversion entirely and seed/refit the reconstructor
    /// directly from each `WireHit`'s true drift radius, instead of
    /// re-deriving it from the (possibly smeared) TDC every cycle.
    /// A validation mode for exercising the fit and minimizer
    /// independent of digitization noise.
    pub use_non_smeared_track: bool,
}

impl Default for DigitizerConfig {
    fn default() -> Self {
        Self {
            include_signal_propagation: true,
            include_hit_time: true,
            include_tdc_smearing: true,
            use_non_smeared_track: false,
        }
    }
}

/// Number of TDC-inversion / refit cycles the reconstructor runs
/// (spec.md §4.6).
pub const DEFAULT_N_CYCLES: usize = 3;

/// Fiducial volume inset, in mm, applied to both the x half-extent and
/// the per-module y (height) half-extent (spec.md §4.7,
/// `reconstructionNLLmethod.cpp`'s `FIDUCIAL_CUT`).
pub const FIDUCIAL_CUT_MM: f64 = 100.0;

/// Minimum number of fired wires per projection required by selection
/// (spec.md §4.7).
pub const MIN_HITS_PER_PROJECTION: usize = 5;
