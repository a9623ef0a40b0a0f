//! Charged-particle track reconstruction core for a cylindrical
//! drift-chamber / straw-tube tracker in a solenoidal field.
//!
//! Three layers, in dependency order:
//! - [`geometry`] indexes a volume tree into planes, cells and wires
//!   and answers spatial queries.
//! - [`digitizer`] turns a truth helix or MC energy deposits into wire
//!   TDCs.
//! - [`fit`] and [`reco`] invert those TDCs back into a 3D helix, and
//!   [`selection`] decides whether to keep the result.
//!
//! Randomness is never global: callers that need it (smearing in
//! [`digitizer`]) pass a `&mut dyn rand::RngCore` explicitly, typically
//! one derived from a `tracker_env::Context`.

pub mod config;
pub mod digitizer;
pub mod error;
pub mod fit;
pub mod geometry;
pub mod helix;
pub mod ids;
pub mod minimizer;
pub mod reco;
pub mod selection;

pub use config::{DigitizerConfig, GeometryConfig};
pub use digitizer::{digitize_from_helix, digitize_from_segments, EnergyDepositSegment, WireHit};
pub use error::{DigitizerError, GeometryError, ReconstructionError};
pub use geometry::{GeometryIndex, VolumeNode, VolumeShape};
pub use helix::Helix;
pub use reco::{reconstruct, RecoResult};
pub use selection::{select, FiducialVolume, PrimaryTrack, SelectionVerdict};
