//! `tracker-reco`: batch driver for the track reconstruction core
//! (spec.md §6 "CLI surface").
//!
//! ```text
//! tracker-reco --edep FILE | --digit FILE --primary FILE --wireinfo FILE -o OUT [--debug]
//! ```
//!
//! Exit codes: `0` success, `1` usage/IO error, `101` the spec's `-1`
//! usage error (POSIX exit codes are `u8`; `101` is the nearest
//! representable value, recorded as an Open Question resolution in
//! `DESIGN.md`).

mod io;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use tracker_core::config::{DigitizerConfig, GeometryConfig, DEFAULT_N_CYCLES, MAGNETIC_FIELD_TESLA};
use tracker_core::geometry::GeometryIndex;
use tracker_core::{digitize_from_segments, reconstruct, select, FiducialVolume, PrimaryTrack};
use tracker_env::Context;

const EXIT_SUCCESS: u8 = 0;
const EXIT_IO_ERROR: u8 = 1;
const EXIT_USAGE_ERROR: u8 = 101;

#[derive(Parser, Debug)]
#[command(name = "tracker-reco", about = "Drift-chamber track reconstruction batch driver")]
struct Args {
    /// MC energy-deposit segments to digitize (mutually exclusive with --digit).
    #[arg(long)]
    edep: Option<PathBuf>,

    /// Already-digitized wire hits to reconstruct directly (mutually exclusive with --edep).
    #[arg(long)]
    digit: Option<PathBuf>,

    /// MC truth primary trajectory (PDG code and production vertex),
    /// JSON-encoded, required for selection (spec.md §4.7).
    #[arg(long)]
    primary: PathBuf,

    /// Optional hierarchical volume tree, JSON-encoded; falls back to a
    /// built-in geometry when omitted (spec.md §6's geometry loader is
    /// external and out of scope for this crate).
    #[arg(long)]
    geometry: Option<PathBuf>,

    /// Output path for the wire-info CSV, written once after the
    /// geometry index is built.
    #[arg(long)]
    wireinfo: PathBuf,

    /// Output path for the reconstruction run summary (JSON).
    #[arg(short, long)]
    output: PathBuf,

    /// Master seed for TDC smearing (ignored when digitizing from
    /// already-built `--digit` input).
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Event id, used to derive this run's RNG stream from the seed.
    #[arg(long, default_value = "0")]
    event: u64,

    /// Raise logging to DEBUG.
    #[arg(long)]
    debug: bool,
}

fn run(args: &Args) -> Result<(), ExitCode> {
    if args.edep.is_some() == args.digit.is_some() {
        error!("exactly one of --edep or --digit must be given");
        return Err(ExitCode::from(EXIT_USAGE_ERROR));
    }

    let geometry_tree = match &args.geometry {
        Some(path) => io::read_json(path).map_err(|e| {
            error!("{e}");
            ExitCode::from(EXIT_IO_ERROR)
        })?,
        None => {
            info!("no --geometry given, using the built-in tracker geometry");
            io::default_geometry_tree()
        }
    };

    let geometry_config = GeometryConfig::default();
    let geometry = GeometryIndex::build(&geometry_tree, &geometry_config).map_err(|e| {
        error!("invalid geometry: {e}");
        ExitCode::from(EXIT_IO_ERROR)
    })?;

    let wireinfo_file = std::fs::File::create(&args.wireinfo).map_err(|e| {
        error!("failed to create `{}`: {e}", args.wireinfo.display());
        ExitCode::from(EXIT_IO_ERROR)
    })?;
    geometry.write_wire_info_csv(wireinfo_file).map_err(|e| {
        error!("failed to write wire info: {e}");
        ExitCode::from(EXIT_IO_ERROR)
    })?;

    let digitizer_config = DigitizerConfig::default();
    let context = Context::new(args.seed);

    let hits = if let Some(edep_path) = &args.edep {
        let segments = io::read_energy_deposits(edep_path).map_err(|e| {
            error!("{e}");
            ExitCode::from(EXIT_IO_ERROR)
        })?;
        let mut rng = context.rng_for_event(args.event);
        digitize_from_segments(&segments, &geometry, &digitizer_config, Some(&mut rng)).map_err(|e| {
            error!("digitization failed: {e}");
            ExitCode::from(EXIT_IO_ERROR)
        })?
    } else {
        io::read_wire_hits(args.digit.as_ref().unwrap()).map_err(|e| {
            error!("{e}");
            ExitCode::from(EXIT_IO_ERROR)
        })?
    };

    let result = reconstruct(&hits, &geometry, &digitizer_config, MAGNETIC_FIELD_TESLA, DEFAULT_N_CYCLES).map_err(|e| {
        error!("reconstruction failed: {e}");
        ExitCode::from(EXIT_IO_ERROR)
    })?;

    let primary: PrimaryTrack = io::read_primary_track(&args.primary).map_err(|e| {
        error!("{e}");
        ExitCode::from(EXIT_IO_ERROR)
    })?;

    let tree_half_extents = geometry_tree_half_extents(&geometry_tree);
    let fiducial = FiducialVolume {
        half_x_active_mm: tree_half_extents.x,
        half_y_active_mm: tree_half_extents.y,
    };
    let verdict = select(&primary, &result, &fiducial);
    info!("selection verdict: {:?}", verdict);

    let summary = io::RunSummary { context_seed: context.seed(), verdict, result };
    io::write_run_summary(&args.output, &summary).map_err(|e| {
        error!("{e}");
        ExitCode::from(EXIT_IO_ERROR)
    })?;

    Ok(())
}

fn geometry_tree_half_extents(tree: &tracker_core::geometry::VolumeNode) -> nalgebra::Vector3<f64> {
    tree.shape.half_extents()
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: failed to install tracing subscriber");
    }

    match run(&args) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(code) => code,
    }
}
