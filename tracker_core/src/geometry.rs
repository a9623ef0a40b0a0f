//! The "GEOMETRY" engine — flat, query-only tracker model (spec.md §4.1).
//!
//! Turns a hierarchical volume tree into planes → cells → wires, and
//! answers the two spatial queries the fitters need: "which cell does
//! this point belong to" and "which cells in neighbouring planes are
//! adjacent to this one".

use nalgebra::{Point2, Point3, Rotation2, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::GeometryConfig;
use crate::error::GeometryError;
use crate::ids::{encode_cell_id, encode_plane_id, OrientationClass};

// ============================================================================
// VOLUME TREE (external input shape — §9 "Polymorphism")
// ============================================================================

/// Local-to-parent rigid transform: rotation about the plane-normal axis
/// (z) plus a translation. The detector geometry this core targets only
/// ever rotates about z, so a full `Isometry3` would carry dead weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2 {
    pub rotation_rad: f64,
    pub translation: Vector3<f64>,
}

impl Transform2 {
    pub fn identity() -> Self {
        Self { rotation_rad: 0.0, translation: Vector3::zeros() }
    }

    pub fn apply(&self, p: Point3<f64>) -> Point3<f64> {
        let r = Rotation2::new(self.rotation_rad);
        let xy = r * Vector2::new(p.x, p.y);
        Point3::new(xy.x, xy.y, p.z) + self.translation
    }

    pub fn compose(&self, inner: &Transform2) -> Transform2 {
        // self applied after inner: world = self(inner(local))
        let r = Rotation2::new(self.rotation_rad);
        let rotated_translation = r * Vector2::new(inner.translation.x, inner.translation.y);
        Transform2 {
            rotation_rad: self.rotation_rad + inner.rotation_rad,
            translation: Vector3::new(
                rotated_translation.x + self.translation.x,
                rotated_translation.y + self.translation.y,
                inner.translation.z + self.translation.z,
            ),
        }
    }
}

/// The capability set every shape kind exposes (Design Notes §9): no
/// caller ever matches on the concrete variant outside this module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VolumeShape {
    BBox { half_x: f64, half_y: f64, half_z: f64 },
    Trapezoid { half_z: f64, half_x_lo: f64, half_x_hi: f64, half_y: f64 },
    Tube { half_z: f64, r_min: f64, r_max: f64 },
    TubeSegment { half_z: f64, r_min: f64, r_max: f64, phi_lo: f64, phi_hi: f64 },
}

impl VolumeShape {
    /// Half-extents in the shape's own local frame, used for bounding
    /// the synthetic drift-plane grid.
    pub fn half_extents(&self) -> Vector3<f64> {
        match *self {
            VolumeShape::BBox { half_x, half_y, half_z } => Vector3::new(half_x, half_y, half_z),
            VolumeShape::Trapezoid { half_z, half_x_lo, half_x_hi, half_y } => {
                Vector3::new(half_x_lo.max(half_x_hi), half_y, half_z)
            }
            VolumeShape::Tube { half_z, r_max, .. } => Vector3::new(r_max, r_max, half_z),
            VolumeShape::TubeSegment { half_z, r_max, .. } => Vector3::new(r_max, r_max, half_z),
        }
    }

    pub fn contains(&self, local: Point3<f64>) -> bool {
        match *self {
            VolumeShape::BBox { half_x, half_y, half_z } => {
                local.x.abs() <= half_x && local.y.abs() <= half_y && local.z.abs() <= half_z
            }
            VolumeShape::Trapezoid { half_z, half_x_lo, half_x_hi, half_y } => {
                if local.z.abs() > half_z || local.y.abs() > half_y {
                    return false;
                }
                let frac = (local.z + half_z) / (2.0 * half_z);
                let half_x_here = half_x_lo + frac * (half_x_hi - half_x_lo);
                local.x.abs() <= half_x_here
            }
            VolumeShape::Tube { half_z, r_min, r_max } => {
                if local.z.abs() > half_z {
                    return false;
                }
                let r = (local.x * local.x + local.y * local.y).sqrt();
                r >= r_min && r <= r_max
            }
            VolumeShape::TubeSegment { half_z, r_min, r_max, phi_lo, phi_hi } => {
                if local.z.abs() > half_z {
                    return false;
                }
                let r = (local.x * local.x + local.y * local.y).sqrt();
                if r < r_min || r > r_max {
                    return false;
                }
                let phi = local.y.atan2(local.x);
                phi >= phi_lo && phi <= phi_hi
            }
        }
    }
}

/// A node in the hierarchical detector description provided by the
/// (external) geometry loader (spec.md §3 "VolumeTree").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeNode {
    pub name: String,
    pub shape: VolumeShape,
    pub to_parent: Transform2,
    pub children: Vec<VolumeNode>,
}

impl VolumeNode {
    pub fn leaf(name: impl Into<String>, shape: VolumeShape, to_parent: Transform2) -> Self {
        Self { name: name.into(), shape, to_parent, children: Vec::new() }
    }
}

/// What kind of tracker plane a volume's name identifies, and the
/// orientation class it selects into [`GeometryConfig`].
///
/// spec.md §6 describes this as a regular-expression match performed by
/// the external geometry loader; this core only needs the *result* of
/// that match, so volume names are matched against a small literal
/// pattern (`drift_plane_<n>`, `stt_plane_<n>`) rather than pulling in a
/// regex engine for an interface boundary concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
    Drift(OrientationClass),
    Straw(OrientationClass),
}

pub fn classify_volume_name(name: &str) -> Option<PlaneKind> {
    if let Some(rest) = name.strip_prefix("drift_plane_") {
        rest.parse::<u8>().ok().map(PlaneKind::Drift)
    } else if let Some(rest) = name.strip_prefix("stt_plane_") {
        rest.parse::<u8>().ok().map(PlaneKind::Straw)
    } else {
        None
    }
}

// ============================================================================
// FLAT MODEL (spec.md §3)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadoutEnd {
    A,
    B,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    pub id: u64,
    pub endpoint_a: Point3<f64>,
    pub endpoint_b: Point3<f64>,
    pub center: Point3<f64>,
    pub length: f64,
    pub orientation: OrientationClass,
    pub readout_end: ReadoutEnd,
}

impl Wire {
    pub fn readout_point(&self) -> Point3<f64> {
        match self.readout_end {
            ReadoutEnd::A => self.endpoint_a,
            ReadoutEnd::B => self.endpoint_b,
        }
    }

    /// Parametric point `endpoint_a + t * (endpoint_b - endpoint_a)`,
    /// matching the `Line2D`/`Line` parameterisation used by the
    /// digitizer and TDC inversion (§4.1.4, §4.5).
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.endpoint_a + (self.endpoint_b - self.endpoint_a) * t
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub id: u64,
    pub wire: Wire,
    pub transverse_coord: f64,
    pub width: f64,
    pub depth: f64,
    pub v_drift: f64,
    pub adjacent: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct TrackerPlane {
    pub id: u64,
    pub local_id: OrientationClass,
    pub center: Point3<f64>,
    pub half_extent_transverse: f64,
    pub half_extent_along_wire: f64,
    pub wire_angle_rad: f64,
    /// Sorted ascending by `Cell::transverse_coord` (spec.md §3 invariant:
    /// "transverse coordinate is strictly monotone in the map").
    cells: Vec<Cell>,
}

impl TrackerPlane {
    pub fn z(&self) -> f64 {
        self.center.z
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell_by_id(&self, id: u64) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id == id)
    }

    // ---- 4.1.1 plane frame transforms ----

    /// World (x, y) relative to the plane center — the "local" frame.
    pub fn world_to_local(&self, p: Point3<f64>) -> Point2<f64> {
        Point2::new(p.x - self.center.x, p.y - self.center.y)
    }

    pub fn local_to_world(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(p.x + self.center.x, p.y + self.center.y)
    }

    /// Un-rotate local coordinates by the wire angle, so wires run along
    /// the rotated-x axis.
    pub fn local_to_rotated(&self, p: Point2<f64>) -> Point2<f64> {
        Rotation2::new(-self.wire_angle_rad) * p
    }

    pub fn rotated_to_local(&self, p: Point2<f64>) -> Point2<f64> {
        Rotation2::new(self.wire_angle_rad) * p
    }

    pub fn world_to_rotated(&self, p: Point3<f64>) -> Point2<f64> {
        self.local_to_rotated(self.world_to_local(p))
    }

    pub fn rotated_to_world(&self, p: Point2<f64>) -> Point2<f64> {
        self.local_to_world(self.rotated_to_local(p))
    }

    // ---- 4.1.5 point-to-cell query ----

    /// Find the cell whose wire is closest, transversely, to `point`.
    ///
    /// Binary-searches the ordered cell map for the lower bound, then
    /// compares against the adjacent entry; widens the search by one
    /// step in each direction if both candidates are farther than a
    /// half-cell width, clamped to the map bounds.
    pub fn get_cell_at_point(&self, point: Point3<f64>) -> Option<&Cell> {
        if self.cells.is_empty() {
            return None;
        }
        let rotated = self.world_to_rotated(point);
        let transverse = rotated.y;

        let idx = self.cells.partition_point(|c| c.transverse_coord < transverse);

        let mut lo = idx.saturating_sub(1);
        let mut hi = idx.min(self.cells.len() - 1);

        let dist = |i: usize| (self.cells[i].transverse_coord - transverse).abs();

        let mut best = if dist(lo) <= dist(hi) { lo } else { hi };
        let half_width = self.cells[best].width / 2.0;

        if dist(lo) > half_width && dist(hi) > half_width {
            lo = lo.saturating_sub(1);
            hi = (hi + 1).min(self.cells.len() - 1);
            best = if dist(lo) <= dist(hi) { lo } else { hi };
        }

        // Deterministic tie-break: lower transverse coordinate wins.
        if (dist(lo) - dist(hi)).abs() < 1e-9 {
            best = lo;
        }

        Some(&self.cells[best])
    }
}

// ============================================================================
// 4.1.2 LINE–RECTANGLE INTERSECTION
// ============================================================================

/// Intersect the infinite line `point + t * direction` (both in the
/// plane's local frame) with the plane's rectangular boundary
/// `[-half_x, half_x] x [-half_y, half_y]`.
///
/// Each edge is parameterised by `s in [0, 1]`; an intersection is
/// accepted iff the 2x2 system is non-degenerate (`|det| >= 1e-9`) and
/// `s` falls inside `[0, 1]`.
pub fn line_rect_intersections(
    point: Point2<f64>,
    direction: Vector2<f64>,
    half_x: f64,
    half_y: f64,
) -> Vec<Point2<f64>> {
    let corners = [
        Point2::new(-half_x, -half_y),
        Point2::new(half_x, -half_y),
        Point2::new(half_x, half_y),
        Point2::new(-half_x, half_y),
    ];
    let edges = [(corners[0], corners[1]), (corners[1], corners[2]), (corners[2], corners[3]), (corners[3], corners[0])];

    let mut hits = Vec::new();
    for (a, b) in edges {
        let edge_dir = b - a;
        // Solve: point + t*direction = a + s*edge_dir
        // [direction, -edge_dir] * [t, s]^T = a - point
        let det = direction.x * (-edge_dir.y) - (-edge_dir.x) * direction.y;
        if det.abs() < 1e-9 {
            continue;
        }
        let rhs = a - point;
        let s = (direction.x * rhs.y - direction.y * rhs.x) / det;
        if (0.0..=1.0).contains(&s) {
            hits.push(a + edge_dir * s);
        }
    }
    hits
}

// ============================================================================
// 4.1.4 SEGMENT-TO-SEGMENT DISTANCE
// ============================================================================

/// Closest points between two 3D segments; clamps both parameters to
/// `[0, 1]`, re-projecting and re-clamping when one clamp forces the
/// other out of range. Falls through to point-to-line handling when the
/// segments are parallel (`denom` vanishes).
pub fn segment_segment_distance(p1: Point3<f64>, q1: Point3<f64>, p2: Point3<f64>, q2: Point3<f64>) -> f64 {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.dot(&d1);
    let e = d2.dot(&d2);
    let f = d2.dot(&r);

    let (s, t);
    if a <= 1e-12 && e <= 1e-12 {
        s = 0.0;
        t = 0.0;
    } else if a <= 1e-12 {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(&r);
        if e <= 1e-12 {
            t = 0.0;
            s = (-c / a).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            let mut s_unclamped = if denom.abs() > 1e-9 { ((b * f - c * e) / denom).clamp(0.0, 1.0) } else { 0.0 };
            let mut t_unclamped = (b * s_unclamped + f) / e;
            if t_unclamped < 0.0 {
                t_unclamped = 0.0;
                s_unclamped = (-c / a).clamp(0.0, 1.0);
            } else if t_unclamped > 1.0 {
                t_unclamped = 1.0;
                s_unclamped = ((b - c) / a).clamp(0.0, 1.0);
            }
            s = s_unclamped;
            t = t_unclamped;
        }
    }

    let c1 = p1 + d1 * s;
    let c2 = p2 + d2 * t;
    (c1 - c2).norm()
}

// ============================================================================
// GEOMETRY INDEX (build protocol, §4.1 top)
// ============================================================================

pub struct GeometryIndex {
    planes: Vec<TrackerPlane>,
    by_id: HashMap<u64, usize>,
}

impl GeometryIndex {
    /// Depth-first build from the root of the volume tree (spec.md §4.1
    /// "Build protocol").
    pub fn build(root: &VolumeNode, config: &GeometryConfig) -> Result<Self, GeometryError> {
        let mut planes = Vec::new();
        let module_id = crate::ids::encode_module_id(0, 0, 0);
        walk(root, Transform2::identity(), module_id, config, &mut planes)?;

        planes.sort_by(|a, b| a.center.z.partial_cmp(&b.center.z).unwrap());

        let mut by_id = HashMap::with_capacity(planes.len());
        for (idx, plane) in planes.iter().enumerate() {
            by_id.insert(plane.id, idx);
        }

        let mut index = GeometryIndex { planes, by_id };
        index.build_adjacency();
        tracing::debug!(n_planes = index.planes.len(), n_cells = index.planes.iter().map(|p| p.cells.len()).sum::<usize>(), "built geometry index");
        Ok(index)
    }

    pub fn planes(&self) -> &[TrackerPlane] {
        &self.planes
    }

    pub fn plane_by_id(&self, id: u64) -> Option<&TrackerPlane> {
        self.by_id.get(&id).map(|&idx| &self.planes[idx])
    }

    pub fn cell_by_global_id(&self, cell_global_id: u64) -> Option<&Cell> {
        let (plane_id, _) = crate::ids::decode_cell_id(cell_global_id);
        self.plane_by_id(plane_id)?.cell_by_id(cell_global_id)
    }

    /// Point-to-cell query across the whole index: find the plane whose
    /// z is closest to `point.z`, then delegate to that plane.
    ///
    /// Returns [`crate::error::UNRECOGNIZED_VOLUME_SENTINEL`]-worthy
    /// `None` when no plane is within `z_tolerance` (spec.md §7.2).
    pub fn get_cell_at_point(&self, point: Point3<f64>, z_tolerance: f64) -> Option<&Cell> {
        let plane = self
            .planes
            .iter()
            .min_by(|a, b| (a.center.z - point.z).abs().partial_cmp(&(b.center.z - point.z).abs()).unwrap())?;
        if (plane.center.z - point.z).abs() > z_tolerance {
            return None;
        }
        plane.get_cell_at_point(point)
    }

    /// 4.1.3 cell adjacency: for each plane, compare every cell against
    /// every cell in the next up-to-three planes in z.
    fn build_adjacency(&mut self) {
        let n = self.planes.len();
        let mut pairs: Vec<(u64, u64)> = Vec::new();

        for i in 0..n {
            for j in (i + 1)..n.min(i + 4) {
                for c in self.planes[i].cells.iter() {
                    for c2 in self.planes[j].cells.iter() {
                        let threshold = (c.width * c.width + c.depth * c.depth).sqrt() + 0.1;
                        let dist = segment_segment_distance(
                            c.wire.endpoint_a,
                            c.wire.endpoint_b,
                            c2.wire.endpoint_a,
                            c2.wire.endpoint_b,
                        );
                        if dist < threshold {
                            pairs.push((c.id, c2.id));
                        }
                    }
                }
            }
        }

        for (a, b) in pairs {
            self.add_adjacency(a, b);
            self.add_adjacency(b, a);
        }
    }

    fn add_adjacency(&mut self, cell_id: u64, neighbor_id: u64) {
        let (plane_id, _) = crate::ids::decode_cell_id(cell_id);
        if let Some(&plane_idx) = self.by_id.get(&plane_id) {
            if let Some(cell) = self.planes[plane_idx].cells.iter_mut().find(|c| c.id == cell_id) {
                if !cell.adjacent.contains(&neighbor_id) {
                    cell.adjacent.push(neighbor_id);
                }
            }
        }
    }

    /// Write the wire-info CSV (spec.md §6): one row per wire, header
    /// `id,x,y,z,length,orientation,ax,ay,az`. Supplemented from
    /// `SANDGeoManager.cpp`'s `file_wireinfo` dump — a build-time
    /// artifact written once after geometry construction.
    pub fn write_wire_info_csv<W: std::io::Write>(&self, mut out: W) -> std::io::Result<()> {
        writeln!(out, "id,x,y,z,length,orientation,ax,ay,az")?;
        for plane in &self.planes {
            for cell in &plane.cells {
                let w = &cell.wire;
                let dir = (w.endpoint_b - w.endpoint_a).normalize();
                let orientation = if w.orientation == 1 { 1 } else { 0 };
                writeln!(
                    out,
                    "{},{},{},{},{},{},{},{},{}",
                    w.id, w.center.x, w.center.y, w.center.z, w.length, orientation, dir.x, dir.y, dir.z
                )?;
            }
        }
        Ok(())
    }
}

fn walk(
    node: &VolumeNode,
    parent_to_world: Transform2,
    module_id: u64,
    config: &GeometryConfig,
    planes: &mut Vec<TrackerPlane>,
) -> Result<(), GeometryError> {
    let to_world = parent_to_world.compose(&node.to_parent);

    match classify_volume_name(&node.name) {
        Some(PlaneKind::Drift(orientation)) => {
            planes.push(build_drift_plane(node, &to_world, module_id, orientation, config)?);
            return Ok(());
        }
        Some(PlaneKind::Straw(orientation)) => {
            planes.push(build_straw_plane(node, &to_world, module_id, orientation)?);
            return Ok(());
        }
        None => {}
    }

    for (i, child) in node.children.iter().enumerate() {
        walk(child, to_world, module_id.wrapping_add(i as u64 + 1), config, planes)?;
    }
    Ok(())
}

fn build_drift_plane(
    node: &VolumeNode,
    to_world: &Transform2,
    module_id: u64,
    orientation: OrientationClass,
    config: &GeometryConfig,
) -> Result<TrackerPlane, GeometryError> {
    let cfg = config.get(orientation).ok_or(GeometryError::MissingOrientationConfig(orientation))?;
    let half_extents = node.shape.half_extents();
    let center = to_world.apply(Point3::origin());

    let mut cells = Vec::new();
    let n_wires = ((2.0 * half_extents.y - cfg.offset) / cfg.spacing).floor().max(0.0) as i64 + 1;

    for i in 0..n_wires {
        let transverse = -half_extents.y + cfg.offset + (i as f64) * cfg.spacing;
        if transverse.abs() > half_extents.y {
            continue;
        }

        let point_local_rot = Point2::new(0.0, transverse);
        let point_local = Rotation2::new(cfg.angle) * point_local_rot;
        let direction_local = Rotation2::new(cfg.angle) * Vector2::new(1.0, 0.0);

        let hits = line_rect_intersections(point_local, direction_local, half_extents.x, half_extents.y);
        if hits.len() < 2 {
            continue;
        }
        let (p0, p1) = (hits[0], hits[1]);
        let length = (p1 - p0).norm();
        if length < cfg.min_length {
            continue;
        }

        let corner_coord = half_extents.x;
        let readout_end = if (p0.x.abs() - corner_coord).abs() < 1.0 { ReadoutEnd::A } else { ReadoutEnd::B };

        let endpoint_a = to_world.apply(Point3::new(p0.x, p0.y, 0.0));
        let endpoint_b = to_world.apply(Point3::new(p1.x, p1.y, 0.0));
        let wire_center = Point3::from((endpoint_a.coords + endpoint_b.coords) / 2.0);

        let plane_id_guess = encode_plane_id(module_id, 0, orientation);
        let cell_id = encode_cell_id(plane_id_guess, i as u32);

        let wire = Wire {
            id: cell_id,
            endpoint_a,
            endpoint_b,
            center: wire_center,
            length,
            orientation,
            readout_end,
        };

        cells.push(Cell {
            id: cell_id,
            wire,
            transverse_coord: transverse,
            width: cfg.spacing,
            depth: half_extents.z * 2.0,
            v_drift: cfg.v_drift,
            adjacent: Vec::new(),
        });
    }

    cells.sort_by(|a, b| a.transverse_coord.partial_cmp(&b.transverse_coord).unwrap());

    Ok(TrackerPlane {
        id: encode_plane_id(module_id, 0, orientation),
        local_id: orientation,
        center,
        half_extent_transverse: half_extents.y,
        half_extent_along_wire: half_extents.x,
        wire_angle_rad: cfg.angle,
        cells,
    })
}

fn build_straw_plane(
    node: &VolumeNode,
    to_world: &Transform2,
    module_id: u64,
    orientation: OrientationClass,
) -> Result<TrackerPlane, GeometryError> {
    let half_extents = node.shape.half_extents();
    let center = to_world.apply(Point3::origin());
    let plane_id = encode_plane_id(module_id, 1, orientation);

    let mut cells = Vec::new();
    for (tube_idx, tube) in node.children.iter().enumerate() {
        let tube_half = tube.shape.half_extents();
        let tube_to_world = to_world.compose(&tube.to_parent);
        let tube_center_local = tube.to_parent.translation;

        let point_local = Point2::new(tube_center_local.x, tube_center_local.y);
        let direction_local = Vector2::new(1.0, 0.0);
        let hits = line_rect_intersections(point_local, direction_local, half_extents.x, half_extents.y);
        if hits.len() < 2 {
            continue;
        }
        let (p0, p1) = (hits[0], hits[1]);
        let length = (p1 - p0).norm();

        let endpoint_a = to_world.apply(Point3::new(p0.x, p0.y, 0.0));
        let endpoint_b = to_world.apply(Point3::new(p1.x, p1.y, 0.0));
        let wire_center = Point3::from((endpoint_a.coords + endpoint_b.coords) / 2.0);

        let cell_id = encode_cell_id(plane_id, tube_idx as u32);
        let wire = Wire {
            id: cell_id,
            endpoint_a,
            endpoint_b,
            center: wire_center,
            length,
            orientation,
            readout_end: ReadoutEnd::A,
        };

        let width = 2.0 * tube_half.y;
        cells.push(Cell {
            id: cell_id,
            wire,
            transverse_coord: tube_center_local.y,
            width,
            depth: tube_half.x * 2.0,
            v_drift: 0.05,
            adjacent: Vec::new(),
        });
    }

    cells.sort_by(|a, b| a.transverse_coord.partial_cmp(&b.transverse_coord).unwrap());

    Ok(TrackerPlane {
        id: plane_id,
        local_id: orientation,
        center,
        half_extent_transverse: half_extents.y,
        half_extent_along_wire: half_extents.x,
        wire_angle_rad: 0.0,
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn horizontal_drift_config() -> GeometryConfig {
        let mut cfg = GeometryConfig::default();
        cfg.orientations.insert(0, crate::config::OrientationConfig { angle: 0.0, offset: 0.0, spacing: 10.0, min_length: 10.0, v_drift: 0.05 });
        cfg
    }

    fn single_plane_node() -> VolumeNode {
        VolumeNode::leaf(
            "drift_plane_0",
            VolumeShape::BBox { half_x: 500.0, half_y: 250.0, half_z: 5.0 },
            Transform2 { rotation_rad: 0.0, translation: Vector3::new(0.0, 0.0, 1000.0) },
        )
    }

    #[test]
    fn wire_length_matches_endpoint_distance() {
        let config = horizontal_drift_config();
        let index = GeometryIndex::build(&single_plane_node(), &config).unwrap();
        let plane = &index.planes()[0];
        for cell in plane.cells() {
            let computed = (cell.wire.endpoint_b - cell.wire.endpoint_a).norm();
            assert_relative_eq!(computed, cell.wire.length, epsilon = 1e-6);
        }
    }

    #[test]
    fn wire_endpoints_lie_on_plane_boundary() {
        let config = horizontal_drift_config();
        let index = GeometryIndex::build(&single_plane_node(), &config).unwrap();
        let plane = &index.planes()[0];
        for cell in plane.cells() {
            for endpoint in [cell.wire.endpoint_a, cell.wire.endpoint_b] {
                let local = plane.world_to_local(endpoint);
                let on_x_boundary = (local.x.abs() - plane.half_extent_along_wire).abs() < 1.0;
                let on_y_boundary = (local.y.abs() - plane.half_extent_transverse).abs() < 1.0;
                assert!(on_x_boundary || on_y_boundary, "endpoint not on boundary: {:?}", local);
            }
        }
    }

    #[test]
    fn point_at_wire_center_resolves_to_its_own_cell() {
        let config = horizontal_drift_config();
        let index = GeometryIndex::build(&single_plane_node(), &config).unwrap();
        let plane = &index.planes()[0];
        let sample = plane.cells()[3].clone();
        let found = plane.get_cell_at_point(sample.wire.center).unwrap();
        assert_eq!(found.id, sample.id);
    }

    #[test]
    fn segment_distance_is_zero_for_intersecting_segments() {
        let p1 = Point3::new(0.0, -1.0, 0.0);
        let q1 = Point3::new(0.0, 1.0, 0.0);
        let p2 = Point3::new(-1.0, 0.0, 0.0);
        let q2 = Point3::new(1.0, 0.0, 0.0);
        let d = segment_segment_distance(p1, q1, p2, q2);
        assert_relative_eq!(d, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn segment_distance_parallel_segments() {
        let p1 = Point3::new(0.0, 0.0, 0.0);
        let q1 = Point3::new(10.0, 0.0, 0.0);
        let p2 = Point3::new(0.0, 5.0, 0.0);
        let q2 = Point3::new(10.0, 5.0, 0.0);
        let d = segment_segment_distance(p1, q1, p2, q2);
        assert_relative_eq!(d, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let config = horizontal_drift_config();
        let mut root = VolumeNode { name: "module".into(), shape: VolumeShape::BBox { half_x: 600.0, half_y: 300.0, half_z: 20.0 }, to_parent: Transform2::identity(), children: Vec::new() };
        for i in 0..3 {
            root.children.push(VolumeNode::leaf(
                format!("drift_plane_0"),
                VolumeShape::BBox { half_x: 500.0, half_y: 250.0, half_z: 5.0 },
                Transform2 { rotation_rad: 0.0, translation: Vector3::new(0.0, 0.0, (i as f64) * 15.0) },
            ));
        }
        let index = GeometryIndex::build(&root, &config).unwrap();
        for plane in index.planes() {
            for cell in plane.cells() {
                for &neighbor_id in &cell.adjacent {
                    let neighbor = index.cell_by_global_id(neighbor_id).expect("neighbor exists");
                    assert!(neighbor.adjacent.contains(&cell.id), "adjacency not symmetric for {} <-> {}", cell.id, neighbor_id);
                }
            }
        }
    }

    #[test]
    fn line_rect_intersection_rejects_degenerate_direction() {
        let hits = line_rect_intersections(Point2::new(0.0, 0.0), Vector2::new(0.0, 0.0), 10.0, 10.0);
        assert!(hits.is_empty());
    }
}
