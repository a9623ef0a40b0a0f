//! Helix parametrization (spec.md §3, GLOSSARY).
//!
//! The magnetic field is axial along x, so the bending plane is (z, y)
//! — a circle — and the non-bending plane is (x, z) — a line. A single
//! arc-length parameter `s` ties the two together:
//!
//! ```text
//! z(s) = z0 + R * (sin(phi0 + h*s_t/R) - sin(phi0))
//! y(s) = y0 + h*R * (cos(phi0) - cos(phi0 + h*s_t/R))
//! x(s) = x0 + s * sin(dip)
//! ```
//! with `s_t = s * cos(dip)` the arc length projected into the bending
//! plane.

use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::MOMENTUM_COEFFICIENT;

/// A circle in the bending plane, `(z, y)` coordinates stored as
/// `(center.x, center.y) = (z_c, y_c)` to keep the fit code's algebra
/// in the same order as its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle2D {
    pub center: Point2<f64>,
    pub radius: f64,
}

impl Circle2D {
    /// Unsigned distance from `(z, y)` to the circle.
    pub fn distance_to_point(&self, z: f64, y: f64) -> f64 {
        let d = ((z - self.center.x).powi(2) + (y - self.center.y).powi(2)).sqrt();
        (d - self.radius).abs()
    }
}

/// A line in the non-bending plane: `x = slope * z + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line2D {
    pub slope: f64,
    pub intercept: f64,
}

impl Line2D {
    pub fn x_at(&self, z: f64) -> f64 {
        self.slope * z + self.intercept
    }

    /// Signed perpendicular distance from `(z, x)` to the line.
    pub fn distance_to_point(&self, z: f64, x: f64) -> f64 {
        (x - self.x_at(z)) / (1.0 + self.slope * self.slope).sqrt()
    }
}

/// A 3D helix: `R`, dip angle `lambda`, phase `phi0`, helicity `h`, and
/// the 3D point at `s = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Helix {
    pub radius: f64,
    pub dip: f64,
    pub phi0: f64,
    pub helicity: f64,
    pub origin: Point3<f64>,
    pub s_min: Option<f64>,
    pub s_max: Option<f64>,
}

impl Helix {
    pub fn new(radius: f64, dip: f64, phi0: f64, helicity: f64, origin: Point3<f64>) -> Self {
        Self { radius, dip, phi0, helicity, origin, s_min: None, s_max: None }
    }

    pub fn with_arc_window(mut self, s_min: f64, s_max: f64) -> Self {
        self.s_min = Some(s_min);
        self.s_max = Some(s_max);
        self
    }

    pub fn in_arc_window(&self, s: f64) -> bool {
        match (self.s_min, self.s_max) {
            (Some(lo), Some(hi)) => s >= lo && s <= hi,
            _ => true,
        }
    }

    /// Position along the helix at arc length `s` (measured from the
    /// origin point).
    pub fn position_at_s(&self, s: f64) -> Point3<f64> {
        let s_t = s * self.dip.cos();
        let phase = self.phi0 + self.helicity * s_t / self.radius;
        let z = self.origin.z + self.radius * (phase.sin() - self.phi0.sin());
        let y = self.origin.y + self.helicity * self.radius * (self.phi0.cos() - phase.cos());
        let x = self.origin.x + s * self.dip.sin();
        Point3::new(x, y, z)
    }

    /// The circle the helix traces in the bending plane.
    pub fn bending_circle(&self) -> Circle2D {
        let cz = self.origin.z - self.radius * self.phi0.sin();
        let cy = self.origin.y + self.helicity * self.radius * self.phi0.cos();
        Circle2D { center: Point2::new(cz, cy), radius: self.radius }
    }

    /// Invert `z(phi)` for `phi` given a target `z`. Returns `None` when
    /// `z` is unreachable by this circle (`|arg| > 1`).
    pub fn phi_from_z(&self, z: f64) -> Option<f64> {
        let arg = (z - self.origin.z) / self.radius + self.phi0.sin();
        if arg.abs() > 1.0 {
            None
        } else {
            Some(arg.asin())
        }
    }

    /// Arc length `s` corresponding to a bending-plane phase `phi`.
    pub fn s_from_phi(&self, phi: f64) -> f64 {
        let s_t = self.helicity * self.radius * (phi - self.phi0);
        s_t / self.dip.cos()
    }

    /// Transverse momentum magnitude, GeV, from `p_perp = k * B * R[m]`.
    pub fn transverse_momentum(&self, b_field_tesla: f64) -> f64 {
        MOMENTUM_COEFFICIENT * b_field_tesla * (self.radius / 1000.0)
    }

    /// Full 3D momentum vector at `s = 0` (GLOSSARY "p_perp").
    pub fn momentum_at_origin(&self, b_field_tesla: f64) -> Vector3<f64> {
        let p_perp = self.transverse_momentum(b_field_tesla);
        let p = p_perp / self.dip.cos();
        let dz_ds = self.helicity * self.dip.cos() * self.phi0.cos();
        let dy_ds = self.dip.cos() * self.phi0.sin();
        let dx_ds = self.dip.sin();
        Vector3::new(p * dx_ds, p * dy_ds, p * dz_ds)
    }

    /// Build a helix from a starting point, momentum vector, charge sign
    /// and field strength — grounded on `Helix(const TG4Trajectory&)` in
    /// `SANDRecoUtils.h`, used to seed truth-level digitization and as a
    /// reference helix in tests.
    ///
    /// Helicity is taken as the sign of the charge: a positive particle
    /// curves with `h = +1` in this convention. A full Lorentz-force
    /// derivation would also depend on the sign of `b_field_tesla`; this
    /// crate only ever runs with a positive axial field, so the
    /// simplification is recorded rather than generalized.
    pub fn from_initial_momentum(origin: Point3<f64>, momentum: Vector3<f64>, charge: f64, b_field_tesla: f64) -> Self {
        let p_perp = (momentum.y * momentum.y + momentum.z * momentum.z).sqrt();
        let p = momentum.norm();
        let helicity = if charge >= 0.0 { 1.0 } else { -1.0 };
        let radius_m = p_perp / (MOMENTUM_COEFFICIENT * b_field_tesla);
        let radius = radius_m * 1000.0;
        let dip = (momentum.x / p).asin();
        let phi0 = momentum.y.atan2(helicity * momentum.z);
        Self::new(radius, dip, phi0, helicity, origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn position_at_zero_is_the_origin() {
        let h = Helix::new(800.0, 0.1, 0.3, 1.0, Point3::new(0.0, 0.0, 0.0));
        let p = h.position_at_s(0.0);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn bending_projection_lies_on_its_own_circle() {
        let h = Helix::new(800.0, 0.15, 0.4, -1.0, Point3::new(0.0, 10.0, -20.0));
        let circle = h.bending_circle();
        for s in [-50.0, -10.0, 0.0, 25.0, 100.0] {
            let p = h.position_at_s(s);
            let d = circle.distance_to_point(p.z, p.y);
            assert_relative_eq!(d, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn x_grows_linearly_with_arc_length() {
        let h = Helix::new(800.0, 0.2, 0.0, 1.0, Point3::new(5.0, 0.0, 0.0));
        let p1 = h.position_at_s(10.0);
        let p2 = h.position_at_s(20.0);
        assert_relative_eq!(p2.x - p1.x, 10.0 * 0.2_f64.sin(), epsilon = 1e-9);
    }

    #[test]
    fn from_initial_momentum_round_trips_transverse_momentum() {
        let origin = Point3::new(0.0, 0.0, 0.0);
        let momentum = Vector3::new(0.05, 0.3, 0.9);
        let helix = Helix::from_initial_momentum(origin, momentum, 1.0, 0.6);
        let p_perp_in = (momentum.y.powi(2) + momentum.z.powi(2)).sqrt();
        assert_relative_eq!(helix.transverse_momentum(0.6), p_perp_in, epsilon = 1e-6);
    }

    #[test]
    fn phi_from_z_inverts_position_at_s() {
        let h = Helix::new(800.0, 0.1, 0.2, 1.0, Point3::new(0.0, 0.0, 0.0));
        let s = 15.0;
        let p = h.position_at_s(s);
        let phi = h.phi_from_z(p.z).expect("reachable z");
        let s_recovered = h.s_from_phi(phi);
        assert_relative_eq!(s_recovered, s, epsilon = 1e-6);
    }
}
