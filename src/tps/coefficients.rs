use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geom::{Point3, Tolerance, Vec3};

/// One radial-basis term of the warp. `control_point` is the source point of
/// the landmark pair the term was solved for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NonAffineTerm {
    pub weight: Vec3,
    pub control_point: Point3,
}

impl NonAffineTerm {
    #[must_use]
    pub const fn new(weight: Vec3, control_point: Point3) -> Self {
        Self {
            weight,
            control_point,
        }
    }
}

/// Solved thin-plate spline warp:
///
/// `f(p) = a1 + a2 * p.x + a3 * p.y + a4 * p.z + sum(w_i * U(|c_i - p|))`
///
/// `a1` is the translation and `a2..a4` are the columns of the linear part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpsCoefficients {
    pub a1: Vec3,
    pub a2: Vec3,
    pub a3: Vec3,
    pub a4: Vec3,
    pub non_affine_terms: Vec<NonAffineTerm>,
}

impl TpsCoefficients {
    /// Coefficients of the identity warp.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            a1: Vec3::ZERO,
            a2: Vec3::X,
            a3: Vec3::Y,
            a4: Vec3::Z,
            non_affine_terms: Vec::new(),
        }
    }

    /// Returns true if these coefficients describe the identity map within `tol`.
    #[must_use]
    pub fn is_identity(&self, tol: Tolerance) -> bool {
        tol.is_zero_vec3(self.a1)
            && tol.approx_eq_vec3(self.a2, Vec3::X)
            && tol.approx_eq_vec3(self.a3, Vec3::Y)
            && tol.approx_eq_vec3(self.a4, Vec3::Z)
            && self
                .non_affine_terms
                .iter()
                .all(|term| tol.is_zero_vec3(term.weight))
    }
}

impl Default for TpsCoefficients {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for TpsCoefficients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = |v: Vec3| format!("({}, {}, {})", v.x, v.y, v.z);
        writeln!(f, "TpsCoefficients")?;
        writeln!(f, "  a1 = {}", v(self.a1))?;
        writeln!(f, "  a2 = {}", v(self.a2))?;
        writeln!(f, "  a3 = {}", v(self.a3))?;
        write!(f, "  a4 = {}", v(self.a4))?;
        for (i, term) in self.non_affine_terms.iter().enumerate() {
            write!(
                f,
                "\n  w{i} = {} @ {}",
                v(term.weight),
                v(term.control_point.to_vec3())
            )?;
        }
        Ok(())
    }
}
