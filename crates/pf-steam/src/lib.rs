//! Water/steam property tables for the primary-plant heatup model.
//!
//! Everything here is a pure function of temperature or pressure on the
//! saturation line (plus compressed-liquid corrections), covering the
//! heatup envelope: 273.16 K to 640 K, 1 kPa to 22 MPa. Out-of-range
//! arguments are errors, never clamps; the callers above are expected
//! to surface them, not absorb them.

pub mod error;
mod liquid;
mod saturation;
mod vapor;

pub use error::{SteamError, SteamResult};
pub use liquid::{bulk_modulus, cp_liquid, rho_liquid_compressed, rho_liquid_sat, thermal_expansion};
pub use saturation::{p_sat, t_sat, T_CRIT_K, P_CRIT_PA, T_MAX_K, T_MIN_K};
pub use vapor::{latent_heat, rho_vapor_sat};

/// Linear interpolation over a sorted `(x, y)` table.
///
/// The tables in this crate are short enough that a linear scan wins over
/// binary search.
pub(crate) fn interp(table: &[(f64, f64)], x: f64) -> Option<f64> {
    let (first, last) = (table.first()?, table.last()?);
    if x < first.0 || x > last.0 {
        return None;
    }
    for w in table.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        if x <= x1 {
            let f = (x - x0) / (x1 - x0);
            return Some(y0 + f * (y1 - y0));
        }
    }
    Some(last.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interp_endpoints_and_midpoint() {
        let t = [(0.0, 0.0), (1.0, 2.0), (2.0, 6.0)];
        assert_eq!(interp(&t, 0.0), Some(0.0));
        assert_eq!(interp(&t, 2.0), Some(6.0));
        assert_eq!(interp(&t, 0.5), Some(1.0));
        assert_eq!(interp(&t, 1.5), Some(4.0));
        assert_eq!(interp(&t, -0.1), None);
        assert_eq!(interp(&t, 2.1), None);
    }
}
