//! Saturation line: Wagner-Pruss auxiliary equation and its inverse.

use crate::error::{SteamError, SteamResult};

/// Critical temperature of water (K).
pub const T_CRIT_K: f64 = 647.096;
/// Critical pressure of water (Pa).
pub const P_CRIT_PA: f64 = 22.064e6;

/// Lower bound of the validity range (triple point, K).
pub const T_MIN_K: f64 = 273.16;
/// Upper bound of the validity range (K). The heatup envelope tops out
/// well below the critical point; the auxiliary correlations degrade
/// above this.
pub const T_MAX_K: f64 = 640.0;

const P_MIN_PA: f64 = 1.0e3;
const P_MAX_PA: f64 = 22.0e6;

// Wagner-Pruss saturation-pressure coefficients.
const A: [f64; 6] = [
    -7.859_517_83,
    1.844_082_59,
    -11.786_649_7,
    22.680_741_1,
    -15.961_871_9,
    1.801_225_02,
];

/// Saturation pressure (Pa) at temperature `t_k`.
pub fn p_sat(t_k: f64) -> SteamResult<f64> {
    if !(T_MIN_K..=T_MAX_K).contains(&t_k) {
        return Err(SteamError::OutOfRange {
            what: "saturation temperature (K)",
            value: t_k,
        });
    }
    let tau = 1.0 - t_k / T_CRIT_K;
    let poly = A[0] * tau
        + A[1] * tau.powf(1.5)
        + A[2] * tau.powi(3)
        + A[3] * tau.powf(3.5)
        + A[4] * tau.powi(4)
        + A[5] * tau.powf(7.5);
    Ok(P_CRIT_PA * (T_CRIT_K / t_k * poly).exp())
}

/// Saturation temperature (K) at pressure `p_pa`, by Newton iteration on
/// `ln p_sat(T)` with a bisection fallback bracket.
pub fn t_sat(p_pa: f64) -> SteamResult<f64> {
    if !(P_MIN_PA..=P_MAX_PA).contains(&p_pa) {
        return Err(SteamError::OutOfRange {
            what: "saturation pressure (Pa)",
            value: p_pa,
        });
    }

    const MAX_ITER: usize = 60;
    const TOL_K: f64 = 1e-8;

    let ln_target = p_pa.ln();
    let (mut t_lo, mut t_hi) = (T_MIN_K, T_MAX_K);
    let mut t = 0.5 * (t_lo + t_hi);

    for _ in 0..MAX_ITER {
        let f = p_sat(t)?.ln() - ln_target;
        if f > 0.0 {
            t_hi = t;
        } else {
            t_lo = t;
        }

        // d(ln p)/dT from a centered difference; the bracket guards the
        // Newton step.
        let h = 1e-4 * t;
        let dfdt = (p_sat((t + h).min(T_MAX_K))?.ln() - p_sat((t - h).max(T_MIN_K))?.ln())
            / ((t + h).min(T_MAX_K) - (t - h).max(T_MIN_K));
        let mut t_next = t - f / dfdt;
        if !(t_lo..=t_hi).contains(&t_next) {
            t_next = 0.5 * (t_lo + t_hi);
        }

        if (t_next - t).abs() < TOL_K {
            return Ok(t_next);
        }
        t = t_next;
    }

    Err(SteamError::ConvergenceFailed {
        what: "t_sat: iteration did not converge",
    })
}
