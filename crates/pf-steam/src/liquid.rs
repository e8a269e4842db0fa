//! Saturated and compressed liquid properties.

use crate::error::{SteamError, SteamResult};
use crate::interp;
use crate::saturation::{p_sat, T_CRIT_K, T_MAX_K, T_MIN_K};

const RHO_CRIT: f64 = 322.0;

// IAPWS SR1-86 auxiliary equation, saturated liquid density.
const B: [f64; 6] = [
    1.992_740_64,
    1.099_653_42,
    -0.510_839_303,
    -1.754_934_79,
    -45.517_035_2,
    -674_694.450,
];

/// Saturated liquid density (kg/m3) at temperature `t_k`.
pub fn rho_liquid_sat(t_k: f64) -> SteamResult<f64> {
    if !(T_MIN_K..=T_MAX_K).contains(&t_k) {
        return Err(SteamError::OutOfRange {
            what: "liquid temperature (K)",
            value: t_k,
        });
    }
    let tau = 1.0 - t_k / T_CRIT_K;
    let ratio = 1.0
        + B[0] * tau.powf(1.0 / 3.0)
        + B[1] * tau.powf(2.0 / 3.0)
        + B[2] * tau.powf(5.0 / 3.0)
        + B[3] * tau.powf(16.0 / 3.0)
        + B[4] * tau.powf(43.0 / 3.0)
        + B[5] * tau.powf(110.0 / 3.0);
    Ok(RHO_CRIT * ratio)
}

/// Compressed (subcooled) liquid density: saturated density corrected for
/// pressure above saturation through the isothermal bulk modulus.
pub fn rho_liquid_compressed(t_k: f64, p_pa: f64) -> SteamResult<f64> {
    let rho_sat = rho_liquid_sat(t_k)?;
    let k_t = bulk_modulus(t_k)?;
    let dp = p_pa - p_sat(t_k)?;
    Ok(rho_sat * (1.0 + dp / k_t))
}

// Isobaric specific heat of saturated liquid water, J/(kg K).
const CP_TABLE: [(f64, f64); 13] = [
    (273.16, 4220.0),
    (300.0, 4181.0),
    (320.0, 4181.0),
    (340.0, 4189.0),
    (360.0, 4203.0),
    (380.0, 4226.0),
    (400.0, 4256.0),
    (440.0, 4357.0),
    (480.0, 4533.0),
    (520.0, 4838.0),
    (560.0, 5423.0),
    (600.0, 6953.0),
    (640.0, 12_000.0),
];

/// Liquid specific heat (J/(kg K)) on the saturation line.
pub fn cp_liquid(t_k: f64) -> SteamResult<f64> {
    interp(&CP_TABLE, t_k).ok_or(SteamError::OutOfRange {
        what: "cp temperature (K)",
        value: t_k,
    })
}

// Isothermal bulk modulus of liquid water, Pa. Peaks near 320 K, then
// softens toward the critical point.
const BULK_TABLE: [(f64, f64); 9] = [
    (273.16, 1.96e9),
    (320.0, 2.28e9),
    (373.15, 2.08e9),
    (423.0, 1.70e9),
    (473.0, 1.30e9),
    (523.0, 0.95e9),
    (573.0, 0.60e9),
    (613.0, 0.30e9),
    (640.0, 0.15e9),
];

/// Isothermal bulk modulus (Pa) of liquid water.
pub fn bulk_modulus(t_k: f64) -> SteamResult<f64> {
    interp(&BULK_TABLE, t_k).ok_or(SteamError::OutOfRange {
        what: "bulk modulus temperature (K)",
        value: t_k,
    })
}

/// Volumetric thermal expansion coefficient (1/K) of saturated liquid,
/// from a centered difference on the density correlation.
pub fn thermal_expansion(t_k: f64) -> SteamResult<f64> {
    let h = 0.5;
    let t_lo = (t_k - h).max(T_MIN_K);
    let t_hi = (t_k + h).min(T_MAX_K);
    let rho = rho_liquid_sat(t_k)?;
    let drho_dt = (rho_liquid_sat(t_hi)? - rho_liquid_sat(t_lo)?) / (t_hi - t_lo);
    Ok(-drho_dt / rho)
}
