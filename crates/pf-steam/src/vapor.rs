//! Saturated vapor properties.

use crate::error::{SteamError, SteamResult};
use crate::saturation::{T_CRIT_K, T_MAX_K, T_MIN_K};

const RHO_CRIT: f64 = 322.0;

// IAPWS SR1-86 auxiliary equation, saturated vapor density.
const C: [f64; 6] = [
    -2.031_502_40,
    -2.683_029_40,
    -5.386_264_92,
    -17.299_160_5,
    -44.758_658_1,
    -63.920_106_3,
];

/// Saturated vapor density (kg/m3) at temperature `t_k`.
pub fn rho_vapor_sat(t_k: f64) -> SteamResult<f64> {
    if !(T_MIN_K..=T_MAX_K).contains(&t_k) {
        return Err(SteamError::OutOfRange {
            what: "vapor temperature (K)",
            value: t_k,
        });
    }
    let tau = 1.0 - t_k / T_CRIT_K;
    let ln_ratio = C[0] * tau.powf(2.0 / 6.0)
        + C[1] * tau.powf(4.0 / 6.0)
        + C[2] * tau.powf(8.0 / 6.0)
        + C[3] * tau.powf(18.0 / 6.0)
        + C[4] * tau.powf(37.0 / 6.0)
        + C[5] * tau.powf(71.0 / 6.0);
    Ok(RHO_CRIT * ln_ratio.exp())
}

/// Latent heat of vaporization (J/kg) at temperature `t_k`, by the
/// Watson relation anchored at the normal boiling point.
pub fn latent_heat(t_k: f64) -> SteamResult<f64> {
    if !(T_MIN_K..=T_MAX_K).contains(&t_k) {
        return Err(SteamError::OutOfRange {
            what: "latent heat temperature (K)",
            value: t_k,
        });
    }
    const H_FG_NBP: f64 = 2.256e6;
    const T_NBP: f64 = 373.124;
    let ratio = (T_CRIT_K - t_k) / (T_CRIT_K - T_NBP);
    Ok(H_FG_NBP * ratio.powf(0.38))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steam_density_at_atmospheric() {
        let rho = rho_vapor_sat(373.124).unwrap();
        assert!((rho - 0.597).abs() < 0.02, "rho = {rho}");
    }

    #[test]
    fn steam_density_grows_with_temperature() {
        let lo = rho_vapor_sat(373.15).unwrap();
        let hi = rho_vapor_sat(600.0).unwrap();
        assert!(hi > 50.0 * lo, "lo = {lo}, hi = {hi}");
    }

    #[test]
    fn latent_heat_at_atmospheric() {
        let h = latent_heat(373.124).unwrap();
        assert!((h - 2.256e6).abs() < 1e3);
    }

    #[test]
    fn latent_heat_shrinks_toward_critical() {
        let lo = latent_heat(373.15).unwrap();
        let hi = latent_heat(620.0).unwrap();
        assert!(hi < 0.6 * lo, "lo = {lo}, hi = {hi}");
        assert!(hi > 0.0);
    }
}
