// pf-core/src/units.rs

use uom::si::f64::{
    Pressure as UomPressure, ThermodynamicTemperature as UomThermodynamicTemperature,
};

// Public canonical unit types (SI, f64)
pub type Pressure = UomPressure;
pub type Temperature = UomThermodynamicTemperature;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn psi(v: f64) -> Pressure {
    use uom::si::pressure::pound_force_per_square_inch;
    Pressure::new::<pound_force_per_square_inch>(v)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn degf(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::degree_fahrenheit;
    Temperature::new::<degree_fahrenheit>(v)
}

/// Conversion helpers for plant-procedure constants, which the source
/// references give in psi and degrees Fahrenheit.
pub mod convert {
    use super::*;

    #[inline]
    pub fn psi_to_pa(v: f64) -> f64 {
        use uom::si::pressure::pascal;
        psi(v).get::<pascal>()
    }

    #[inline]
    pub fn pa_to_psi(v: f64) -> f64 {
        use uom::si::pressure::pound_force_per_square_inch;
        pa(v).get::<pound_force_per_square_inch>()
    }

    #[inline]
    pub fn degf_to_k(v: f64) -> f64 {
        use uom::si::thermodynamic_temperature::kelvin;
        degf(v).get::<kelvin>()
    }

    #[inline]
    pub fn k_to_degf(v: f64) -> f64 {
        use uom::si::thermodynamic_temperature::degree_fahrenheit;
        k(v).get::<degree_fahrenheit>()
    }

    /// A temperature *interval* of one degree Fahrenheit, in kelvin.
    pub const DEGF_INTERVAL_K: f64 = 5.0 / 9.0;
}
