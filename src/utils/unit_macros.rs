#![warn(missing_docs)]
//! Convenience macros for creating [`uom`] length values.

/// Create a `Length` in meter.
#[macro_export]
macro_rules! meter {
    ($val:expr) => {{
        use uom::si::{f64::Length, length::meter};
        Length::new::<meter>($val)
    }};
}

/// Create a `Length` in millimeter.
#[macro_export]
macro_rules! millimeter {
    ($val:expr) => {{
        use uom::si::{f64::Length, length::millimeter};
        Length::new::<millimeter>($val)
    }};
}

/// Create a `Length` in micrometer.
#[macro_export]
macro_rules! micrometer {
    ($val:expr) => {{
        use uom::si::{f64::Length, length::micrometer};
        Length::new::<micrometer>($val)
    }};
}

/// Create a `Length` in nanometer.
#[macro_export]
macro_rules! nanometer {
    ($val:expr) => {{
        use uom::si::{f64::Length, length::nanometer};
        Length::new::<nanometer>($val)
    }};
}

/// Create a `Length` in inch.
#[macro_export]
macro_rules! inch {
    ($val:expr) => {{
        use uom::si::{f64::Length, length::inch};
        Length::new::<inch>($val)
    }};
}

#[cfg(test)]
mod test {
    use approx::assert_abs_diff_eq;
    use uom::si::length::meter;
    #[test]
    fn length_macros() {
        assert_abs_diff_eq!(meter!(1.5).get::<meter>(), 1.5);
        assert_abs_diff_eq!(millimeter!(1.0).get::<meter>(), 1e-3);
        assert_abs_diff_eq!(micrometer!(1.0).get::<meter>(), 1e-6);
        assert_abs_diff_eq!(nanometer!(500.0).get::<meter>(), 5e-7);
        assert_abs_diff_eq!(inch!(1.0).get::<meter>(), 0.0254);
    }
}
