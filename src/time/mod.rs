//! Time handling: Modified Julian Dates and UTC conversions.

pub mod mjd;

pub use mjd::ModifiedJulianDate;
