//! Modified Julian Date value type and UTC conversions.
//!
//! The mount's program-track format and the turnaround bookkeeping both work
//! in MJD, while everything wall-clock facing uses `chrono::DateTime<Utc>`.
//! This module is the single place where the two meet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MJD of the Unix epoch (1970-01-01 00:00:00 UTC).
const MJD_UNIX_EPOCH: f64 = 40587.0;

/// A Modified Julian Date, kept as a thin wrapper around `f64`.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ModifiedJulianDate(f64);

impl ModifiedJulianDate {
    /// Create a new MJD value.
    pub fn new(v: f64) -> Self {
        Self(v)
    }

    /// Raw MJD value as f64.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Julian Date corresponding to this MJD.
    pub fn to_jd(&self) -> f64 {
        self.0 + 2_400_000.5
    }

    /// Convert a UTC instant to MJD.
    pub fn from_utc(t: DateTime<Utc>) -> Self {
        Self(t.timestamp_millis() as f64 / 86_400_000.0 + MJD_UNIX_EPOCH)
    }

    /// Convert back to a UTC instant, with millisecond resolution.
    ///
    /// Returns `None` for values outside the representable chrono range.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let millis = ((self.0 - MJD_UNIX_EPOCH) * 86_400_000.0).round() as i64;
        DateTime::<Utc>::from_timestamp_millis(millis)
    }
}

impl From<f64> for ModifiedJulianDate {
    fn from(v: f64) -> Self {
        ModifiedJulianDate::new(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn unix_epoch_is_mjd_40587() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(ModifiedJulianDate::from_utc(epoch).value(), 40587.0);
    }

    #[test]
    fn known_mjd_conversion() {
        // MJD 59580.0 = 2022-01-01 00:00:00 UTC
        let t = ModifiedJulianDate::new(59580.0).to_utc().unwrap();
        assert_eq!(t.year(), 2022);
        assert_eq!(t.month(), 1);
        assert_eq!(t.day(), 1);
        assert_eq!(t.hour(), 0);
    }

    #[test]
    fn utc_roundtrip() {
        let t = Utc.with_ymd_and_hms(2021, 1, 11, 9, 30, 15).unwrap();
        let mjd = ModifiedJulianDate::from_utc(t);
        assert_eq!(mjd.to_utc().unwrap(), t);
    }

    #[test]
    fn mjd_roundtrip_precision() {
        let mjd = 59580.123456;
        let back = ModifiedJulianDate::from_utc(
            ModifiedJulianDate::new(mjd).to_utc().unwrap(),
        );
        // Millisecond resolution is ~1.2e-8 days.
        assert!((back.value() - mjd).abs() < 2e-8);
    }
}
