//! Sidereal time and the equatorial-to-horizon transform.
//!
//! Greenwich mean sidereal time comes from the standard linear polynomial on
//! the Julian date; the horizon conversion and parallactic angle are plain
//! spherical trigonometry. No precession/nutation chain is applied: the same
//! transform is used for the pre-check and the executed path, and the
//! residual is far below the sample spacing of the scans this drives.

use chrono::{DateTime, Utc};

use crate::core::SiteLocation;
use crate::time::ModifiedJulianDate;

/// Greenwich mean sidereal time in degrees at `t`.
pub fn gmst_deg(t: DateTime<Utc>) -> f64 {
    let d = ModifiedJulianDate::from_utc(t).to_jd() - 2_451_545.0;
    (280.460_618_37 + 360.985_647_366_29 * d).rem_euclid(360.0)
}

/// Local sidereal time in degrees at an east-positive longitude.
pub fn lst_deg(t: DateTime<Utc>, longitude_deg: f64) -> f64 {
    (gmst_deg(t) + longitude_deg).rem_euclid(360.0)
}

/// Horizon-frame pointing of a target at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizonPointing {
    /// Azimuth from north through east, degrees in `[0, 360)`.
    pub az_deg: f64,
    pub alt_deg: f64,
    pub parallactic_deg: f64,
}

/// Convert `(ra, dec)` to topocentric azimuth/altitude at `site` and `t`,
/// with the target's parallactic angle at that instant.
pub fn to_horizon(ra_deg: f64, dec_deg: f64, site: &SiteLocation, t: DateTime<Utc>) -> HorizonPointing {
    let hour_angle = (lst_deg(t, site.longitude_deg) - ra_deg).to_radians();
    let dec = dec_deg.to_radians();
    let lat = site.latitude_deg.to_radians();

    let (sin_h, cos_h) = hour_angle.sin_cos();
    let (sin_dec, cos_dec) = dec.sin_cos();
    let (sin_lat, cos_lat) = lat.sin_cos();

    let alt = (sin_lat * sin_dec + cos_lat * cos_dec * cos_h).asin();
    let az = (-cos_dec * sin_h).atan2(sin_dec * cos_lat - cos_dec * cos_h * sin_lat);
    let parallactic = sin_h.atan2(lat.tan() * cos_dec - sin_dec * cos_h);

    HorizonPointing {
        az_deg: az.to_degrees().rem_euclid(360.0),
        alt_deg: alt.to_degrees(),
        parallactic_deg: parallactic.to_degrees(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn site() -> SiteLocation {
        SiteLocation {
            latitude_deg: -30.7,
            longitude_deg: 21.4,
            height_m: 1050.0,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 11, 21, 0, 0).unwrap()
    }

    #[test]
    fn gmst_matches_reference_epoch() {
        // At J2000.0 (2000-01-01 12:00 UTC) GMST is ~280.46 deg.
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((gmst_deg(j2000) - 280.460_618_37).abs() < 1e-6);
    }

    #[test]
    fn celestial_pole_altitude_equals_latitude() {
        let p = to_horizon(0.0, -90.0, &site(), t0());
        assert!((p.alt_deg - 30.7).abs() < 1e-9);
        assert!((p.az_deg - 180.0).abs() < 1e-9);
    }

    #[test]
    fn target_on_meridian_is_due_north_or_south() {
        let s = site();
        let ra = lst_deg(t0(), s.longitude_deg);
        // Declination above the site latitude, i.e. north of zenith.
        let north = to_horizon(ra, 20.0, &s, t0());
        assert!((north.az_deg).min(360.0 - north.az_deg) < 1e-6);
        // South of zenith the parallactic angle vanishes on the meridian.
        let south = to_horizon(ra, -60.0, &s, t0());
        assert!((south.az_deg - 180.0).abs() < 1e-6);
        assert!(south.parallactic_deg.abs() < 1e-6);
    }

    #[test]
    fn setting_target_is_west() {
        let s = site();
        // Hour angle of +60 deg: well past the meridian, i.e. to the west.
        let ra = (lst_deg(t0(), s.longitude_deg) - 60.0).rem_euclid(360.0);
        let p = to_horizon(ra, -30.0, &s, t0());
        assert!(p.az_deg > 180.0 && p.az_deg < 360.0);
    }

    #[test]
    fn altitude_is_bounded() {
        let s = site();
        for ra in [0.0, 90.0, 180.0, 270.0] {
            for dec in [-80.0, -30.0, 0.0, 45.0] {
                let p = to_horizon(ra, dec, &s, t0());
                assert!(p.alt_deg <= 90.0 && p.alt_deg >= -90.0);
                assert!((0.0..360.0).contains(&p.az_deg));
            }
        }
    }
}
