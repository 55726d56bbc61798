//! Celestial-to-horizon conversion of scan paths and the mount-consumable
//! program-track serialization.

pub mod sidereal;

use tracing::debug;

use crate::core::{HorizonPath, HorizonSample, ProgramTrack, SiteLocation, SkyPath};
use crate::error::{Error, Result};
use crate::time::ModifiedJulianDate;

/// Convert a time-tagged equatorial path to the horizon frame at `site`.
///
/// Each sample is transformed at its own timestamp; the output has the same
/// length and order as the input. The caller is responsible for validating
/// the returned altitudes against the elevation limit before issuing any
/// motion command.
pub fn transform(sky: &SkyPath, site: &SiteLocation) -> HorizonPath {
    let samples = sky
        .samples
        .iter()
        .map(|s| {
            let p = sidereal::to_horizon(s.ra_deg, s.dec_deg, site, s.time);
            HorizonSample {
                az_deg: p.az_deg,
                alt_deg: p.alt_deg,
                time: s.time,
                on_source: s.on_source,
                parallactic_deg: p.parallactic_deg,
            }
        })
        .collect();
    debug!(samples = sky.len(), "transformed path to horizon frame");
    HorizonPath { samples }
}

/// Serialize a horizon path as a mount program track.
///
/// One line per sample, newline-terminated, in sample order:
/// `<time-as-MJD> <az:.8f> <alt:.8f> <flag> <parallactic_deg>` where the
/// flag is the sample's on-source flag as 0/1.
pub fn program_track(path: &HorizonPath) -> ProgramTrack {
    let mut table = String::with_capacity(path.len() * 64);
    for s in &path.samples {
        let mjd = ModifiedJulianDate::from_utc(s.time).value();
        table.push_str(&format!(
            "{} {:.8} {:.8} {} {}\n",
            mjd,
            s.az_deg,
            s.alt_deg,
            u8::from(s.on_source),
            s.parallactic_deg,
        ));
    }
    ProgramTrack::new(table)
}

/// Check every altitude of the path against the elevation limit.
pub fn ensure_above_min_elevation(path: &HorizonPath, min_el_deg: f64) -> Result<()> {
    match path.min_altitude_deg() {
        Some(alt) if alt < min_el_deg => Err(Error::Safety(format!(
            "scan reaches altitude {alt:.3} deg, below the minimum of {min_el_deg:.3} deg"
        ))),
        Some(_) => Ok(()),
        None => Err(Error::Safety("scan path is empty".into())),
    }
}
