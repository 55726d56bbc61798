//! Zenithal-tangent (gnomonic) projection around a source.
//!
//! The raster pattern lives on a flat tangent plane centered on the target;
//! this module maps plane offsets back onto the celestial sphere. The scale
//! is far below the sample spacing, so projection rounding is negligible.

/// Tangent point on the sky.
#[derive(Debug, Clone, Copy)]
pub struct TangentPoint {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

/// Inverse gnomonic projection of a tangent-plane offset.
///
/// `xi_deg` runs along increasing right ascension, `eta_deg` along
/// increasing declination, both in degrees at the tangent point. Returns
/// `(ra_deg, dec_deg)` with RA normalized to `[0, 360)`.
pub fn plane_to_equatorial(center: TangentPoint, xi_deg: f64, eta_deg: f64) -> (f64, f64) {
    let xi = xi_deg.to_radians();
    let eta = eta_deg.to_radians();
    let ra0 = center.ra_deg.to_radians();
    let dec0 = center.dec_deg.to_radians();

    let (sin_dec0, cos_dec0) = dec0.sin_cos();
    let denom = (1.0 + xi * xi + eta * eta).sqrt();

    let dec = ((sin_dec0 + eta * cos_dec0) / denom).asin();
    let ra = ra0 + xi.atan2(cos_dec0 - eta * sin_dec0);

    (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
}
