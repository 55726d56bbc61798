//! On-the-fly scan observer for an alt-az radio telescope.
//!
//! The crate plans boustrophedon raster scans across calibrator sources,
//! transforms them into timestamped horizon-frame program tracks, and drives
//! the antenna control unit and capture backend through a full observation:
//!
//! - [`scan`] builds the raster pattern in the tangent plane and projects it
//!   onto the sky around a source.
//! - [`transform`] converts equatorial paths into azimuth/elevation tracks
//!   with parallactic angles and renders the program-track wire format.
//! - [`mount`] is the HTTP device-control client: authority arbitration, axis
//!   activation, slews, track upload, and data-logging sessions.
//! - [`backend`] and [`shipper`] are the seams to the capture backend and the
//!   log shipper; null implementations keep stand-alone runs working.
//! - [`observe`] orchestrates one scan per source, applying flux and
//!   elevation gates before any hardware is touched.

pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod mount;
pub mod observe;
pub mod scan;
pub mod shipper;
pub mod time;
pub mod transform;

pub use config::Config;
pub use error::{Error, Result};
