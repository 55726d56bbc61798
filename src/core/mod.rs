//! Core domain types shared by the planning and control layers.

pub mod domain;

pub use domain::{
    HorizonPath, HorizonSample, ProgramTrack, RunGates, ScanGeometry, ScanOutcome, ScanPoint,
    SiteLocation, SkyPath, SkySample, Source,
};
