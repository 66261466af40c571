//! Data types shared across the ground station.
//!
//! - Dashboard status model
//! - Unit conversions

pub mod status;
pub mod units;

pub use status::{
    MissionData, MissionEntry, MissionState, ReplayData, ReplayState, Rn2483RadioData, SerialData,
    StatusData,
};
