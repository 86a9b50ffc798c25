// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! Circular-orbit geometry for a satellite-to-ground link

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mean Earth radius (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Standard gravitational parameter of Earth (km³/s²)
pub const EARTH_MU: f64 = 398_600.4418;

/// Below this elevation no QKD session is attempted
pub const MIN_ELEVATION_DEG: f64 = 10.0;
const MARGINAL_ELEVATION_DEG: f64 = 15.0;
const GOOD_ELEVATION_DEG: f64 = 45.0;

/// Slant range, orbital period and velocity for one pass geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteStats {
    pub altitude_km: f64,
    pub elevation_angle_deg: f64,
    pub distance_km: f64,
    pub orbital_period_minutes: f64,
    pub orbital_velocity_km_s: f64,
    pub visibility_status: String,
}

impl SatelliteStats {
    pub fn compute(altitude_km: f64, elevation_angle_deg: f64) -> Result<Self> {
        if !altitude_km.is_finite() || altitude_km <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "altitude_km must be positive, got {}",
                altitude_km
            )));
        }
        if !(0.0..=90.0).contains(&elevation_angle_deg) {
            return Err(Error::InvalidParameter(format!(
                "elevation_angle_deg must be within [0, 90], got {}",
                elevation_angle_deg
            )));
        }

        let orbit_radius = EARTH_RADIUS_KM + altitude_km;
        Ok(Self {
            altitude_km,
            elevation_angle_deg,
            distance_km: slant_distance(altitude_km, elevation_angle_deg),
            orbital_period_minutes: 2.0 * PI * (orbit_radius.powi(3) / EARTH_MU).sqrt() / 60.0,
            orbital_velocity_km_s: (EARTH_MU / orbit_radius).sqrt(),
            visibility_status: visibility_status(elevation_angle_deg).to_string(),
        })
    }

    pub fn is_link_possible(&self) -> bool {
        self.elevation_angle_deg >= MIN_ELEVATION_DEG
    }
}

/// Ground-station-to-satellite slant range over a spherical Earth.
///
/// Equals the altitude at zenith and grows toward the horizon.
pub fn slant_distance(altitude_km: f64, elevation_angle_deg: f64) -> f64 {
    let r = EARTH_RADIUS_KM;
    let orbit_radius = r + altitude_km;
    let e = elevation_angle_deg.to_radians();
    (orbit_radius.powi(2) - (r * e.cos()).powi(2)).sqrt() - r * e.sin()
}

pub fn visibility_status(elevation_angle_deg: f64) -> &'static str {
    if elevation_angle_deg < MIN_ELEVATION_DEG {
        "Below horizon - QKD not possible"
    } else if elevation_angle_deg < MARGINAL_ELEVATION_DEG {
        "Low elevation - marginal link quality"
    } else if elevation_angle_deg < GOOD_ELEVATION_DEG {
        "Good visibility"
    } else {
        "Excellent visibility - near zenith"
    }
}
