// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! Free-space optical channel model
//!
//! Photon survival is the product of independent loss terms:
//! - distance attenuation (Beer-Lambert decay with slant range)
//! - base atmospheric absorption (rises with cloud cover)
//! - scattering (rises with cloud thickness, falls with receiver aperture)
//! - turbulence (small, larger in daytime from solar background)

use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Attenuation coefficient per kilometre of slant range
pub const DISTANCE_ATTENUATION_PER_KM: f64 = 1e-4;

/// Aperture at which the weather scattering coefficients are quoted
pub const REFERENCE_APERTURE_CM: f64 = 30.0;

/// Turbulence penalty at night
pub const NIGHT_TURBULENCE: f64 = 0.005;

/// Turbulence penalty in daytime (solar background)
pub const DAY_TURBULENCE: f64 = 0.02;

/// Sky condition over the ground station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Clear,
    LightHaze,
    HeavyClouds,
    Rain,
}

impl Default for Weather {
    fn default() -> Self {
        Self::Clear
    }
}

impl Weather {
    /// Parse from the wire name (case-insensitive)
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "light_haze" => Ok(Self::LightHaze),
            "heavy_clouds" => Ok(Self::HeavyClouds),
            "rain" => Ok(Self::Rain),
            other => Err(Error::InvalidParameter(format!("Unknown weather '{}'", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::LightHaze => "light_haze",
            Self::HeavyClouds => "heavy_clouds",
            Self::Rain => "rain",
        }
    }

    /// Human-readable description of the condition
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear sky, optimal conditions",
            Self::LightHaze => "Light atmospheric haze, minor attenuation",
            Self::HeavyClouds => "Heavy cloud cover, significant attenuation",
            Self::Rain => "Rain or heavy precipitation, QKD not possible",
        }
    }

    /// Fail when the condition blocks the optical link outright
    pub fn ensure_operable(&self) -> Result<()> {
        match self {
            Self::Rain => Err(Error::InvalidChannelConfiguration(
                "QKD is not possible in rain".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Absorption loss probability, or `None` when the link cannot operate
    fn base_loss(&self) -> Option<f64> {
        match self {
            Self::Clear => Some(0.01),
            Self::LightHaze => Some(0.08),
            Self::HeavyClouds => Some(0.35),
            Self::Rain => None,
        }
    }

    /// Scattering coefficient at the reference aperture
    fn scattering_at_reference(&self) -> Option<f64> {
        match self {
            Self::Clear => Some(0.005),
            Self::LightHaze => Some(0.04),
            Self::HeavyClouds => Some(0.20),
            Self::Rain => None,
        }
    }
}

/// Time of day at the ground station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Day,
    Night,
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self::Night
    }
}

impl TimeOfDay {
    /// Parse from the wire name (case-insensitive)
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "night" => Ok(Self::Night),
            other => Err(Error::InvalidParameter(format!(
                "Unknown time_of_day '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Night => "night",
        }
    }

    fn turbulence(&self) -> f64 {
        match self {
            Self::Day => DAY_TURBULENCE,
            Self::Night => NIGHT_TURBULENCE,
        }
    }
}

/// Geometry and conditions of the satellite-to-ground link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelParameters {
    pub distance_km: f64,
    pub weather: Weather,
    pub time_of_day: TimeOfDay,
    pub telescope_aperture_cm: f64,
}

impl Default for ChannelParameters {
    fn default() -> Self {
        Self {
            distance_km: 500.0,
            weather: Weather::Clear,
            time_of_day: TimeOfDay::Night,
            telescope_aperture_cm: 30.0,
        }
    }
}

/// Diagnostic breakdown reported with every simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub distance_km: f64,
    pub weather: Weather,
    pub weather_description: String,
    pub time_of_day: TimeOfDay,
    pub telescope_aperture_cm: f64,
    pub total_loss_probability: f64,
    pub transmission_efficiency: f64,
    pub distance_attenuation: f64,
    pub base_atmospheric_loss: f64,
    pub scattering_coefficient: f64,
    pub turbulence_factor: f64,
}

/// Validated channel with its loss terms resolved
#[derive(Debug, Clone)]
pub struct ChannelModel {
    params: ChannelParameters,
    distance_attenuation: f64,
    base_atmospheric_loss: f64,
    scattering_coefficient: f64,
    turbulence_factor: f64,
}

impl ChannelModel {
    /// Build the model, rejecting configurations that cannot carry a session
    pub fn new(params: ChannelParameters) -> Result<Self> {
        params.weather.ensure_operable()?;
        let (Some(base_atmospheric_loss), Some(scattering)) = (
            params.weather.base_loss(),
            params.weather.scattering_at_reference(),
        ) else {
            return Err(Error::InvalidChannelConfiguration(format!(
                "No loss profile for weather '{}'",
                params.weather.as_str()
            )));
        };

        if !params.distance_km.is_finite() || params.distance_km <= 0.0 {
            return Err(Error::InvalidChannelConfiguration(format!(
                "distance_km must be positive, got {}",
                params.distance_km
            )));
        }

        if !params.telescope_aperture_cm.is_finite() || params.telescope_aperture_cm <= 0.0 {
            return Err(Error::InvalidChannelConfiguration(format!(
                "telescope_aperture_cm must be positive, got {}",
                params.telescope_aperture_cm
            )));
        }

        let model = Self {
            params,
            distance_attenuation: (-DISTANCE_ATTENUATION_PER_KM * params.distance_km).exp(),
            base_atmospheric_loss,
            scattering_coefficient: scattering * REFERENCE_APERTURE_CM
                / params.telescope_aperture_cm,
            turbulence_factor: params.time_of_day.turbulence(),
        };

        // Extreme geometry underflows to zero survival: no photon could ever arrive
        if model.transmission_efficiency() <= 0.0 {
            return Err(Error::InvalidChannelConfiguration(format!(
                "No photon can survive {} km with a {} cm aperture",
                params.distance_km, params.telescope_aperture_cm
            )));
        }

        Ok(model)
    }

    pub fn parameters(&self) -> &ChannelParameters {
        &self.params
    }

    /// Per-photon survival probability in `[0, 1]`
    pub fn transmission_efficiency(&self) -> f64 {
        let survival = self.distance_attenuation
            * (1.0 - self.base_atmospheric_loss)
            * (-self.scattering_coefficient).exp()
            * (1.0 - self.turbulence_factor);
        survival.clamp(0.0, 1.0)
    }

    /// Draw whether one photon reaches the receiver
    pub fn photon_survives<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.transmission_efficiency())
    }

    pub fn stats(&self) -> ChannelStats {
        let efficiency = self.transmission_efficiency();
        ChannelStats {
            distance_km: self.params.distance_km,
            weather: self.params.weather,
            weather_description: self.params.weather.description().to_string(),
            time_of_day: self.params.time_of_day,
            telescope_aperture_cm: self.params.telescope_aperture_cm,
            total_loss_probability: 1.0 - efficiency,
            transmission_efficiency: efficiency,
            distance_attenuation: self.distance_attenuation,
            base_atmospheric_loss: self.base_atmospheric_loss,
            scattering_coefficient: self.scattering_coefficient,
            turbulence_factor: self.turbulence_factor,
        }
    }
}
