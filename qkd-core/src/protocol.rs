// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! JSON request and response bodies for the gateway API
//!
//! Enum-valued request fields travel as plain strings so that an unknown value
//! surfaces as `InvalidParameter` instead of a deserialization failure.

use crate::basis::{Basis, Bit};
use crate::bb84::{SimulationRequest, SimulationResult};
use crate::channel::{ChannelModel, ChannelParameters, ChannelStats, TimeOfDay, Weather};
use crate::crypto::{EncryptedMessage, EncryptionInfo};
use crate::eve::{AttackType, EveConfiguration, EveStats};
use crate::orbit::SatelliteStats;
use crate::sifting::SecurityLevel;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// POST /api/qkd/generate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateKeyRequest {
    #[serde(default = "default_num_bits")]
    pub num_bits: i64,

    #[serde(default)]
    pub eve_active: bool,

    #[serde(default = "default_interception_rate")]
    pub eve_interception_rate: f64,

    #[serde(default = "default_attack_type")]
    pub eve_attack_type: String,

    #[serde(default = "default_distance_km")]
    pub distance_km: f64,

    #[serde(default = "default_weather")]
    pub weather: String,

    #[serde(default = "default_time_of_day")]
    pub time_of_day: String,

    #[serde(default = "default_aperture_cm")]
    pub telescope_aperture_cm: f64,
}

impl Default for GenerateKeyRequest {
    fn default() -> Self {
        Self {
            num_bits: default_num_bits(),
            eve_active: false,
            eve_interception_rate: default_interception_rate(),
            eve_attack_type: default_attack_type(),
            distance_km: default_distance_km(),
            weather: default_weather(),
            time_of_day: default_time_of_day(),
            telescope_aperture_cm: default_aperture_cm(),
        }
    }
}

impl GenerateKeyRequest {
    /// Parse and validate into engine inputs.
    ///
    /// Rain is reported ahead of any other problem with the request, then
    /// the rest of the channel, then `num_bits`, then Eve.
    pub fn into_simulation(self) -> Result<SimulationRequest> {
        let weather = Weather::parse(&self.weather)?;
        weather.ensure_operable()?;

        let channel = ChannelParameters {
            distance_km: self.distance_km,
            weather,
            time_of_day: TimeOfDay::parse(&self.time_of_day)?,
            telescope_aperture_cm: self.telescope_aperture_cm,
        };
        ChannelModel::new(channel)?;

        if self.num_bits <= 0 {
            return Err(Error::InvalidParameter(format!(
                "num_bits must be positive, got {}",
                self.num_bits
            )));
        }
        let num_bits = usize::try_from(self.num_bits)
            .map_err(|_| Error::InvalidParameter(format!("num_bits {} is too large", self.num_bits)))?;

        let eve = EveConfiguration {
            active: self.eve_active,
            interception_rate: self.eve_interception_rate,
            attack_type: AttackType::parse(&self.eve_attack_type)?,
        };

        Ok(SimulationRequest {
            num_bits,
            eve,
            channel,
        })
    }
}

/// QBER details over the disclosed sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub qber_percentage: f64,
    pub errors_detected: usize,
    pub bits_tested: usize,
    pub tested_indices: Vec<usize>,
    pub matching_bases_count: usize,
    pub basis_match_rate: f64,
    pub security_level: SecurityLevel,
    pub assessment: String,
    pub eve_active: bool,
    pub safe_to_use_key: bool,
}

/// Response body for a completed key exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateKeyResponse {
    pub success: bool,

    pub alice_bits: Vec<Bit>,
    pub alice_bases: Vec<Basis>,
    pub bob_bases: Vec<Basis>,
    pub bob_bits: Vec<Option<Bit>>,

    pub matching_indices: Vec<usize>,
    pub matches: Vec<bool>,

    pub sifted_key: Vec<Bit>,
    pub final_key: Vec<Bit>,
    pub final_key_length: usize,
    pub final_key_hex: String,

    pub total_bits_sent: usize,
    pub photons_received: usize,
    pub transmission_efficiency: f64,
    pub basis_match_rate: f64,
    pub key_efficiency: f64,

    pub qber: f64,
    pub error_analysis: ErrorAnalysis,
    pub channel_stats: ChannelStats,

    pub eve_active: bool,
    pub eve_stats: Option<EveStats>,
    pub secure: bool,
    pub security_level: SecurityLevel,
}

impl From<&SimulationResult> for GenerateKeyResponse {
    fn from(result: &SimulationResult) -> Self {
        let assessment = &result.assessment;
        Self {
            success: true,
            alice_bits: result.alice_bits(),
            alice_bases: result.alice_bases(),
            bob_bases: result.bob_bases(),
            bob_bits: result.bob_bits(),
            matching_indices: result.matching_indices.clone(),
            matches: result.matches.clone(),
            sifted_key: result.sifted_key.clone(),
            final_key: result.final_key.clone(),
            final_key_length: result.final_key.len(),
            final_key_hex: result.final_key_hex(),
            total_bits_sent: result.total_bits_sent(),
            photons_received: result.photons_received,
            transmission_efficiency: result.transmission_efficiency(),
            basis_match_rate: result.basis_match_rate(),
            key_efficiency: result.key_efficiency(),
            qber: result.qber(),
            error_analysis: ErrorAnalysis {
                qber_percentage: assessment.qber_percentage,
                errors_detected: assessment.errors_detected,
                bits_tested: assessment.bits_tested,
                tested_indices: result.tested_indices.clone(),
                matching_bases_count: result.matching_indices.len(),
                basis_match_rate: result.basis_match_rate(),
                security_level: assessment.security_level,
                assessment: assessment.assessment.clone(),
                eve_active: result.eve_active,
                safe_to_use_key: assessment.safe_to_use_key,
            },
            channel_stats: result.channel_stats.clone(),
            eve_active: result.eve_active,
            eve_stats: result.eve_stats.clone(),
            secure: result.is_secure(),
            security_level: result.security_level(),
        }
    }
}

/// Convert wire key bits, rejecting anything that is not 0 or 1
pub fn key_bits(quantum_key: &[i64]) -> Result<Vec<Bit>> {
    quantum_key
        .iter()
        .enumerate()
        .map(|(i, &value)| match value {
            0 | 1 => Ok(value as Bit),
            _ => Err(Error::InvalidParameter(format!(
                "quantum_key[{}] is {}, expected 0 or 1",
                i, value
            ))),
        })
        .collect()
}

/// POST /api/qkd/encrypt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptRequest {
    pub message: String,
    pub quantum_key: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub success: bool,
    pub ciphertext_b64: String,
    pub iv_b64: String,
    pub encryption_info: EncryptionInfo,
    pub original_length: usize,
    pub encrypted_length: usize,
}

impl From<EncryptedMessage> for EncryptResponse {
    fn from(encrypted: EncryptedMessage) -> Self {
        Self {
            success: true,
            encrypted_length: encrypted.encrypted_length(),
            original_length: encrypted.original_length,
            ciphertext_b64: encrypted.ciphertext_b64,
            iv_b64: encrypted.iv_b64,
            encryption_info: encrypted.info,
        }
    }
}

/// POST /api/qkd/decrypt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub ciphertext_b64: String,
    pub iv_b64: String,
    pub quantum_key: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub success: bool,
    pub plaintext: String,
}

/// POST /api/satellite/stats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SatelliteStatsRequest {
    #[serde(default = "default_altitude_km")]
    pub altitude_km: f64,

    #[serde(default = "default_elevation_deg")]
    pub elevation_angle_deg: f64,
}

impl Default for SatelliteStatsRequest {
    fn default() -> Self {
        Self {
            altitude_km: default_altitude_km(),
            elevation_angle_deg: default_elevation_deg(),
        }
    }
}

impl SatelliteStatsRequest {
    pub fn compute(&self) -> Result<SatelliteStats> {
        SatelliteStats::compute(self.altitude_km, self.elevation_angle_deg)
    }
}

/// Error body returned for every failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub detail: String,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self {
            success: false,
            error: err.kind().to_string(),
            detail: err.to_string(),
        }
    }
}

/// Health status for system monitoring
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// GET /health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub service: String,
}

/// GET /api/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// Overall health status
    pub status: HealthStatus,

    pub version: String,

    /// Service start time
    pub started_at: DateTime<Utc>,

    /// Service uptime in seconds
    pub uptime_seconds: u64,

    pub simulations_total: u64,
    pub simulations_failed: u64,
    pub simulations_aborted: u64,
    pub encryptions_total: u64,
    pub decryptions_total: u64,

    /// Any warnings or issues
    pub warnings: Vec<String>,
}

// Default value functions
fn default_num_bits() -> i64 {
    256
}

fn default_interception_rate() -> f64 {
    0.5
}

fn default_attack_type() -> String {
    AttackType::default().as_str().to_string()
}

fn default_distance_km() -> f64 {
    500.0
}

fn default_weather() -> String {
    Weather::default().as_str().to_string()
}

fn default_time_of_day() -> String {
    TimeOfDay::default().as_str().to_string()
}

fn default_aperture_cm() -> f64 {
    30.0
}

fn default_altitude_km() -> f64 {
    550.0
}

fn default_elevation_deg() -> f64 {
    45.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84::Bb84Protocol;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_request_defaults() {
        let request: GenerateKeyRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, GenerateKeyRequest::default());

        let sim = request.into_simulation().unwrap();
        assert_eq!(sim.num_bits, 256);
        assert!(!sim.eve.active);
        assert_eq!(sim.eve.interception_rate, 0.5);
        assert_eq!(sim.eve.attack_type, AttackType::InterceptResend);
        assert_eq!(sim.channel, ChannelParameters::default());
    }

    #[test]
    fn test_rain_reported_first() {
        let request = GenerateKeyRequest {
            num_bits: -5,
            eve_attack_type: "quantum_cloning".to_string(),
            weather: "rain".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            request.into_simulation(),
            Err(Error::InvalidChannelConfiguration(_))
        ));
    }

    #[test]
    fn test_rain_beats_other_channel_errors() {
        let request = GenerateKeyRequest {
            weather: "RAIN".to_string(),
            time_of_day: "dusk".to_string(),
            distance_km: -1.0,
            telescope_aperture_cm: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            request.into_simulation(),
            Err(Error::InvalidChannelConfiguration(msg)) if msg.contains("rain")
        ));

        // Without rain the bad time of day is what gets reported
        let request = GenerateKeyRequest {
            time_of_day: "dusk".to_string(),
            ..Default::default()
        };
        assert!(matches!(request.into_simulation(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_invalid_fields() {
        let cases = [
            GenerateKeyRequest {
                num_bits: 0,
                ..Default::default()
            },
            GenerateKeyRequest {
                eve_attack_type: "quantum_cloning".to_string(),
                ..Default::default()
            },
            GenerateKeyRequest {
                weather: "snow".to_string(),
                ..Default::default()
            },
            GenerateKeyRequest {
                time_of_day: "dusk".to_string(),
                ..Default::default()
            },
        ];
        for request in cases {
            assert!(matches!(
                request.into_simulation(),
                Err(Error::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_response_shape() {
        let sim = GenerateKeyRequest {
            num_bits: 128,
            eve_active: true,
            ..Default::default()
        }
        .into_simulation()
        .unwrap();
        let result = Bb84Protocol::new(sim)
            .unwrap()
            .run_with_rng(&mut StdRng::seed_from_u64(11));

        let response = GenerateKeyResponse::from(&result);
        assert_eq!(response.total_bits_sent, 128);
        assert_eq!(response.final_key_length, response.final_key.len());
        assert_eq!(
            response.error_analysis.matching_bases_count,
            response.matching_indices.len()
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["alice_bases"].as_array().unwrap().len(), 128);
        assert!(json["eve_stats"].is_object());
        assert!(json["security_level"].is_string());
        let first_basis = json["alice_bases"][0].as_str().unwrap();
        assert!(first_basis == "+" || first_basis == "×");
    }

    #[test]
    fn test_key_bits() {
        assert_eq!(key_bits(&[1, 0, 1]).unwrap(), vec![1, 0, 1]);
        assert!(matches!(key_bits(&[1, 2]), Err(Error::InvalidParameter(_))));
        assert!(key_bits(&[-1]).is_err());
    }

    #[test]
    fn test_error_response() {
        let err = Error::InvalidChannelConfiguration("rain".to_string());
        let body = ErrorResponse::from(&err);
        assert!(!body.success);
        assert_eq!(body.error, "invalid_channel_configuration");
        assert!(body.detail.contains("rain"));
    }
}
