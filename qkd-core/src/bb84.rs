// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! BB84 protocol driver
//!
//! Runs one complete key exchange:
//! 1. Alice draws random bits and bases, Bob draws random bases
//! 2. Photons cross the atmospheric channel (and Eve, if active)
//! 3. Bob measures whatever arrives
//! 4. Bases are reconciled over the public channel
//! 5. A sample of the sifted key is disclosed to estimate the QBER
//! 6. The untested remainder becomes the final key
//!
//! All validation happens in [`Bb84Protocol::new`], so a constructed protocol
//! always runs to completion and never yields a partial result.

use crate::basis::{Basis, Bit, PreparationSequences};
use crate::channel::{ChannelModel, ChannelParameters, ChannelStats};
use crate::eve::{EveConfiguration, EveStats};
use crate::sifting::{self, SecurityAssessment, SecurityLevel};
use crate::simulator::{PhotonEvent, TransmissionSimulator};
use crate::{Error, Result};
use rand::Rng;
use tracing::{debug, field, info, instrument, warn, Span};
use uuid::Uuid;

/// Validated inputs for one key exchange
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationRequest {
    pub num_bits: usize,
    pub eve: EveConfiguration,
    pub channel: ChannelParameters,
}

/// Immutable outcome of one key exchange
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub run_id: Uuid,
    pub photons: Vec<PhotonEvent>,
    pub photons_received: usize,
    pub matching_indices: Vec<usize>,
    pub matches: Vec<bool>,
    pub sifted_key: Vec<Bit>,
    pub tested_indices: Vec<usize>,
    pub assessment: SecurityAssessment,
    pub final_key: Vec<Bit>,
    pub channel_stats: ChannelStats,
    pub eve_active: bool,
    pub eve_stats: Option<EveStats>,
}

impl SimulationResult {
    pub fn total_bits_sent(&self) -> usize {
        self.photons.len()
    }

    pub fn alice_bits(&self) -> Vec<Bit> {
        self.photons.iter().map(|p| p.alice_bit).collect()
    }

    pub fn alice_bases(&self) -> Vec<Basis> {
        self.photons.iter().map(|p| p.alice_basis).collect()
    }

    pub fn bob_bases(&self) -> Vec<Basis> {
        self.photons.iter().map(|p| p.bob_basis).collect()
    }

    pub fn bob_bits(&self) -> Vec<Option<Bit>> {
        self.photons.iter().map(|p| p.bob_measured_bit).collect()
    }

    pub fn qber(&self) -> f64 {
        self.assessment.qber_percentage
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.assessment.security_level
    }

    /// Photons received / photons sent
    pub fn transmission_efficiency(&self) -> f64 {
        ratio(self.photons_received, self.total_bits_sent())
    }

    /// Sifted positions as a percentage of photons sent
    pub fn basis_match_rate(&self) -> f64 {
        ratio(self.matching_indices.len(), self.total_bits_sent()) * 100.0
    }

    /// Final key length as a percentage of photons sent
    pub fn key_efficiency(&self) -> f64 {
        ratio(self.final_key.len(), self.total_bits_sent()) * 100.0
    }

    pub fn final_key_hex(&self) -> String {
        sifting::bits_to_hex(&self.final_key)
    }

    /// Key is safe to use and non-empty
    pub fn is_secure(&self) -> bool {
        self.assessment.safe_to_use_key && !self.final_key.is_empty()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// A validated BB84 session ready to run
#[derive(Debug, Clone)]
pub struct Bb84Protocol {
    num_bits: usize,
    channel: ChannelModel,
    eve: EveConfiguration,
}

impl Bb84Protocol {
    /// Validate a request.
    ///
    /// Channel problems (rain in particular) are reported first, before any
    /// other check and before any randomness is drawn.
    pub fn new(request: SimulationRequest) -> Result<Self> {
        let channel = ChannelModel::new(request.channel)?;

        if request.num_bits == 0 {
            return Err(Error::InvalidParameter(
                "num_bits must be positive".to_string(),
            ));
        }

        request.eve.validate()?;

        Ok(Self {
            num_bits: request.num_bits,
            channel,
            eve: request.eve,
        })
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn channel(&self) -> &ChannelModel {
        &self.channel
    }

    /// Run with the thread-local CSPRNG
    pub fn run(&self) -> SimulationResult {
        self.run_with_rng(&mut rand::thread_rng())
    }

    /// Run with a caller-supplied random source
    #[instrument(
        name = "bb84",
        skip_all,
        fields(
            run_id = field::Empty,
            num_bits = self.num_bits,
            eve_active = self.eve.active,
            attack = self.eve.attack_type.as_str(),
        )
    )]
    pub fn run_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> SimulationResult {
        let run_id = Uuid::new_v4();
        Span::current().record("run_id", field::display(run_id));

        let prep = PreparationSequences::generate(self.num_bits, rng);
        debug!("Alice and Bob prepared {} random bits and bases", prep.len());

        let transmission = TransmissionSimulator::new(&self.channel, &self.eve).run(&prep, rng);

        let sifted = sifting::sift(&transmission.photons);
        debug!(
            sifted = sifted.len(),
            basis_match_rate = sifted.basis_match_rate(self.num_bits),
            "Basis reconciliation complete"
        );

        let estimate = sifting::estimate_qber(&transmission.photons, &sifted, rng);
        let final_key =
            sifting::finalize_key(&transmission.photons, &sifted, &estimate.tested_indices);

        let assessment = estimate.assessment;
        match assessment.security_level {
            SecurityLevel::Abort => warn!(
                qber = assessment.qber_percentage,
                "QBER above abort threshold, key must be discarded"
            ),
            SecurityLevel::InsufficientData => {
                warn!("No sifted bits survived, QBER cannot be estimated")
            }
            level => info!(
                qber = assessment.qber_percentage,
                security_level = level.as_str(),
                final_key_bits = final_key.len(),
                "Key exchange complete"
            ),
        }

        SimulationResult {
            run_id,
            photons_received: transmission.photons_received,
            photons: transmission.photons,
            matching_indices: sifted.matching_indices,
            matches: sifted.matches,
            sifted_key: sifted.sifted_key,
            tested_indices: estimate.tested_indices,
            assessment,
            final_key,
            channel_stats: self.channel.stats(),
            eve_active: self.eve.active,
            eve_stats: transmission.eve_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{TimeOfDay, Weather};
    use crate::eve::AttackType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn clear_link() -> ChannelParameters {
        ChannelParameters {
            distance_km: 1.0,
            weather: Weather::Clear,
            time_of_day: TimeOfDay::Night,
            telescope_aperture_cm: 100.0,
        }
    }

    fn run(num_bits: usize, eve: EveConfiguration, seed: u64) -> SimulationResult {
        let protocol = Bb84Protocol::new(SimulationRequest {
            num_bits,
            eve,
            channel: clear_link(),
        })
        .unwrap();
        protocol.run_with_rng(&mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_rain_short_circuits() {
        let request = SimulationRequest {
            num_bits: 0,
            eve: EveConfiguration {
                active: true,
                interception_rate: 3.0,
                ..Default::default()
            },
            channel: ChannelParameters {
                weather: Weather::Rain,
                ..Default::default()
            },
        };
        assert!(matches!(
            Bb84Protocol::new(request),
            Err(Error::InvalidChannelConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        let zero_bits = SimulationRequest {
            num_bits: 0,
            ..Default::default()
        };
        assert!(matches!(Bb84Protocol::new(zero_bits), Err(Error::InvalidParameter(_))));

        let bad_rate = SimulationRequest {
            num_bits: 64,
            eve: EveConfiguration {
                active: true,
                interception_rate: 1.01,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(Bb84Protocol::new(bad_rate), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_basis_match_rate_without_eve() {
        let result = run(10_000, EveConfiguration::default(), 100);
        let rate = result.basis_match_rate();
        assert!((rate - 50.0).abs() < 3.0, "basis_match_rate = {}", rate);
        assert_eq!(result.qber(), 0.0);
        assert_eq!(result.security_level(), SecurityLevel::Secure);
        assert!(result.is_secure());
        assert!(result.eve_stats.is_none());
    }

    #[test]
    fn test_intercept_resend_is_detected() {
        let eve = EveConfiguration {
            active: true,
            interception_rate: 1.0,
            attack_type: AttackType::InterceptResend,
        };
        let result = run(10_000, eve, 101);

        let intercepted_sifted: Vec<_> = result
            .matching_indices
            .iter()
            .map(|&i| &result.photons[i])
            .filter(|p| p.eve_intercepted)
            .collect();
        let errors = intercepted_sifted
            .iter()
            .filter(|p| p.bob_measured_bit != Some(p.alice_bit))
            .count();
        let rate = errors as f64 / intercepted_sifted.len() as f64 * 100.0;

        assert!((rate - 25.0).abs() < 5.0, "error rate = {}", rate);
        assert!((result.qber() - 25.0).abs() < 5.0);
        assert_eq!(result.security_level(), SecurityLevel::Abort);
        assert!(!result.is_secure());
    }

    #[test]
    fn test_detector_blinding_is_stealthier() {
        let blinding = EveConfiguration {
            active: true,
            interception_rate: 1.0,
            attack_type: AttackType::DetectorBlinding,
        };
        let result = run(10_000, blinding, 102);
        assert!(result.qber() < 11.0, "qber = {}", result.qber());
        assert!(result.eve_stats.as_ref().unwrap().information_leaked_bits > 0);
    }

    #[test]
    fn test_result_invariants() {
        let eve = EveConfiguration {
            active: true,
            interception_rate: 0.4,
            attack_type: AttackType::BeamSplitting,
        };
        let result = run(512, eve, 103);

        assert_eq!(result.total_bits_sent(), 512);
        assert_eq!(result.alice_bits().len(), 512);
        assert_eq!(result.bob_bits().len(), 512);
        assert_eq!(result.sifted_key.len(), result.matching_indices.len());
        assert_eq!(result.matches.len(), result.matching_indices.len());
        assert!(result.final_key.len() <= result.sifted_key.len());
        assert_eq!(
            result.final_key.len() + result.tested_indices.len(),
            result.sifted_key.len()
        );
        assert_eq!(result.final_key_hex().len(), (result.final_key.len() + 3) / 4);
        assert!(result.transmission_efficiency() > 0.0 && result.transmission_efficiency() <= 1.0);
        assert!(result.eve_stats.is_some());
    }

    #[test]
    fn test_tiny_run_has_no_final_key() {
        // A single photon can sift at most one bit, which is always tested
        let result = run(1, EveConfiguration::default(), 104);
        assert!(result.final_key.is_empty());
        assert!(!result.is_secure());
        assert!(matches!(
            result.security_level(),
            SecurityLevel::Secure | SecurityLevel::InsufficientData
        ));
    }

    #[test]
    fn test_jammed_link_yields_insufficient_data() {
        let eve = EveConfiguration {
            active: true,
            interception_rate: 1.0,
            attack_type: AttackType::JammedLink,
        };
        let result = run(256, eve, 105);
        assert_eq!(result.photons_received, 0);
        assert_eq!(result.assessment.bits_tested, 0);
        assert_eq!(result.qber(), 0.0);
        assert_eq!(result.security_level(), SecurityLevel::InsufficientData);
        assert!(!result.is_secure());
    }
}
