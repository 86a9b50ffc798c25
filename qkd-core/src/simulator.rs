// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! Photon transmission and measurement
//!
//! Each photon goes through three stages in order: channel survival,
//! the eavesdropper (if active), and Bob's measurement. Outcomes are stored
//! in a flat, index-aligned `Vec<PhotonEvent>`.

use crate::basis::{Basis, Bit, PhotonState, PreparationSequences};
use crate::channel::ChannelModel;
use crate::eve::{EveConfiguration, EveStats, Reception};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Complete history of one photon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotonEvent {
    pub index: usize,
    pub alice_bit: Bit,
    pub alice_basis: Basis,
    pub bob_basis: Basis,
    pub channel_survived: bool,
    pub eve_intercepted: bool,
    pub eve_basis: Option<Basis>,
    pub bob_measured_bit: Option<Bit>,
}

impl PhotonEvent {
    /// Bob detected the photon and used Alice's basis
    pub fn is_sifted(&self) -> bool {
        self.bob_measured_bit.is_some() && self.alice_basis == self.bob_basis
    }
}

/// Per-photon outcomes of one run
#[derive(Debug, Clone)]
pub struct Transmission {
    pub photons: Vec<PhotonEvent>,
    pub photons_received: usize,
    pub eve_stats: Option<EveStats>,
}

impl Transmission {
    pub fn total_bits_sent(&self) -> usize {
        self.photons.len()
    }

    /// Received / sent, as a ratio
    pub fn transmission_efficiency(&self) -> f64 {
        if self.photons.is_empty() {
            0.0
        } else {
            self.photons_received as f64 / self.photons.len() as f64
        }
    }

    pub fn bob_bits(&self) -> Vec<Option<Bit>> {
        self.photons.iter().map(|p| p.bob_measured_bit).collect()
    }
}

/// Composes channel loss, eavesdropping, and Bob's measurement
pub struct TransmissionSimulator<'a> {
    channel: &'a ChannelModel,
    eve: &'a EveConfiguration,
}

impl<'a> TransmissionSimulator<'a> {
    pub fn new(channel: &'a ChannelModel, eve: &'a EveConfiguration) -> Self {
        Self { channel, eve }
    }

    /// Send every prepared photon through the link
    pub fn run<R: Rng + ?Sized>(&self, prep: &PreparationSequences, rng: &mut R) -> Transmission {
        let mut photons = Vec::with_capacity(prep.len());
        let mut eve_stats = self.eve.active.then(|| EveStats::new(self.eve));
        let mut photons_received = 0;

        for index in 0..prep.len() {
            let alice = PhotonState::new(prep.alice_bits[index], prep.alice_bases[index]);
            let bob_basis = prep.bob_bases[index];

            let channel_survived = self.channel.photon_survives(rng);
            let mut eve_intercepted = false;
            let mut eve_basis = None;

            let reception = if !channel_survived {
                Reception::Lost
            } else if self.eve.intercepts(rng) {
                let interception = self.eve.attack_type.apply(alice, bob_basis, rng);
                if let Some(stats) = eve_stats.as_mut() {
                    stats.record(index, alice, &interception);
                }
                eve_intercepted = true;
                eve_basis = interception.eve_basis;
                interception.reception
            } else {
                Reception::State(alice)
            };

            let bob_measured_bit = match reception {
                Reception::State(state) => Some(state.measure(bob_basis, rng)),
                Reception::Forced(bit) => Some(bit),
                Reception::Lost => None,
            };
            if bob_measured_bit.is_some() {
                photons_received += 1;
            }

            photons.push(PhotonEvent {
                index,
                alice_bit: alice.bit,
                alice_basis: alice.basis,
                bob_basis,
                channel_survived,
                eve_intercepted,
                eve_basis,
                bob_measured_bit,
            });
        }

        debug!(
            sent = photons.len(),
            received = photons_received,
            intercepted = eve_stats.as_ref().map_or(0, |s| s.photons_intercepted),
            "Transmission complete"
        );

        Transmission {
            photons,
            photons_received,
            eve_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelParameters, TimeOfDay, Weather};
    use crate::eve::AttackType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn near_lossless() -> ChannelModel {
        ChannelModel::new(ChannelParameters {
            distance_km: 1.0,
            weather: Weather::Clear,
            time_of_day: TimeOfDay::Night,
            telescope_aperture_cm: 100.0,
        })
        .unwrap()
    }

    fn run(n: usize, eve: EveConfiguration, seed: u64) -> Transmission {
        let mut rng = StdRng::seed_from_u64(seed);
        let channel = near_lossless();
        let prep = PreparationSequences::generate(n, &mut rng);
        TransmissionSimulator::new(&channel, &eve).run(&prep, &mut rng)
    }

    #[test]
    fn test_events_are_index_aligned() {
        let t = run(256, EveConfiguration::default(), 1);
        assert_eq!(t.total_bits_sent(), 256);
        for (i, p) in t.photons.iter().enumerate() {
            assert_eq!(p.index, i);
            if !p.channel_survived {
                assert_eq!(p.bob_measured_bit, None);
                assert!(!p.eve_intercepted);
            }
        }
        assert_eq!(
            t.photons_received,
            t.photons.iter().filter(|p| p.bob_measured_bit.is_some()).count()
        );
    }

    #[test]
    fn test_no_eve_no_errors_on_sifted_positions() {
        let t = run(5_000, EveConfiguration::default(), 2);
        assert!(t.eve_stats.is_none());
        assert!(t
            .photons
            .iter()
            .filter(|p| p.is_sifted())
            .all(|p| p.bob_measured_bit == Some(p.alice_bit)));
        assert!(t.transmission_efficiency() > 0.95);
    }

    #[test]
    fn test_intercept_resend_full_interception() {
        let eve = EveConfiguration {
            active: true,
            interception_rate: 1.0,
            attack_type: AttackType::InterceptResend,
        };
        let t = run(10_000, eve, 3);
        let stats = t.eve_stats.as_ref().unwrap();

        let survived = t.photons.iter().filter(|p| p.channel_survived).count();
        assert_eq!(stats.photons_intercepted, survived);

        let sifted: Vec<_> = t
            .photons
            .iter()
            .filter(|p| p.eve_intercepted && p.is_sifted())
            .collect();
        let errors = sifted
            .iter()
            .filter(|p| p.bob_measured_bit != Some(p.alice_bit))
            .count();
        let rate = errors as f64 / sifted.len() as f64;
        assert!((rate - 0.25).abs() < 0.05, "rate = {}", rate);
    }

    #[test]
    fn test_jammed_link_blocks_intercepted_photons() {
        let eve = EveConfiguration {
            active: true,
            interception_rate: 1.0,
            attack_type: AttackType::JammedLink,
        };
        let t = run(1_000, eve, 4);
        assert_eq!(t.photons_received, 0);
        assert_eq!(t.transmission_efficiency(), 0.0);

        let stats = t.eve_stats.unwrap();
        assert_eq!(stats.photons_blocked, stats.photons_intercepted);
        assert_eq!(stats.measurement_errors, 0);
    }
}
