// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! Basis reconciliation, QBER estimation and key finalization
//!
//! After transmission Alice and Bob publicly compare bases, keep the positions
//! where they agree, sacrifice a random sample of those to estimate the error
//! rate, and keep the untested remainder as the final key.

use crate::basis::Bit;
use crate::simulator::PhotonEvent;
use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// QBER (percent) below which a key is classified secure
pub const SECURE_QBER_THRESHOLD: f64 = 5.0;

/// QBER (percent) below which a key is classified acceptable
pub const ACCEPTABLE_QBER_THRESHOLD: f64 = 11.0;

/// QBER (percent) at or above which the protocol aborts
pub const ABORT_QBER_THRESHOLD: f64 = 15.0;

/// Fraction of sifted positions disclosed for error estimation
pub const QBER_SAMPLE_FRACTION: f64 = 0.5;

/// Minimum sample size, capped at the sifted length
pub const MIN_TEST_BITS: usize = 10;

/// Security classification derived from the QBER
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityLevel {
    Secure,
    Acceptable,
    Suspicious,
    Abort,
    /// No sifted bits were available for testing
    InsufficientData,
}

impl SecurityLevel {
    /// Classify a measured QBER percentage
    pub fn classify(qber: f64) -> Self {
        if qber < SECURE_QBER_THRESHOLD {
            Self::Secure
        } else if qber < ACCEPTABLE_QBER_THRESHOLD {
            Self::Acceptable
        } else if qber < ABORT_QBER_THRESHOLD {
            Self::Suspicious
        } else {
            Self::Abort
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secure => "SECURE",
            Self::Acceptable => "ACCEPTABLE",
            Self::Suspicious => "SUSPICIOUS",
            Self::Abort => "ABORT",
            Self::InsufficientData => "INSUFFICIENT_DATA",
        }
    }

    pub fn assessment(&self) -> &'static str {
        match self {
            Self::Secure => "Normal atmospheric noise levels",
            Self::Acceptable => "Slightly elevated error rate, within acceptable bounds",
            Self::Suspicious => "High error rate detected - possible eavesdropping",
            Self::Abort => "CRITICAL: Error rate too high - eavesdropper detected!",
            Self::InsufficientData => "No sifted bits available to estimate the error rate",
        }
    }

    /// Key material may be used at this level
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Secure | Self::Acceptable | Self::Suspicious)
    }
}

/// Result of comparing the tested sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAssessment {
    pub qber_percentage: f64,
    pub errors_detected: usize,
    pub bits_tested: usize,
    pub security_level: SecurityLevel,
    pub safe_to_use_key: bool,
    pub assessment: String,
}

impl SecurityAssessment {
    pub fn evaluate(errors_detected: usize, bits_tested: usize) -> Self {
        let (qber, level) = if bits_tested == 0 {
            (0.0, SecurityLevel::InsufficientData)
        } else {
            let qber = errors_detected as f64 / bits_tested as f64 * 100.0;
            (qber, SecurityLevel::classify(qber))
        };

        Self {
            qber_percentage: qber,
            errors_detected,
            bits_tested,
            security_level: level,
            safe_to_use_key: level.is_safe(),
            assessment: level.assessment().to_string(),
        }
    }
}

/// Positions kept after basis reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiftedKey {
    pub matching_indices: Vec<usize>,
    /// Alice's bits at `matching_indices`
    pub sifted_key: Vec<Bit>,
    /// Whether Bob's bit agrees with Alice's, aligned with `matching_indices`
    pub matches: Vec<bool>,
}

impl SiftedKey {
    pub fn len(&self) -> usize {
        self.matching_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matching_indices.is_empty()
    }

    /// Sifted positions as a percentage of photons sent
    pub fn basis_match_rate(&self, total_bits_sent: usize) -> f64 {
        if total_bits_sent == 0 {
            0.0
        } else {
            self.len() as f64 / total_bits_sent as f64 * 100.0
        }
    }
}

/// Keep positions where bases agree and Bob detected a photon
pub fn sift(photons: &[PhotonEvent]) -> SiftedKey {
    let mut sifted = SiftedKey::default();
    for photon in photons.iter().filter(|p| p.is_sifted()) {
        sifted.matching_indices.push(photon.index);
        sifted.sifted_key.push(photon.alice_bit);
        sifted.matches.push(photon.bob_measured_bit == Some(photon.alice_bit));
    }
    sifted
}

/// Number of sifted positions disclosed for error estimation
pub fn test_sample_size(sifted_len: usize) -> usize {
    let fraction = (sifted_len as f64 * QBER_SAMPLE_FRACTION).ceil() as usize;
    fraction.max(MIN_TEST_BITS).min(sifted_len)
}

/// Uniformly sample the tested positions; returned in ascending order
pub fn select_test_indices<R: Rng + ?Sized>(matching_indices: &[usize], rng: &mut R) -> Vec<usize> {
    let amount = test_sample_size(matching_indices.len());
    let mut tested: Vec<usize> = rand::seq::index::sample(rng, matching_indices.len(), amount)
        .into_iter()
        .map(|pos| matching_indices[pos])
        .collect();
    tested.sort_unstable();
    tested
}

/// Error estimate over the disclosed sample
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEstimate {
    pub tested_indices: Vec<usize>,
    pub assessment: SecurityAssessment,
}

/// Sample the sifted key and compare Alice's and Bob's bits on the sample
pub fn estimate_qber<R: Rng + ?Sized>(
    photons: &[PhotonEvent],
    sifted: &SiftedKey,
    rng: &mut R,
) -> ErrorEstimate {
    let tested_indices = select_test_indices(&sifted.matching_indices, rng);
    let errors = tested_indices
        .iter()
        .filter(|&&i| photons[i].bob_measured_bit != Some(photons[i].alice_bit))
        .count();

    ErrorEstimate {
        assessment: SecurityAssessment::evaluate(errors, tested_indices.len()),
        tested_indices,
    }
}

/// Alice's bits at the sifted positions that were not disclosed.
///
/// `tested_indices` must be sorted.
pub fn finalize_key(photons: &[PhotonEvent], sifted: &SiftedKey, tested_indices: &[usize]) -> Vec<Bit> {
    sifted
        .matching_indices
        .iter()
        .filter(|&&i| tested_indices.binary_search(&i).is_err())
        .map(|&i| photons[i].alice_bit)
        .collect()
}

/// Pack bits into hex digits, most significant bit first.
///
/// The last digit is zero-padded on the right when the length is not a multiple of 4.
pub fn bits_to_hex(bits: &[Bit]) -> String {
    bits.chunks(4)
        .map(|nibble| {
            let value = nibble
                .iter()
                .enumerate()
                .fold(0u32, |acc, (j, &bit)| acc | (u32::from(bit & 1) << (3 - j)));
            std::char::from_digit(value, 16).unwrap_or('0')
        })
        .collect()
}

/// Expand hex digits into `len` bits, dropping right padding
pub fn hex_to_bits(hex: &str, len: usize) -> Result<Vec<Bit>> {
    if len > hex.len() * 4 {
        return Err(Error::InvalidParameter(format!(
            "{} hex digits cannot hold {} bits",
            hex.len(),
            len
        )));
    }

    let mut bits = Vec::with_capacity(hex.len() * 4);
    for c in hex.chars() {
        let value = c
            .to_digit(16)
            .ok_or_else(|| Error::InvalidParameter(format!("Invalid hex digit '{}'", c)))?;
        bits.extend((0..4).rev().map(|shift| ((value >> shift) & 1) as Bit));
    }
    bits.truncate(len);
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::Basis;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn event(index: usize, alice_bit: Bit, same_basis: bool, bob: Option<Bit>) -> PhotonEvent {
        PhotonEvent {
            index,
            alice_bit,
            alice_basis: Basis::Rectilinear,
            bob_basis: if same_basis { Basis::Rectilinear } else { Basis::Diagonal },
            channel_survived: bob.is_some(),
            eve_intercepted: false,
            eve_basis: None,
            bob_measured_bit: bob,
        }
    }

    #[test]
    fn test_security_level_boundaries() {
        assert_eq!(SecurityLevel::classify(0.0), SecurityLevel::Secure);
        assert_eq!(SecurityLevel::classify(4.99), SecurityLevel::Secure);
        assert_eq!(SecurityLevel::classify(5.00), SecurityLevel::Acceptable);
        assert_eq!(SecurityLevel::classify(10.99), SecurityLevel::Acceptable);
        assert_eq!(SecurityLevel::classify(11.00), SecurityLevel::Suspicious);
        assert_eq!(SecurityLevel::classify(14.99), SecurityLevel::Suspicious);
        assert_eq!(SecurityLevel::classify(15.00), SecurityLevel::Abort);
        assert_eq!(SecurityLevel::classify(100.0), SecurityLevel::Abort);
    }

    #[test]
    fn test_abort_boundary_is_exact() {
        // 3 errors in 20 bits is exactly 15%
        let assessment = SecurityAssessment::evaluate(3, 20);
        assert_eq!(assessment.qber_percentage, 15.0);
        assert_eq!(assessment.security_level, SecurityLevel::Abort);
        assert!(!assessment.safe_to_use_key);

        // 1 error in 20 bits is exactly 5%
        let assessment = SecurityAssessment::evaluate(1, 20);
        assert_eq!(assessment.security_level, SecurityLevel::Acceptable);
        assert!(assessment.safe_to_use_key);
    }

    #[test]
    fn test_no_tested_bits() {
        let assessment = SecurityAssessment::evaluate(0, 0);
        assert_eq!(assessment.qber_percentage, 0.0);
        assert_eq!(assessment.security_level, SecurityLevel::InsufficientData);
        assert!(!assessment.safe_to_use_key);
        assert_eq!(
            serde_json::to_string(&assessment.security_level).unwrap(),
            "\"INSUFFICIENT_DATA\""
        );
    }

    #[test]
    fn test_sift_keeps_received_matching_positions() {
        let photons = vec![
            event(0, 1, true, Some(1)),
            event(1, 0, false, Some(1)),
            event(2, 1, true, None),
            event(3, 0, true, Some(1)),
            event(4, 1, true, Some(1)),
        ];
        let sifted = sift(&photons);
        assert_eq!(sifted.matching_indices, vec![0, 3, 4]);
        assert_eq!(sifted.sifted_key, vec![1, 0, 1]);
        assert_eq!(sifted.matches, vec![true, false, true]);
        assert_eq!(sifted.basis_match_rate(photons.len()), 60.0);
    }

    #[test]
    fn test_sample_size_bounds() {
        assert_eq!(test_sample_size(0), 0);
        assert_eq!(test_sample_size(4), 4);
        assert_eq!(test_sample_size(10), 10);
        assert_eq!(test_sample_size(15), 10);
        assert_eq!(test_sample_size(21), 11);
        assert_eq!(test_sample_size(100), 50);
    }

    #[test]
    fn test_final_key_disjoint_from_tested() {
        let mut rng = StdRng::seed_from_u64(9);
        let photons: Vec<_> = (0..200)
            .map(|i| event(i, (i % 3 == 0) as Bit, i % 2 == 0, Some((i % 3 == 0) as Bit)))
            .collect();
        let sifted = sift(&photons);
        let estimate = estimate_qber(&photons, &sifted, &mut rng);
        let final_key = finalize_key(&photons, &sifted, &estimate.tested_indices);

        assert_eq!(sifted.len(), 100);
        assert_eq!(estimate.tested_indices.len(), 50);
        assert_eq!(final_key.len(), 50);
        assert!(final_key.len() <= sifted.sifted_key.len());
        assert!(estimate.tested_indices.windows(2).all(|w| w[0] < w[1]));
        assert!(estimate
            .tested_indices
            .iter()
            .all(|i| sifted.matching_indices.contains(i)));
        assert_eq!(estimate.assessment.errors_detected, 0);
        assert_eq!(estimate.assessment.security_level, SecurityLevel::Secure);
    }

    #[test]
    fn test_errors_counted_on_sample_only() {
        let mut rng = StdRng::seed_from_u64(10);
        // Ten sifted positions, all tested, four of them wrong
        let photons: Vec<_> = (0..10)
            .map(|i| event(i, 0, true, Some(if i < 4 { 1 } else { 0 })))
            .collect();
        let sifted = sift(&photons);
        let estimate = estimate_qber(&photons, &sifted, &mut rng);
        assert_eq!(estimate.assessment.bits_tested, 10);
        assert_eq!(estimate.assessment.errors_detected, 4);
        assert_eq!(estimate.assessment.qber_percentage, 40.0);
        assert!(finalize_key(&photons, &sifted, &estimate.tested_indices).is_empty());
    }

    #[test]
    fn test_hex_packing() {
        assert_eq!(bits_to_hex(&[]), "");
        assert_eq!(bits_to_hex(&[1, 0, 1, 0]), "a");
        assert_eq!(bits_to_hex(&[1, 1, 1, 1, 0, 0, 0, 1]), "f1");
        // 10 -> padded to 1000
        assert_eq!(bits_to_hex(&[1, 0]), "8");
        assert_eq!(bits_to_hex(&[0, 0, 0, 1, 1]), "18");
    }

    #[test]
    fn test_hex_decoding_errors() {
        assert!(matches!(hex_to_bits("zz", 8), Err(Error::InvalidParameter(_))));
        assert!(matches!(hex_to_bits("a", 5), Err(Error::InvalidParameter(_))));
    }

    proptest! {
        #[test]
        fn prop_hex_round_trip(bits in proptest::collection::vec(0u8..=1, 0..300)) {
            let hex = bits_to_hex(&bits);
            prop_assert_eq!(hex.len(), (bits.len() + 3) / 4);
            prop_assert_eq!(hex_to_bits(&hex, bits.len()).unwrap(), bits);
        }
    }
}
