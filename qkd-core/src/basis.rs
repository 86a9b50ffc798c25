// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! Bit and basis generation for BB84
//!
//! Alice encodes each bit on a single photon in one of two conjugate bases.
//! Bob measures in a basis of his own choosing, drawn independently.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A classical bit, always 0 or 1
pub type Bit = u8;

/// BB84 measurement basis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Basis {
    /// 0°/90° polarization
    #[serde(rename = "+")]
    Rectilinear,
    /// 45°/135° polarization
    #[serde(rename = "×")]
    Diagonal,
}

impl Basis {
    /// Draw a basis uniformly at random
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Basis::Diagonal
        } else {
            Basis::Rectilinear
        }
    }

    /// Symbol used on the wire
    pub fn symbol(&self) -> &'static str {
        match self {
            Basis::Rectilinear => "+",
            Basis::Diagonal => "×",
        }
    }
}

/// Draw a bit uniformly at random
pub fn random_bit<R: Rng + ?Sized>(rng: &mut R) -> Bit {
    rng.gen_range(0..=1)
}

/// Polarization state carried by one photon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotonState {
    pub bit: Bit,
    pub basis: Basis,
}

impl PhotonState {
    pub fn new(bit: Bit, basis: Basis) -> Self {
        Self { bit, basis }
    }

    /// Measure this state in `basis`.
    ///
    /// Matching bases read the encoded bit deterministically; conjugate bases
    /// collapse to a uniformly random outcome.
    pub fn measure<R: Rng + ?Sized>(&self, basis: Basis, rng: &mut R) -> Bit {
        if basis == self.basis {
            self.bit
        } else {
            random_bit(rng)
        }
    }
}

/// Independent random choices made by Alice and Bob for one run
#[derive(Debug, Clone)]
pub struct PreparationSequences {
    pub alice_bits: Vec<Bit>,
    pub alice_bases: Vec<Basis>,
    pub bob_bases: Vec<Basis>,
}

impl PreparationSequences {
    /// Generate `n` i.i.d. uniform draws for each of the three sequences
    pub fn generate<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let alice_bits = (0..n).map(|_| random_bit(rng)).collect();
        let alice_bases = (0..n).map(|_| Basis::random(rng)).collect();
        let bob_bases = (0..n).map(|_| Basis::random(rng)).collect();

        Self {
            alice_bits,
            alice_bases,
            bob_bases,
        }
    }

    pub fn len(&self) -> usize {
        self.alice_bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alice_bits.is_empty()
    }
}
