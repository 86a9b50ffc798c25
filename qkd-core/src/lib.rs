// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! QKD Core Library
//!
//! Simulates BB84 quantum key distribution between a satellite (Alice) and a
//! ground station (Bob) across a lossy free-space optical link, optionally with
//! an eavesdropper (Eve) on the line. The resulting key can be used directly to
//! drive AES-256-CBC encryption.
//!
//! # Architecture
//!
//! - `channel`: atmospheric loss model (distance, weather, aperture, turbulence)
//! - `basis`: bits, bases and single-photon measurement
//! - `eve`: the five eavesdropping attacks and their bookkeeping
//! - `simulator`: per-photon transmission through channel, Eve and Bob
//! - `sifting`: basis reconciliation, QBER estimation and key finalization
//! - `bb84`: one complete key exchange
//! - `crypto`: AES-256-CBC keyed by BB84 bits
//! - `orbit`: satellite pass geometry
//! - `protocol`: JSON bodies for the gateway API
//! - `config`, `metrics`, `error`: gateway plumbing
//!
//! # Example
//!
//! ```
//! use qkd_core::bb84::{Bb84Protocol, SimulationRequest};
//!
//! let protocol = Bb84Protocol::new(SimulationRequest {
//!     num_bits: 512,
//!     ..Default::default()
//! })?;
//! let result = protocol.run();
//! assert_eq!(result.total_bits_sent(), 512);
//! # Ok::<(), qkd_core::Error>(())
//! ```

pub mod basis;
pub mod bb84;
pub mod channel;
pub mod config;
pub mod crypto;
pub mod error;
pub mod eve;
pub mod metrics;
pub mod orbit;
pub mod protocol;
pub mod sifting;
pub mod simulator;

pub use bb84::{Bb84Protocol, SimulationRequest, SimulationResult};
pub use error::{Error, Result};
pub use sifting::SecurityLevel;

/// Library version reported by the gateway
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
