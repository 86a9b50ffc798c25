// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! Configuration management for the QKD gateway

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix shared by file overrides and env-only mode
pub const ENV_PREFIX: &str = "QKD";

/// QKD gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Bind address for HTTP server
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Largest num_bits accepted by /api/qkd/generate
    #[serde(default = "default_max_num_bits")]
    pub max_num_bits: usize,

    /// Largest plaintext (UTF-8 bytes) accepted by /api/qkd/encrypt
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            max_num_bits: default_max_num_bits(),
            max_message_bytes: default_max_message_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
            metrics_enabled: true,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file, with `QKD_*` environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from `QKD_`-prefixed key/value pairs
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::prefixed(format!("{}_", ENV_PREFIX))
            .from_iter(vars)
            .map_err(|e| Error::Config(format!("Failed to parse environment variables: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.max_num_bits == 0 {
            return Err(Error::Config("max_num_bits must be > 0".to_string()));
        }
        if self.max_message_bytes == 0 {
            return Err(Error::Config("max_message_bytes must be > 0".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_address.parse().map_err(|e| {
            Error::Config(format!("Invalid listen_address '{}': {}", self.listen_address, e))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Default value functions
fn default_listen_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_max_num_bits() -> usize {
    4096
}

fn default_max_message_bytes() -> usize {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
