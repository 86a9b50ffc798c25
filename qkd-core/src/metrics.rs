// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! Metrics collection and reporting

use crate::bb84::SimulationResult;
use crate::sifting::SecurityLevel;
use parking_lot::RwLock;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const LATENCY_WINDOW: usize = 10_000;

/// Global metrics collector
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    start_time: Instant,

    // Simulation metrics
    simulations_total: AtomicU64,
    simulations_failed: AtomicU64,
    simulations_aborted: AtomicU64,
    photons_sent: AtomicU64,
    final_key_bits: AtomicU64,

    // Encryption metrics
    encryptions_total: AtomicU64,
    decryptions_total: AtomicU64,
    crypto_failures: AtomicU64,

    // Simulation latency (microseconds)
    simulation_latencies: RwLock<Vec<u64>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                start_time: Instant::now(),
                simulations_total: AtomicU64::new(0),
                simulations_failed: AtomicU64::new(0),
                simulations_aborted: AtomicU64::new(0),
                photons_sent: AtomicU64::new(0),
                final_key_bits: AtomicU64::new(0),
                encryptions_total: AtomicU64::new(0),
                decryptions_total: AtomicU64::new(0),
                crypto_failures: AtomicU64::new(0),
                simulation_latencies: RwLock::new(Vec::with_capacity(LATENCY_WINDOW)),
            }),
        }
    }

    // Simulation metrics
    pub fn record_simulation(&self, result: &SimulationResult, latency_micros: u64) {
        self.inner.simulations_total.fetch_add(1, Ordering::Relaxed);
        self.inner
            .photons_sent
            .fetch_add(result.total_bits_sent() as u64, Ordering::Relaxed);
        self.inner
            .final_key_bits
            .fetch_add(result.final_key.len() as u64, Ordering::Relaxed);
        if result.security_level() == SecurityLevel::Abort {
            self.inner.simulations_aborted.fetch_add(1, Ordering::Relaxed);
        }

        let mut latencies = self.inner.simulation_latencies.write();
        latencies.push(latency_micros);
        if latencies.len() > LATENCY_WINDOW {
            latencies.drain(0..LATENCY_WINDOW / 2);
        }
    }

    pub fn record_simulation_failure(&self) {
        self.inner.simulations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn simulations_total(&self) -> u64 {
        self.inner.simulations_total.load(Ordering::Relaxed)
    }

    pub fn simulations_failed(&self) -> u64 {
        self.inner.simulations_failed.load(Ordering::Relaxed)
    }

    pub fn simulations_aborted(&self) -> u64 {
        self.inner.simulations_aborted.load(Ordering::Relaxed)
    }

    pub fn photons_sent(&self) -> u64 {
        self.inner.photons_sent.load(Ordering::Relaxed)
    }

    pub fn final_key_bits(&self) -> u64 {
        self.inner.final_key_bits.load(Ordering::Relaxed)
    }

    // Encryption metrics
    pub fn record_encryption(&self) {
        self.inner.encryptions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decryption(&self) {
        self.inner.decryptions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crypto_failure(&self) {
        self.inner.crypto_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn encryptions_total(&self) -> u64 {
        self.inner.encryptions_total.load(Ordering::Relaxed)
    }

    pub fn decryptions_total(&self) -> u64 {
        self.inner.decryptions_total.load(Ordering::Relaxed)
    }

    pub fn crypto_failures(&self) -> u64 {
        self.inner.crypto_failures.load(Ordering::Relaxed)
    }

    // Derived metrics
    pub fn uptime_seconds(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    pub fn latency_percentile(&self, percentile: f64) -> Option<u64> {
        let latencies = self.inner.simulation_latencies.read();
        if latencies.is_empty() {
            return None;
        }

        let mut sorted = latencies.clone();
        sorted.sort_unstable();
        let index = ((sorted.len() as f64 * percentile).ceil() as usize).min(sorted.len() - 1);
        Some(sorted[index])
    }

    pub fn latency_p50(&self) -> Option<u64> {
        self.latency_percentile(0.50)
    }

    pub fn latency_p99(&self) -> Option<u64> {
        self.latency_percentile(0.99)
    }

    /// Generate Prometheus-compatible metrics output
    pub fn prometheus_format(&self) -> String {
        let mut output = String::new();

        let counters = [
            ("simulations_total", "Total number of BB84 simulations", self.simulations_total()),
            ("simulations_failed", "Simulations rejected by validation", self.simulations_failed()),
            ("simulations_aborted", "Simulations whose QBER reached the abort threshold", self.simulations_aborted()),
            ("photons_sent", "Total photons sent by Alice", self.photons_sent()),
            ("final_key_bits", "Total final key bits produced", self.final_key_bits()),
            ("encryptions_total", "Total messages encrypted", self.encryptions_total()),
            ("decryptions_total", "Total messages decrypted", self.decryptions_total()),
            ("crypto_failures", "Failed encryptions and decryptions", self.crypto_failures()),
        ];
        for (name, help, value) in counters {
            push_metric(&mut output, name, help, "counter", value);
        }

        push_metric(&mut output, "uptime_seconds", "Service uptime in seconds", "gauge", self.uptime_seconds());

        if let Some(p50) = self.latency_p50() {
            push_metric(&mut output, "simulation_latency_p50_microseconds", "Simulation latency 50th percentile", "gauge", p50);
        }

        if let Some(p99) = self.latency_p99() {
            push_metric(&mut output, "simulation_latency_p99_microseconds", "Simulation latency 99th percentile", "gauge", p99);
        }

        output
    }
}

fn push_metric(output: &mut String, name: &str, help: &str, kind: &str, value: u64) {
    let _ = writeln!(output, "# HELP qkd_{} {}", name, help);
    let _ = writeln!(output, "# TYPE qkd_{} {}", name, kind);
    let _ = writeln!(output, "qkd_{} {}", name, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84::{Bb84Protocol, SimulationRequest};
    use crate::channel::ChannelParameters;
    use crate::eve::{AttackType, EveConfiguration};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn simulate(eve: EveConfiguration) -> SimulationResult {
        let protocol = Bb84Protocol::new(SimulationRequest {
            num_bits: 1024,
            eve,
            channel: ChannelParameters {
                distance_km: 1.0,
                telescope_aperture_cm: 100.0,
                ..Default::default()
            },
        })
        .unwrap();
        protocol.run_with_rng(&mut StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        let clean = simulate(EveConfiguration::default());
        metrics.record_simulation(&clean, 100);

        let attacked = simulate(EveConfiguration {
            active: true,
            interception_rate: 1.0,
            attack_type: AttackType::InterceptResend,
        });
        metrics.record_simulation(&attacked, 200);
        metrics.record_simulation_failure();

        assert_eq!(metrics.simulations_total(), 2);
        assert_eq!(metrics.simulations_failed(), 1);
        assert_eq!(metrics.simulations_aborted(), 1);
        assert_eq!(metrics.photons_sent(), 2048);
        assert_eq!(
            metrics.final_key_bits(),
            (clean.final_key.len() + attacked.final_key.len()) as u64
        );

        metrics.record_encryption();
        metrics.record_decryption();
        metrics.record_crypto_failure();
        assert_eq!(metrics.encryptions_total(), 1);
        assert_eq!(metrics.decryptions_total(), 1);
        assert_eq!(metrics.crypto_failures(), 1);
    }

    #[test]
    fn test_latency_percentiles() {
        let metrics = Metrics::new();
        let result = simulate(EveConfiguration::default());

        for i in 1..=100 {
            metrics.record_simulation(&result, i);
        }

        let p50 = metrics.latency_p50().unwrap();
        assert!((45..=55).contains(&p50));

        let p99 = metrics.latency_p99().unwrap();
        assert!((95..=100).contains(&p99));
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        let text = metrics.prometheus_format();
        assert!(text.contains("# TYPE qkd_simulations_total counter"));
        assert!(text.contains("qkd_photons_sent 0"));
        assert!(!text.contains("latency_p50"));
    }
}
