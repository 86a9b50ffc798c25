// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! QKD Gateway - REST API for the BB84 link simulator
//!
//! # Features
//!
//! - Key generation over a configurable satellite-to-ground channel
//! - Optional eavesdropper with five attack models
//! - AES-256-CBC encryption and decryption with generated keys
//! - Satellite pass geometry
//! - Prometheus metrics
//! - Health monitoring

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use qkd_core::{
    bb84::Bb84Protocol,
    config::GatewayConfig,
    crypto,
    metrics::Metrics,
    orbit::SatelliteStats,
    protocol::{
        key_bits, DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse,
        ErrorResponse, GatewayStatus, GenerateKeyRequest, GenerateKeyResponse, HealthResponse,
        HealthStatus, SatelliteStatsRequest,
    },
    Error,
};
use std::path::PathBuf;
use std::time::Instant;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "qkd-gateway")]
#[command(about = "QKD Gateway - Simulates BB84 key distribution via REST API", long_about = None)]
struct Args {
    /// Path to configuration file (ignored if --env-mode is set)
    #[arg(short, long, default_value = "config/gateway.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Load configuration from environment variables instead of file
    #[arg(long, default_value = "false")]
    env_mode: bool,
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    config: GatewayConfig,
    metrics: Metrics,
    started_at: DateTime<Utc>,
}

impl AppState {
    fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            metrics: Metrics::new(),
            started_at: Utc::now(),
        }
    }
}

/// Engine error rendered as an `ErrorResponse` body
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::InvalidParameter(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!("Request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Parse, validate and cap a generate-key request
fn prepare_simulation(config: &GatewayConfig, request: GenerateKeyRequest) -> qkd_core::Result<Bb84Protocol> {
    let simulation = request.into_simulation()?;
    if simulation.num_bits > config.max_num_bits {
        return Err(Error::InvalidParameter(format!(
            "num_bits {} exceeds the gateway limit of {}",
            simulation.num_bits, config.max_num_bits
        )));
    }
    Bb84Protocol::new(simulation)
}

/// POST /api/qkd/generate - Run one BB84 key exchange
async fn generate_key(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateKeyRequest>, JsonRejection>,
) -> ApiResult<GenerateKeyResponse> {
    let protocol = match payload
        .map_err(ApiError::from)
        .and_then(|Json(request)| prepare_simulation(&state.config, request).map_err(ApiError::from))
    {
        Ok(protocol) => protocol,
        Err(e) => {
            state.metrics.record_simulation_failure();
            warn!("Rejected key generation request: {}", e.0);
            return Err(e);
        }
    };

    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || protocol.run())
        .await
        .map_err(|e| {
            state.metrics.record_simulation_failure();
            Error::Internal(format!("Simulation task failed: {}", e))
        })?;
    state
        .metrics
        .record_simulation(&result, start.elapsed().as_micros() as u64);

    info!(
        run_id = %result.run_id,
        qber = result.qber(),
        security_level = result.security_level().as_str(),
        final_key_bits = result.final_key.len(),
        "Generated key"
    );

    Ok(Json(GenerateKeyResponse::from(&result)))
}

fn encrypt(config: &GatewayConfig, request: &EncryptRequest) -> qkd_core::Result<EncryptResponse> {
    if request.message.is_empty() {
        return Err(Error::InvalidParameter("message must not be empty".to_string()));
    }
    if request.message.len() > config.max_message_bytes {
        return Err(Error::InvalidParameter(format!(
            "message is {} bytes, limit is {}",
            request.message.len(),
            config.max_message_bytes
        )));
    }
    let bits = key_bits(&request.quantum_key)?;
    crypto::encrypt_message(&request.message, &bits).map(EncryptResponse::from)
}

/// POST /api/qkd/encrypt - Encrypt a message with a quantum key
async fn encrypt_message(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EncryptRequest>, JsonRejection>,
) -> ApiResult<EncryptResponse> {
    let Json(request) = payload?;
    match encrypt(&state.config, &request) {
        Ok(response) => {
            state.metrics.record_encryption();
            Ok(Json(response))
        }
        Err(e) => {
            state.metrics.record_crypto_failure();
            Err(e.into())
        }
    }
}

/// POST /api/qkd/decrypt - Decrypt a message with a quantum key
async fn decrypt_message(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DecryptRequest>, JsonRejection>,
) -> ApiResult<DecryptResponse> {
    let Json(request) = payload?;
    let plaintext = key_bits(&request.quantum_key)
        .and_then(|bits| crypto::decrypt_message(&request.ciphertext_b64, &request.iv_b64, &bits));

    match plaintext {
        Ok(plaintext) => {
            state.metrics.record_decryption();
            Ok(Json(DecryptResponse {
                success: true,
                plaintext,
            }))
        }
        Err(e) => {
            state.metrics.record_crypto_failure();
            warn!("Decryption failed: {}", e);
            Err(e.into())
        }
    }
}

/// POST /api/satellite/stats - Orbital parameters for a pass geometry
async fn satellite_stats(
    payload: std::result::Result<Json<SatelliteStatsRequest>, JsonRejection>,
) -> ApiResult<SatelliteStats> {
    let Json(request) = payload?;
    Ok(Json(request.compute()?))
}

/// GET / - Service banner
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "QKD Link Simulator",
        "version": qkd_core::VERSION,
        "protocol": "BB84",
        "endpoints": {
            "health": "GET /health",
            "status": "GET /api/status",
            "metrics": "GET /metrics",
            "generate_key": "POST /api/qkd/generate",
            "encrypt": "POST /api/qkd/encrypt",
            "decrypt": "POST /api/qkd/decrypt",
            "satellite_stats": "POST /api/satellite/stats",
        }
    }))
}

/// GET /health - Simple health check
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        service: "qkd-gateway".to_string(),
    })
}

/// GET /api/status - System status
async fn get_status(State(state): State<AppState>) -> Json<GatewayStatus> {
    let metrics = &state.metrics;
    let total = metrics.simulations_total();
    let aborted = metrics.simulations_aborted();

    let mut warnings = Vec::new();
    let status = if total > 0 && aborted * 2 > total {
        warnings.push(format!(
            "{} of {} key exchanges aborted on high QBER",
            aborted, total
        ));
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    Json(GatewayStatus {
        status,
        version: qkd_core::VERSION.to_string(),
        started_at: state.started_at,
        uptime_seconds: metrics.uptime_seconds(),
        simulations_total: total,
        simulations_failed: metrics.simulations_failed(),
        simulations_aborted: aborted,
        encryptions_total: metrics.encryptions_total(),
        decryptions_total: metrics.decryptions_total(),
        warnings,
    })
}

/// GET /metrics - Prometheus metrics
async fn get_metrics(State(state): State<AppState>) -> Response {
    if !state.config.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    (
        [(hyper::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.prometheus_format(),
    )
        .into_response()
}

fn build_router(state: AppState) -> Router {
    let timeout = state.config.request_timeout();

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .route("/api/qkd/generate", post(generate_key))
        .route("/api/qkd/encrypt", post(encrypt_message))
        .route("/api/qkd/decrypt", post(decrypt_message))
        .route("/api/satellite/stats", post(satellite_stats))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize tracing
    let log_level = args.log_level.parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .json()
        .init();

    info!("QKD Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.env_mode {
        info!("Loading configuration from environment variables");
        GatewayConfig::from_env()
            .context("Failed to load configuration from environment")?
    } else {
        info!("Loading configuration from file: {:?}", args.config);
        GatewayConfig::from_file(&args.config)
            .context("Failed to load configuration from file")?
    };

    let addr = config.socket_addr().context("Invalid listen address")?;
    info!(
        max_num_bits = config.max_num_bits,
        max_message_bytes = config.max_message_bytes,
        request_timeout_secs = config.request_timeout_secs,
        metrics_enabled = config.metrics_enabled,
        "Configuration loaded"
    );

    let app = build_router(AppState::new(config));

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
