//! Prometheus Metrics Registry - Vault Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards:
//! committed operations, rejections by error kind, command latency, pool
//! value and shares per strategy, revenue flow and feed health.

use std::sync::Arc;

use alloy::primitives::U256;
use axum::routing::get;
use axum::Router;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::domain::events::{EventRecord, VaultEvent};
use crate::domain::units::{to_f64, USD_DECIMALS};

/// Decimals assumed when rendering native revenue amounts.
const NATIVE_DECIMALS: u8 = 18;

/// Centralized Prometheus metrics for the vault engine.
///
/// All metrics follow the naming convention `vault_*`.
pub struct MetricsRegistry {
    registry: Registry,
    /// Committed events by name.
    pub events_total: IntCounterVec,
    /// Rejected commands by operation and error kind.
    pub rejections_total: IntCounterVec,
    /// Command latency in microseconds.
    pub command_latency_us: HistogramVec,
    /// Pool value per strategy in USD.
    pub pool_value_usd: GaugeVec,
    /// Outstanding shares per strategy (whole shares).
    pub total_shares: GaugeVec,
    /// Native revenue moved, by direction (funded / claimed).
    pub revenue_native: CounterVec,
    /// Price feed status (1 = healthy, 0 = unhealthy).
    pub feed_healthy: Gauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_total = IntCounterVec::new(
            Opts::new("vault_events_total", "Committed engine events"),
            &["event"],
        )?;

        let rejections_total = IntCounterVec::new(
            Opts::new("vault_rejections_total", "Rejected commands by error kind"),
            &["op", "kind"],
        )?;

        let command_latency_us = HistogramVec::new(
            HistogramOpts::new(
                "vault_command_latency_us",
                "Command latency in microseconds",
            )
            .buckets(vec![10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 50000.0]),
            &["op"],
        )?;

        let pool_value_usd = GaugeVec::new(
            Opts::new("vault_pool_value_usd", "Strategy pool value in USD"),
            &["strategy"],
        )?;

        let total_shares = GaugeVec::new(
            Opts::new("vault_total_shares", "Outstanding LP shares per strategy"),
            &["strategy"],
        )?;

        let revenue_native = CounterVec::new(
            Opts::new("vault_revenue_native_total", "Native revenue moved"),
            &["direction"],
        )?;

        let feed_healthy = Gauge::new(
            "vault_feed_healthy",
            "Price feed status (1=healthy, 0=unhealthy)",
        )?;

        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(rejections_total.clone()))?;
        registry.register(Box::new(command_latency_us.clone()))?;
        registry.register(Box::new(pool_value_usd.clone()))?;
        registry.register(Box::new(total_shares.clone()))?;
        registry.register(Box::new(revenue_native.clone()))?;
        registry.register(Box::new(feed_healthy.clone()))?;

        Ok(Self {
            registry,
            events_total,
            rejections_total,
            command_latency_us,
            pool_value_usd,
            total_shares,
            revenue_native,
            feed_healthy,
        })
    }

    /// Count a committed event.
    pub fn observe(&self, record: &EventRecord) {
        self.events_total
            .with_label_values(&[record.event.name()])
            .inc();
        match &record.event {
            VaultEvent::RevenueFunded { amount, .. } => self
                .revenue_native
                .with_label_values(&["funded"])
                .inc_by(to_f64(*amount, NATIVE_DECIMALS)),
            VaultEvent::RevenueClaimed { amount, .. } => self
                .revenue_native
                .with_label_values(&["claimed"])
                .inc_by(to_f64(*amount, NATIVE_DECIMALS)),
            _ => {}
        }
    }

    pub fn record_rejection(&self, op: &str, kind: &str) {
        self.rejections_total.with_label_values(&[op, kind]).inc();
    }

    pub fn record_latency(&self, op: &str, micros: f64) {
        self.command_latency_us.with_label_values(&[op]).observe(micros);
    }

    /// Update pool gauges for one strategy.
    pub fn set_pool(&self, strategy: &str, pool_usd: U256, shares: U256) {
        self.pool_value_usd
            .with_label_values(&[strategy])
            .set(to_f64(pool_usd, USD_DECIMALS));
        self.total_shares
            .with_label_values(&[strategy])
            .set(to_f64(shares, USD_DECIMALS));
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move { metrics.render() }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use chrono::Utc;

    #[test]
    fn test_observe_counts_events_and_revenue() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.observe(&EventRecord {
            sequence: 0,
            emitted_at: Utc::now(),
            event: VaultEvent::RevenueFunded {
                payer: Address::repeat_byte(1),
                to: Address::repeat_byte(2),
                amount: U256::from(2_000_000_000_000_000_000u128),
            },
        });
        metrics.record_rejection("deposit", "below_minimum_deposit");

        assert_eq!(
            metrics
                .events_total
                .with_label_values(&["revenue_funded"])
                .get(),
            1
        );
        let funded = metrics.revenue_native.with_label_values(&["funded"]).get();
        assert!((funded - 2.0).abs() < f64::EPSILON);

        let text = metrics.render();
        assert!(text.contains("vault_rejections_total"));
    }
}
