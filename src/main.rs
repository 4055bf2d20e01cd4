//! Strategy Vault Engine - Entry Point
//!
//! Wiring sequence:
//! 1. Load config.toml (path from the first argument) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build the price feed (static, or Chainlink when `[chain]` is set)
//! 4. Restore the last snapshot or seed custody from `[[wallets]]`
//! 5. Build registry, ledgers and revenue ledger around shared ports
//! 6. Spawn metrics (:9090) and health (/live + /ready) servers
//! 7. Replay the configured command session through the sequencer
//! 8. Journal committed events, save the snapshot
//! 9. Wait for SIGINT → graceful shutdown (stop servers → save → exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use strategy_vault::adapters::chain::{AggregatorBinding, ChainProvider, ChainlinkFeed};
use strategy_vault::adapters::feeds::StaticPriceFeed;
use strategy_vault::adapters::memory::{
    MemoryBank, OracleSwapRouter, StaticAgentAuthority, SystemClock,
};
use strategy_vault::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use strategy_vault::adapters::persistence::{
    load_session, EngineSnapshot, EventJournal, StateStore,
};
use strategy_vault::config::{self, AppConfig};
use strategy_vault::ports::{Clock, PriceFeed};
use strategy_vault::usecases::{
    LedgerPorts, LedgerSettings, PriceOracle, RegistryAddresses, Sequencer, StrategyRegistry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config =
        config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.engine.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.engine.name,
        version = env!("CARGO_PKG_VERSION"),
        tokens = config.tokens.len(),
        "Starting strategy vault engine"
    );

    // ── 3. Price feed + oracle ──────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let feed = build_feed(&config, Arc::clone(&clock)).await?;
    let oracle = Arc::new(PriceOracle::new(
        Arc::clone(&feed),
        clock,
        config.ledger.max_feed_age_secs,
    ));

    // ── 4. Persistence + custody ────────────────────────────
    let store = StateStore::new(
        &config.persistence.data_dir,
        &config.persistence.snapshot_file,
    )
    .await?;
    let journal = EventJournal::new(&config.persistence.data_dir).await?;
    let snapshot = if config.persistence.restore_on_start {
        store.load().await?
    } else {
        None
    };

    let bank = Arc::new(match &snapshot {
        Some(snapshot) => MemoryBank::from_entries(&snapshot.custody),
        None => seed_bank(&config)?,
    });

    // ── 5. Registry + ledgers ───────────────────────────────
    let ports = LedgerPorts {
        oracle: Arc::clone(&oracle),
        router: Arc::new(OracleSwapRouter::new(
            Arc::clone(&bank),
            Arc::clone(&oracle),
            config.router.slippage_bps,
        )),
        bank: bank.clone(),
        authority: Arc::new(StaticAgentAuthority::new(config.agents.iter().copied())),
    };
    let settings = LedgerSettings {
        rebalance_slippage_bps: config.ledger.rebalance_slippage_bps,
    };
    let addresses = RegistryAddresses {
        factory: config.registry.factory,
        revenue: config.registry.revenue,
        swap_router: config.registry.swap_router,
        price_oracle: config.registry.price_oracle,
    };
    let registry = Arc::new(match snapshot {
        Some(snapshot) => {
            if snapshot.registry.addresses != addresses {
                warn!("Snapshot registry addresses differ from config; keeping snapshot values");
            }
            StrategyRegistry::restore(snapshot.registry, ports, settings, bank.clone())
        }
        None => StrategyRegistry::new(addresses, ports, settings, bank.clone()),
    });

    // ── 6. Metrics + health servers ─────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let metrics = Arc::new(MetricsRegistry::new()?);
    let health = Arc::new(HealthState::new());

    let mut handles = Vec::new();
    if config.metrics.enabled {
        let metrics_task = Arc::clone(&metrics);
        let bind = config.metrics.bind_address.clone();
        let rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = metrics_task.serve(bind, rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }));

        let health_server = HealthServer::new(Arc::clone(&health), config.metrics.health_port);
        let rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = health_server.run(rx).await {
                error!(error = %e, "Health server failed");
            }
        }));
    }

    // ── 7. Replay the command session ───────────────────────
    let sequencer = Sequencer::new(Arc::clone(&registry));
    if let Some(path) = &config.session.commands {
        run_session(&sequencer, &metrics, Path::new(path)).await?;
    }
    health.session_applied.store(true, Ordering::Relaxed);

    // ── 8. Journal + snapshot ───────────────────────────────
    flush_events(&registry, &journal, &metrics).await?;
    refresh_pool_gauges(&registry, &metrics).await;
    save_snapshot(&registry, &bank, &store).await?;

    info!(
        strategies = registry.strategies().await.len(),
        "Engine ready - serving probes until shutdown"
    );

    // ── 9. Wait for SIGINT, polling dependency health ───────
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("SIGINT received, initiating graceful shutdown");
                break;
            }
            () = tokio::time::sleep(Duration::from_secs(30)) => {
                let feed_ok = oracle.is_healthy().await;
                let storage_ok = store.is_healthy().await && journal.is_healthy().await;
                health.feed_healthy.store(feed_ok, Ordering::Relaxed);
                health.storage_healthy.store(storage_ok, Ordering::Relaxed);
                metrics.feed_healthy.set(if feed_ok { 1.0 } else { 0.0 });
                refresh_pool_gauges(&registry, &metrics).await;
            }
        }
    }

    // ── Graceful shutdown ───────────────────────────────────
    health.session_applied.store(false, Ordering::Relaxed);
    let _ = shutdown_tx.send(());

    flush_events(&registry, &journal, &metrics).await?;
    save_snapshot(&registry, &bank, &store).await?;

    for handle in handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Static feed from `[[tokens]]`, or Chainlink aggregators when `[chain]`
/// is configured.
async fn build_feed(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn PriceFeed>> {
    if let Some(chain) = &config.chain {
        let provider = Arc::new(ChainProvider::connect(chain).await?);
        let bindings: Vec<AggregatorBinding> = config
            .tokens
            .iter()
            .filter_map(|token| {
                token.aggregator.map(|aggregator| AggregatorBinding {
                    token: token.address,
                    aggregator,
                    token_decimals: token.decimals,
                })
            })
            .collect();
        let feed = ChainlinkFeed::connect(provider, &bindings).await?;
        return Ok(Arc::new(feed));
    }

    let feed = StaticPriceFeed::new(clock);
    for token in &config.tokens {
        feed.register(
            token.address,
            token.feed_answer()?,
            token.feed_decimals,
            token.decimals,
        );
        info!(symbol = %token.symbol, price_usd = %token.price_usd, "Static feed registered");
    }
    Ok(Arc::new(feed))
}

/// Credit `[[wallets]]` balances into a fresh bank.
fn seed_bank(config: &AppConfig) -> Result<MemoryBank> {
    let bank = MemoryBank::new();
    for wallet in &config.wallets {
        let (token, amount) = config::loader::wallet_amount(config, &wallet.token, &wallet.amount)?;
        bank.mint(token, wallet.holder, amount)?;
        info!(holder = %wallet.holder, token = %wallet.token, amount = %wallet.amount, "Wallet seeded");
    }
    Ok(bank)
}

/// Apply every envelope of a session file in order.
async fn run_session(sequencer: &Sequencer, metrics: &MetricsRegistry, path: &Path) -> Result<()> {
    let envelopes = load_session(path).await?;
    let mut applied = 0usize;
    let mut rejected = 0usize;

    for envelope in &envelopes {
        let op = envelope.command.name();
        let started = Instant::now();
        let outcome = sequencer.submit(envelope).await;
        metrics.record_latency(op, started.elapsed().as_secs_f64() * 1_000_000.0);

        match outcome {
            Ok(_) => applied += 1,
            Err(err) => {
                rejected += 1;
                metrics.record_rejection(op, err.kind());
            }
        }
    }

    info!(applied, rejected, "Session replayed");
    Ok(())
}

async fn flush_events(
    registry: &StrategyRegistry,
    journal: &EventJournal,
    metrics: &MetricsRegistry,
) -> Result<()> {
    let records = registry.events().drain();
    for record in &records {
        metrics.observe(record);
    }
    journal.append(&records).await
}

async fn refresh_pool_gauges(registry: &StrategyRegistry, metrics: &MetricsRegistry) {
    for id in registry.strategies().await {
        let Some(ledger) = registry.strategy(id).await else {
            continue;
        };
        match ledger.pool_value_usd().await {
            Ok(pool_usd) => {
                metrics.set_pool(&id.to_string(), pool_usd, ledger.total_shares().await);
            }
            Err(e) => warn!(strategy = %id, error = %e, "Pool valuation failed"),
        }
    }
}

async fn save_snapshot(
    registry: &StrategyRegistry,
    bank: &MemoryBank,
    store: &StateStore,
) -> Result<()> {
    let snapshot = EngineSnapshot::new(registry.snapshot().await, bank.entries());
    store.save(&snapshot).await
}
