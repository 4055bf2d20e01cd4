//! Ledger Benchmarks - Hot-Path Performance Validation
//!
//! Benchmarks the share math and rebalance planning that run on every
//! deposit and agent action, plus a full in-memory deposit round trip.
//!
//! Run with: cargo bench --bench ledger_bench

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use strategy_vault::adapters::feeds::StaticPriceFeed;
use strategy_vault::adapters::memory::{
    ManualClock, MemoryBank, OracleSwapRouter, StaticAgentAuthority,
};
use strategy_vault::domain::rebalance::plan;
use strategy_vault::domain::shares::{pro_rata, shares_for_deposit};
use strategy_vault::domain::units::{one_usd, pow10};
use strategy_vault::domain::{CreateStrategyRequest, Visibility};
use strategy_vault::usecases::{
    LedgerPorts, LedgerSettings, PriceOracle, RegistryAddresses, StrategyRegistry,
};

/// Benchmark proportional share minting.
fn bench_shares_for_deposit(c: &mut Criterion) {
    let total = U256::from(1_250_000u64) * one_usd();
    let pool = U256::from(1_310_000u64) * one_usd();

    c.bench_function("shares_for_deposit", |b| {
        b.iter(|| {
            let _minted = shares_for_deposit(
                black_box(U256::from(5_000u64) * one_usd()),
                black_box(total),
                black_box(pool),
            );
        });
    });
}

/// Benchmark a four-token pro-rata withdrawal.
fn bench_pro_rata(c: &mut Criterion) {
    let balances = vec![
        U256::from(400u64) * pow10(18),
        U256::from(1_000_000u64) * pow10(6),
        U256::from(25u64) * pow10(8),
        U256::from(90_000u64) * pow10(18),
    ];
    let total = U256::from(2_000_000u64) * one_usd();

    c.bench_function("pro_rata_4_tokens", |b| {
        b.iter(|| {
            let _amounts = pro_rata(
                black_box(&balances),
                black_box(U256::from(12_345u64) * one_usd()),
                black_box(total),
            );
        });
    });
}

/// Benchmark planning a rebalance across eight tokens.
fn bench_rebalance_plan(c: &mut Criterion) {
    let balances: Vec<U256> = (1..=8u64).map(|i| U256::from(i * 1_000) * pow10(18)).collect();
    let values: Vec<U256> = (1..=8u64)
        .map(|i| U256::from(i * i * 1_000) * one_usd())
        .collect();
    let ratio = vec![1_250u32; 8];

    c.bench_function("rebalance_plan_8_tokens", |b| {
        b.iter(|| {
            let _legs = plan(black_box(&balances), black_box(&values), black_box(&ratio));
        });
    });
}

/// Benchmark an end-to-end deposit against in-memory adapters.
fn bench_ledger_deposit(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };
    let token_a = Address::repeat_byte(0xA1);
    let token_b = Address::repeat_byte(0xB2);
    let depositor = Address::repeat_byte(0x01);

    let clock = Arc::new(ManualClock::new(1_000));
    let feed = Arc::new(StaticPriceFeed::new(clock.clone()));
    feed.register(token_a, 100_000_000, 8, 18);
    feed.register(token_b, 200_000_000, 8, 6);
    let oracle = Arc::new(PriceOracle::new(feed, clock, 3_600));
    let bank = Arc::new(MemoryBank::new());
    let _ = bank.mint(token_a, depositor, U256::MAX / U256::from(2u64));

    let ports = LedgerPorts {
        oracle: oracle.clone(),
        router: Arc::new(OracleSwapRouter::new(bank.clone(), oracle, 30)),
        bank: bank.clone(),
        authority: Arc::new(StaticAgentAuthority::default()),
    };
    let registry = StrategyRegistry::new(
        RegistryAddresses {
            factory: Address::repeat_byte(0xFA),
            revenue: Address::repeat_byte(0xFE),
            swap_router: Address::repeat_byte(0x5A),
            price_oracle: Address::repeat_byte(0x0C),
        },
        ports,
        LedgerSettings::default(),
        bank,
    );
    let Ok(ledger) = runtime.block_on(async {
        let id = registry
            .create_strategy(
                depositor,
                CreateStrategyRequest {
                    tokens: vec![token_a, token_b],
                    split_ratio: vec![5_000, 5_000],
                    visibility: Visibility::Public,
                    deposit_usd_min: U256::ZERO,
                    fork_cost: U256::ZERO,
                    allowed_actions: vec![0],
                },
            )
            .await?;
        registry.ledger(id).await
    }) else {
        return;
    };

    c.bench_function("ledger_deposit", |b| {
        b.to_async(&runtime).iter(|| async {
            let _minted = ledger
                .deposit(depositor, token_a, black_box(pow10(18)))
                .await;
        });
    });
}

criterion_group!(
    benches,
    bench_shares_for_deposit,
    bench_pro_rata,
    bench_rebalance_plan,
    bench_ledger_deposit,
);
criterion_main!(benches);
