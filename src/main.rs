//! Trade Sentinel - Main Entry Point
//!
//! Runs the behavioral risk evaluation engine, with a simulation mode for
//! exercising the full pipeline against synthetic activity.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use trade_sentinel::aggregation::RiskReport;
use trade_sentinel::composition::{default_rules, CompositionEngine};
use trade_sentinel::config::Config;
use trade_sentinel::engine::{ChannelPublisher, LogPublisher, ReportPublisher, RiskProcessor};
use trade_sentinel::evaluators::{
    ConcurrencyLimitEvaluator, CooldownEvaluator, DailyTradeLimitEvaluator, EvaluatorRegistry,
    EvaluatorSelection, FomoEvaluator, LossChasingEvaluator, OversizedTradeEvaluator,
    OvertradingEvaluator, Preset, SunkCostEvaluator, ThinLiquidityEvaluator,
    VolatilityEntryEvaluator, VolumeLimitEvaluator,
};
use trade_sentinel::market::{
    CachedMarketData, HttpMarketDataProvider, HypeMetrics, LiquidityMetrics, MarketCacheConfig,
    MarketDataProvider, StaticMarketData,
};
use trade_sentinel::pattern::PatternStore;
use trade_sentinel::state::{
    ActivityEvent, EquityStore, InMemoryLimits, Job, JobSide, JobStore, Position, PositionStore,
    UserLimits,
};

/// Trade Sentinel CLI
#[derive(Parser)]
#[command(name = "trade-sentinel")]
#[command(version, about = "Behavioral risk pattern detection for trading activity")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted activity burst through the full pipeline
    Simulate {
        /// User id to simulate
        #[arg(short, long, default_value = "sim-user")]
        user: String,

        /// Print full report JSON instead of the summary
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the configured composite rule set
    Rules,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Some(Commands::Simulate { user, verbose }) => {
            return run_simulation(&user, verbose).await;
        }
        Some(Commands::Rules) => {
            return show_rules();
        }
        None => {
            // Default: run the engine
        }
    }

    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║        Trade Sentinel v{} - Risk Pattern Engine         ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let config = Config::load()?;
    config.validate()?;
    log_config(&config);

    // Market data: HTTP-backed when configured, otherwise a static stub that
    // leaves the market-dependent evaluators quiet.
    let provider: Arc<dyn MarketDataProvider> = match &config.market.base_url {
        Some(base_url) => {
            info!("🌐 [MARKET] Using market analytics service at {}", base_url);
            Arc::new(HttpMarketDataProvider::new(
                base_url,
                Duration::from_secs(config.market.request_timeout_secs),
            )?)
        }
        None => {
            warn!("🌐 [MARKET] No market data service configured, market checks disabled");
            Arc::new(StaticMarketData::new())
        }
    };

    let processor = build_processor(
        &config,
        provider,
        Arc::new(InMemoryLimits::with_fallback(default_limits())),
        Arc::new(LogPublisher::new()),
    );

    // Shutdown signal
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    let handles = processor.start();
    info!("🚀 Engine running; feed activity via the ingestion API");

    // Periodic status logging until shutdown.
    while !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_secs(60)).await;
        let metrics = processor.metrics();
        info!(
            "📊 [STATUS] cycles={} failed={} published={} dropped={} eval_failures={} eval_timeouts={}",
            metrics.cycles_completed,
            metrics.cycles_failed,
            metrics.reports_published,
            metrics.requests_dropped,
            metrics.evaluator_failures,
            metrics.evaluator_timeouts,
        );
    }

    processor.shutdown();
    for handle in handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    info!("👋 Engine stopped");
    Ok(())
}

/// Default caps served for users without configured limits.
fn default_limits() -> UserLimits {
    UserLimits {
        max_job_notional: Some(dec!(25000)),
        max_daily_jobs: Some(25),
        max_daily_volume: Some(dec!(250000)),
        cooldown_minutes: Some(5),
        max_open_positions: Some(10),
    }
}

/// Wire stores, evaluators, composition, and the processor together.
fn build_processor(
    config: &Config,
    provider: Arc<dyn MarketDataProvider>,
    limits: Arc<InMemoryLimits>,
    publisher: Arc<dyn ReportPublisher>,
) -> Arc<RiskProcessor> {
    let jobs = Arc::new(JobStore::new());
    let positions = Arc::new(PositionStore::new());
    let equity = Arc::new(EquityStore::new());
    let store = Arc::new(PatternStore::new());

    let market = Arc::new(CachedMarketData::new(
        provider,
        MarketCacheConfig {
            volatility_ttl_secs: config.market.volatility_ttl_secs,
            liquidity_ttl_secs: config.market.liquidity_ttl_secs,
            hype_ttl_secs: config.market.hype_ttl_secs,
        },
    ));

    let eval_cfg = config.evaluators.clone();
    let pat_cfg = config.patterns.clone();
    let limits_dyn: Arc<dyn trade_sentinel::state::LimitsProvider> = limits;

    let mut registry = EvaluatorRegistry::new();
    registry.register(Arc::new(OversizedTradeEvaluator::new(
        jobs.clone(),
        limits_dyn.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));
    registry.register(Arc::new(DailyTradeLimitEvaluator::new(
        jobs.clone(),
        limits_dyn.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));
    registry.register(Arc::new(VolumeLimitEvaluator::new(
        jobs.clone(),
        limits_dyn.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));
    registry.register(Arc::new(CooldownEvaluator::new(
        jobs.clone(),
        limits_dyn.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));
    registry.register(Arc::new(ConcurrencyLimitEvaluator::new(
        positions.clone(),
        limits_dyn.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));
    registry.register(Arc::new(OvertradingEvaluator::new(
        jobs.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));
    registry.register(Arc::new(FomoEvaluator::new(
        jobs.clone(),
        market.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));
    registry.register(Arc::new(VolatilityEntryEvaluator::new(
        jobs.clone(),
        market.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));
    registry.register(Arc::new(ThinLiquidityEvaluator::new(
        jobs.clone(),
        market.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));
    registry.register(Arc::new(SunkCostEvaluator::new(
        positions.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));
    registry.register(Arc::new(LossChasingEvaluator::new(
        jobs.clone(),
        positions.clone(),
        equity.clone(),
        eval_cfg.clone(),
        pat_cfg.clone(),
    )));

    let composition = CompositionEngine::new(
        default_rules(),
        config.composition.clone(),
        config.patterns.composite_ttl_minutes,
    );

    RiskProcessor::new(
        config.clone(),
        registry,
        composition,
        store,
        jobs,
        positions,
        equity,
        publisher,
    )
}

/// Drive the full pipeline with a scripted activity burst.
async fn run_simulation(user: &str, verbose: bool) -> Result<()> {
    info!("🧪 [SIM] Simulating risky activity for user '{}'", user);

    let config = Config::default();

    // Hyped, volatile, thin market for the simulated symbol.
    let market = StaticMarketData::new();
    market.set_hype(
        "MEMEUSDT",
        HypeMetrics {
            hype_score: 0.92,
            mention_velocity: 8.5,
        },
    );
    market.set_volatility("MEMEUSDT", 1.7);
    market.set_liquidity(
        "MEMEUSDT",
        LiquidityMetrics {
            spread: 0.015,
            depth: 8_000.0,
        },
    );

    let limits = Arc::new(InMemoryLimits::new());
    limits.set(
        user,
        UserLimits {
            max_job_notional: Some(dec!(5000)),
            max_daily_jobs: Some(5),
            max_daily_volume: Some(dec!(20000)),
            cooldown_minutes: Some(10),
            max_open_positions: Some(2),
        },
    );

    let (publisher, mut reports) = ChannelPublisher::channel();
    let processor = build_processor(&config, Arc::new(market), limits, Arc::new(publisher));

    let now = Utc::now();

    // Declining equity curve.
    for (hours_ago, equity) in [(6, dec!(10000)), (3, dec!(9800)), (0, dec!(9550))] {
        processor.record_event(ActivityEvent::EquitySnapshot {
            user_id: user.to_string(),
            equity,
            timestamp: now - ChronoDuration::hours(hours_ago),
        });
    }

    // A position held underwater long enough to count as sunk cost.
    processor.record_event(ActivityEvent::PositionUpdate(Position {
        position_key: "pos-meme".to_string(),
        user_id: user.to_string(),
        symbol: "MEMEUSDT".to_string(),
        quantity: dec!(4000),
        entry_price: dec!(2.5),
        mark_price: dec!(2.2),
        unrealized_pnl: dec!(-1200),
        opened_at: now - ChronoDuration::hours(30),
        updated_at: now,
    }));

    // A burst of rapid, oversized entries into the hyped symbol.
    for i in 0..8 {
        processor.record_event(ActivityEvent::Job(Job {
            job_id: format!("sim-job-{}", i),
            user_id: user.to_string(),
            symbol: "MEMEUSDT".to_string(),
            side: JobSide::Buy,
            notional: if i == 0 { dec!(12000) } else { dec!(2500) },
            position_key: Some("pos-meme".to_string()),
            created_at: now - ChronoDuration::minutes(24 - i * 3),
        }));
    }

    let report = processor
        .evaluate_user_now(user, EvaluatorSelection::Preset(Preset::All))
        .await?;
    print_report(&report, verbose)?;

    // Drain the published copy so the channel side is exercised too.
    let published = reports.recv().await;
    info!(
        "📤 [SIM] Publisher delivered {} report(s)",
        published.is_some() as u8
    );

    Ok(())
}

fn print_report(report: &RiskReport, verbose: bool) -> Result<()> {
    info!(
        "🧾 [REPORT] user={} level={} category={} confidence={:.3}",
        report.user_id, report.top_risk_level, report.top_risk_type, report.top_risk_confidence
    );
    info!(
        "   patterns={} composites={} consumed={} unconsumed={} source={:?}",
        report.pattern_count,
        report.composite_count,
        report.consumed_count,
        report.unconsumed_count,
        report.signal_source
    );
    for (category, score) in &report.category_scores {
        info!("   {}: {:.3}", category, score);
    }
    for composite in &report.composite_patterns {
        info!(
            "   🧩 {} ({:.2}): {}",
            composite.pattern_id, composite.confidence, composite.message
        );
    }
    if verbose {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    Ok(())
}

fn show_rules() -> Result<()> {
    for rule in default_rules() {
        println!(
            "{} [{}] window={}m sequence={} per_position={}",
            rule.rule_id,
            rule.category,
            rule.time_window_minutes,
            rule.sequence_matters,
            rule.position_specific
        );
        for req in &rule.requirements {
            println!(
                "   requires {} x{}{}",
                req.pattern_id,
                req.minimum,
                if req.greedy { "+ (greedy)" } else { "" }
            );
        }
        println!("   -> {}", rule.message);
    }
    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Queue capacity: {}", config.engine.queue_capacity);
    info!(
        "   Worker pool: {} concurrent batches",
        config.engine.max_concurrent_batches
    );
    info!(
        "   Evaluator timeout: {}s",
        config.engine.evaluator_timeout_secs
    );
    info!("   Sweep interval: {}s", config.engine.sweep_interval_secs);
    info!(
        "   Pattern TTL: {}m (composite {}m)",
        config.patterns.default_ttl_minutes, config.patterns.composite_ttl_minutes
    );
    info!("   Report lookback: {}h", config.patterns.lookback_hours);
    info!(
        "   Combination bound: {}",
        config.composition.max_combinations
    );
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly("logs", "trade-sentinel.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("trade_sentinel=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}
