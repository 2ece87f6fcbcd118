use anyhow::Result;
use risk_manager::{load_layered_config, RiskManager};
use std::sync::Arc;
use strategy_engine::{builtin_catalog, RewardTable, StrategyCatalog};
use tokio::sync::{mpsc, watch};
use tracing::{info, Level};
use trading_session::{load_settings, PaperExecutor, PaperExecutorConfig, TradingSession};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/session.toml".to_string());
    let settings = load_settings(&path, None)?;
    let risk = load_layered_config(&settings.risk_config, None)?;

    let catalog = match &settings.strategies_file {
        Some(file) => StrategyCatalog::from_json(&std::fs::read_to_string(file)?)?,
        None => builtin_catalog()?,
    };
    info!(
        strategies = ?catalog.names().collect::<Vec<_>>(),
        selected = %settings.strategy,
        "Strategies loaded"
    );

    let rewards = Arc::new(RewardTable::standard()?);
    let mut manager = RiskManager::with_catalog(
        catalog,
        &settings.strategy,
        settings.base_stake,
        risk,
        rewards.clone(),
    )?;
    if let Some(seed) = settings.seed {
        manager = manager.with_seed(seed);
    }

    let executor = Arc::new(PaperExecutor::new(
        PaperExecutorConfig {
            initial_balance: settings.initial_balance,
            seed: settings.seed,
        },
        rewards,
    ));

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("👋 Stop requested, finishing current trade...");
            let _ = stop_tx.send(true);
        }
    });

    let (notify_tx, mut notify_rx) = mpsc::channel::<trading_session::Notification>(256);
    let notifier = tokio::spawn(async move {
        while let Some(notification) = notify_rx.recv().await {
            info!("{}", notification.text());
        }
    });

    let mut session = TradingSession::new(manager, executor, settings.session, stop_rx)
        .with_notifications(notify_tx);
    let report = session.run().await?;
    drop(session);
    notifier.await?;

    info!(
        reason = %report.reason,
        trades = report.trades,
        summary = %serde_json::to_string(&report.summary)?,
        "Session finished"
    );

    Ok(())
}
