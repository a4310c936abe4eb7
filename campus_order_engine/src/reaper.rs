//! The stale order reaper.
//!
//! Orders that sit in a pre-delivery status for too long (an abandoned vendor, a phone that went flat) would
//! otherwise clutter active views forever. The reaper sweeps them into `Delivered` on a fixed schedule via the
//! administrative [`OrderFlowApi::reap_stale_orders`] entry point; the sweep is a single conditional bulk update, so
//! overlapping or repeated runs do no extra work.
use std::env;

use cfo_common::helpers::parse_boolean_flag;
use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

use crate::{OrderFlowApi, SqliteDatabase};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_STALE_THRESHOLD_HOURS: i64 = 2;

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// When false, [`start_reaper_worker`] is a no-op. Stale orders then stay put until an operator sweeps manually.
    pub enabled: bool,
    /// How often the sweep runs.
    pub sweep_interval: std::time::Duration,
    /// How long an order may stay in a pre-delivery status before it is force-delivered.
    pub stale_threshold: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            stale_threshold: Duration::hours(DEFAULT_STALE_THRESHOLD_HOURS),
        }
    }
}

impl ReaperConfig {
    /// Reads `CFO_REAPER_ENABLED`, `CFO_REAPER_INTERVAL_SECS` and `CFO_REAPER_THRESHOLD_HOURS`, falling back to the
    /// defaults (enabled, 60 s sweep, 2 h threshold) when unset or unparseable.
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let enabled = parse_boolean_flag(env::var("CFO_REAPER_ENABLED").ok(), defaults.enabled);
        let sweep_interval = env::var("CFO_REAPER_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(std::time::Duration::from_secs)
            .unwrap_or(defaults.sweep_interval);
        let stale_threshold = env::var("CFO_REAPER_THRESHOLD_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .map(Duration::hours)
            .unwrap_or(defaults.stale_threshold);
        Self { enabled, sweep_interval, stale_threshold }
    }
}

/// Starts the reaper worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_reaper_worker(api: OrderFlowApi<SqliteDatabase>, config: ReaperConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            warn!("🧹️ Stale order reaper is disabled. Stuck orders will not be swept.");
            return;
        }
        let mut timer = tokio::time::interval(config.sweep_interval);
        info!("🧹️ Stale order reaper started. Threshold: {}h", config.stale_threshold.num_hours());
        loop {
            timer.tick().await;
            trace!("🧹️ Running stale order sweep");
            match api.reap_stale_orders(config.stale_threshold).await {
                Ok(reaped) if reaped.is_empty() => {},
                Ok(reaped) => {
                    info!("🧹️ {} stale order(s) force-delivered: {}", reaped.len(), order_list(&reaped));
                },
                Err(e) => {
                    error!("🧹️ Error running stale order sweep: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[crate::db_types::Order]) -> String {
    orders
        .iter()
        .map(|o| format!("{} (student: {}, vendor: {})", o.order_id, o.student_id, o.vendor_id))
        .collect::<Vec<String>>()
        .join(", ")
}
