// crates/indexer/src/controller.rs
//! The feed manager: a single serial loop regulating the feed rate against
//! the queue's observed drain rate.
//!
//! Each iteration reads the queue depth and ack egress rate, updates a
//! single-exponential-smoothing forecast of the drain rate, feeds when the
//! depth is at or under the buffer, and sleeps just long enough for the
//! workers to get back down to the buffer. Clamping the sleep in both
//! directions keeps status output live.
//!
//! After the feeder reports exhaustion, the remaining depth divided by the
//! forecast is the theoretical wind-down window; the loop exits once that
//! window fits inside a single maximum sleep.

use std::time::Duration;

use anyhow::Result;
use tracing::info;

use dex_db::Database;
use dex_queue::{WorkQueue, INDEX_QUEUE};

use crate::config::Config;
use crate::feeder::Feeder;
use crate::indexer::format_hms;

pub struct FeedManager {
    feeder: Feeder,
    queue: WorkQueue,
    db: Database,
    feed_size: i64,
    feed_buffer: f64,
    smoothing_constant: f64,
    max_sleep_secs: f64,

    demand: f64,
    forecast: f64,
    error_sq: f64,
}

impl FeedManager {
    pub fn new(feeder: Feeder, queue: WorkQueue, db: Database, config: &Config) -> Self {
        Self {
            feeder,
            queue,
            db,
            feed_size: config.feed_size,
            feed_buffer: config.feed_buffer(),
            smoothing_constant: config.smoothing_constant,
            max_sleep_secs: config.max_sleep_secs,
            demand: 0.0,
            forecast: 0.0,
            error_sq: 0.0,
        }
    }

    /// Drive feed cycles until the catalog is exhausted and the queue has
    /// drained within the wind-down window.
    pub async fn run(&mut self) -> Result<()> {
        let mut timeout: i64 = 1;
        while timeout != 0 {
            let sleep = self.tick(&mut timeout).await?;
            tokio::time::sleep(Duration::from_secs_f64(sleep)).await;
        }
        info!("queue drained within the wind-down window");
        Ok(())
    }

    /// One controller iteration. Returns the sleep before the next one.
    pub async fn tick(&mut self, timeout: &mut i64) -> Result<f64> {
        let stats = self.queue.stats(INDEX_QUEUE).await?;
        let mut messages = stats.messages as f64;
        self.observe(stats.demand);

        if messages <= self.feed_buffer {
            if !self.feeder.is_exhausted() {
                self.feeder.feed().await?;
                // Treat the fresh batch as already on the queue.
                messages += self.feed_size as f64;
            } else {
                let sleep_remaining = messages / self.forecast;
                *timeout = (sleep_remaining / self.max_sleep_secs) as i64;
            }
        }

        self.status().await;
        Ok(self.sleep_secs(messages))
    }

    /// Fold a demand observation into the forecast.
    fn observe(&mut self, demand: f64) {
        self.demand = demand;
        if self.forecast > 0.0 {
            self.error_sq = (demand - self.forecast).powi(2);
            self.forecast += self.smoothing_constant * (demand - self.forecast);
        } else {
            // First observation; a dead-idle queue still forecasts 1 so the
            // sleep arithmetic never divides by zero.
            self.forecast = if demand > 0.0 { demand } else { 1.0 };
        }
        if self.forecast <= 0.0 {
            self.forecast = 1.0;
        }
    }

    /// Time for the workers to drain back down to the buffer, clamped to
    /// `[0, max_sleep]`.
    fn sleep_secs(&self, messages: f64) -> f64 {
        let excess = if messages > self.feed_buffer {
            messages - self.feed_buffer
        } else {
            messages
        };
        (excess / self.forecast).clamp(0.0, self.max_sleep_secs)
    }

    pub async fn report_failures(&self) -> Result<Vec<dex_db::Repository>> {
        self.feeder.report_failures().await
    }

    async fn status(&self) {
        let Ok(Some(session)) = self.db.get_session(self.feeder.session_id()).await else {
            return;
        };
        let remaining = session.remaining();
        let eta_secs = remaining as f64 / self.forecast.max(1.0);
        info!(
            demand = self.demand,
            forecast = self.forecast,
            error_sq = self.error_sq,
            progress_pct = session.progress() * 100.0,
            remaining,
            eta = %format_hms(eta_secs as u64),
            "index rate"
        );
    }
}
