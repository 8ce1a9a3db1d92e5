use chrono::Utc;
use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::MonitorConfig,
    error::MonitorError,
    fetcher::PageSource,
    highscore_parser::HighscoreParser,
    store::SnapshotStore,
    types::CycleReport,
};

pub fn system_now() -> i64 {
    Utc::now().timestamp()
}

/// Seconds left until the next cycle is due. Zero or less means "now".
pub fn compute_wait(last_timestamp: i64, poll_interval: i64, now: i64) -> i64 {
    last_timestamp.saturating_add(poll_interval).saturating_sub(now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            max_attempts: config.retry.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.retry.initial_delay_ms),
        }
    }
}

/// The poll loop. Paces itself off the newest persisted snapshot instead of
/// a wall-clock timer, so a slow cycle never shifts the cadence and missed
/// cycles are not caught up.
pub struct Monitor<S, D> {
    source: S,
    parser: HighscoreParser,
    store: D,
    poll_interval: i64,
    retry: RetryPolicy,
    clock: fn() -> i64,
}

impl<S: PageSource, D: SnapshotStore> Monitor<S, D> {
    pub fn new(source: S, parser: HighscoreParser, store: D, config: &MonitorConfig) -> Self {
        Self {
            source,
            parser,
            store,
            poll_interval: i64::try_from(config.schedule.poll_interval_secs).unwrap_or(i64::MAX),
            retry: RetryPolicy::from_config(config),
            clock: system_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    /// Runs until `cancel` fires or a fatal error occurs.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), MonitorError> {
        // Cycle start of the last cycle that wrote nothing. Without it an
        // empty leaderboard would never advance the store and we would spin.
        let mut empty_cycle_at = 0;

        loop {
            if cancel.is_cancelled() {
                info!("Shutdown requested, stopping monitor");
                return Ok(());
            }

            let Some(last) = self
                .retrying("read last snapshot time", &cancel, || self.store.last_timestamp())
                .await?
            else {
                return Ok(());
            };

            let wait = compute_wait(last.max(empty_cycle_at), self.poll_interval, (self.clock)());
            if wait > 0 {
                info!("sleeping {} seconds and checking again..", wait);
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Shutdown requested while waiting, stopping monitor");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(Duration::from_secs(wait.unsigned_abs())) => {}
                }
                continue;
            }

            if cancel.is_cancelled() {
                info!("Shutdown requested, stopping monitor");
                return Ok(());
            }

            let Some(report) = self.poll_once(&cancel).await? else {
                return Ok(());
            };
            if report.recorded == 0 {
                warn!("Cycle at {} found no players on the leaderboard", report.timestamp);
                empty_cycle_at = report.timestamp;
            }
        }
    }

    /// One cycle with transient failures retried. `None` if cancelled
    /// while backing off.
    pub async fn poll_once(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<CycleReport>, MonitorError> {
        self.retrying("poll cycle", cancel, || self.run_cycle()).await
    }

    /// Fetch, parse and persist once. Every snapshot of the cycle shares the
    /// timestamp taken when it started.
    pub async fn run_cycle(&self) -> Result<CycleReport, MonitorError> {
        let timestamp = (self.clock)();
        let html = self.source.fetch().await?;
        let players = self.parser.parse(&html)?;
        let report = self.store.record_cycle(&players, timestamp).await?;

        info!(
            "Recorded {} players ({} new) at {}",
            report.recorded, report.new_players, report.timestamp
        );
        Ok(report)
    }

    async fn retrying<T, F, Fut>(
        &self,
        what: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<Option<T>, MonitorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MonitorError>>,
    {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(Some(value)),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!("{} failed (attempt {}/{}): {}", what, attempt, self.retry.max_attempts, e);
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
