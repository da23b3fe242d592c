//! Liveness sweeper background task.
//!
//! Periodically evicts participants whose last heartbeat is older than the
//! inactivity threshold, announcing each departure with a `leaves` status
//! message to the broadcast recipient.
//!
//! # Graceful Shutdown
//!
//! The task runs until its cancellation token is triggered. A cycle in
//! progress is finished before the task exits. [`SweeperHandle::stop`]
//! cancels the token and waits for the task to end.

use crate::config::Config;
use crate::errors::ChatError;
use crate::models::NewMessage;
use crate::observability::metrics;
use crate::services::ChatStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the liveness sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Time between sweep cycles. The first cycle runs one interval after start.
    pub interval: Duration,

    /// Participants silent for longer than this are evicted.
    pub inactivity_threshold: Duration,
}

impl From<&Config> for SweeperConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.sweep_interval(),
            inactivity_threshold: config.inactivity_threshold(),
        }
    }
}

/// Result of one sweep cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Participants removed this cycle.
    pub evicted: u64,

    /// Participants whose eviction or departure announcement failed.
    pub failed: u64,
}

/// Run a single sweep cycle against `store`.
///
/// The delete of each candidate is conditional on it still being stale, so
/// a heartbeat landing mid-cycle keeps the participant and suppresses its
/// leave message. A failure for one participant is logged and the cycle
/// moves on.
///
/// # Errors
///
/// Returns the store error if the stale participants cannot be selected.
/// Nothing is evicted in that case.
pub async fn sweep_once(
    store: &dyn ChatStore,
    inactivity_threshold: Duration,
    now: DateTime<Utc>,
) -> Result<SweepOutcome, ChatError> {
    let threshold = chrono::Duration::from_std(inactivity_threshold).map_err(|e| {
        error!(
            target: "chat.task.sweeper",
            error = %e,
            "Inactivity threshold out of range"
        );
        ChatError::Internal
    })?;
    let cutoff = now - threshold;

    let stale = store.find_stale_participants(cutoff).await?;
    let mut outcome = SweepOutcome::default();

    for participant in stale {
        match store.remove_stale_participant(participant.id, cutoff).await {
            Ok(true) => {
                outcome.evicted += 1;
                info!(
                    target: "chat.task.sweeper",
                    name = %participant.name,
                    last_status = %participant.last_status,
                    "Evicted inactive participant"
                );

                if let Err(e) = store
                    .insert_message(&NewMessage::left(&participant.name, now))
                    .await
                {
                    outcome.failed += 1;
                    warn!(
                        target: "chat.task.sweeper",
                        name = %participant.name,
                        error = %e,
                        "Failed to announce participant departure"
                    );
                }
            }
            Ok(false) => {
                debug!(
                    target: "chat.task.sweeper",
                    name = %participant.name,
                    "Participant refreshed before eviction, keeping"
                );
            }
            Err(e) => {
                outcome.failed += 1;
                warn!(
                    target: "chat.task.sweeper",
                    name = %participant.name,
                    error = %e,
                    "Failed to evict participant"
                );
            }
        }
    }

    Ok(outcome)
}

/// Run one cycle, logging and recording metrics for the result.
async fn run_cycle(store: &dyn ChatStore, config: &SweeperConfig) {
    let start = Instant::now();

    match sweep_once(store, config.inactivity_threshold, Utc::now()).await {
        Ok(outcome) => {
            let status = if outcome.failed > 0 {
                "partial"
            } else {
                "success"
            };
            metrics::record_sweep(status, outcome.evicted, start.elapsed());

            if outcome.evicted > 0 || outcome.failed > 0 {
                info!(
                    target: "chat.task.sweeper",
                    evicted = outcome.evicted,
                    failed = outcome.failed,
                    "Sweep cycle complete"
                );
            }
        }
        Err(e) => {
            metrics::record_sweep("error", 0, start.elapsed());
            error!(
                target: "chat.task.sweeper",
                error = %e,
                "Failed to select inactive participants"
            );
        }
    }
}

/// Start the liveness sweeper loop.
///
/// Runs a sweep cycle every `config.interval` until `cancel_token` is
/// triggered. Ticks missed while a slow cycle runs are skipped, not bunched.
/// A zero interval is rejected: the task logs an error and returns at once.
#[instrument(skip_all, name = "chat.task.sweeper")]
pub async fn start_liveness_sweeper(
    store: Arc<dyn ChatStore>,
    config: SweeperConfig,
    cancel_token: CancellationToken,
) {
    info!(
        target: "chat.task.sweeper",
        interval_ms = config.interval.as_millis() as u64,
        inactivity_threshold_ms = config.inactivity_threshold.as_millis() as u64,
        "Starting liveness sweeper task"
    );

    if config.interval.is_zero() {
        error!(
            target: "chat.task.sweeper",
            "Sweep interval must be greater than zero, sweeper not started"
        );
        return;
    }

    let mut interval =
        tokio::time::interval_at(tokio::time::Instant::now() + config.interval, config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_cycle(store.as_ref(), &config).await;
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "chat.task.sweeper",
                    "Liveness sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "chat.task.sweeper", "Liveness sweeper stopped");
}

/// Spawner for the liveness sweeper.
pub struct LivenessSweeper;

impl LivenessSweeper {
    /// Spawn the sweeper on the current runtime.
    pub fn spawn(store: Arc<dyn ChatStore>, config: SweeperConfig) -> SweeperHandle {
        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(start_liveness_sweeper(
            store,
            config,
            cancel_token.clone(),
        ));

        SweeperHandle { cancel_token, task }
    }
}

/// Handle to a running sweeper.
pub struct SweeperHandle {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Whether the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the sweeper and wait for it to exit.
    pub async fn stop(self) {
        self.cancel_token.cancel();

        if let Err(e) = self.task.await {
            error!(
                target: "chat.task.sweeper",
                error = %e,
                "Liveness sweeper task ended abnormally"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{MessageKind, BROADCAST_RECIPIENT, LEAVE_STATUS_TEXT};
    use crate::services::InMemoryChatStore;

    const THRESHOLD: Duration = Duration::from_secs(10);

    async fn store_with(names: &[(&str, i64)], now: DateTime<Utc>) -> InMemoryChatStore {
        let store = InMemoryChatStore::new();
        for (name, age_seconds) in names {
            store
                .insert_participant(name, now - chrono::Duration::seconds(*age_seconds))
                .await
                .unwrap();
        }
        store
    }

    fn leave_messages(messages: &[crate::models::Message]) -> Vec<&str> {
        messages
            .iter()
            .filter(|m| m.kind == MessageKind::Status && m.text == LEAVE_STATUS_TEXT)
            .map(|m| m.from.as_str())
            .collect()
    }

    #[test]
    fn test_sweeper_config_from_config_defaults() {
        let vars = [("DATABASE_URL".to_string(), "postgres://localhost/chat".to_string())]
            .into_iter()
            .collect();
        let config = Config::from_vars(&vars).unwrap();

        let sweeper = SweeperConfig::from(&config);
        assert_eq!(sweeper.interval, Duration::from_secs(15));
        assert_eq!(sweeper.inactivity_threshold, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_sweep_evicts_stale_and_keeps_fresh() {
        let now = Utc::now();
        let store = store_with(&[("stale", 11), ("fresh", 2)], now).await;

        let outcome = sweep_once(&store, THRESHOLD, now).await.unwrap();

        assert_eq!(outcome, SweepOutcome { evicted: 1, failed: 0 });
        assert!(store.find_participant("stale").await.unwrap().is_none());
        assert!(store.find_participant("fresh").await.unwrap().is_some());

        let messages = store.all_messages().await;
        assert_eq!(leave_messages(&messages), vec!["stale"]);
        assert!(messages.iter().all(|m| m.to == BROADCAST_RECIPIENT));
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent_per_participant() {
        let now = Utc::now();
        let store = store_with(&[("stale", 30)], now).await;

        sweep_once(&store, THRESHOLD, now).await.unwrap();
        let second = sweep_once(&store, THRESHOLD, now).await.unwrap();

        assert_eq!(second, SweepOutcome::default());
        assert_eq!(leave_messages(&store.all_messages().await).len(), 1);
    }

    #[tokio::test]
    async fn test_participant_exactly_at_threshold_survives() {
        let now = Utc::now();
        let store = store_with(&[("edge", 10)], now).await;

        let outcome = sweep_once(&store, THRESHOLD, now).await.unwrap();

        assert_eq!(outcome.evicted, 0);
        assert!(store.find_participant("edge").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_eviction_does_not_stop_cycle() {
        let now = Utc::now();
        let store = store_with(&[("stuck", 20), ("gone", 20)], now).await;
        store.fail_evictions_for("stuck").await;

        let outcome = sweep_once(&store, THRESHOLD, now).await.unwrap();

        assert_eq!(outcome, SweepOutcome { evicted: 1, failed: 1 });
        assert!(store.find_participant("stuck").await.unwrap().is_some());
        assert!(store.find_participant("gone").await.unwrap().is_none());
        assert_eq!(leave_messages(&store.all_messages().await), vec!["gone"]);
    }

    #[tokio::test]
    async fn test_failed_announcement_still_counts_eviction() {
        let now = Utc::now();
        let store = store_with(&[("stale", 20)], now).await;
        store.set_failing_message_inserts(true);

        let outcome = sweep_once(&store, THRESHOLD, now).await.unwrap();

        assert_eq!(outcome, SweepOutcome { evicted: 1, failed: 1 });
        assert!(store.find_participant("stale").await.unwrap().is_none());
        assert!(store.all_messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_select_failure_aborts_cycle() {
        let store = InMemoryChatStore::failing();

        let result = sweep_once(&store, THRESHOLD, Utc::now()).await;

        assert!(matches!(result, Err(ChatError::Database(_))));
    }

    #[tokio::test]
    async fn test_spawned_sweeper_evicts_on_tick_and_stops() {
        let store = Arc::new(InMemoryChatStore::new());
        store
            .insert_participant("idle", Utc::now() - chrono::Duration::seconds(60))
            .await
            .unwrap();

        let handle = LivenessSweeper::spawn(
            store.clone(),
            SweeperConfig {
                interval: Duration::from_millis(20),
                inactivity_threshold: THRESHOLD,
            },
        );

        let mut evicted = false;
        for _ in 0..100 {
            if store.find_participant("idle").await.unwrap().is_none() {
                evicted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(evicted, "sweeper should evict the idle participant");

        tokio::time::timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("sweeper should stop promptly");
    }

    #[tokio::test]
    async fn test_first_cycle_waits_one_interval() {
        let store = Arc::new(InMemoryChatStore::new());
        store
            .insert_participant("idle", Utc::now() - chrono::Duration::seconds(60))
            .await
            .unwrap();

        let handle = LivenessSweeper::spawn(
            store.clone(),
            SweeperConfig {
                interval: Duration::from_secs(3600),
                inactivity_threshold: THRESHOLD,
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.find_participant("idle").await.unwrap().is_some());
        assert!(!handle.is_finished());

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_zero_interval_returns_without_sweeping() {
        let store = Arc::new(InMemoryChatStore::new());
        store
            .insert_participant("idle", Utc::now() - chrono::Duration::seconds(60))
            .await
            .unwrap();

        let config = SweeperConfig {
            interval: Duration::ZERO,
            inactivity_threshold: THRESHOLD,
        };
        tokio::time::timeout(
            Duration::from_secs(5),
            start_liveness_sweeper(store.clone(), config, CancellationToken::new()),
        )
        .await
        .expect("sweeper should return immediately");

        assert!(store.find_participant("idle").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweeper_survives_store_outage() {
        let store = Arc::new(InMemoryChatStore::failing());

        let handle = LivenessSweeper::spawn(
            store.clone(),
            SweeperConfig {
                interval: Duration::from_millis(10),
                inactivity_threshold: THRESHOLD,
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        handle.stop().await;
    }
}
