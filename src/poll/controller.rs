//! Refresh-cycle orchestration
//!
//! Drives the fetch-and-derive loop: a fixed-interval tick (plus manual
//! retries) cancels any in-flight cycle, fetches both pages concurrently
//! under a fresh cancellation token, and publishes the derived snapshot
//! through a watch channel.

use super::{average_price, primary_subset, secondary_subset, Snapshot};
use crate::config::PollConfig;
use crate::telemetry;
use crate::upstream::PageFetcher;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Pages requested per refresh cycle
const FIRST_PAGE: u32 = 1;
const SECOND_PAGE: u32 = 2;

/// Orchestrates refresh cycles and owns the current snapshot
pub struct PollController<F: PageFetcher> {
    fetcher: Arc<F>,
    refresh_interval: Duration,
    snapshot_tx: Arc<watch::Sender<Snapshot>>,
    retry_tx: mpsc::Sender<()>,
    retry_rx: mpsc::Receiver<()>,
    shutdown: CancellationToken,
}

/// Clonable handle exposing the controller's imperative actions
#[derive(Clone)]
pub struct PollHandle {
    retry_tx: mpsc::Sender<()>,
    shutdown: CancellationToken,
}

impl PollHandle {
    /// Queue an immediate extra refresh cycle
    pub fn retry(&self) {
        // A full buffer means a refresh is already queued
        let _ = self.retry_tx.try_send(());
    }

    /// Stop the controller and cancel any outstanding fetches
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl<F: PageFetcher + 'static> PollController<F> {
    /// Create a new controller around the given fetcher
    pub fn new(fetcher: F, config: PollConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(Snapshot::default());
        let (retry_tx, retry_rx) = mpsc::channel(1);

        Self {
            fetcher: Arc::new(fetcher),
            // The tick period must be non-zero
            refresh_interval: Duration::from_secs(config.refresh_interval_secs.max(1)),
            snapshot_tx: Arc::new(snapshot_tx),
            retry_tx,
            retry_rx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Subscribe to snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Handle for triggering retries and shutdown
    pub fn handle(&self) -> PollHandle {
        PollHandle {
            retry_tx: self.retry_tx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Run the refresh loop until shutdown
    ///
    /// The first cycle starts immediately; afterwards cycles start on every
    /// interval tick or retry request. Starting a cycle always cancels the
    /// previous one first, so at most one cycle's fetches are live.
    pub async fn run(self) {
        let Self {
            fetcher,
            refresh_interval,
            snapshot_tx,
            retry_tx: _retry_tx,
            mut retry_rx,
            shutdown,
        } = self;

        let mut interval = tokio::time::interval(refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut current_cycle: Option<CancellationToken> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    if let Some(token) = current_cycle.take() {
                        token.cancel();
                    }
                    tracing::info!("Poll controller shutting down");
                    break;
                }
                _ = interval.tick() => {
                    start_cycle(&fetcher, &snapshot_tx, &shutdown, &mut current_cycle);
                }
                Some(()) = retry_rx.recv() => {
                    tracing::debug!("Manual refresh requested");
                    start_cycle(&fetcher, &snapshot_tx, &shutdown, &mut current_cycle);
                }
            }
        }
    }
}

/// Cancel the in-flight cycle, then spawn the next one
fn start_cycle<F: PageFetcher + 'static>(
    fetcher: &Arc<F>,
    snapshot_tx: &Arc<watch::Sender<Snapshot>>,
    shutdown: &CancellationToken,
    current: &mut Option<CancellationToken>,
) {
    if let Some(previous) = current.take() {
        tracing::debug!("Superseding in-flight refresh cycle");
        previous.cancel();
    }

    let token = shutdown.child_token();
    *current = Some(token.clone());

    // First load only: once any cycle has resolved, later cycles refresh in
    // place without flicker
    snapshot_tx.send_if_modified(|snapshot| {
        let first_load = snapshot.is_empty()
            && snapshot.error.is_none()
            && snapshot.last_updated.is_none();
        if first_load && !snapshot.loading {
            snapshot.loading = true;
            return true;
        }
        false
    });

    let fetcher = Arc::clone(fetcher);
    let snapshot_tx = Arc::clone(snapshot_tx);
    tokio::spawn(async move {
        run_cycle(fetcher, token, snapshot_tx).await;
    });
}

/// One refresh cycle: fetch both pages, derive subsets, publish
async fn run_cycle<F: PageFetcher>(
    fetcher: Arc<F>,
    cancel: CancellationToken,
    snapshot_tx: Arc<watch::Sender<Snapshot>>,
) {
    let started = Instant::now();
    let result = tokio::try_join!(
        fetcher.fetch_page(FIRST_PAGE, &cancel),
        fetcher.fetch_page(SECOND_PAGE, &cancel),
    );

    match result {
        Ok((page1, page2)) => {
            let primary = primary_subset(&page1, &page2);
            let secondary = secondary_subset(&page2);
            let primary_average = average_price(&primary);
            let secondary_average = average_price(&secondary);

            telemetry::record_cycle_success(started.elapsed());
            telemetry::set_average_gauges(primary_average, secondary_average);
            tracing::debug!(
                primary_count = primary.len(),
                secondary_count = secondary.len(),
                "Refresh cycle completed"
            );

            snapshot_tx.send_modify(|snapshot| {
                // A superseded cycle must not overwrite a newer publication
                if cancel.is_cancelled() {
                    snapshot.loading = false;
                    return;
                }
                snapshot.primary = primary;
                snapshot.secondary = secondary;
                snapshot.primary_average = primary_average;
                snapshot.secondary_average = secondary_average;
                snapshot.last_updated = Some(Utc::now());
                snapshot.error = None;
                snapshot.loading = false;
            });
        }
        Err(err) if err.is_cancelled() => {
            // Superseded mid-flight: reset the spinner, leave data and error untouched
            telemetry::record_cycle_cancelled();
            snapshot_tx.send_modify(|snapshot| snapshot.loading = false);
        }
        Err(err) => {
            tracing::warn!(error = %err, "Refresh cycle failed");
            telemetry::record_cycle_failure();

            let message = err.to_string();
            snapshot_tx.send_modify(|snapshot| {
                if cancel.is_cancelled() {
                    snapshot.loading = false;
                    return;
                }
                snapshot.error = Some(message);
                snapshot.loading = false;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{FetchError, Listing};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::timeout;

    #[derive(Clone)]
    enum Script {
        Respond(Vec<Listing>),
        Fail(String),
        /// Return the cancelled outcome once the token fires
        Hang,
        /// Ignore cancellation and return data anyway, to exercise the
        /// publish guard
        HangThenRespond(Vec<Listing>),
    }

    /// Fetcher serving scripted per-page responses; unscripted calls return
    /// an empty page
    #[derive(Clone, Default)]
    struct ScriptedFetcher {
        pages: Arc<Mutex<HashMap<u32, VecDeque<Script>>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedFetcher {
        fn push(&self, page: u32, script: Script) {
            self.pages
                .lock()
                .unwrap()
                .entry(page)
                .or_default()
                .push_back(script);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(
            &self,
            page: u32,
            cancel: &CancellationToken,
        ) -> Result<Vec<Listing>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let script = self
                .pages
                .lock()
                .unwrap()
                .get_mut(&page)
                .and_then(|queue| queue.pop_front());

            match script {
                None => Ok(vec![]),
                Some(Script::Respond(items)) => Ok(items),
                Some(Script::Fail(msg)) => Err(FetchError::Upstream(msg)),
                Some(Script::Hang) => {
                    cancel.cancelled().await;
                    Err(FetchError::Cancelled)
                }
                Some(Script::HangThenRespond(items)) => {
                    cancel.cancelled().await;
                    Ok(items)
                }
            }
        }
    }

    fn listing(price: &str) -> Listing {
        Listing {
            id: None,
            nick_name: format!("maker-{price}"),
            price: price.to_string(),
            price_type: 0,
            currency_id: "RUB".to_string(),
            token_id: "USDT".to_string(),
            min_amount: "10000".to_string(),
            max_amount: "500000".to_string(),
            payments: vec!["582".to_string()],
        }
    }

    fn page(prices: &[&str]) -> Vec<Listing> {
        prices.iter().map(|p| listing(p)).collect()
    }

    fn full_page2() -> Vec<Listing> {
        page(&["90", "91", "92", "93", "94", "95", "96", "97", "98", "99"])
    }

    fn prices(listings: &[Listing]) -> Vec<String> {
        listings.iter().map(|l| l.price.clone()).collect()
    }

    async fn await_snapshot<P>(rx: &mut watch::Receiver<Snapshot>, pred: P) -> Snapshot
    where
        P: Fn(&Snapshot) -> bool,
    {
        timeout(Duration::from_secs(5), async {
            loop {
                {
                    let snapshot = rx.borrow_and_update();
                    if pred(&snapshot) {
                        return snapshot.clone();
                    }
                }
                rx.changed().await.expect("controller dropped");
            }
        })
        .await
        .expect("timed out waiting for snapshot")
    }

    fn controller(fetcher: ScriptedFetcher) -> PollController<ScriptedFetcher> {
        PollController::new(
            fetcher,
            PollConfig {
                refresh_interval_secs: 10,
            },
        )
    }

    #[tokio::test]
    async fn test_first_load_publishes_snapshot() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push(1, Script::Respond(page(&["80", "81", "82"])));
        fetcher.push(2, Script::Respond(full_page2()));

        let controller = controller(fetcher);
        let mut rx = controller.subscribe();
        let handle = controller.handle();

        assert!(rx.borrow().loading);
        assert!(rx.borrow().is_empty());

        tokio::spawn(controller.run());

        let snapshot = await_snapshot(&mut rx, |s| s.last_updated.is_some()).await;
        assert!(!snapshot.loading);
        assert!(snapshot.error.is_none());
        assert_eq!(
            prices(&snapshot.primary),
            vec!["82", "90", "91", "92", "93", "94"]
        );
        assert_eq!(
            prices(&snapshot.secondary),
            vec!["94", "95", "96", "97", "98", "99"]
        );
        assert!(snapshot.primary_average.is_some());
        assert!(snapshot.secondary_average.is_some());

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_failed_cycle_preserves_previous_data() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push(1, Script::Respond(page(&["80"])));
        fetcher.push(2, Script::Respond(full_page2()));
        fetcher.push(1, Script::Fail("System busy".to_string()));
        fetcher.push(2, Script::Respond(full_page2()));

        let controller = controller(fetcher);
        let mut rx = controller.subscribe();
        let handle = controller.handle();
        tokio::spawn(controller.run());

        let first = await_snapshot(&mut rx, |s| s.last_updated.is_some()).await;
        let first_primary = prices(&first.primary);

        handle.retry();
        let failed = await_snapshot(&mut rx, |s| s.error.is_some()).await;

        assert_eq!(failed.error.as_deref(), Some("System busy"));
        assert!(!failed.loading);
        // Previous data stays visible
        assert_eq!(prices(&failed.primary), first_primary);
        assert_eq!(failed.primary_average, first.primary_average);
        assert_eq!(failed.last_updated, first.last_updated);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_error_cleared_on_next_success() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push(1, Script::Fail("boom".to_string()));
        fetcher.push(2, Script::Respond(full_page2()));
        fetcher.push(1, Script::Respond(page(&["80"])));
        fetcher.push(2, Script::Respond(full_page2()));

        let controller = controller(fetcher);
        let mut rx = controller.subscribe();
        let handle = controller.handle();
        tokio::spawn(controller.run());

        let failed = await_snapshot(&mut rx, |s| s.error.is_some()).await;
        assert!(failed.is_empty());

        handle.retry();
        let recovered = await_snapshot(&mut rx, |s| s.last_updated.is_some()).await;
        assert!(recovered.error.is_none());
        assert!(!recovered.is_empty());

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_superseded_cycle_never_publishes() {
        let fetcher = ScriptedFetcher::default();
        // First cycle ignores cancellation and still returns data
        fetcher.push(1, Script::HangThenRespond(page(&["1", "2", "3"])));
        fetcher.push(2, Script::HangThenRespond(page(&["4", "5", "6", "7", "8", "9", "10", "11", "12", "13"])));
        fetcher.push(1, Script::Respond(page(&["80"])));
        fetcher.push(2, Script::Respond(full_page2()));

        let controller = controller(fetcher);
        let mut rx = controller.subscribe();
        let handle = controller.handle();
        tokio::spawn(controller.run());

        // Let the first cycle get in flight, then supersede it
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.retry();

        let snapshot = await_snapshot(&mut rx, |s| s.last_updated.is_some()).await;
        assert_eq!(
            prices(&snapshot.primary),
            vec!["80", "90", "91", "92", "93", "94"]
        );

        // The first cycle's late result must not surface afterwards
        tokio::time::sleep(Duration::from_millis(100)).await;
        let settled = rx.borrow().clone();
        assert_eq!(
            prices(&settled.primary),
            vec!["80", "90", "91", "92", "93", "94"]
        );
        assert!(settled.error.is_none());

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_loading_set_only_for_first_load() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push(1, Script::Respond(page(&["80"])));
        fetcher.push(2, Script::Respond(full_page2()));
        fetcher.push(1, Script::Hang);
        fetcher.push(2, Script::Hang);

        let controller = controller(fetcher);
        let mut rx = controller.subscribe();
        let handle = controller.handle();
        tokio::spawn(controller.run());

        let first = await_snapshot(&mut rx, |s| s.last_updated.is_some()).await;
        assert!(!first.loading);

        // A later in-flight cycle must not re-enter the loading state
        handle.retry();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!rx.borrow().loading);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_loading_not_reentered_after_failed_first_load() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push(1, Script::Fail("boom".to_string()));
        fetcher.push(2, Script::Respond(full_page2()));
        fetcher.push(1, Script::Hang);
        fetcher.push(2, Script::Hang);

        let controller = controller(fetcher);
        let mut rx = controller.subscribe();
        let handle = controller.handle();
        tokio::spawn(controller.run());

        let failed = await_snapshot(&mut rx, |s| s.error.is_some()).await;
        assert!(!failed.loading);

        handle.retry();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!rx.borrow().loading);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_retry_triggers_extra_cycle() {
        let fetcher = ScriptedFetcher::default();
        let controller = controller(fetcher.clone());
        let handle = controller.handle();
        tokio::spawn(controller.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.calls(), 2);

        handle.retry();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.calls(), 4);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop_and_cancels_fetches() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push(1, Script::Hang);
        fetcher.push(2, Script::Hang);

        let controller = controller(fetcher);
        let handle = controller.handle();
        let task = tokio::spawn(controller.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown();

        timeout(Duration::from_secs(5), task)
            .await
            .expect("run did not stop")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_schedules_cycles() {
        let fetcher = ScriptedFetcher::default();
        let controller = PollController::new(
            fetcher.clone(),
            PollConfig {
                refresh_interval_secs: 1,
            },
        );
        let mut rx = controller.subscribe();
        let handle = controller.handle();
        tokio::spawn(controller.run());

        // First cycle fires immediately; empty pages still publish
        let snapshot = await_snapshot(&mut rx, |s| s.last_updated.is_some()).await;
        assert!(snapshot.primary_average.is_none());
        assert!(snapshot.secondary_average.is_none());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(fetcher.calls() >= 4);

        handle.shutdown();
    }
}
