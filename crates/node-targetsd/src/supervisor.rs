//! Watch supervisor - keeps the target file in step with cluster membership
//!
//! Lifecycle:
//!
//! ```text
//! Initializing --ok--> Streaming --stream ends--> Resyncing --ok--> Streaming ...
//!      |                                              |
//!      +--error--> (fatal)              budget spent--+--> (fatal)
//! ```
//!
//! Every state transition into `Streaming` goes through a full snapshot,
//! store replacement and render. Events are applied and rendered one at a
//! time, in stream order. A watch that ends before delivering anything or
//! staying open for `stable_after` delays the next resync with backoff.

use crate::backoff::{BackoffPolicy, ResyncBackoff};
use crate::writer::TargetFileWriter;
use futures_util::StreamExt;
use node_targets_client::{ClusterApi, ClusterError, EventStream};
use node_targets_core::{apply, Applied, MembershipEvent, MembershipStore, VersionToken};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default bound on silence from an open watch
pub const DEFAULT_WATCH_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Supervisor errors (all terminate the daemon)
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Initial synchronization failed: {0}")]
    Startup(#[source] ClusterError),
    #[error("Resync failed {failures} times in a row, last error: {last}")]
    ResyncExhausted {
        failures: u32,
        #[source]
        last: ClusterError,
    },
}

/// Supervisor lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    Initializing,
    Streaming { version: VersionToken },
    Resyncing { failures: u32 },
    Stopped,
}

/// Supervisor counters
#[derive(Debug, Clone, Default)]
pub struct SupervisorStats {
    /// Completed resyncs (the initial sync is not counted)
    pub resyncs: u64,
    pub resync_failures: u64,
    pub events_applied: u64,
    pub events_ignored: u64,
    pub events_rejected: u64,
    pub writes: u64,
    pub write_failures: u64,
    pub watch_idle_timeouts: u64,
}

/// Why a watch stream stopped being consumed
enum StreamEnd {
    Closed,
    Failed(ClusterError),
    Idle(Duration),
    Shutdown,
}

/// Owns the membership store and drives list/watch/render
pub struct Supervisor {
    api: Arc<dyn ClusterApi>,
    store: MembershipStore,
    writer: TargetFileWriter,
    backoff: ResyncBackoff,
    watch_idle_timeout: Option<Duration>,
    state: SupervisorState,
    stats: SupervisorStats,
}

impl Supervisor {
    pub fn new(api: Arc<dyn ClusterApi>, writer: TargetFileWriter, policy: BackoffPolicy) -> Self {
        Self {
            api,
            store: MembershipStore::new(),
            writer,
            backoff: ResyncBackoff::new(policy),
            watch_idle_timeout: Some(DEFAULT_WATCH_IDLE_TIMEOUT),
            state: SupervisorState::Initializing,
            stats: SupervisorStats::default(),
        }
    }

    /// Treat a watch that is silent this long as dead; `None` waits forever
    pub fn with_watch_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.watch_idle_timeout = timeout;
        self
    }

    pub fn store(&self) -> &MembershipStore {
        &self.store
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn stats(&self) -> SupervisorStats {
        self.stats.clone()
    }

    /// Run until shutdown or a fatal error.
    ///
    /// A message on (or closure of) `shutdown` stops the loop at the next
    /// suspension point: snapshot fetch, watch open, next event or backoff.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), SupervisorError> {
        self.state = SupervisorState::Initializing;
        info!(
            path = %self.writer.path().display(),
            port = self.writer.port(),
            "Loading initial node snapshot"
        );

        let initial = tokio::select! {
            biased;
            _ = shutdown.recv() => None,
            result = self.synchronize() => Some(result),
        };
        let (mut version, mut events) = match initial {
            None => {
                self.stop();
                return Ok(());
            }
            Some(Ok(sync)) => sync,
            Some(Err(e)) => {
                self.state = SupervisorState::Stopped;
                return Err(SupervisorError::Startup(e));
            }
        };

        loop {
            info!(version = %version, nodes = self.store.len(), "Watching node membership");
            self.state = SupervisorState::Streaming {
                version: version.clone(),
            };

            let opened = Instant::now();
            let seen = self.events_seen();

            match self.consume(&mut events, &mut shutdown).await {
                StreamEnd::Shutdown => {
                    self.stop();
                    return Ok(());
                }
                StreamEnd::Closed => info!("Watch stream closed, resyncing"),
                StreamEnd::Failed(e) => warn!(error = %e, "Watch stream failed, resyncing"),
                StreamEnd::Idle(after) => {
                    self.stats.watch_idle_timeouts += 1;
                    warn!(idle_secs = after.as_secs(), "Watch stream idle, resyncing");
                }
            }

            if self.events_seen() > seen || opened.elapsed() >= self.backoff.policy().stable_after {
                self.backoff.reset();
            } else {
                let delay = self.backoff.early_end_delay();
                self.state = SupervisorState::Resyncing {
                    failures: self.backoff.failures(),
                };
                info!(delay_ms = delay.as_millis() as u64, "Watch ended early, delaying resync");

                tokio::select! {
                    biased;
                    _ = shutdown.recv() => {
                        self.stop();
                        return Ok(());
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match self.resync(&mut shutdown).await {
                Ok(Some((v, e))) => {
                    version = v;
                    events = e;
                }
                Ok(None) => {
                    self.stop();
                    return Ok(());
                }
                Err(e) => {
                    self.state = SupervisorState::Stopped;
                    return Err(e);
                }
            }
        }
    }

    /// Snapshot, replace the store, render, then open the watch
    async fn synchronize(&mut self) -> Result<(VersionToken, EventStream), ClusterError> {
        let snapshot = self.api.list_nodes().await?;
        self.store.replace_all(snapshot.records);
        info!(nodes = self.store.len(), version = %snapshot.version, "Membership snapshot loaded");
        self.render();

        let events = self.api.watch_nodes(&snapshot.version).await?;
        Ok((snapshot.version, events))
    }

    /// Retry synchronization with backoff until it succeeds.
    ///
    /// `Ok(None)` means shutdown was requested.
    async fn resync(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<Option<(VersionToken, EventStream)>, SupervisorError> {
        loop {
            self.state = SupervisorState::Resyncing {
                failures: self.backoff.failures(),
            };

            let result = tokio::select! {
                biased;
                _ = shutdown.recv() => None,
                result = self.synchronize() => Some(result),
            };

            match result {
                None => return Ok(None),
                Some(Ok(sync)) => {
                    self.backoff.record_success();
                    self.stats.resyncs += 1;
                    return Ok(Some(sync));
                }
                Some(Err(e)) => {
                    self.stats.resync_failures += 1;
                    let Some(delay) = self.backoff.next_delay() else {
                        return Err(SupervisorError::ResyncExhausted {
                            failures: self.backoff.failures(),
                            last: e,
                        });
                    };
                    warn!(
                        error = %e,
                        failures = self.backoff.failures(),
                        delay_ms = delay.as_millis() as u64,
                        "Resync failed, retrying"
                    );

                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => return Ok(None),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Apply events until the stream ends or shutdown is requested
    async fn consume(
        &mut self,
        events: &mut EventStream,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> StreamEnd {
        let idle = self.watch_idle_timeout;
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.recv() => return StreamEnd::Shutdown,
                next = events.next() => next,
                after = idle_deadline(idle) => return StreamEnd::Idle(after),
            };

            match next {
                None => return StreamEnd::Closed,
                Some(Err(e)) => return StreamEnd::Failed(e),
                Some(Ok(event)) => self.handle_event(event),
            }
        }
    }

    fn events_seen(&self) -> u64 {
        self.stats.events_applied + self.stats.events_ignored + self.stats.events_rejected
    }

    /// Apply one event and render if membership may have changed
    fn handle_event(&mut self, event: MembershipEvent) {
        let applied = apply(event, &mut self.store);

        match &applied {
            Applied::Inserted(id) => info!(node = %id, nodes = self.store.len(), "Node added"),
            Applied::Replaced(id) => debug!(node = %id, "Node re-announced"),
            Applied::Removed(id) => info!(node = %id, nodes = self.store.len(), "Node removed"),
            Applied::Absent(id) => debug!(node = %id, "Removal of unknown node"),
            Applied::Ignored { kind } => debug!(kind = %kind, "Ignoring watch event"),
            Applied::Rejected { reason } => warn!(reason = %reason, "Ignoring malformed watch event"),
        }

        match applied {
            Applied::Ignored { .. } => self.stats.events_ignored += 1,
            Applied::Rejected { .. } => self.stats.events_rejected += 1,
            _ => self.stats.events_applied += 1,
        }

        if applied.requires_render() {
            self.render();
        }
    }

    /// Write the current store; failures leave the store untouched
    fn render(&mut self) {
        match self.writer.write(self.store.enumerate()) {
            Ok(_) => self.stats.writes += 1,
            Err(e) => {
                self.stats.write_failures += 1;
                error!(error = %e, "Failed to write target file");
            }
        }
    }

    fn stop(&mut self) {
        self.state = SupervisorState::Stopped;
        info!(
            nodes = self.store.len(),
            resyncs = self.stats.resyncs,
            events = self.stats.events_applied,
            writes = self.stats.writes,
            write_failures = self.stats.write_failures,
            "Supervisor stopped"
        );
    }
}

/// Resolves with `idle` once it has elapsed; never without a bound
async fn idle_deadline(idle: Option<Duration>) -> Duration {
    match idle {
        Some(after) => {
            tokio::time::sleep(after).await;
            after
        }
        None => std::future::pending().await,
    }
}
