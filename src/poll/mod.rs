//! The polling state machine.
//!
//! ```text
//! Disconnected --connect ok--> ConnectedIdle --> Polling --cycle ok--> Polling
//!      ^             |                              |
//!      |        connect err                     cycle err
//!      |             v                              v
//!      +-------- ErrorBackoff <---------------------+
//! ```
//!
//! Cancellation is checked between transitions and during every sleep.

pub mod cancel;

use std::time::Duration;

use tracing::{debug, error, info, warn};

pub use cancel::CancelToken;

use crate::checkpoint::store::CheckpointStore;
use crate::checkpoint::{Checkpoint, Uid};
use crate::config::PollConfig;
use crate::error::{Result, WatchError};
use crate::mailbox::{Connector, MailSession};
use crate::pipeline::MessagePipeline;

/// Where the watcher is in its connect/poll/backoff cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Disconnected,
    ConnectedIdle,
    Polling,
    ErrorBackoff,
}

/// Mailbox and timing for the loop.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub mailbox: String,
    pub interval: Duration,
    pub backoff: Duration,
}

impl PollSettings {
    pub fn from_config(poll: &PollConfig) -> Self {
        Self {
            mailbox: poll.mailbox.clone(),
            interval: poll.interval(),
            backoff: poll.backoff(),
        }
    }
}

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Unseen messages reported by the server.
    pub unseen: usize,
    /// Unseen messages not yet in the checkpoint.
    pub new: usize,
    /// UIDs processed successfully and recorded.
    pub processed: Vec<Uid>,
    /// UIDs that failed and will be retried next cycle.
    pub failed: Vec<Uid>,
}

/// Owns the session, checkpoint and pipeline for one mailbox.
pub struct Watcher<C: Connector> {
    connector: C,
    session: Option<C::Session>,
    checkpoint: Checkpoint,
    store: CheckpointStore,
    pipeline: MessagePipeline,
    settings: PollSettings,
    state: PollState,
}

impl<C: Connector> Watcher<C> {
    /// Create a watcher, loading the checkpoint from `store`.
    pub fn new(
        connector: C,
        store: CheckpointStore,
        pipeline: MessagePipeline,
        settings: PollSettings,
    ) -> Self {
        let checkpoint = store.load();
        Self {
            connector,
            session: None,
            checkpoint,
            store,
            pipeline,
            settings,
            state: PollState::Disconnected,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Run until `cancel` is set, then log out.
    pub fn run(&mut self, cancel: &CancelToken) {
        info!(mailbox = %self.settings.mailbox, "Watching mailbox");
        while !cancel.is_cancelled() {
            self.step(cancel);
        }
        self.disconnect();
        info!("Stopped");
    }

    /// Connect, run a single cycle and log out.
    pub fn run_once(&mut self) -> Result<CycleReport> {
        let result = self
            .establish()
            .and_then(|()| self.poll_cycle(&CancelToken::new()));
        self.disconnect();
        self.state = PollState::Disconnected;
        result
    }

    /// Perform one state transition and return the new state.
    pub fn step(&mut self, cancel: &CancelToken) -> PollState {
        self.state = match self.state {
            PollState::Disconnected => match self.establish() {
                Ok(()) => PollState::ConnectedIdle,
                Err(e) => {
                    error!(error = %e, "Connection failed");
                    self.disconnect();
                    PollState::ErrorBackoff
                }
            },
            PollState::ConnectedIdle => PollState::Polling,
            PollState::Polling => match self.poll_cycle(cancel) {
                Ok(report) => {
                    if report.new > 0 || !report.failed.is_empty() {
                        info!(
                            unseen = report.unseen,
                            new = report.new,
                            processed = report.processed.len(),
                            failed = report.failed.len(),
                            "Cycle complete"
                        );
                    } else {
                        debug!(unseen = report.unseen, "No new messages");
                    }
                    cancel.sleep(self.settings.interval);
                    PollState::Polling
                }
                Err(e) => {
                    error!(error = %e, "Polling failed, reconnecting");
                    self.disconnect();
                    PollState::ErrorBackoff
                }
            },
            PollState::ErrorBackoff => {
                debug!(secs = self.settings.backoff.as_secs(), "Backing off");
                cancel.sleep(self.settings.backoff);
                PollState::Disconnected
            }
        };
        self.state
    }

    /// One select/search/fetch/process/record pass over the mailbox.
    pub fn poll_cycle(&mut self, cancel: &CancelToken) -> Result<CycleReport> {
        let session = self.session.as_mut().ok_or(WatchError::NotConnected)?;

        let status = session.select(&self.settings.mailbox)?;
        let mut dirty = false;
        if self.checkpoint.reconcile_validity(status.uid_validity) {
            warn!(
                uid_validity = ?status.uid_validity,
                "UIDVALIDITY changed, checkpoint reset"
            );
            dirty = true;
        }

        let unseen = session.search_unseen()?;
        let new = self.checkpoint.new_since(&unseen);
        let mut report = CycleReport {
            unseen: unseen.len(),
            new: new.len(),
            ..Default::default()
        };
        if !new.is_empty() {
            info!(count = new.len(), exists = status.exists, "New messages");
        }

        for uid in new {
            if cancel.is_cancelled() {
                break;
            }
            let outcome = session
                .fetch(uid)
                .and_then(|raw| self.pipeline.process(uid, &raw));
            match outcome {
                Ok(_) => report.processed.push(uid),
                Err(e) => {
                    warn!(uid, error = %e, "Message skipped, will retry");
                    report.failed.push(uid);
                }
            }
        }

        if !report.processed.is_empty() {
            self.checkpoint.record(report.processed.iter().copied());
            dirty = true;
        }
        if dirty {
            if let Err(e) = self.store.save(&self.checkpoint) {
                error!(error = %e, "Failed to save checkpoint");
            }
        }

        Ok(report)
    }

    fn establish(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let mut session = self.connector.connect()?;
        let folders = session.list_folders();
        match folders {
            Ok(folders) => debug!(count = folders.len(), ?folders, "Folders"),
            Err(e) => {
                let _ = session.logout();
                return Err(e);
            }
        }
        self.session = Some(session);
        Ok(())
    }

    /// Log out and drop the session, ignoring errors.
    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.logout() {
                debug!(error = %e, "Logout failed");
            }
        }
    }
}
