//! # Inbox Store
//!
//! Single reconciliation loop that owns one viewer's conversation list and
//! unread badge.
//!
//! ## Architecture
//!
//! ```text
//!  InboxHandle ──┐
//!  fetch tasks ──┼──▶ bounded mpsc<InboxCommand> ──▶ reconciliation loop ──▶ watch<InboxSnapshot>
//!  forwarder ────┘                                     (list + badge)
//! ```
//!
//! Everything that changes state arrives as a command on one queue and is
//! applied by one task, so the list and the badge published in a snapshot
//! always agree.
//!
//! - **Generations**: every fetch is tagged; a result whose generation is not
//!   the one in flight is discarded.
//! - **Epochs**: every subscription is tagged; events from a torn-down
//!   subscription are discarded even if they were already queued.
//! - **Subscription lifecycle**: armed after the first successful fetch for a
//!   viewer, torn down on sign-out, viewer change and shutdown. Subscribe
//!   failures are logged and leave the list as it was.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use roamly_inbox::gateway::MemoryGateway;
//! use roamly_inbox::inbox::InboxStore;
//! use roamly_inbox::shared::{InboxConfig, Viewer};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), roamly_inbox::shared::InboxError> {
//! let gateway = Arc::new(MemoryGateway::new("main"));
//! let inbox = InboxStore::spawn(gateway, &InboxConfig::default());
//!
//! inbox.sign_in(Viewer::tourist("t1")).await?;
//! let snapshot = inbox.wait_for(|s| s.list.is_ready()).await?;
//! println!("{} unread", snapshot.unread);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::gateway::RemoteGateway;
use crate::shared::config::InboxConfig;
use crate::shared::error::InboxError;
use crate::shared::event::{ChangeEvent, RealtimeEvent};
use crate::shared::messaging::{ConversationSummary, Viewer};

use super::fetcher::ConversationFetcher;
use super::list::{ConversationList, ListEffect, ListState};

/// Realtime subscription status
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LiveStatus {
    /// No subscription
    #[default]
    Offline,
    /// Subscribe call in flight
    Connecting,
    /// Receiving events
    Live,
    /// Subscribe failed; no live updates until the next sign-in
    Failed(String),
    /// The feed ended; no live updates until the next sign-in
    Ended,
}

/// State published after each processed command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InboxSnapshot {
    /// Signed-in viewer
    pub viewer: Option<Viewer>,
    /// Conversation list
    pub list: ListState,
    /// Unread badge, always the sum over `list`
    pub unread: u32,
    /// Realtime status
    pub live: LiveStatus,
}

/// Commands processed by the reconciliation loop
#[derive(Debug)]
pub enum InboxCommand {
    /// A viewer signed in (or switched identity)
    SignIn(Viewer),
    /// The viewer signed out
    SignOut,
    /// Refetch now
    Retry,
    /// Raw event from subscription `epoch`
    Remote { epoch: u64, event: RealtimeEvent },
    /// Status change of subscription `epoch`
    Live { epoch: u64, status: LiveStatus },
    /// Result of fetch `generation`
    FetchCompleted {
        generation: u64,
        result: Result<Vec<ConversationSummary>, InboxError>,
    },
    /// Stop the loop
    Shutdown,
}

/// Entry point for spawning the store
pub struct InboxStore;

impl InboxStore {
    /// Spawn the reconciliation loop on the current tokio runtime
    pub fn spawn(gateway: Arc<dyn RemoteGateway>, config: &InboxConfig) -> InboxHandle {
        let (commands, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (snapshots, snapshot_rx) = watch::channel(InboxSnapshot::default());

        let reconciler = Reconciler {
            fetcher: ConversationFetcher::new(Arc::clone(&gateway), config),
            gateway,
            channel: config.conversations_channel(),
            list: ConversationList::new(),
            generation: 0,
            pending: None,
            replay: Vec::new(),
            epoch: 0,
            forwarder: None,
            live: LiveStatus::Offline,
            commands: commands.downgrade(),
            snapshots,
        };
        tokio::spawn(reconciler.run(rx));

        InboxHandle {
            commands,
            snapshots: snapshot_rx,
        }
    }
}

/// Cloneable handle to a running store
///
/// The loop stops on [`InboxHandle::shutdown`] or once every handle is dropped.
#[derive(Debug, Clone)]
pub struct InboxHandle {
    commands: mpsc::Sender<InboxCommand>,
    snapshots: watch::Receiver<InboxSnapshot>,
}

impl InboxHandle {
    async fn send(&self, command: InboxCommand) -> Result<(), InboxError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| InboxError::StoreClosed)
    }

    /// Sign a viewer in, or switch to a different viewer
    pub async fn sign_in(&self, viewer: Viewer) -> Result<(), InboxError> {
        self.send(InboxCommand::SignIn(viewer)).await
    }

    /// Sign the viewer out; the badge drops to zero in the same update
    pub async fn sign_out(&self) -> Result<(), InboxError> {
        self.send(InboxCommand::SignOut).await
    }

    /// Refetch the list (the "try again" action)
    pub async fn retry(&self) -> Result<(), InboxError> {
        self.send(InboxCommand::Retry).await
    }

    /// Stop the loop and drop the subscription
    pub async fn shutdown(&self) -> Result<(), InboxError> {
        self.send(InboxCommand::Shutdown).await
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> InboxSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot
    pub fn watch(&self) -> watch::Receiver<InboxSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a snapshot satisfies `predicate`
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&InboxSnapshot) -> bool,
    ) -> Result<InboxSnapshot, InboxError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| InboxError::StoreClosed)?;
        Ok(snapshot.clone())
    }
}

struct Reconciler {
    gateway: Arc<dyn RemoteGateway>,
    fetcher: ConversationFetcher,
    channel: String,
    list: ConversationList,
    /// Last generation handed out
    generation: u64,
    /// Generation of the fetch in flight
    pending: Option<u64>,
    /// Update/delete events seen while a refetch was in flight
    replay: Vec<ChangeEvent>,
    /// Tag of the current subscription
    epoch: u64,
    forwarder: Option<JoinHandle<()>>,
    live: LiveStatus,
    commands: mpsc::WeakSender<InboxCommand>,
    snapshots: watch::Sender<InboxSnapshot>,
}

impl Reconciler {
    async fn run(mut self, mut rx: mpsc::Receiver<InboxCommand>) {
        tracing::info!("[Inbox] Reconciliation loop started");
        while let Some(command) = rx.recv().await {
            if !self.handle(command) {
                break;
            }
            self.publish();
        }
        self.teardown_subscription();
        self.publish();
        tracing::info!("[Inbox] Reconciliation loop stopped");
    }

    /// Apply one command; `false` stops the loop
    fn handle(&mut self, command: InboxCommand) -> bool {
        match command {
            InboxCommand::SignIn(viewer) => self.sign_in(viewer),
            InboxCommand::SignOut => self.sign_out(),
            InboxCommand::Retry => self.retry(),
            InboxCommand::Remote { epoch, event } => self.remote(epoch, event),
            InboxCommand::Live { epoch, status } => {
                if epoch == self.epoch && self.forwarder.is_some() {
                    tracing::debug!("[Inbox] Subscription status {:?}", status);
                    self.live = status;
                }
            }
            InboxCommand::FetchCompleted { generation, result } => {
                self.fetch_completed(generation, result)
            }
            InboxCommand::Shutdown => return false,
        }
        true
    }

    fn sign_in(&mut self, viewer: Viewer) {
        if self.list.viewer() == Some(&viewer) {
            tracing::debug!("[Inbox] {} {} already signed in", viewer.role, viewer.id);
            return;
        }
        tracing::info!("[Inbox] Signed in as {} {}", viewer.role, viewer.id);
        self.teardown_subscription();
        self.list.reset();
        self.list.begin_loading(viewer);
        self.start_fetch();
    }

    fn sign_out(&mut self) {
        tracing::info!("[Inbox] Signed out");
        self.teardown_subscription();
        self.list.reset();
        self.generation += 1;
        self.pending = None;
        self.replay.clear();
    }

    fn retry(&mut self) {
        let Some(viewer) = self.list.viewer().cloned() else {
            tracing::debug!("[Inbox] Retry ignored, nobody signed in");
            return;
        };
        tracing::info!("[Inbox] Retrying fetch");
        self.list.begin_loading(viewer);
        self.start_fetch();
    }

    fn remote(&mut self, epoch: u64, event: RealtimeEvent) {
        if epoch != self.epoch || self.forwarder.is_none() {
            tracing::debug!("[Inbox] Dropping event from closed subscription {}", epoch);
            return;
        }
        let Some(change) = event.into_change() else {
            tracing::debug!("[Inbox] Ignoring unrecognised realtime event");
            return;
        };

        if self.pending.is_some() && !matches!(change, ChangeEvent::Created { .. }) {
            self.replay.push(change.clone());
        }

        match self.list.apply(&change) {
            ListEffect::Refetch => {
                tracing::info!("[Inbox] New conversation {}, refetching", change.id());
                self.start_fetch();
            }
            ListEffect::Changed => {
                tracing::debug!("[Inbox] Applied {:?} for {}", change.kind(), change.id());
            }
            ListEffect::Unchanged => {}
        }
    }

    fn fetch_completed(
        &mut self,
        generation: u64,
        result: Result<Vec<ConversationSummary>, InboxError>,
    ) {
        if self.pending != Some(generation) {
            tracing::debug!(
                "[Inbox] Discarding stale fetch {} (current {:?})",
                generation,
                self.pending
            );
            return;
        }
        self.pending = None;

        match &result {
            Ok(summaries) => tracing::info!("[Inbox] Loaded {} conversations", summaries.len()),
            Err(e) => tracing::warn!("[Inbox] Failed to load conversations: {}", e),
        }
        let loaded = result.is_ok();
        self.list.finish_fetch(result);

        for change in std::mem::take(&mut self.replay) {
            self.list.apply(&change);
        }

        if loaded && self.forwarder.is_none() {
            self.arm_subscription();
        }
    }

    fn start_fetch(&mut self) {
        let Some(viewer) = self.list.viewer().cloned() else {
            return;
        };
        let Some(commands) = self.commands.upgrade() else {
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        self.pending = Some(generation);
        self.replay.clear();

        let fetcher = self.fetcher.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(&viewer).await;
            let _ = commands
                .send(InboxCommand::FetchCompleted { generation, result })
                .await;
        });
    }

    fn arm_subscription(&mut self) {
        self.epoch += 1;
        self.live = LiveStatus::Connecting;
        tracing::info!("[Inbox] Subscribing to {}", self.channel);
        self.forwarder = Some(tokio::spawn(forward(
            Arc::clone(&self.gateway),
            self.channel.clone(),
            self.epoch,
            self.commands.clone(),
        )));
    }

    fn teardown_subscription(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            tracing::info!("[Inbox] Unsubscribing from {}", self.channel);
            forwarder.abort();
        }
        self.epoch += 1;
        self.live = LiveStatus::Offline;
    }

    fn publish(&self) {
        let next = InboxSnapshot {
            viewer: self.list.viewer().cloned(),
            list: self.list.state().clone(),
            unread: self.list.unread(),
            live: self.live.clone(),
        };
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

/// Subscribe and forward every event into the command queue
async fn forward(
    gateway: Arc<dyn RemoteGateway>,
    channel: String,
    epoch: u64,
    commands: mpsc::WeakSender<InboxCommand>,
) {
    let mut subscription = match gateway.subscribe(&channel).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!("[Inbox] Subscription to {} failed: {}", channel, e);
            deliver(
                &commands,
                InboxCommand::Live {
                    epoch,
                    status: LiveStatus::Failed(e.to_string()),
                },
            )
            .await;
            return;
        }
    };

    if !deliver(&commands, InboxCommand::Live { epoch, status: LiveStatus::Live }).await {
        return;
    }
    while let Some(event) = subscription.next().await {
        if !deliver(&commands, InboxCommand::Remote { epoch, event }).await {
            return;
        }
    }

    tracing::warn!("[Inbox] Realtime feed for {} ended", channel);
    deliver(&commands, InboxCommand::Live { epoch, status: LiveStatus::Ended }).await;
}

/// Send through a weak sender; `false` once the store is gone
async fn deliver(commands: &mpsc::WeakSender<InboxCommand>, command: InboxCommand) -> bool {
    match commands.upgrade() {
        Some(sender) => sender.send(command).await.is_ok(),
        None => false,
    }
}
