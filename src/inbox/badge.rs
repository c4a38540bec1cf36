//! # Unread Badge
//!
//! Standalone navigation badge for surfaces that do not mount the inbox.
//!
//! The badge keeps no list. It requeries and resums the viewer's unread
//! counters on sign-in and after every realtime event (create, update or
//! delete) whose payload names the viewer on their side. It converges with
//! any [`InboxStore`](super::InboxStore) after each event but may briefly
//! disagree with one.
//!
//! - A failed requery keeps the previous count.
//! - A failed subscribe is logged; the count stays as last computed.
//! - Sign-out sets the count to 0 in the same update and drops the
//!   subscription; nothing is recomputed until the next sign-in.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::gateway::RemoteGateway;
use crate::shared::config::InboxConfig;
use crate::shared::error::InboxError;
use crate::shared::event::RealtimeEvent;
use crate::shared::messaging::Viewer;

use super::fetcher::ConversationFetcher;
use super::unread::UnreadAggregator;

#[derive(Debug)]
enum BadgeCommand {
    SignIn(Viewer),
    SignOut,
    Remote { epoch: u64, event: RealtimeEvent },
    Computed { generation: u64, result: Result<u32, InboxError> },
    Shutdown,
}

/// Entry point for spawning the badge task
pub struct UnreadBadge;

impl UnreadBadge {
    /// Spawn the badge task on the current tokio runtime
    pub fn spawn(gateway: Arc<dyn RemoteGateway>, config: &InboxConfig) -> BadgeHandle {
        let (commands, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (count, count_rx) = watch::channel(0u32);

        let task = BadgeTask {
            aggregator: UnreadAggregator::new(ConversationFetcher::new(Arc::clone(&gateway), config)),
            gateway,
            channel: config.conversations_channel(),
            viewer: None,
            generation: 0,
            epoch: 0,
            forwarder: None,
            commands: commands.downgrade(),
            count,
        };
        tokio::spawn(task.run(rx));

        BadgeHandle { commands, count: count_rx }
    }
}

/// Cloneable handle to a running badge
#[derive(Debug, Clone)]
pub struct BadgeHandle {
    commands: mpsc::Sender<BadgeCommand>,
    count: watch::Receiver<u32>,
}

impl BadgeHandle {
    async fn send(&self, command: BadgeCommand) -> Result<(), InboxError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| InboxError::StoreClosed)
    }

    pub async fn sign_in(&self, viewer: Viewer) -> Result<(), InboxError> {
        self.send(BadgeCommand::SignIn(viewer)).await
    }

    pub async fn sign_out(&self) -> Result<(), InboxError> {
        self.send(BadgeCommand::SignOut).await
    }

    pub async fn shutdown(&self) -> Result<(), InboxError> {
        self.send(BadgeCommand::Shutdown).await
    }

    /// Current count
    pub fn count(&self) -> u32 {
        *self.count.borrow()
    }

    /// Receiver notified whenever the count changes
    pub fn watch(&self) -> watch::Receiver<u32> {
        self.count.clone()
    }

    /// Wait until the count satisfies `predicate`
    pub async fn wait_for(&self, mut predicate: impl FnMut(u32) -> bool) -> Result<u32, InboxError> {
        let mut rx = self.count.clone();
        let count = rx
            .wait_for(|count| predicate(*count))
            .await
            .map_err(|_| InboxError::StoreClosed)?;
        Ok(*count)
    }
}

struct BadgeTask {
    gateway: Arc<dyn RemoteGateway>,
    aggregator: UnreadAggregator,
    channel: String,
    viewer: Option<Viewer>,
    generation: u64,
    epoch: u64,
    forwarder: Option<JoinHandle<()>>,
    commands: mpsc::WeakSender<BadgeCommand>,
    count: watch::Sender<u32>,
}

impl BadgeTask {
    async fn run(mut self, mut rx: mpsc::Receiver<BadgeCommand>) {
        tracing::info!("[Badge] Started");
        while let Some(command) = rx.recv().await {
            match command {
                BadgeCommand::SignIn(viewer) => self.sign_in(viewer),
                BadgeCommand::SignOut => self.sign_out(),
                BadgeCommand::Remote { epoch, event } => self.remote(epoch, event),
                BadgeCommand::Computed { generation, result } => self.computed(generation, result),
                BadgeCommand::Shutdown => break,
            }
        }
        self.unsubscribe();
        tracing::info!("[Badge] Stopped");
    }

    fn sign_in(&mut self, viewer: Viewer) {
        if self.viewer.as_ref() == Some(&viewer) {
            return;
        }
        tracing::info!("[Badge] Tracking {} {}", viewer.role, viewer.id);
        self.unsubscribe();
        self.viewer = Some(viewer);
        // The previous viewer's count must not show while the new one loads
        self.count.send_if_modified(|count| std::mem::replace(count, 0) != 0);
        self.recompute();
        self.subscribe();
    }

    fn sign_out(&mut self) {
        tracing::info!("[Badge] Signed out");
        self.unsubscribe();
        self.viewer = None;
        self.generation += 1;
        self.count.send_if_modified(|count| std::mem::replace(count, 0) != 0);
    }

    fn remote(&mut self, epoch: u64, event: RealtimeEvent) {
        if epoch != self.epoch || self.forwarder.is_none() {
            return;
        }
        let Some(viewer) = self.viewer.as_ref() else {
            return;
        };
        if event.kind().is_none() || !viewer.matches_document(&event.payload) {
            return;
        }
        tracing::debug!("[Badge] Change for {}, recomputing", viewer.id);
        self.recompute();
    }

    fn computed(&mut self, generation: u64, result: Result<u32, InboxError>) {
        if generation != self.generation {
            tracing::debug!("[Badge] Discarding stale count {}", generation);
            return;
        }
        match result {
            Ok(total) => {
                tracing::debug!("[Badge] Unread count {}", total);
                self.count.send_if_modified(|count| std::mem::replace(count, total) != total);
            }
            Err(e) => tracing::warn!("[Badge] Failed to recompute unread count: {}", e),
        }
    }

    fn recompute(&mut self) {
        let (Some(viewer), Some(commands)) = (self.viewer.clone(), self.commands.upgrade()) else {
            return;
        };
        self.generation += 1;
        let generation = self.generation;
        let aggregator = self.aggregator.clone();
        tokio::spawn(async move {
            let result = aggregator.recompute(&viewer).await;
            let _ = commands.send(BadgeCommand::Computed { generation, result }).await;
        });
    }

    fn subscribe(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        let gateway = Arc::clone(&self.gateway);
        let channel = self.channel.clone();
        let commands = self.commands.clone();

        self.forwarder = Some(tokio::spawn(async move {
            let mut subscription = match gateway.subscribe(&channel).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    tracing::warn!("[Badge] Subscription to {} failed: {}", channel, e);
                    return;
                }
            };
            while let Some(event) = subscription.next().await {
                let Some(sender) = commands.upgrade() else {
                    return;
                };
                if sender.send(BadgeCommand::Remote { epoch, event }).await.is_err() {
                    return;
                }
            }
        }));
    }

    fn unsubscribe(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.epoch += 1;
    }
}
