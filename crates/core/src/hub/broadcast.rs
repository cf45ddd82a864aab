//! Viewer registry with non-blocking fan-out.
//!
//! Every viewer owns a bounded outbound queue. Broadcasting never waits on a
//! viewer: a frame that does not fit is not retried, the viewer is evicted
//! instead (drop-and-disconnect backpressure).
//!
//! Fan-out works on a snapshot: matching senders are cloned under the read
//! lock and frames are pushed after the lock is released. Registry writes
//! (register, unregister, subscription changes) are therefore never blocked
//! by a broadcast, and a subscription change applies from the next
//! broadcast on. A viewer unregistered while a snapshot is being delivered
//! may still have a frame pushed into its orphaned queue; nobody reads it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{HubConfig, PortfolioScope};
use crate::models::message::{
    normalize_topic, ClientMessage, PortfolioUpdate, ServerMessage, PORTFOLIO_CHANNEL,
};
use crate::models::quote::Quote;

pub type ViewerId = Uuid;

/// An encoded JSON frame, shared by every recipient of one broadcast.
pub type Frame = Arc<str>;

/// Returned by [`BroadcastHub::register`]: the viewer's id and the receiving
/// end of its outbound queue. The `connected` acknowledgement is already
/// queued.
#[derive(Debug)]
pub struct ViewerHandle {
    pub id: ViewerId,
    pub outbound: mpsc::Receiver<Frame>,
}

struct ViewerEntry {
    /// User the viewer is bound to, for per-user portfolio updates
    owner: Option<String>,
    /// Symbols and/or the `portfolio` sentinel
    subscriptions: HashSet<String>,
    outbound: mpsc::Sender<Frame>,
}

struct HubInner {
    config: HubConfig,
    viewers: RwLock<HashMap<ViewerId, ViewerEntry>>,
}

/// Registry of connected viewers. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("viewers", &self.viewer_count())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                viewers: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Add a viewer and queue its `connected` acknowledgement. Never fails.
    pub fn register(&self, owner: Option<String>) -> ViewerHandle {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.inner.config.outbound_capacity.max(1));

        match ServerMessage::connected(id.to_string()).to_json() {
            Ok(json) => {
                let _ = tx.try_send(Frame::from(json));
            }
            Err(e) => warn!(viewer = %id, error = %e, "failed to encode welcome frame"),
        }

        let entry = ViewerEntry {
            owner: owner.clone(),
            subscriptions: HashSet::new(),
            outbound: tx,
        };
        let count = {
            let mut viewers = self.write_viewers();
            viewers.insert(id, entry);
            viewers.len()
        };

        info!(viewer = %id, owner = ?owner, viewers = count, "viewer registered");
        ViewerHandle { id, outbound: rx }
    }

    /// Remove a viewer. Dropping its sender closes the outbound queue.
    /// Returns false when the viewer was already gone.
    pub fn unregister(&self, id: ViewerId) -> bool {
        let removed = self.write_viewers().remove(&id);
        match removed {
            Some(_) => {
                debug!(viewer = %id, "viewer unregistered");
                true
            }
            None => false,
        }
    }

    /// Add a symbol (or the `portfolio` sentinel) to a viewer's subscriptions.
    pub fn subscribe(&self, id: ViewerId, topic: &str) -> bool {
        let topic = normalize_topic(topic);
        if topic.is_empty() {
            return false;
        }
        match self.write_viewers().get_mut(&id) {
            Some(entry) => {
                debug!(viewer = %id, topic = %topic, "subscribed");
                entry.subscriptions.insert(topic);
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe(&self, id: ViewerId, topic: &str) -> bool {
        let topic = normalize_topic(topic);
        match self.write_viewers().get_mut(&id) {
            Some(entry) => entry.subscriptions.remove(&topic),
            None => false,
        }
    }

    /// Apply an inbound text frame from a viewer. Unknown or malformed
    /// frames are ignored.
    pub fn handle_inbound(&self, id: ViewerId, text: &str) {
        match ClientMessage::parse(text) {
            Some(ClientMessage::Subscribe { symbol }) => {
                self.subscribe(id, &symbol);
            }
            Some(ClientMessage::Unsubscribe { symbol }) => {
                self.unsubscribe(id, &symbol);
            }
            Some(ClientMessage::Unknown) | None => {
                debug!(viewer = %id, "ignoring unrecognized inbound frame");
            }
        }
    }

    /// Push a `price_update` to viewers subscribed to the symbol or to
    /// `portfolio`. Returns the number of viewers the frame was queued for.
    pub fn broadcast_price_update(&self, quote: &Quote) -> usize {
        let symbol = normalize_topic(&quote.symbol);
        self.fan_out(&ServerMessage::price_update(quote), |entry| {
            entry.subscriptions.contains(&symbol) || entry.subscriptions.contains(PORTFOLIO_CHANNEL)
        })
    }

    /// Push a `portfolio_update`.
    ///
    /// With [`PortfolioScope::Global`], or for an update without a user id,
    /// every registered viewer receives it. With [`PortfolioScope::PerUser`]
    /// only viewers bound to the update's user do.
    pub fn broadcast_portfolio_update(&self, update: &PortfolioUpdate) -> usize {
        let scope = self.inner.config.portfolio_scope;
        let target = update.user_id.as_deref();
        self.fan_out(
            &ServerMessage::portfolio_update(update.clone()),
            |entry| match (scope, target) {
                (PortfolioScope::Global, _) | (PortfolioScope::PerUser, None) => true,
                (PortfolioScope::PerUser, Some(user)) => entry.owner.as_deref() == Some(user),
            },
        )
    }

    pub fn viewer_count(&self) -> usize {
        self.read_viewers().len()
    }

    pub fn is_registered(&self, id: ViewerId) -> bool {
        self.read_viewers().contains_key(&id)
    }

    /// A viewer's subscriptions, sorted. `None` for unknown viewers.
    pub fn subscriptions(&self, id: ViewerId) -> Option<Vec<String>> {
        self.read_viewers().get(&id).map(|entry| {
            let mut topics: Vec<String> = entry.subscriptions.iter().cloned().collect();
            topics.sort();
            topics
        })
    }

    fn fan_out(&self, message: &ServerMessage, matches: impl Fn(&ViewerEntry) -> bool) -> usize {
        let frame: Frame = match message.to_json() {
            Ok(json) => Frame::from(json),
            Err(e) => {
                warn!(error = %e, "failed to encode broadcast frame");
                return 0;
            }
        };

        let recipients: Vec<(ViewerId, mpsc::Sender<Frame>)> = self
            .read_viewers()
            .iter()
            .filter(|(_, entry)| matches(entry))
            .map(|(id, entry)| (*id, entry.outbound.clone()))
            .collect();

        let mut delivered = 0;
        let mut evicted = Vec::new();
        for (id, outbound) in recipients {
            match outbound.try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(viewer = %id, "outbound queue full; dropping viewer");
                    evicted.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(viewer = %id, "outbound queue closed; dropping viewer");
                    evicted.push(id);
                }
            }
        }

        for id in evicted {
            self.unregister(id);
        }
        delivered
    }

    fn read_viewers(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ViewerId, ViewerEntry>> {
        self.inner.viewers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_viewers(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ViewerId, ViewerEntry>> {
        self.inner.viewers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
