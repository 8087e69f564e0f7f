//! WebSocket connection registry and broadcast manager.
//!
//! Holds per-type client registries, relays bus traffic to matching groups,
//! and fans domain events out both locally and over the bus. The bus
//! listener has an explicit lifecycle: `start` at process init, `shutdown`
//! at exit.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::cache::CacheHandle;
use crate::cache::keys::{
    ALL_CHANNELS, CHANNEL_INVENTORY_UPDATES, CHANNEL_PRICE_ALERTS, CHANNEL_PRICE_UPDATES,
    CHANNEL_STOCK_ALERTS,
};
use crate::realtime::messages::{
    Envelope, EventKind, InventoryUpdate, PriceChangeAlert, PriceUpdate, StockAlert, StreamKind,
};

/// Bounded per-channel wait, so one idle channel cannot starve the others.
const BUS_POLL_WAIT: Duration = Duration::from_secs(1);

pub type ClientId = u64;

struct Client {
    id: ClientId,
    sender: mpsc::UnboundedSender<String>,
}

/// Snapshot of the manager's connection state.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    pub total_connections: usize,
    pub connections_by_type: BTreeMap<&'static str, usize>,
    pub bus_listener_active: bool,
    pub listener_task_running: bool,
}

pub struct ConnectionManager {
    origin: Uuid,
    cache: CacheHandle,
    registry: RwLock<HashMap<StreamKind, Vec<Client>>>,
    next_client_id: AtomicU64,
    listening: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(cache: CacheHandle) -> Self {
        let mut registry = HashMap::new();
        for kind in StreamKind::ALL {
            registry.insert(kind, Vec::new());
        }
        Self {
            origin: Uuid::new_v4(),
            cache,
            registry: RwLock::new(registry),
            next_client_id: AtomicU64::new(1),
            listening: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    /// Process-instance id stamped on every published envelope.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Start the single bus-listener task. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut listener = self.listener.lock().expect("listener lock");
        if listener.is_some() {
            return;
        }
        self.listening.store(true, Ordering::SeqCst);
        let manager = Arc::clone(self);
        *listener = Some(tokio::spawn(manager.run_listener()));
    }

    /// Stop the bus-listener task.
    pub fn shutdown(&self) {
        self.listening.store(false, Ordering::SeqCst);
        if let Some(handle) = self.listener.lock().expect("listener lock").take() {
            handle.abort();
            info!("bus listener stopped");
        }
    }

    /// Register a connection under its stream group.
    pub async fn register(
        &self,
        kind: StreamKind,
        sender: mpsc::UnboundedSender<String>,
    ) -> ClientId {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let mut registry = self.registry.write().await;
        registry.entry(kind).or_default().push(Client { id, sender });
        let total: usize = registry.values().map(Vec::len).sum();
        info!(
            connection_type = kind.as_str(),
            total_connections = total,
            "websocket client connected"
        );
        id
    }

    /// Remove a connection from whichever group holds it.
    pub async fn disconnect(&self, id: ClientId) {
        let mut registry = self.registry.write().await;
        for (kind, clients) in registry.iter_mut() {
            if let Some(position) = clients.iter().position(|client| client.id == id) {
                clients.remove(position);
                info!(
                    connection_type = kind.as_str(),
                    remaining_connections = clients.len(),
                    "websocket client disconnected"
                );
                return;
            }
        }
    }

    /// Deliver `text` to every connection of `kind`.
    ///
    /// The registry slice is snapshotted before sending so registrations
    /// arriving mid-broadcast never shift the iteration. A failed send is
    /// terminal for that connection: it is evicted immediately, tallied,
    /// never raised.
    pub async fn broadcast_to(&self, kind: StreamKind, text: &str) -> usize {
        let snapshot: Vec<(ClientId, mpsc::UnboundedSender<String>)> = {
            let registry = self.registry.read().await;
            registry
                .get(&kind)
                .map(|clients| {
                    clients
                        .iter()
                        .map(|client| (client.id, client.sender.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };
        if snapshot.is_empty() {
            return 0;
        }

        let mut failed = Vec::new();
        for (id, sender) in &snapshot {
            if sender.send(text.to_string()).is_err() {
                failed.push(*id);
            }
        }

        if !failed.is_empty() {
            let mut registry = self.registry.write().await;
            if let Some(clients) = registry.get_mut(&kind) {
                clients.retain(|client| !failed.contains(&client.id));
            }
        }

        let delivered = snapshot.len() - failed.len();
        debug!(
            connection_type = kind.as_str(),
            successful_sends = delivered,
            failed_sends = failed.len(),
            "broadcast complete"
        );
        delivered
    }

    /// Deliver `text` to every connection of every group.
    pub async fn broadcast_all(&self, text: &str) -> usize {
        let mut delivered = 0;
        for kind in StreamKind::ALL {
            delivered += self.broadcast_to(kind, text).await;
        }
        delivered
    }

    pub async fn send_inventory_update(&self, update: InventoryUpdate) {
        self.dispatch(
            EventKind::InventoryUpdate,
            CHANNEL_INVENTORY_UPDATES,
            StreamKind::Inventory,
            None,
            &update,
        )
        .await;
    }

    pub async fn send_price_update(&self, update: PriceUpdate) {
        self.dispatch(
            EventKind::PriceUpdate,
            CHANNEL_PRICE_UPDATES,
            StreamKind::Price,
            None,
            &update,
        )
        .await;
    }

    pub async fn send_stock_alert(&self, alert: StockAlert) {
        let severity = Some(alert.alert_level.clone());
        self.dispatch(
            EventKind::StockAlert,
            CHANNEL_STOCK_ALERTS,
            StreamKind::Alerts,
            severity,
            &alert,
        )
        .await;
    }

    pub async fn send_price_alert(&self, alert: PriceChangeAlert) {
        let severity = Some(alert.alert_type.as_str().to_string());
        self.dispatch(
            EventKind::PriceAlert,
            CHANNEL_PRICE_ALERTS,
            StreamKind::Alerts,
            severity,
            &alert,
        )
        .await;
    }

    /// Publish an envelope to the bus for other instances and broadcast it
    /// to locally-held connections of the matching group. The listener drops
    /// our own bus echo by origin id, so local clients see the event once.
    async fn dispatch<T: Serialize>(
        &self,
        kind: EventKind,
        channel: &'static str,
        target: StreamKind,
        severity: Option<String>,
        payload: &T,
    ) {
        let envelope = Envelope::new(kind, self.origin, payload, severity);
        self.cache.publish_json(channel, &envelope).await;

        match serde_json::to_string(&envelope) {
            Ok(text) => {
                self.broadcast_to(target, &text).await;
            }
            Err(err) => warn!(channel, error = %err, "failed to serialize envelope"),
        }
    }

    pub async fn stats(&self) -> ManagerStats {
        let registry = self.registry.read().await;
        let connections_by_type: BTreeMap<&'static str, usize> = registry
            .iter()
            .map(|(kind, clients)| (kind.as_str(), clients.len()))
            .collect();
        ManagerStats {
            total_connections: connections_by_type.values().sum(),
            connections_by_type,
            bus_listener_active: self.listening.load(Ordering::SeqCst),
            listener_task_running: self
                .listener
                .lock()
                .expect("listener lock")
                .as_ref()
                .is_some_and(|handle| !handle.is_finished()),
        }
    }

    async fn run_listener(self: Arc<Self>) {
        let mut subscriptions = Vec::with_capacity(ALL_CHANNELS.len());
        for channel in ALL_CHANNELS {
            match self.cache.subscribe(channel).await {
                Ok(subscription) => subscriptions.push((channel, subscription)),
                Err(err) => {
                    error!(channel, error = %err, "bus subscribe failed, realtime bridge disabled");
                    self.listening.store(false, Ordering::SeqCst);
                    return;
                }
            }
        }
        info!(channels = ?ALL_CHANNELS, "bus listener started");

        loop {
            for (channel, subscription) in subscriptions.iter_mut() {
                let channel = *channel;
                match subscription.next_message(BUS_POLL_WAIT).await {
                    Ok(Some(payload)) => self.relay(channel, &payload).await,
                    Ok(None) => {}
                    Err(err) => {
                        warn!(channel, error = %err, "bus poll failed");
                        tokio::time::sleep(BUS_POLL_WAIT).await;
                    }
                }
            }
        }
    }

    /// Route one bus message to the matching connection groups.
    async fn relay(&self, channel: &str, payload: &str) {
        let mut envelope: Envelope = match serde_json::from_str(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(channel, error = %err, "dropping malformed bus message");
                return;
            }
        };

        if envelope.origin == self.origin {
            trace!(channel, "dropping self-originated bus echo");
            return;
        }

        envelope.channel = Some(channel.to_string());
        envelope.received_at = Some(OffsetDateTime::now_utc());
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(err) => {
                warn!(channel, error = %err, "failed to re-serialize bus message");
                return;
            }
        };

        match channel {
            CHANNEL_INVENTORY_UPDATES => {
                self.broadcast_to(StreamKind::Inventory, &text).await;
            }
            CHANNEL_PRICE_UPDATES => {
                self.broadcast_to(StreamKind::Price, &text).await;
            }
            CHANNEL_STOCK_ALERTS | CHANNEL_PRICE_ALERTS => {
                self.broadcast_to(StreamKind::Alerts, &text).await;
            }
            _ => {
                self.broadcast_all(&text).await;
            }
        }
    }
}
