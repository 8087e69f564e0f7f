//! WebSocket fan-out: typed event envelopes and the connection manager
//! bridging locally-held sockets with the shared Redis bus.

pub mod manager;
pub mod messages;

pub use manager::{ConnectionManager, ManagerStats};
pub use messages::{
    Envelope, EventKind, InventoryEventItem, InventoryUpdate, PriceChangeAlert, PriceEventBody,
    PriceUpdate, StockAlert, StreamKind,
};
