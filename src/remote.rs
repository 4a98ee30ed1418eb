//! # Remote Data Channel
//!
//! Boundary types for the channel that connects the face to its paired
//! companion. The transport itself is an external collaborator; this module only
//! defines what the face consumes:
//!
//! - connection lifecycle (`connect` / `disconnect` plus later notices)
//! - peer discovery (`list_peers`)
//! - fetch of a cached key/value payload by path (`fetch`)
//! - a live-update feed (`subscribe` / `unsubscribe`)
//! - asset resolution to a byte stream (`resolve_asset`)
//!
//! All operations are asynchronous. Callers spawn them and route the results back
//! onto the face's event loop; nothing here is ever awaited from the draw path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by a remote channel.
///
/// None of these are fatal to the face: the sync service logs them and keeps
/// showing the last known weather.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Operation issued while no connection is established
    #[error("channel not connected")]
    NotConnected,

    /// The peer or the channel service cannot be reached
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// Any other transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Identifier of a discovered companion.
///
/// Only valid for the connection session it was discovered in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerHandle {
    pub id: String,
    pub display_name: String,
}

impl PeerHandle {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        PeerHandle {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Opaque reference to binary data held by the channel
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetRef(pub String);

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single value inside a [`DataMap`]
#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    Text(String),
    Int(i64),
    Asset(AssetRef),
}

/// Key/value payload exchanged over the channel
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataMap(BTreeMap<String, DataValue>);

impl DataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: DataValue) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.0.get(key)
    }

    /// Text value for `key`; absent when missing or of another type.
    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(DataValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Asset value for `key`; absent when missing or of another type.
    pub fn get_asset(&self, key: &str) -> Option<&AssetRef> {
        match self.0.get(key) {
            Some(DataValue::Asset(asset)) => Some(asset),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One entry of the live-update feed
#[derive(Clone, Debug, PartialEq)]
pub enum DataEvent {
    Changed { path: String, data: DataMap },
    Deleted { path: String },
}

impl DataEvent {
    pub fn path(&self) -> &str {
        match self {
            DataEvent::Changed { path, .. } | DataEvent::Deleted { path } => path,
        }
    }
}

/// Asynchronous notice pushed by the channel after `connect` or `subscribe`
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelNotice {
    /// Connection temporarily lost; the channel may come back on its own
    ConnectionSuspended,
    /// Connection dropped with the given cause
    ConnectionFailed(String),
    /// Live-update feed entry
    Data(DataEvent),
}

/// Sender half handed to the channel for notices
pub type NoticeSink = mpsc::UnboundedSender<ChannelNotice>;

/// Rule used when more than one peer is connected.
///
/// The platform enumerates peers without any "most recently paired" ordering, so
/// picking one is arbitrary; the default keeps the last one enumerated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeerTieBreak {
    #[default]
    LastWins,
    FirstWins,
}

impl PeerTieBreak {
    /// Pick one peer out of the enumerated list.
    pub fn choose(self, peers: Vec<PeerHandle>) -> Option<PeerHandle> {
        match self {
            PeerTieBreak::LastWins => peers.into_iter().last(),
            PeerTieBreak::FirstWins => peers.into_iter().next(),
        }
    }
}

/// Capability to talk to the paired companion.
///
/// Implementations must be cheap to share (`Arc`) and safe to call from spawned
/// tasks. `fetch` returns `Ok(None)` when no data item exists at the path yet and
/// `resolve_asset` returns `Ok(None)` for an unknown asset.
pub trait RemoteChannel: Send + Sync + 'static {
    /// Establish the connection. Later lifecycle changes arrive on `notices`.
    fn connect(&self, notices: NoticeSink) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Tear down the connection and drop every registered sink.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    /// Peers currently connected, in platform enumeration order.
    fn list_peers(&self) -> impl Future<Output = Result<Vec<PeerHandle>, ChannelError>> + Send;

    /// Cached payload stored by `peer` at `path`.
    fn fetch(
        &self,
        peer: &PeerHandle,
        path: &str,
    ) -> impl Future<Output = Result<Option<DataMap>, ChannelError>> + Send;

    /// Start forwarding changes under `path_prefix` to `sink`, replacing any
    /// previous subscription.
    fn subscribe(
        &self,
        path_prefix: &str,
        sink: NoticeSink,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Stop the live-update feed. No event is delivered after this resolves.
    fn unsubscribe(&self) -> impl Future<Output = ()> + Send;

    /// Byte stream behind `asset`.
    fn resolve_asset(
        &self,
        asset: &AssetRef,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, ChannelError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers() -> Vec<PeerHandle> {
        vec![PeerHandle::new("A", "pixel"), PeerHandle::new("B", "tablet")]
    }

    #[test]
    fn test_last_wins_picks_last_enumerated() {
        let chosen = PeerTieBreak::LastWins.choose(peers()).unwrap();
        assert_eq!(chosen.id, "B");
    }

    #[test]
    fn test_first_wins_picks_first_enumerated() {
        let chosen = PeerTieBreak::FirstWins.choose(peers()).unwrap();
        assert_eq!(chosen.id, "A");
    }

    #[test]
    fn test_no_peers_chooses_nothing() {
        assert!(PeerTieBreak::LastWins.choose(Vec::new()).is_none());
    }

    #[test]
    fn test_data_map_typed_getters() {
        let mut map = DataMap::new();
        map.insert("HIGH_TEMP", DataValue::Text("75°".into()))
            .insert("WEATHER_ICON", DataValue::Asset(AssetRef("icon-1".into())))
            .insert("TIMESTAMP", DataValue::Int(42));

        assert_eq!(map.get_text("HIGH_TEMP"), Some("75°"));
        assert_eq!(map.get_text("WEATHER_ICON"), None);
        assert_eq!(map.get_asset("WEATHER_ICON"), Some(&AssetRef("icon-1".into())));
        assert_eq!(map.get_asset("MISSING"), None);
        assert_eq!(map.len(), 3);
    }
}
