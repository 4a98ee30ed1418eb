//! In-process companion for development and tests.
//!
//! [`LoopbackChannel`] implements [`RemoteChannel`] entirely in memory: peers,
//! data items and assets are registered by the caller, and publishing a data
//! item pushes a change event to the current subscriber exactly like a phone
//! would. It also lets tests inject connection failures and suspensions.

use crate::config::CompanionConfig;
use crate::remote::{
    AssetRef, ChannelError, ChannelNotice, DataEvent, DataMap, DataValue, NoticeSink, PeerHandle,
    RemoteChannel,
};
use crate::weather_sync::{HIGH_TEMP_KEY, LOW_TEMP_KEY, WEATHER_ICON_KEY};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::{fs, io};

#[derive(Default)]
struct Inner {
    connected: bool,
    connect_failure: Option<String>,
    peers: Vec<PeerHandle>,
    items: HashMap<(String, String), DataMap>,
    assets: HashMap<AssetRef, Vec<u8>>,
    lifecycle: Option<NoticeSink>,
    subscription: Option<(String, NoticeSink)>,
    connect_calls: usize,
}

/// Memory-backed remote channel
#[derive(Default)]
pub struct LoopbackChannel {
    inner: Mutex<Inner>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Companion with a single peer serving the configured demo payload at `path`.
    pub fn from_config(config: &CompanionConfig, path: &str) -> io::Result<Self> {
        let channel = Self::new();
        let peer = PeerHandle::new(format!("{}-node", config.peer_name), &config.peer_name);
        channel.add_peer(peer.clone());

        let mut data = DataMap::new();
        if let Some(high) = &config.high_temp {
            data.insert(HIGH_TEMP_KEY, DataValue::Text(high.clone()));
        }
        if let Some(low) = &config.low_temp {
            data.insert(LOW_TEMP_KEY, DataValue::Text(low.clone()));
        }
        if let Some(icon_path) = &config.icon_path {
            let bytes = fs::read(icon_path)?;
            let asset = AssetRef(icon_path.display().to_string());
            channel.put_asset(asset.clone(), bytes);
            data.insert(WEATHER_ICON_KEY, DataValue::Asset(asset));
        }
        channel.publish(&peer.id, path, data);
        Ok(channel)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_peer(&self, peer: PeerHandle) {
        self.lock().peers.push(peer);
    }

    pub fn put_asset(&self, asset: AssetRef, bytes: Vec<u8>) {
        self.lock().assets.insert(asset, bytes);
    }

    /// Store a data item and notify the subscriber if the path matches.
    pub fn publish(&self, peer_id: &str, path: &str, data: DataMap) {
        let mut inner = self.lock();
        inner
            .items
            .insert((peer_id.to_string(), path.to_string()), data.clone());
        Self::notify(
            &inner,
            DataEvent::Changed {
                path: path.to_string(),
                data,
            },
        );
    }

    /// Remove a data item and notify the subscriber if the path matches.
    pub fn delete(&self, peer_id: &str, path: &str) {
        let mut inner = self.lock();
        inner
            .items
            .remove(&(peer_id.to_string(), path.to_string()));
        Self::notify(
            &inner,
            DataEvent::Deleted {
                path: path.to_string(),
            },
        );
    }

    /// Make the next `connect` calls fail with `reason` (or succeed again with `None`).
    pub fn set_connect_failure(&self, reason: Option<String>) {
        self.lock().connect_failure = reason;
    }

    /// Simulate the platform suspending the connection.
    pub fn suspend_connection(&self) {
        let mut inner = self.lock();
        inner.connected = false;
        if let Some(lifecycle) = &inner.lifecycle {
            let _ = lifecycle.send(ChannelNotice::ConnectionSuspended);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().subscription.is_some()
    }

    /// Number of `connect` calls received so far.
    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    fn notify(inner: &Inner, event: DataEvent) {
        if let Some((prefix, sink)) = &inner.subscription {
            if event.path().starts_with(prefix.as_str()) {
                let _ = sink.send(ChannelNotice::Data(event));
            }
        }
    }
}

impl RemoteChannel for LoopbackChannel {
    async fn connect(&self, notices: NoticeSink) -> Result<(), ChannelError> {
        let mut inner = self.lock();
        inner.connect_calls += 1;
        if let Some(reason) = &inner.connect_failure {
            return Err(ChannelError::Unreachable(reason.clone()));
        }
        inner.connected = true;
        inner.lifecycle = Some(notices);
        Ok(())
    }

    async fn disconnect(&self) {
        let mut inner = self.lock();
        inner.connected = false;
        inner.lifecycle = None;
        inner.subscription = None;
    }

    async fn list_peers(&self) -> Result<Vec<PeerHandle>, ChannelError> {
        let inner = self.lock();
        if !inner.connected {
            return Err(ChannelError::NotConnected);
        }
        Ok(inner.peers.clone())
    }

    async fn fetch(&self, peer: &PeerHandle, path: &str) -> Result<Option<DataMap>, ChannelError> {
        let inner = self.lock();
        if !inner.connected {
            return Err(ChannelError::NotConnected);
        }
        Ok(inner
            .items
            .get(&(peer.id.clone(), path.to_string()))
            .cloned())
    }

    async fn subscribe(&self, path_prefix: &str, sink: NoticeSink) -> Result<(), ChannelError> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(ChannelError::NotConnected);
        }
        inner.subscription = Some((path_prefix.to_string(), sink));
        Ok(())
    }

    async fn unsubscribe(&self) {
        self.lock().subscription = None;
    }

    async fn resolve_asset(&self, asset: &AssetRef) -> Result<Option<Vec<u8>>, ChannelError> {
        let inner = self.lock();
        if !inner.connected {
            return Err(ChannelError::NotConnected);
        }
        Ok(inner.assets.get(asset).cloned())
    }
}
