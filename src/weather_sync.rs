//! # Weather Synchronization
//!
//! This module keeps the cached [`WeatherSnapshot`] in step with the paired
//! companion. It owns the connection state machine and the sync pipeline:
//!
//! 1. **Connect**: `connect()` is idempotent and only acts from `Disconnected`
//! 2. **Discover**: list connected peers and pick one (last enumerated by default)
//! 3. **Fetch**: read the cached payload at the weather path from that peer
//! 4. **Publish**: swap in a new snapshot with the temperature pair
//! 5. **Decode**: resolve the icon asset and decode it off the event loop
//! 6. **Listen**: subscribe to live updates under the weather path
//!
//! ## Event Loop Integration
//!
//! Every channel call runs in a spawned task. Its outcome comes back as a
//! [`SyncMessage`] which the owner feeds to [`WeatherSyncService::apply`] on the
//! face's single event loop, so state is only ever mutated from that loop.
//! Messages carry the connection session they belong to; once the face suspends
//! the channel (or the channel drops), results and events from the old session
//! are discarded.
//!
//! ## Error Handling
//!
//! Nothing here is fatal. Connection problems are logged and left for the next
//! visibility change to retry. A missing payload or a missing peer is a steady
//! state, not an error. A broken icon leaves the icon unset and never touches the
//! temperatures already published.

use crate::config::SyncConfig;
use crate::icon::{Icon, IconError};
use crate::remote::{
    AssetRef, ChannelError, ChannelNotice, DataEvent, DataMap, NoticeSink, PeerHandle,
    PeerTieBreak, RemoteChannel,
};
use crate::WeatherSnapshot;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Payload key holding the display-ready high temperature
pub const HIGH_TEMP_KEY: &str = "HIGH_TEMP";
/// Payload key holding the display-ready low temperature
pub const LOW_TEMP_KEY: &str = "LOW_TEMP";
/// Payload key holding the icon asset reference
pub const WEATHER_ICON_KEY: &str = "WEATHER_ICON";

/// Failures of individual pipeline stages
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("peer discovery failed: {0}")]
    Discovery(ChannelError),

    #[error("payload fetch failed: {0}")]
    Fetch(ChannelError),

    #[error("subscribe failed: {0}")]
    Subscribe(ChannelError),

    #[error("asset fetch failed: {0}")]
    Asset(ChannelError),

    #[error("asset {0} resolved to no stream")]
    AssetMissing(AssetRef),

    #[error("icon decode failed: {0}")]
    Icon(#[from] IconError),
}

/// Connection lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Progress of the sync pipeline within the current session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStage {
    Idle,
    DiscoveringPeer,
    FetchingPayload,
    DecodingAsset,
    Ready,
    Failed,
}

/// Result of an asynchronous channel operation, routed back to the event loop
#[derive(Debug)]
pub enum SyncMessage {
    ConnectResult {
        session: u64,
        result: Result<(), ChannelError>,
    },
    Notice {
        session: u64,
        notice: ChannelNotice,
    },
    PeerChosen {
        session: u64,
        peer: Option<PeerHandle>,
    },
    PayloadFetched {
        session: u64,
        payload: Option<DataMap>,
    },
    Subscribed {
        session: u64,
        result: Result<(), ChannelError>,
    },
    IconResolved {
        session: u64,
        generation: u64,
        result: Result<Icon, SyncError>,
    },
    StageFailed {
        session: u64,
        error: SyncError,
    },
}

impl SyncMessage {
    fn session(&self) -> u64 {
        match self {
            SyncMessage::ConnectResult { session, .. }
            | SyncMessage::Notice { session, .. }
            | SyncMessage::PeerChosen { session, .. }
            | SyncMessage::PayloadFetched { session, .. }
            | SyncMessage::Subscribed { session, .. }
            | SyncMessage::IconResolved { session, .. }
            | SyncMessage::StageFailed { session, .. } => *session,
        }
    }
}

/// Owner of the weather cache and the remote channel session
pub struct WeatherSyncService<C: RemoteChannel> {
    channel: Arc<C>,
    data_path: String,
    tie_break: PeerTieBreak,
    state: ConnectionState,
    stage: SyncStage,
    session: u64,
    generation: u64,
    subscribed: bool,
    peer: Option<PeerHandle>,
    notices: Option<NoticeSink>,
    /// Unsubscribe + disconnect of the previous session; the next connect waits for it
    teardown: Option<JoinHandle<()>>,
    snapshot: Arc<WeatherSnapshot>,
    messages: mpsc::UnboundedSender<SyncMessage>,
}

impl<C: RemoteChannel> WeatherSyncService<C> {
    /// Create a disconnected service. Results are posted to `messages`.
    pub fn new(
        channel: Arc<C>,
        config: &SyncConfig,
        messages: mpsc::UnboundedSender<SyncMessage>,
    ) -> Self {
        WeatherSyncService {
            channel,
            data_path: config.data_path.clone(),
            tie_break: config.peer_tie_break,
            state: ConnectionState::Disconnected,
            stage: SyncStage::Idle,
            session: 0,
            generation: 0,
            subscribed: false,
            peer: None,
            notices: None,
            teardown: None,
            snapshot: Arc::new(WeatherSnapshot::default()),
            messages,
        }
    }

    /// Read-only handle on the current snapshot.
    pub fn snapshot(&self) -> Arc<WeatherSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Peer chosen in the current session.
    pub fn peer(&self) -> Option<&PeerHandle> {
        self.peer.as_ref()
    }

    /// Start a connection attempt unless one is established or in flight.
    pub fn connect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            log::debug!("connect ignored, channel is {:?}", self.state);
            return;
        }
        self.session += 1;
        self.state = ConnectionState::Connecting;
        self.stage = SyncStage::Idle;
        log::info!("connecting to companion (session {})", self.session);

        let session = self.session;
        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
        self.notices = Some(notice_tx.clone());

        // Forward channel notices onto the loop, tagged with this session
        let forward = self.messages.clone();
        tokio::spawn(async move {
            while let Some(notice) = notice_rx.recv().await {
                if forward.send(SyncMessage::Notice { session, notice }).is_err() {
                    break;
                }
            }
        });

        let channel = Arc::clone(&self.channel);
        let messages = self.messages.clone();
        let teardown = self.teardown.take();
        tokio::spawn(async move {
            if let Some(teardown) = teardown {
                let _ = teardown.await;
            }
            let result = channel.connect(notice_tx).await;
            let _ = messages.send(SyncMessage::ConnectResult { session, result });
        });
    }

    /// Unsubscribe and disconnect; anything still in flight is discarded.
    pub fn suspend(&mut self) {
        log::info!("suspending companion channel (session {})", self.session);
        self.session += 1;
        self.state = ConnectionState::Disconnected;
        self.stage = SyncStage::Idle;
        self.subscribed = false;
        self.peer = None;
        self.notices = None;

        let channel = Arc::clone(&self.channel);
        let previous = self.teardown.take();
        self.teardown = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            channel.unsubscribe().await;
            channel.disconnect().await;
        }));
    }

    /// Apply an asynchronous result. Returns true when the snapshot changed and
    /// the face should redraw.
    pub fn apply(&mut self, message: SyncMessage) -> bool {
        if message.session() != self.session {
            log::debug!("dropping result from stale session {}", message.session());
            return false;
        }

        match message {
            SyncMessage::ConnectResult { result, .. } => {
                match result {
                    Ok(()) => self.on_connected(),
                    Err(e) => self.on_connection_failed(&e.to_string()),
                }
                false
            }
            SyncMessage::Notice { notice, .. } => match notice {
                ChannelNotice::ConnectionSuspended => {
                    self.on_connection_suspended();
                    false
                }
                ChannelNotice::ConnectionFailed(reason) => {
                    self.on_connection_failed(&reason);
                    false
                }
                ChannelNotice::Data(event) => self.on_data_event(event),
            },
            SyncMessage::PeerChosen { peer, .. } => {
                match &peer {
                    Some(peer) => {
                        log::info!("using peer {} ({})", peer.display_name, peer.id);
                        self.stage = SyncStage::FetchingPayload;
                    }
                    None => {
                        log::info!("no paired peer connected");
                        self.stage = SyncStage::Ready;
                    }
                }
                self.peer = peer;
                false
            }
            SyncMessage::PayloadFetched { payload, .. } => match payload {
                Some(data) => self.apply_payload(&data),
                None => {
                    log::info!("no weather data at {} yet", self.data_path);
                    self.stage = SyncStage::Ready;
                    false
                }
            },
            SyncMessage::Subscribed { result, .. } => {
                match result {
                    Ok(()) => {
                        log::debug!("listening for changes under {}", self.data_path);
                        self.subscribed = true;
                    }
                    Err(e) => {
                        log::warn!("{}", SyncError::Subscribe(e));
                        self.stage = SyncStage::Failed;
                    }
                }
                false
            }
            SyncMessage::IconResolved {
                generation, result, ..
            } => self.on_icon_resolved(generation, result),
            SyncMessage::StageFailed { error, .. } => {
                log::warn!("{}", error);
                self.stage = SyncStage::Failed;
                false
            }
        }
    }

    fn on_connected(&mut self) {
        log::info!("companion channel connected");
        self.state = ConnectionState::Connected;
        self.stage = SyncStage::DiscoveringPeer;
        self.peer = None;

        let Some(notices) = self.notices.clone() else {
            return;
        };
        tokio::spawn(initial_sync(
            Arc::clone(&self.channel),
            self.session,
            self.data_path.clone(),
            self.tie_break,
            notices,
            self.messages.clone(),
        ));
    }

    fn on_connection_suspended(&mut self) {
        log::warn!("companion connection suspended");
        self.drop_session();
    }

    fn on_connection_failed(&mut self, reason: &str) {
        log::warn!("companion connection failed: {}", reason);
        self.drop_session();
    }

    /// Back to a state the next `connect()` can recover from.
    fn drop_session(&mut self) {
        self.session += 1;
        self.state = ConnectionState::Disconnected;
        self.stage = SyncStage::Idle;
        self.subscribed = false;
        self.peer = None;
        self.notices = None;
    }

    /// Feed entries can overtake the `Subscribed` result; the session tag alone
    /// decides whether they still apply.
    fn on_data_event(&mut self, event: DataEvent) -> bool {
        match event {
            DataEvent::Changed { path, data } if path == self.data_path => {
                log::info!("weather data changed");
                self.apply_payload(&data)
            }
            DataEvent::Deleted { path } if path == self.data_path => {
                log::debug!("weather data deleted, keeping last snapshot");
                false
            }
            other => {
                log::debug!("ignoring change at {}", other.path());
                false
            }
        }
    }

    /// Publish the temperatures right away and start resolving the icon.
    fn apply_payload(&mut self, data: &DataMap) -> bool {
        let high = data.get_text(HIGH_TEMP_KEY).map(str::to_owned);
        let low = data.get_text(LOW_TEMP_KEY).map(str::to_owned);
        log::info!("high temp: {:?}, low temp: {:?}", high, low);

        self.generation += 1;
        self.snapshot = Arc::new(self.snapshot.with_temperatures(high, low));

        match data.get_asset(WEATHER_ICON_KEY) {
            Some(asset) => {
                self.stage = SyncStage::DecodingAsset;
                tokio::spawn(resolve_icon(
                    Arc::clone(&self.channel),
                    asset.clone(),
                    self.session,
                    self.generation,
                    self.messages.clone(),
                ));
            }
            None => {
                log::warn!("payload carries no weather icon");
                self.stage = SyncStage::Ready;
            }
        }
        true
    }

    fn on_icon_resolved(&mut self, generation: u64, result: Result<Icon, SyncError>) -> bool {
        if generation != self.generation {
            log::debug!("dropping icon for superseded payload {}", generation);
            return false;
        }
        match result {
            Ok(icon) => {
                log::debug!("weather icon decoded ({}x{})", icon.width(), icon.height());
                self.snapshot = Arc::new(self.snapshot.with_icon(Arc::new(icon)));
                self.stage = SyncStage::Ready;
                true
            }
            Err(SyncError::Icon(e)) => {
                log::warn!("icon decode failed: {}, clearing icon", e);
                self.stage = SyncStage::Failed;
                if self.snapshot.icon.is_some() {
                    self.snapshot = Arc::new(self.snapshot.without_icon());
                    true
                } else {
                    false
                }
            }
            Err(e) => {
                log::warn!("{}", e);
                self.stage = SyncStage::Failed;
                false
            }
        }
    }
}

/// Discover a peer, fetch its payload, then subscribe to live updates.
async fn initial_sync<C: RemoteChannel>(
    channel: Arc<C>,
    session: u64,
    path: String,
    tie_break: PeerTieBreak,
    notices: NoticeSink,
    messages: mpsc::UnboundedSender<SyncMessage>,
) {
    let peer = match channel.list_peers().await {
        Ok(peers) => {
            log::debug!("{} peer(s) connected", peers.len());
            let peer = tie_break.choose(peers);
            let _ = messages.send(SyncMessage::PeerChosen {
                session,
                peer: peer.clone(),
            });
            peer
        }
        Err(e) => {
            let _ = messages.send(SyncMessage::StageFailed {
                session,
                error: SyncError::Discovery(e),
            });
            None
        }
    };

    if let Some(peer) = peer {
        let message = match channel.fetch(&peer, &path).await {
            Ok(payload) => SyncMessage::PayloadFetched { session, payload },
            Err(e) => SyncMessage::StageFailed {
                session,
                error: SyncError::Fetch(e),
            },
        };
        let _ = messages.send(message);
    }

    let result = channel.subscribe(&path, notices).await;
    let _ = messages.send(SyncMessage::Subscribed { session, result });
}

/// Resolve an icon asset to bytes and decode it.
async fn resolve_icon<C: RemoteChannel>(
    channel: Arc<C>,
    asset: AssetRef,
    session: u64,
    generation: u64,
    messages: mpsc::UnboundedSender<SyncMessage>,
) {
    let result = match channel.resolve_asset(&asset).await {
        Ok(Some(bytes)) => Icon::decode(&bytes).map_err(SyncError::from),
        Ok(None) => Err(SyncError::AssetMissing(asset)),
        Err(e) => Err(SyncError::Asset(e)),
    };
    let _ = messages.send(SyncMessage::IconResolved {
        session,
        generation,
        result,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companion::LoopbackChannel;
    use crate::icon::tests::png_bytes;
    use crate::remote::DataValue;
    use std::time::Duration;

    const PATH: &str = "/sunshine";

    struct Harness<C: RemoteChannel = LoopbackChannel> {
        channel: Arc<C>,
        service: WeatherSyncService<C>,
        rx: mpsc::UnboundedReceiver<SyncMessage>,
        redraws: usize,
    }

    impl Harness {
        fn new(tie_break: PeerTieBreak) -> Self {
            Harness::with_channel(LoopbackChannel::new(), tie_break)
        }
    }

    impl<C: RemoteChannel> Harness<C> {
        fn with_channel(channel: C, tie_break: PeerTieBreak) -> Self {
            let channel = Arc::new(channel);
            let (tx, rx) = mpsc::unbounded_channel();
            let config = SyncConfig {
                data_path: PATH.to_string(),
                peer_tie_break: tie_break,
            };
            let service = WeatherSyncService::new(Arc::clone(&channel), &config, tx);
            Harness {
                channel,
                service,
                rx,
                redraws: 0,
            }
        }

        /// Apply messages until nothing arrives for a short while.
        async fn settle(&mut self) {
            while let Ok(Some(message)) =
                tokio::time::timeout(Duration::from_millis(50), self.rx.recv()).await
            {
                if self.service.apply(message) {
                    self.redraws += 1;
                }
            }
        }
    }

    /// Loopback companion with a slow disconnect and an optional change
    /// published the moment a subscription is registered.
    #[derive(Default)]
    struct RacyChannel {
        inner: LoopbackChannel,
        disconnect_delay: Duration,
        on_subscribe: Option<(String, DataMap)>,
    }

    impl std::ops::Deref for RacyChannel {
        type Target = LoopbackChannel;

        fn deref(&self) -> &LoopbackChannel {
            &self.inner
        }
    }

    impl RemoteChannel for RacyChannel {
        async fn connect(&self, notices: NoticeSink) -> Result<(), ChannelError> {
            self.inner.connect(notices).await
        }

        async fn disconnect(&self) {
            tokio::time::sleep(self.disconnect_delay).await;
            self.inner.disconnect().await
        }

        async fn list_peers(&self) -> Result<Vec<PeerHandle>, ChannelError> {
            self.inner.list_peers().await
        }

        async fn fetch(
            &self,
            peer: &PeerHandle,
            path: &str,
        ) -> Result<Option<DataMap>, ChannelError> {
            self.inner.fetch(peer, path).await
        }

        async fn subscribe(&self, path_prefix: &str, sink: NoticeSink) -> Result<(), ChannelError> {
            self.inner.subscribe(path_prefix, sink).await?;
            if let Some((peer, data)) = &self.on_subscribe {
                self.inner.publish(peer, PATH, data.clone());
            }
            Ok(())
        }

        async fn unsubscribe(&self) {
            self.inner.unsubscribe().await
        }

        async fn resolve_asset(&self, asset: &AssetRef) -> Result<Option<Vec<u8>>, ChannelError> {
            self.inner.resolve_asset(asset).await
        }
    }

    fn payload(high: &str, low: &str, icon: Option<&str>) -> DataMap {
        let mut data = DataMap::new();
        data.insert(HIGH_TEMP_KEY, DataValue::Text(high.into()))
            .insert(LOW_TEMP_KEY, DataValue::Text(low.into()));
        if let Some(icon) = icon {
            data.insert(WEATHER_ICON_KEY, DataValue::Asset(AssetRef(icon.into())));
        }
        data
    }

    #[tokio::test]
    async fn test_initial_fetch_publishes_temperatures_and_icon() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.channel
            .put_asset(AssetRef("sun".into()), png_bytes(16, 16, [255, 200, 0, 255]));
        h.channel.publish("A", PATH, payload("75°", "54°", Some("sun")));

        h.service.connect();
        h.settle().await;

        let snapshot = h.service.snapshot();
        assert_eq!(snapshot.temperature_pair(), Some(("75°", "54°")));
        assert_eq!(snapshot.icon.as_ref().map(|i| i.width()), Some(16));
        assert_eq!(h.service.state(), ConnectionState::Connected);
        assert_eq!(h.service.stage(), SyncStage::Ready);
        assert!(h.service.is_subscribed());
        // Temperatures and icon land in separate redraws
        assert_eq!(h.redraws, 2);
    }

    #[tokio::test]
    async fn test_last_peer_wins() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "old phone"));
        h.channel.add_peer(PeerHandle::new("B", "new phone"));
        h.channel.publish("A", PATH, payload("1°", "0°", None));
        h.channel.publish("B", PATH, payload("75°", "54°", None));

        h.service.connect();
        h.settle().await;

        assert_eq!(h.service.peer().map(|p| p.id.as_str()), Some("B"));
        assert_eq!(h.service.snapshot().high_temp.as_deref(), Some("75°"));
    }

    #[tokio::test]
    async fn test_first_wins_when_configured() {
        let mut h = Harness::new(PeerTieBreak::FirstWins);
        h.channel.add_peer(PeerHandle::new("A", "old phone"));
        h.channel.add_peer(PeerHandle::new("B", "new phone"));

        h.service.connect();
        h.settle().await;

        assert_eq!(h.service.peer().map(|p| p.id.as_str()), Some("A"));
    }

    #[tokio::test]
    async fn test_no_peer_is_steady_state() {
        let mut h = Harness::new(PeerTieBreak::LastWins);

        h.service.connect();
        h.settle().await;

        assert!(h.service.snapshot().is_empty());
        assert_eq!(h.service.stage(), SyncStage::Ready);
        // Still listening so a later pairing is picked up
        assert!(h.service.is_subscribed());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.service.connect();
        h.service.connect();
        h.settle().await;
        h.service.connect();
        h.settle().await;

        assert_eq!(h.channel.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_is_recoverable() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.channel.publish("A", PATH, payload("75°", "54°", None));
        h.channel.set_connect_failure(Some("radio off".into()));

        h.service.connect();
        h.settle().await;
        assert_eq!(h.service.state(), ConnectionState::Disconnected);
        assert!(h.service.snapshot().is_empty());

        h.channel.set_connect_failure(None);
        h.service.connect();
        h.settle().await;
        assert_eq!(h.service.state(), ConnectionState::Connected);
        assert_eq!(h.service.snapshot().low_temp.as_deref(), Some("54°"));
    }

    #[tokio::test]
    async fn test_suspension_notice_disconnects_without_retry() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.service.connect();
        h.settle().await;

        h.channel.suspend_connection();
        h.settle().await;

        assert_eq!(h.service.state(), ConnectionState::Disconnected);
        assert!(!h.service.is_subscribed());
        assert_eq!(h.channel.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_live_update_replaces_temperatures_keeps_icon() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.channel
            .put_asset(AssetRef("sun".into()), png_bytes(8, 8, [255, 255, 0, 255]));
        h.channel.publish("A", PATH, payload("75°", "54°", Some("sun")));
        h.service.connect();
        h.settle().await;

        h.channel.publish("A", PATH, payload("60°", "40°", None));
        h.settle().await;

        let snapshot = h.service.snapshot();
        assert_eq!(snapshot.temperature_pair(), Some(("60°", "40°")));
        assert!(snapshot.icon.is_some());
    }

    #[tokio::test]
    async fn test_malformed_icon_keeps_temperatures() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.channel
            .put_asset(AssetRef("broken".into()), b"not an image".to_vec());
        h.channel.publish("A", PATH, payload("75°", "54°", Some("broken")));

        h.service.connect();
        h.settle().await;

        let snapshot = h.service.snapshot();
        assert_eq!(snapshot.temperature_pair(), Some(("75°", "54°")));
        assert!(snapshot.icon.is_none());
        assert_eq!(h.service.stage(), SyncStage::Failed);

        // A later good icon updates only the icon
        h.channel
            .put_asset(AssetRef("good".into()), png_bytes(4, 4, [0, 0, 255, 255]));
        h.channel.publish("A", PATH, payload("75°", "54°", Some("good")));
        h.settle().await;

        let snapshot = h.service.snapshot();
        assert_eq!(snapshot.temperature_pair(), Some(("75°", "54°")));
        assert!(snapshot.icon.is_some());
        assert_eq!(h.service.stage(), SyncStage::Ready);
    }

    #[tokio::test]
    async fn test_unknown_asset_leaves_icon_unset() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.channel.publish("A", PATH, payload("75°", "54°", Some("missing")));

        h.service.connect();
        h.settle().await;

        assert!(h.service.snapshot().icon.is_none());
        assert_eq!(h.service.snapshot().high_temp.as_deref(), Some("75°"));
    }

    #[tokio::test]
    async fn test_delete_event_is_noop() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.channel.publish("A", PATH, payload("75°", "54°", None));
        h.service.connect();
        h.settle().await;
        let redraws = h.redraws;

        h.channel.delete("A", PATH);
        h.settle().await;

        assert_eq!(h.service.snapshot().high_temp.as_deref(), Some("75°"));
        assert_eq!(h.redraws, redraws);
    }

    #[tokio::test]
    async fn test_other_paths_are_ignored() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.service.connect();
        h.settle().await;

        h.channel
            .publish("A", "/sunshine-settings", payload("1°", "2°", None));
        h.settle().await;

        assert!(h.service.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_events_after_suspend_are_dropped() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.service.connect();
        h.settle().await;

        // Event already queued before teardown
        h.channel.publish("A", PATH, payload("99°", "98°", None));
        h.service.suspend();
        h.settle().await;

        assert!(h.service.snapshot().is_empty());
        assert!(!h.channel.is_subscribed());
        assert!(!h.channel.is_connected());
    }

    #[tokio::test]
    async fn test_icon_for_superseded_payload_is_dropped() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.service.connect();
        h.settle().await;

        // Payload 1 starts an icon fetch, payload 2 supersedes it before it lands
        h.service.apply_payload(&payload("1°", "0°", Some("old")));
        let stale_generation = h.service.generation;
        h.service.apply_payload(&payload("2°", "1°", None));

        let icon = Icon::decode(&png_bytes(2, 2, [1, 2, 3, 255])).unwrap();
        let changed = h.service.apply(SyncMessage::IconResolved {
            session: h.service.session,
            generation: stale_generation,
            result: Ok(icon),
        });

        assert!(!changed);
        assert!(h.service.snapshot().icon.is_none());
    }

    #[tokio::test]
    async fn test_malformed_icon_clears_previous_icon() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.channel
            .put_asset(AssetRef("sun".into()), png_bytes(8, 8, [255, 255, 0, 255]));
        h.channel.publish("A", PATH, payload("75°", "54°", Some("sun")));
        h.service.connect();
        h.settle().await;
        assert!(h.service.snapshot().icon.is_some());

        h.channel
            .put_asset(AssetRef("broken".into()), b"not an image".to_vec());
        h.channel.publish("A", PATH, payload("40°", "30°", Some("broken")));
        h.settle().await;

        let snapshot = h.service.snapshot();
        assert!(snapshot.icon.is_none());
        assert_eq!(snapshot.temperature_pair(), Some(("40°", "30°")));
        assert_eq!(h.service.stage(), SyncStage::Failed);
    }

    #[tokio::test]
    async fn test_missing_asset_keeps_previous_icon() {
        let mut h = Harness::new(PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.channel
            .put_asset(AssetRef("sun".into()), png_bytes(8, 8, [255, 255, 0, 255]));
        h.channel.publish("A", PATH, payload("75°", "54°", Some("sun")));
        h.service.connect();
        h.settle().await;

        h.channel.publish("A", PATH, payload("40°", "30°", Some("gone")));
        h.settle().await;

        assert!(h.service.snapshot().icon.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_hide_show_waits_for_teardown() {
        let channel = RacyChannel {
            disconnect_delay: Duration::from_millis(20),
            ..RacyChannel::default()
        };
        let mut h = Harness::with_channel(channel, PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.channel.publish("A", PATH, payload("75°", "54°", None));
        h.service.connect();
        h.settle().await;

        h.service.suspend();
        h.service.connect();
        h.settle().await;

        assert_eq!(h.service.state(), ConnectionState::Connected);
        assert_eq!(h.service.stage(), SyncStage::Ready);
        assert!(h.channel.is_connected());
        assert!(h.channel.is_subscribed());

        // The new session still receives live updates
        h.channel.publish("A", PATH, payload("80°", "60°", None));
        h.settle().await;
        assert_eq!(h.service.snapshot().temperature_pair(), Some(("80°", "60°")));
        assert_eq!(h.channel.connect_calls(), 2);
    }

    #[tokio::test]
    async fn test_change_published_at_subscription_is_applied() {
        let channel = RacyChannel {
            on_subscribe: Some(("A".to_string(), payload("80°", "60°", None))),
            ..RacyChannel::default()
        };
        let mut h = Harness::with_channel(channel, PeerTieBreak::LastWins);
        h.channel.add_peer(PeerHandle::new("A", "phone"));
        h.channel.publish("A", PATH, payload("75°", "54°", None));

        h.service.connect();
        h.settle().await;

        assert_eq!(h.service.snapshot().temperature_pair(), Some(("80°", "60°")));
        assert!(h.service.is_subscribed());
    }
}
