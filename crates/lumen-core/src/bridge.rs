// ── Bridge abstraction ──
//
// Connection lifecycle for one bridge: the initial snapshot, the push
// event stream, mutations with validation and write throttling, and the
// entry point for entertainment sessions. Both the snapshot and the
// stream feed the same `ResourceStore`.

use std::sync::Arc;
use std::time::Duration;

use lumen_api::{
    ClipClient, DatagramConnector, EventStreamHandle, StreamCredentials, StreamMessage,
};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::entertainment::EntertainmentSession;
use crate::error::CoreError;
use crate::event::RegistryEvent;
use crate::model::{
    EntertainmentConfiguration, LightCommand, Resource, ResourceKey, ResourceType,
};
use crate::store::{ResourceStore, SnapshotStats};
use crate::stream::ResourceStream;
use crate::validate::{validate_create, validate_update};
use crate::writes::{Decision, WriteOutcome, WriteThrottle};

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Snapshot loaded; the event stream (if enabled) is live.
    Connected,
    /// The event stream dropped and is backing off.
    Reconnecting,
    Failed,
}

// ── Bridge ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<BridgeInner>`.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    store: Arc<ResourceStore>,
    clip: Arc<ClipClient>,
    connection_state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    /// Child token for the current connection; replaced on reconnect.
    cancel_child: Mutex<CancellationToken>,
    event_stream: Mutex<Option<EventStreamHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    throttle: WriteThrottle,
}

impl Bridge {
    /// Build a bridge client. Does NOT connect; call
    /// [`connect()`](Self::connect) to load the snapshot and start streaming.
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let clip = ClipClient::new(config.url.clone(), &config.app_key, &config.transport())?;
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();
        let throttle = WriteThrottle::new(config.write_throttle);

        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                store: Arc::new(ResourceStore::new()),
                clip: Arc::new(clip),
                connection_state,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                event_stream: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
                throttle,
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.inner.store
    }

    pub fn clip(&self) -> &Arc<ClipClient> {
        &self.inner.clip
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Load the full snapshot, then open the event stream if enabled.
    pub async fn connect(&self) -> Result<SnapshotStats, CoreError> {
        let _ = self.inner.connection_state.send(ConnectionState::Connecting);

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let stats = match self.refresh_resources().await {
            Ok(stats) => stats,
            Err(e) => {
                let _ = self.inner.connection_state.send(ConnectionState::Failed);
                return Err(e);
            }
        };
        info!(resources = self.inner.store.len(), "Initial snapshot loaded");

        if self.inner.config.event_stream_enabled {
            self.spawn_event_stream(&child).await?;
        }

        let _ = self.inner.connection_state.send(ConnectionState::Connected);
        Ok(stats)
    }

    async fn spawn_event_stream(&self, cancel: &CancellationToken) -> Result<(), CoreError> {
        let config = &self.inner.config;
        let stream_cancel = cancel.child_token();
        let handle = EventStreamHandle::connect(
            &config.url,
            &config.app_key,
            &config.transport(),
            (&config.reconnect).into(),
            stream_cancel.clone(),
        )?;

        // Bridge task: stream messages → store / registry events.
        let mut rx = handle.subscribe();
        let bridge = self.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = stream_cancel.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(StreamMessage::Batch(envelope)) => {
                            for container in &envelope.batch {
                                bridge.inner.store.apply_event(container);
                            }
                        }
                        Ok(StreamMessage::Connected { reconnected }) => {
                            let _ = bridge.inner.connection_state.send(ConnectionState::Connected);
                            bridge.inner.store.emit(RegistryEvent::StreamConnected);
                            if reconnected {
                                // Events may have been missed while down.
                                if let Err(e) = bridge.refresh_resources().await {
                                    warn!(error = %e, "Refresh after reconnect failed");
                                }
                            }
                        }
                        Ok(StreamMessage::Disconnected { reason }) => {
                            let _ = bridge.inner.connection_state.send(ConnectionState::Reconnecting);
                            bridge.inner.store.emit(RegistryEvent::StreamDisconnected { reason });
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Event stream receiver lagged, refreshing");
                            if let Err(e) = bridge.refresh_resources().await {
                                warn!(error = %e, "Refresh after lag failed");
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        self.inner.task_handles.lock().await.push(task);
        *self.inner.event_stream.lock().await = Some(handle);
        info!("Event stream spawned");
        Ok(())
    }

    /// Stop the event stream and background tasks. Queued writes finish.
    pub async fn disconnect(&self) {
        self.inner.cancel_child.lock().await.cancel();

        if let Some(handle) = self.inner.event_stream.lock().await.take() {
            handle.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        let _ = self.inner.connection_state.send(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// Connect without the event stream, run `f`, disconnect.
    pub async fn oneshot<F, Fut, T>(config: BridgeConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Bridge) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.event_stream_enabled = false;

        let bridge = Bridge::new(cfg)?;
        bridge.connect().await?;
        let result = f(bridge.clone()).await;
        bridge.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<RegistryEvent> {
        self.inner.store.subscribe()
    }

    pub fn resources(&self, rtype: ResourceType) -> Arc<Vec<Arc<Resource>>> {
        self.inner.store.by_type(rtype)
    }

    pub fn resource(&self, key: &ResourceKey) -> Option<Arc<Resource>> {
        self.inner.store.get(key)
    }

    pub fn subscribe_type(&self, rtype: ResourceType) -> Option<ResourceStream> {
        self.inner.store.subscribe_type(rtype)
    }

    pub fn entertainment_configurations(&self) -> Vec<EntertainmentConfiguration> {
        self.resources(ResourceType::EntertainmentConfiguration)
            .iter()
            .filter_map(|r| EntertainmentConfiguration::from_resource(r))
            .collect()
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Reconcile the store against a full `GET` of every resource.
    pub async fn refresh_resources(&self) -> Result<SnapshotStats, CoreError> {
        let items: Vec<Value> = self.reported(
            self.inner
                .clip
                .list_resources()
                .await
                .map_err(CoreError::from),
        )?;
        let stats = self.inner.store.apply_snapshot(&items, None);
        info!(
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            "Resources refreshed"
        );
        Ok(stats)
    }

    /// Reconcile only `types`.
    async fn refetch(&self, types: &[ResourceType]) -> Result<SnapshotStats, CoreError> {
        let mut items = Vec::new();
        for rtype in types {
            let batch: Vec<Value> = self.reported(
                self.inner
                    .clip
                    .list_resources_of(rtype.as_ref())
                    .await
                    .map_err(CoreError::from),
            )?;
            items.extend(batch);
        }
        Ok(self.inner.store.apply_snapshot(&items, Some(types)))
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Create a resource and refetch every type the bridge reports as
    /// created. Returns the new identities.
    pub async fn create(&self, rtype: ResourceType, payload: Value) -> Result<Vec<ResourceKey>, CoreError> {
        self.reported(validate_create(rtype, &payload))?;

        let refs = self.reported(
            self.inner
                .clip
                .create_resource(rtype.as_ref(), &payload)
                .await
                .map_err(CoreError::from),
        )?;
        let created: Vec<ResourceKey> = refs.iter().filter_map(ResourceKey::from_ref).collect();
        debug!(?created, "Resources created");

        // A create can cascade into dependent resources of other types.
        let mut types = vec![rtype];
        for key in &created {
            if !types.contains(&key.rtype) {
                types.push(key.rtype);
            }
        }
        self.refetch(&types).await?;
        Ok(created)
    }

    /// Write `payload` to `key`, subject to the per-resource throttle.
    pub async fn update(&self, key: ResourceKey, payload: Value) -> Result<WriteOutcome, CoreError> {
        self.reported(validate_update(key.rtype, &payload))?;
        let fields = payload.as_object().cloned().unwrap_or_default();

        match self.inner.throttle.submit(key, &fields) {
            Decision::Send(body) => self.write_now(key, body).await.map(|()| WriteOutcome::Sent),
            Decision::Schedule(delay) => {
                self.schedule_flush(key, delay);
                Ok(WriteOutcome::Deferred)
            }
            Decision::Wait => Ok(WriteOutcome::Deferred),
        }
    }

    pub async fn delete(&self, key: ResourceKey) -> Result<(), CoreError> {
        self.reported(
            self.inner
                .clip
                .delete_resource(key.rtype.as_ref(), &key.id)
                .await
                .map_err(CoreError::from),
        )?;
        self.inner.throttle.forget(&key);
        self.inner.store.remove(&key);
        Ok(())
    }

    /// Apply a light command, unless the target can't do it.
    ///
    /// Each missing capability is announced as
    /// [`RegistryEvent::UnsupportedCapability`] and nothing is sent.
    /// Colours are pulled into the target's gamut.
    pub async fn set_light(&self, key: ResourceKey, command: &LightCommand) -> Result<WriteOutcome, CoreError> {
        if !key.rtype.is_light_like() {
            return self.reported(Err(CoreError::validation(format!(
                "{} is not a light or light group",
                key.rtype
            ))));
        }
        let resource = self.require(&key)?;
        let available = resource.capabilities();

        let missing: Vec<_> = command
            .required_capabilities()
            .into_iter()
            .filter(|c| !available.contains(c))
            .collect();
        if !missing.is_empty() {
            for capability in missing {
                debug!(%key, ?capability, "Unsupported capability, skipping write");
                self.inner
                    .store
                    .emit(RegistryEvent::UnsupportedCapability { key, capability });
            }
            return Ok(WriteOutcome::Unsupported);
        }

        let payload = match resource.gamut() {
            Some(gamut) => command.clone().clamped_to(&gamut).to_payload(),
            None => command.to_payload(),
        };
        self.update(key, payload).await
    }

    async fn write_now(&self, key: ResourceKey, body: Map<String, Value>) -> Result<(), CoreError> {
        let result = self
            .inner
            .clip
            .update_resource(key.rtype.as_ref(), &key.id, &Value::Object(body))
            .await
            .map(drop)
            .map_err(CoreError::from);

        match self.inner.throttle.finish(key, result.is_ok()) {
            Decision::Schedule(delay) => self.schedule_flush(key, delay),
            Decision::Send(_) | Decision::Wait => {}
        }
        self.reported(result)
    }

    fn schedule_flush(&self, key: ResourceKey, delay: Duration) {
        let bridge = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match bridge.inner.throttle.flush(key) {
                Decision::Send(body) => {
                    if let Err(e) = bridge.write_now(key, body).await {
                        debug!(%key, error = %e, "Deferred write failed");
                    }
                }
                Decision::Schedule(delay) => bridge.schedule_flush(key, delay),
                Decision::Wait => {}
            }
        });
    }

    // ── Entertainment ────────────────────────────────────────────

    /// Datagram credentials: app key as identity, client key as PSK.
    pub fn stream_credentials(&self) -> Result<StreamCredentials, CoreError> {
        let config = &self.inner.config;
        let host = config.host().ok_or_else(|| CoreError::StreamingUnavailable {
            reason: "bridge URL has no host".into(),
        })?;
        let client_key = config
            .client_key
            .clone()
            .ok_or_else(|| CoreError::StreamingUnavailable {
                reason: "no client key; pair again with client key generation".into(),
            })?;

        let mut credentials =
            StreamCredentials::new(host, config.app_key.expose_secret(), client_key);
        credentials.port = config.entertainment_port;
        Ok(credentials)
    }

    /// A session for a stored configuration. Its channels follow later
    /// changes to that configuration until the bridge disconnects.
    pub fn entertainment_session(
        &self,
        config_id: Uuid,
        connector: Arc<dyn DatagramConnector>,
    ) -> Result<EntertainmentSession, CoreError> {
        let key = ResourceKey::new(ResourceType::EntertainmentConfiguration, config_id);
        let resource = self.require(&key)?;
        let configuration = EntertainmentConfiguration::from_resource(&resource)
            .ok_or_else(|| CoreError::Internal(format!("{key} is not an entertainment configuration")))?;

        let session = EntertainmentSession::new(
            Arc::clone(&self.inner.clip),
            Arc::clone(&self.inner.store),
            connector,
            self.stream_credentials()?,
            &configuration,
        );
        session.watch_configuration(Arc::clone(&self.inner.store), self.inner.cancel.child_token());
        Ok(session)
    }

    /// A session whose configuration is created from `body` on `start()`.
    pub fn new_entertainment_session(
        &self,
        body: Value,
        connector: Arc<dyn DatagramConnector>,
    ) -> Result<EntertainmentSession, CoreError> {
        self.reported(validate_create(ResourceType::EntertainmentConfiguration, &body))?;
        Ok(EntertainmentSession::unsaved(
            Arc::clone(&self.inner.clip),
            Arc::clone(&self.inner.store),
            connector,
            self.stream_credentials()?,
            body,
        ))
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn require(&self, key: &ResourceKey) -> Result<Arc<Resource>, CoreError> {
        let found = self.inner.store.get(key).ok_or_else(|| CoreError::ResourceNotFound {
            rtype: key.rtype.to_string(),
            id: key.id.to_string(),
        });
        self.reported(found)
    }

    /// Announce a failure on the registry event channel, then hand it back.
    fn reported<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(e) = &result {
            if e.is_rate_limited() {
                warn!("Bridge rate limit hit");
            } else {
                debug!(error = %e, "Bridge operation failed");
            }
            self.inner.store.emit(RegistryEvent::Error {
                errors: vec![e.report()],
            });
        }
        result
    }
}
