// ── Entertainment session ──
//
// Owns the light streams for one entertainment configuration and the
// fixed-rate frame loop that renders and sends them. The loop never
// awaits the network: datagrams go through a small bounded channel to a
// sender task (dropped when it lags), and custom-light REST writes go
// through the per-light `WriteQueue`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use lumen_api::{ClipClient, DatagramConnector, DatagramSink, StreamCredentials};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::frame::encode_frame;
use super::light_stream::LightStream;
use super::write_queue::WriteQueue;
use crate::error::CoreError;
use crate::event::RegistryEvent;
use crate::model::{Channel, EntertainmentConfiguration, ResourceKey, ResourceType};
use crate::store::ResourceStore;

/// Called once per tick, before animations run, with every light stream,
/// the frame number and the frame rate.
pub type FrameCallback = Arc<dyn Fn(&mut [LightStream], u64, u32) + Send + Sync>;

/// Frames queued for the socket before new ones are dropped.
const DATAGRAM_BACKLOG: usize = 4;

const RTYPE: ResourceType = ResourceType::EntertainmentConfiguration;

/// Tick length for `fps`: `round(1000 / fps)` milliseconds.
pub fn frame_period(fps: u32) -> Duration {
    let fps = u64::from(fps.max(1));
    Duration::from_millis(((1000 + fps / 2) / fps).max(1))
}

/// A streaming session for one entertainment configuration.
///
/// Cloning shares the session. Dropping the last clone ends the frame
/// loop.
#[derive(Clone)]
pub struct EntertainmentSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    clip: Arc<ClipClient>,
    /// Resolves channel members to lights and their gamuts.
    store: Arc<ResourceStore>,
    connector: Arc<dyn DatagramConnector>,
    credentials: StreamCredentials,
    config_id: Mutex<Option<Uuid>>,
    /// `POST` body used when the configuration does not exist yet.
    create_body: Option<Value>,
    topology: Mutex<Topology>,
    writes: WriteQueue<ResourceKey>,
    running: tokio::sync::Mutex<Option<Running>>,
    streaming: AtomicBool,
    frame: AtomicU64,
}

struct Running {
    cancel: CancellationToken,
    sink: Arc<dyn DatagramSink>,
}

#[derive(Default)]
struct Topology {
    channels: Vec<Channel>,
    custom: Vec<ResourceKey>,
    streams: Vec<LightStream>,
}

impl Topology {
    /// Discard every stream and recreate them in channel order, custom
    /// lights last. Each stream is bound to the light it renders on, as
    /// far as `store` can resolve it, and takes that light's gamut.
    fn rebuild(&mut self, store: &ResourceStore) {
        let gamut_of = |key: ResourceKey| store.get(&key).and_then(|r| r.gamut());

        let channels = self.channels.iter().map(|c| {
            let light = c.light_services(store).first().copied();
            LightStream::channel(c.channel_id, light).with_gamut(light.and_then(|k| gamut_of(k)))
        });
        let custom = self
            .custom
            .iter()
            .map(|&key| LightStream::custom(key).with_gamut(gamut_of(key)));
        self.streams = channels.chain(custom).collect();

        debug!(
            channels = self.channels.len(),
            custom = self.custom.len(),
            unresolved = self.streams.iter().filter(|s| s.light().is_none()).count(),
            "Light streams rebuilt"
        );
    }
}

impl EntertainmentSession {
    /// Session for a configuration that already exists on the bridge.
    pub fn new(
        clip: Arc<ClipClient>,
        store: Arc<ResourceStore>,
        connector: Arc<dyn DatagramConnector>,
        credentials: StreamCredentials,
        configuration: &EntertainmentConfiguration,
    ) -> Self {
        let session = Self::build(clip, store, connector, credentials, Some(configuration.id), None);
        session.set_channels(configuration.channels.clone());
        session
    }

    /// Session for a configuration that `start()` will create from `body`.
    pub fn unsaved(
        clip: Arc<ClipClient>,
        store: Arc<ResourceStore>,
        connector: Arc<dyn DatagramConnector>,
        credentials: StreamCredentials,
        body: Value,
    ) -> Self {
        Self::build(clip, store, connector, credentials, None, Some(body))
    }

    fn build(
        clip: Arc<ClipClient>,
        store: Arc<ResourceStore>,
        connector: Arc<dyn DatagramConnector>,
        credentials: StreamCredentials,
        config_id: Option<Uuid>,
        create_body: Option<Value>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                clip,
                store,
                connector,
                credentials,
                config_id: Mutex::new(config_id),
                create_body,
                topology: Mutex::new(Topology::default()),
                writes: WriteQueue::new(),
                running: tokio::sync::Mutex::new(None),
                streaming: AtomicBool::new(false),
                frame: AtomicU64::new(0),
            }),
        }
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn config_id(&self) -> Option<Uuid> {
        self.inner.config_id()
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.streaming.load(Ordering::Acquire)
    }

    /// Number of the next frame to be rendered.
    pub fn frame(&self) -> u64 {
        self.inner.frame.load(Ordering::Relaxed)
    }

    // ── Topology ─────────────────────────────────────────────────────

    /// Replace the channel list. All light streams are recreated.
    pub fn set_channels(&self, channels: Vec<Channel>) {
        let mut topo = self.inner.topology();
        topo.channels = channels;
        topo.rebuild(&self.inner.store);
    }

    /// Replace the set of non-protocol lights. All light streams are
    /// recreated.
    pub fn set_custom_lights(&self, lights: Vec<ResourceKey>) {
        let mut topo = self.inner.topology();
        topo.custom = lights;
        topo.rebuild(&self.inner.store);
    }

    /// Run `f` against the live light streams. Do not keep indices
    /// across a topology change.
    pub fn with_streams<R>(&self, f: impl FnOnce(&mut [LightStream]) -> R) -> R {
        f(&mut self.inner.topology().streams)
    }

    /// A copy of the current light streams.
    pub fn light_streams(&self) -> Vec<LightStream> {
        self.inner.topology().streams.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Begin streaming at `fps` frames per second.
    pub async fn start(&self, callback: Option<FrameCallback>, fps: u32) -> Result<(), CoreError> {
        if fps == 0 {
            return Err(CoreError::validation("fps must be at least 1"));
        }

        let inner = &self.inner;
        let mut running = inner.running.lock().await;
        if running.is_some() {
            return Err(CoreError::AlreadyStreaming);
        }

        let config_id = inner.ensure_created().await?;
        inner
            .clip
            .update_resource(RTYPE.as_ref(), &config_id, &json!({ "action": "start" }))
            .await?;

        let sink = match inner.connector.connect(&inner.credentials).await {
            Ok(sink) => sink,
            Err(e) => {
                inner.send_stop(&config_id).await;
                return Err(e.into());
            }
        };

        let cancel = CancellationToken::new();
        spawn_frame_loop(
            Arc::downgrade(inner),
            config_id,
            Arc::clone(&sink),
            callback,
            fps,
            cancel.clone(),
        );
        spawn_close_watcher(Arc::downgrade(inner), sink.closed(), cancel.clone());

        *running = Some(Running { cancel, sink });
        inner.streaming.store(true, Ordering::Release);
        info!(%config_id, fps, "Entertainment streaming started");
        Ok(())
    }

    /// Stop the frame loop, release the configuration and close the
    /// socket. A failed release is ignored; the bridge may already have
    /// taken the stream back.
    pub async fn stop(&self) -> Result<(), CoreError> {
        self.inner.stop().await
    }

    /// Rebuild channels whenever the stored configuration's channel list
    /// changes. Ends with `cancel`, the store, or the session.
    pub(crate) fn watch_configuration(&self, store: Arc<ResourceStore>, cancel: CancellationToken) {
        let weak = Arc::downgrade(&self.inner);
        let mut events = store.subscribe();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    event = events.recv() => event,
                };

                let recheck = match event {
                    Ok(RegistryEvent::Updated { key, fields }) => {
                        key.rtype == RTYPE && fields.iter().any(|f| f == "channels")
                    }
                    Ok(_) => false,
                    // Can't tell what was missed; re-read to be safe.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Topology watcher lagged");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if !recheck {
                    continue;
                }

                let Some(inner) = weak.upgrade() else { break };
                let Some(id) = inner.config_id() else { continue };
                let Some(config) = store
                    .get(&ResourceKey::new(RTYPE, id))
                    .and_then(|r| EntertainmentConfiguration::from_resource(&r))
                else {
                    continue;
                };

                let mut topo = inner.topology();
                if topo.channels != config.channels {
                    topo.channels = config.channels;
                    topo.rebuild(&store);
                }
            }
        });
    }
}

impl SessionInner {
    fn topology(&self) -> MutexGuard<'_, Topology> {
        self.topology.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn config_id(&self) -> Option<Uuid> {
        *self.config_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn ensure_created(&self) -> Result<Uuid, CoreError> {
        if let Some(id) = self.config_id() {
            return Ok(id);
        }
        let body = self.create_body.as_ref().ok_or_else(|| CoreError::StreamingUnavailable {
            reason: "no entertainment configuration to stream to".into(),
        })?;

        let created = self.clip.create_resource(RTYPE.as_ref(), body).await?;
        let id = created
            .iter()
            .find(|r| r.rtype == RTYPE.as_ref())
            .map(|r| r.rid)
            .ok_or_else(|| CoreError::Internal("create returned no configuration id".into()))?;

        *self.config_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
        info!(config_id = %id, "Entertainment configuration created");
        Ok(id)
    }

    async fn send_stop(&self, config_id: &Uuid) {
        if let Err(e) = self
            .clip
            .update_resource(RTYPE.as_ref(), config_id, &json!({ "action": "stop" }))
            .await
        {
            debug!(error = %e, "Ignoring failed stop request");
        }
    }

    async fn stop(&self) -> Result<(), CoreError> {
        let Some(run) = self.running.lock().await.take() else {
            return Err(CoreError::NotStreaming);
        };
        run.cancel.cancel();
        self.streaming.store(false, Ordering::Release);

        if let Some(id) = self.config_id() {
            self.send_stop(&id).await;
        }
        if let Err(e) = run.sink.close().await {
            debug!(error = %e, "Ignoring socket close error");
        }
        info!("Entertainment streaming stopped");
        Ok(())
    }

    /// Render one frame: callback, animations, encode. Returns the
    /// datagram and the REST writes for custom lights.
    fn render_tick(
        &self,
        config_id: &Uuid,
        callback: Option<&FrameCallback>,
        fps: u32,
    ) -> (Vec<u8>, Vec<(ResourceKey, Value)>) {
        let frame = self.frame.fetch_add(1, Ordering::Relaxed);
        let mut topo = self.topology();

        if let Some(callback) = callback {
            callback(&mut topo.streams, frame, fps);
        }
        for stream in &mut topo.streams {
            stream.start_sequence(frame, fps);
        }

        let datagram = encode_frame(config_id, topo.streams.iter().filter_map(LightStream::channel_color));
        let writes = topo.streams.iter().filter_map(LightStream::custom_write).collect();
        trace!(frame, bytes = datagram.len(), "Frame rendered");
        (datagram, writes)
    }

    fn enqueue_write(&self, key: ResourceKey, body: Value) {
        let clip = Arc::clone(&self.clip);
        self.writes.enqueue(key, async move {
            if let Err(e) = clip.update_resource(key.rtype.as_ref(), &key.id, &body).await {
                debug!(%key, error = %e, "Custom light write failed");
            }
        });
    }
}

fn spawn_frame_loop(
    session: Weak<SessionInner>,
    config_id: Uuid,
    sink: Arc<dyn DatagramSink>,
    callback: Option<FrameCallback>,
    fps: u32,
    cancel: CancellationToken,
) {
    let (tx, rx) = mpsc::channel::<Vec<u8>>(DATAGRAM_BACKLOG);
    spawn_sender(sink, rx, cancel.clone());

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(frame_period(fps));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let Some(inner) = session.upgrade() else { break };

            let (datagram, writes) = inner.render_tick(&config_id, callback.as_ref(), fps);
            match tx.try_send(datagram) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("Datagram sender lagging, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
            for (key, body) in writes {
                inner.enqueue_write(key, body);
            }
        }
        debug!("Frame loop ended");
    });
}

fn spawn_sender(
    sink: Arc<dyn DatagramSink>,
    mut frames: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                frame = frames.recv() => frame,
            };
            let Some(frame) = frame else { break };
            if let Err(e) = sink.send(&frame).await {
                warn!(error = %e, "Datagram send failed, closing stream");
                // The close watcher turns this into a stop.
                let _ = sink.close().await;
                break;
            }
        }
    });
}

fn spawn_close_watcher(
    session: Weak<SessionInner>,
    closed: CancellationToken,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {}
            () = closed.cancelled() => {
                warn!("Entertainment socket closed, stopping session");
                if let Some(inner) = session.upgrade() {
                    let _ = inner.stop().await;
                }
            }
        }
    });
}
