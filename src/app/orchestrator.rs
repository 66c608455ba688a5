//! Node orchestrator
//!
//! Owns the three loops of a running node:
//!
//! - capture: camera -> local feed cache + encode pool -> FrameSender
//! - receive: socket -> Reassembler -> per-peer caches
//! - UI (the calling thread): input -> ViewState / TransitionSession -> Display
//!
//! Only the UI loop touches view state, the transition session and the
//! display. The capture and receive loops stop on the shared
//! [`SessionLifecycle`] signal.

use parking_lot::Mutex;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::app::lifecycle::{LoopHandle, SessionLifecycle};
use crate::app::workers::{EncodePool, EncodeQueue, PoolStats};
use crate::codec::{FrameCodec, RleCodec};
use crate::config::AppConfig;
use crate::constants::{CAPTURE_IDLE, ENCODE_QUEUE_DEPTH, ENCODE_WORKERS, LOOP_JOIN_TIMEOUT, STATS_INTERVAL, UI_TICK};
use crate::display::Display;
use crate::effects::GlitchRenderer;
use crate::error::Result;
use crate::input::{key_queue, ButtonListener, KeyInjector, KeyQueue};
use crate::media::{create_shared_cache, open_camera, Camera, Frame, SharedFrameCache};
use crate::network::{create_send_socket, DatagramReceiver, FrameSender, ReceiverStats};
use crate::peers::{FeedId, PeerDirectory, PeerId};
use crate::stream::{FeedCaches, Reassembler, ReassemblyStats};
use crate::transition::{default_clip_opener, ClipStep, TransitionSession};
use crate::view::{Action, ViewMode, ViewState};

type SharedCamera = Arc<Mutex<Box<dyn Camera>>>;

pub struct Orchestrator<D: Display> {
    config: AppConfig,
    self_id: PeerId,
    directory: PeerDirectory,
    lifecycle: SessionLifecycle,

    camera: SharedCamera,
    receiver: Option<DatagramReceiver>,
    reassembler: Option<Reassembler>,
    sender: Arc<FrameSender>,
    codec: Arc<dyn FrameCodec>,

    feeds: FeedCaches,
    local_feed: SharedFrameCache,

    view: ViewState,
    transition: TransitionSession,
    glitch: GlitchRenderer,
    display: D,

    keys: KeyQueue,
    injector: KeyInjector,
    buttons: Option<ButtonListener>,

    receiver_stats: Arc<ReceiverStats>,
    reassembly_stats: Arc<ReassemblyStats>,
}

impl<D: Display> Orchestrator<D> {
    /// Open the configured camera and sockets.
    ///
    /// Fails only on the fatal startup conditions: invalid configuration,
    /// camera unavailable, socket setup failure.
    pub fn new(config: AppConfig, display: D, lifecycle: SessionLifecycle) -> Result<Self> {
        let camera = open_camera(&config.camera)?;
        Self::with_camera(config, camera, display, lifecycle)
    }

    /// Same as [`Orchestrator::new`] with an already opened camera
    pub fn with_camera(
        config: AppConfig,
        camera: Box<dyn Camera>,
        display: D,
        lifecycle: SessionLifecycle,
    ) -> Result<Self> {
        config.validate()?;
        let self_id = config.node.id.clone();
        let directory = config.peer_directory();
        let bindings = config.key_bindings()?;
        let network = &config.network;

        let receiver = DatagramReceiver::bind(network.udp_port, network.receive_timeout())?;
        let targets = directory.targets(&self_id, network.udp_port);
        tracing::info!("Sending to {} peers on port {}", targets.len(), network.udp_port);
        let sender = Arc::new(FrameSender::new(create_send_socket()?, targets, network.max_datagram));

        let others = directory.others(&self_id);
        let feeds = FeedCaches::new(&others, config.stream.cache_depth);
        let codec: Arc<dyn FrameCodec> = Arc::new(RleCodec);
        let reassembler = Reassembler::new(feeds.clone(), codec.clone(), network.reassembly_timeout());

        let view = ViewState::new(self_id.clone(), directory.clone(), bindings);
        let transition = TransitionSession::from_config(&config.transition, default_clip_opener());

        let (injector, keys) = key_queue();
        let buttons = config.buttons.port.as_deref().and_then(|port| {
            let Ok(code) = u8::try_from(config.buttons.release_key) else {
                tracing::warn!("Button release key {:?} is not a single byte", config.buttons.release_key);
                return None;
            };
            ButtonListener::open(port, config.buttons.baud, code, injector.clone())
        });

        Ok(Self {
            self_id,
            directory,
            lifecycle,
            camera: Arc::new(Mutex::new(camera)),
            receiver_stats: receiver.stats(),
            reassembly_stats: reassembler.stats(),
            receiver: Some(receiver),
            reassembler: Some(reassembler),
            sender,
            codec,
            feeds,
            local_feed: create_shared_cache(config.stream.cache_depth),
            view,
            transition,
            glitch: GlitchRenderer::new(),
            display,
            keys,
            injector,
            buttons,
            config,
        })
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    /// Handle for feeding keys from outside the UI loop
    pub fn key_injector(&self) -> KeyInjector {
        self.injector.clone()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn feeds(&self) -> &FeedCaches {
        &self.feeds
    }

    pub fn local_feed(&self) -> &SharedFrameCache {
        &self.local_feed
    }

    /// Run the node until Quit or cancellation, then shut down in order
    pub fn run(mut self) -> Result<()> {
        tracing::info!(
            "Node {} running: {} remote peers, mode {:?}",
            self.self_id,
            self.view.other_ids().len(),
            self.view.mode()
        );

        let pool = EncodePool::new(
            ENCODE_WORKERS,
            ENCODE_QUEUE_DEPTH,
            self.codec.clone(),
            self.config.codec.quality,
            self.sender.clone(),
        )?;
        let Some(queue) = pool.queue() else {
            return Err(io::Error::new(io::ErrorKind::Other, "encode pool closed").into());
        };

        let capture = self.spawn_capture(queue)?;
        let receive = match self.spawn_receive() {
            Ok(handle) => handle,
            Err(e) => {
                self.lifecycle.cancel();
                capture.join(LOOP_JOIN_TIMEOUT);
                return Err(e.into());
            }
        };

        self.ui_loop(&pool.stats());
        self.shutdown(capture, receive, pool);
        Ok(())
    }

    fn spawn_capture(&self, queue: EncodeQueue) -> io::Result<LoopHandle> {
        let camera = self.camera.clone();
        let local_feed = self.local_feed.clone();
        self.lifecycle
            .spawn_loop("capture", move |lc| capture_loop(lc, camera, queue, local_feed))
    }

    fn spawn_receive(&mut self) -> io::Result<LoopHandle> {
        let (Some(receiver), Some(reassembler)) = (self.receiver.take(), self.reassembler.take()) else {
            return Err(io::Error::new(io::ErrorKind::Other, "receive loop already started"));
        };
        let directory = self.directory.clone();
        let self_id = self.self_id.clone();
        self.lifecycle.spawn_loop("receive", move |lc| {
            receive_loop(lc, receiver, reassembler, directory, self_id)
        })
    }

    fn ui_loop(&mut self, pool_stats: &PoolStats) {
        let mut next_stats = Instant::now() + STATS_INTERVAL;
        while !self.lifecycle.is_cancelled() {
            let tick = Instant::now();
            if !self.step() {
                self.lifecycle.cancel();
                break;
            }

            if tick >= next_stats {
                self.log_stats(pool_stats);
                next_stats = tick + STATS_INTERVAL;
            }

            let elapsed = tick.elapsed();
            if elapsed < UI_TICK {
                thread::sleep(UI_TICK - elapsed);
            }
        }
    }

    /// One UI tick: at most one input event, then one render.
    ///
    /// Returns `false` when the operator asked to quit.
    pub fn step(&mut self) -> bool {
        if let Some(code) = self.next_key() {
            let action = self.view.handle_key(code);
            if !self.handle_action(action) {
                return false;
            }
        }
        self.render();
        true
    }

    fn next_key(&mut self) -> Option<u8> {
        self.display.poll_key().or_else(|| self.keys.try_next())
    }

    fn handle_action(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => {
                tracing::info!("Quit requested");
                return false;
            }
            Action::Switch { mode, target } => {
                if self.transition.arm() {
                    tracing::debug!("Switch to {:?} queued behind transition", mode);
                    self.view.queue_pending_view(mode, target);
                } else {
                    self.view.activate_view(mode, target);
                    self.start_glitch();
                }
            }
            Action::Skip => {
                if self.view.mode() == ViewMode::Transition {
                    self.transition.abort();
                    self.view.activate_pending_view();
                    self.start_glitch();
                }
            }
            Action::None => {}
        }
        true
    }

    fn render(&mut self) {
        if self.view.mode() == ViewMode::Transition {
            match self.transition.next_frame() {
                ClipStep::Frame(frame) => {
                    self.display.show_fullscreen(Some(&frame));
                    return;
                }
                ClipStep::Done => {
                    self.view.activate_pending_view();
                    self.start_glitch();
                }
            }
        }

        match self.view.mode() {
            ViewMode::Single => {
                let name = self.view.current_single_name();
                let frame = self
                    .view
                    .single_target()
                    .cloned()
                    .and_then(|feed| self.feed_frame(&feed));
                self.display.show_single(frame.as_deref(), &name);
            }
            ViewMode::Dual => {
                let targets: Vec<(PeerId, String)> = self
                    .view
                    .dual_targets()
                    .into_iter()
                    .map(|p| (p.id.clone(), p.name.clone()))
                    .collect();
                match targets.as_slice() {
                    [(left, left_name), (right, right_name)] => {
                        let left = self.feed_frame(&FeedId::Remote(left.clone()));
                        let right = self.feed_frame(&FeedId::Remote(right.clone()));
                        self.display
                            .show_dual(left.as_deref(), left_name, right.as_deref(), right_name);
                    }
                    [(only, name)] => {
                        let frame = self.feed_frame(&FeedId::Remote(only.clone()));
                        self.display.show_single(frame.as_deref(), name);
                    }
                    _ => self.display.show_single(None, "N/A"),
                }
            }
            ViewMode::Transition => self.display.show_fullscreen(None),
        }
    }

    /// Latest frame of a feed with any running glitch applied
    fn feed_frame(&mut self, feed: &FeedId) -> Option<Arc<Frame>> {
        let frame = match feed {
            FeedId::Remote(id) => self.feeds.latest(id),
            FeedId::LocalCamera => self.local_feed.latest(),
        }?;
        Some(self.glitch.apply(feed, frame))
    }

    fn start_glitch(&mut self) {
        let feeds = self.view.on_screen_feeds();
        self.glitch.start_glitch(&feeds, self.config.effects.glitch_duration());
    }

    fn log_stats(&self, pool: &PoolStats) {
        let rx = &self.receiver_stats;
        let re = &self.reassembly_stats;
        let tx = self.sender.stats();
        tracing::info!(
            "rx: {} datagrams ({} unknown), {} frames, {} expired, {} malformed, {} decode failures | \
             tx: {} frames, {} datagrams, {} errors | encode: {} dropped",
            rx.datagrams_received.load(Ordering::Relaxed),
            rx.unknown_sources.load(Ordering::Relaxed),
            re.frames_completed.load(Ordering::Relaxed),
            re.frames_expired.load(Ordering::Relaxed),
            re.rejected.load(Ordering::Relaxed),
            re.decode_failures.load(Ordering::Relaxed),
            tx.frames_sent,
            tx.datagrams_sent,
            tx.send_errors,
            pool.frames_dropped.load(Ordering::Relaxed),
        );
    }

    /// Stop the loops, finish outstanding sends, then release devices
    fn shutdown(&mut self, capture: LoopHandle, receive: LoopHandle, mut pool: EncodePool) {
        self.lifecycle.cancel();
        capture.join(LOOP_JOIN_TIMEOUT);
        receive.join(LOOP_JOIN_TIMEOUT);

        // The send socket stays open until every queued frame is out
        pool.drain();

        if let Some(mut buttons) = self.buttons.take() {
            if !buttons.stop() {
                tracing::warn!("Button listener did not stop in time");
            }
        }
        self.transition.abort();
        self.camera.lock().release();
        self.display.close();

        let tx = self.sender.stats();
        tracing::info!(
            "Node {} stopped: sent {} frames, received {} frames",
            self.self_id,
            tx.frames_sent,
            self.reassembly_stats.frames_completed.load(Ordering::Relaxed)
        );
    }
}

fn capture_loop(lifecycle: SessionLifecycle, camera: SharedCamera, queue: EncodeQueue, local_feed: SharedFrameCache) {
    while !lifecycle.is_cancelled() {
        let frame = camera.lock().capture();
        match frame {
            Some(frame) => {
                let frame = Arc::new(frame);
                local_feed.push(frame.clone());
                queue.submit(frame);
            }
            None => thread::sleep(CAPTURE_IDLE),
        }
    }
}

fn receive_loop(
    lifecycle: SessionLifecycle,
    mut receiver: DatagramReceiver,
    mut reassembler: Reassembler,
    directory: PeerDirectory,
    self_id: PeerId,
) {
    let stats = receiver.stats();
    while !lifecycle.is_cancelled() {
        match receiver.receive() {
            Ok(Some((data, source))) => match directory.resolve(&self_id, source.ip()) {
                Some(peer) => {
                    reassembler.process_datagram(data, peer);
                }
                None => {
                    stats.unknown_sources.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!("Dropping datagram from unknown source {}", source);
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Receive error: {}", e);
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
