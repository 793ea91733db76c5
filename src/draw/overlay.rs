use crate::draw::fade::{FadeOutcome, FadeSettings};
use crate::draw::input::{EventDisposition, InkEvent, InkInputState};
use crate::draw::messages::{ExitReason, InkSample, MainToOverlay, OverlayToMain};
use crate::draw::model::StrokeStyle;
use crate::draw::render::{alpha_to_u8, render_frame, InkPainter, RenderFrameBuffer};
use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);
const START_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayConfig {
    pub style: StrokeStyle,
    pub fade: FadeSettings,
    pub frame_interval: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            style: StrokeStyle::default(),
            fade: FadeSettings::default(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

/// Source of raw pointer and touch input for a mounted overlay.
pub trait InputSource: Send {
    fn install(&mut self, sender: Sender<InkSample>) -> Result<()>;
    fn uninstall(&mut self) -> Result<()>;
}

/// Installed input source; uninstalls itself when dropped.
pub struct InputGuard {
    source: Box<dyn InputSource>,
}

impl InputGuard {
    pub fn install(mut source: Box<dyn InputSource>, sender: Sender<InkSample>) -> Result<Self> {
        source.install(sender).context("install overlay input source")?;
        Ok(Self { source })
    }
}

impl Drop for InputGuard {
    fn drop(&mut self) {
        if let Err(err) = self.source.uninstall() {
            tracing::warn!(?err, "failed to uninstall overlay input source");
        }
    }
}

/// Full-viewport, click-through drawing surface.
pub trait OverlaySurface {
    /// Current viewport size; polled every frame so the surface can follow
    /// display changes.
    fn viewport(&mut self) -> (u32, u32);

    /// Explicit viewport change reported by the input side.
    fn resize(&mut self, _width: u32, _height: u32) {}

    fn present(&mut self, frame: &RenderFrameBuffer) -> Result<()>;

    fn shutdown(&mut self);
}

/// Drawing state plus the fixed style of one overlay instance.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawOverlay {
    state: InkInputState,
    config: OverlayConfig,
}

impl DrawOverlay {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            state: InkInputState::new(),
            config,
        }
    }

    pub fn config(&self) -> OverlayConfig {
        self.config
    }

    pub fn set_config(&mut self, config: OverlayConfig) {
        self.config = config;
    }

    pub fn handle_event(&mut self, event: &InkEvent, now: Instant) -> EventDisposition {
        self.state.handle_event(event, now)
    }

    pub fn render<P: InkPainter + ?Sized>(&mut self, painter: &mut P, now: Instant) -> FadeOutcome {
        render_frame(
            &mut self.state,
            painter,
            self.config.style,
            self.config.fade,
            now,
        )
    }

    /// Whether the last rendered frame could contain any ink. History whose
    /// faded opacity rounds to nothing counts as gone.
    pub fn has_visible_ink(&self) -> bool {
        let history_alpha = alpha_to_u8(self.state.global_alpha());
        let effective =
            (u32::from(self.config.style.color.a) * u32::from(history_alpha) + 127) / 255;
        (effective > 0 && self.state.strokes().iter().any(|stroke| stroke.is_drawable()))
            || self
                .state
                .current_stroke()
                .is_some_and(|stroke| stroke.is_drawable())
    }
}

/// A mounted overlay. Dropping it detaches input, stops the frame loop and
/// removes the surface.
pub struct MountedOverlay {
    input: Option<InputGuard>,
    main_to_overlay_tx: Sender<MainToOverlay>,
    overlay_to_main_rx: Receiver<OverlayToMain>,
    overlay_thread_handle: Option<JoinHandle<()>>,
}

impl MountedOverlay {
    pub fn update_config(&self, config: OverlayConfig) -> Result<()> {
        self.main_to_overlay_tx
            .send(MainToOverlay::UpdateConfig(config))
            .map_err(|_| anyhow!("overlay thread is no longer running"))
    }

    pub fn is_running(&self) -> bool {
        self.overlay_thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Blocks until the overlay thread ends on its own.
    pub fn wait(mut self) {
        if let Some(handle) = self.overlay_thread_handle.take() {
            if handle.join().is_err() {
                tracing::error!("draw overlay thread panicked");
            }
        }
    }

    pub fn unmount(mut self) -> Option<ExitReason> {
        self.teardown();
        self.overlay_to_main_rx
            .try_iter()
            .find_map(|notice| match notice {
                OverlayToMain::Exited { reason } => Some(reason),
                _ => None,
            })
    }

    fn teardown(&mut self) {
        // Input goes first so nothing new is queued while the loop winds down.
        drop(self.input.take());
        let _ = self.main_to_overlay_tx.send(MainToOverlay::Shutdown);
        if let Some(handle) = self.overlay_thread_handle.take() {
            if handle.join().is_err() {
                tracing::error!("draw overlay thread panicked");
            }
            tracing::info!("draw overlay unmounted");
        }
    }
}

impl Drop for MountedOverlay {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Spawns the overlay thread, waits for its surface to come up, then attaches
/// the input source.
pub fn mount<S, F>(
    config: OverlayConfig,
    create_surface: F,
    input: Box<dyn InputSource>,
) -> Result<MountedOverlay>
where
    S: OverlaySurface,
    F: FnOnce() -> Result<S> + Send + 'static,
{
    let (sample_tx, sample_rx) = channel::<InkSample>();
    let (main_to_overlay_tx, main_to_overlay_rx) = channel::<MainToOverlay>();
    let (overlay_to_main_tx, overlay_to_main_rx) = channel::<OverlayToMain>();

    let overlay_thread_handle = thread::Builder::new()
        .name("ink-overlay".to_string())
        .spawn(move || {
            let mut surface = match create_surface() {
                Ok(surface) => surface,
                Err(err) => {
                    tracing::error!(?err, "unable to create ink overlay surface");
                    let _ = overlay_to_main_tx.send(OverlayToMain::StartFailure {
                        error: format!("{err:#}"),
                    });
                    return;
                }
            };
            let _ = overlay_to_main_tx.send(OverlayToMain::Started);

            let reason = run_frame_loop(config, &mut surface, &sample_rx, &main_to_overlay_rx);
            surface.shutdown();
            let _ = overlay_to_main_tx.send(OverlayToMain::Exited { reason });
        })
        .map_err(|err| anyhow!("failed to spawn ink overlay thread: {err}"))?;

    match overlay_to_main_rx.recv_timeout(START_TIMEOUT) {
        Ok(OverlayToMain::Started) => {}
        Ok(OverlayToMain::StartFailure { error }) => {
            let _ = overlay_thread_handle.join();
            return Err(anyhow!("ink overlay failed to start: {error}"));
        }
        Ok(OverlayToMain::Exited { .. }) | Err(_) => {
            let _ = main_to_overlay_tx.send(MainToOverlay::Shutdown);
            let _ = overlay_thread_handle.join();
            return Err(anyhow!("ink overlay did not signal readiness"));
        }
    }

    let mut mounted = MountedOverlay {
        input: None,
        main_to_overlay_tx,
        overlay_to_main_rx,
        overlay_thread_handle: Some(overlay_thread_handle),
    };
    // On failure `mounted` drops here and stops the thread.
    mounted.input = Some(InputGuard::install(input, sample_tx)?);
    tracing::info!("draw overlay mounted");
    Ok(mounted)
}

fn run_frame_loop<S: OverlaySurface>(
    config: OverlayConfig,
    surface: &mut S,
    sample_rx: &Receiver<InkSample>,
    main_to_overlay_rx: &Receiver<MainToOverlay>,
) -> ExitReason {
    let mut overlay = DrawOverlay::new(config);
    let mut frame = RenderFrameBuffer::new(surface.viewport());
    let mut presented_ink = true;

    loop {
        loop {
            match sample_rx.try_recv() {
                Ok(sample) => {
                    if let InkEvent::Resize { width, height } = sample.event {
                        surface.resize(width, height);
                    }
                    // Samples reach this thread after the OS has routed them,
                    // so a suppress disposition has nothing left to cancel.
                    let _ = overlay.handle_event(&sample.event, sample.at);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        let resized = frame.ensure_size(surface.viewport());
        overlay.render(&mut frame, Instant::now());
        let has_ink = overlay.has_visible_ink();
        // Once a blank frame is on screen there is nothing to repaint until
        // ink shows up again.
        if has_ink || presented_ink || resized {
            if let Err(err) = surface.present(&frame) {
                tracing::warn!(?err, "failed to present ink overlay frame");
            }
            presented_ink = has_ink;
        }

        match main_to_overlay_rx.recv_timeout(overlay.config().frame_interval) {
            Ok(MainToOverlay::UpdateConfig(config)) => overlay.set_config(config),
            Ok(MainToOverlay::Shutdown) => return ExitReason::Unmounted,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return ExitReason::ControllerGone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::input::MouseButton;
    use crate::draw::model::Point;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct SurfaceLog {
        presents: usize,
        shutdowns: usize,
        resizes: Vec<(u32, u32)>,
    }

    struct LoggingSurface {
        log: Arc<Mutex<SurfaceLog>>,
    }

    impl OverlaySurface for LoggingSurface {
        fn viewport(&mut self) -> (u32, u32) {
            (64, 64)
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.log.lock().unwrap().resizes.push((width, height));
        }

        fn present(&mut self, _frame: &RenderFrameBuffer) -> Result<()> {
            self.log.lock().unwrap().presents += 1;
            Ok(())
        }

        fn shutdown(&mut self) {
            self.log.lock().unwrap().shutdowns += 1;
        }
    }

    #[derive(Default)]
    struct SlotInput {
        slot: Arc<Mutex<Option<Sender<InkSample>>>>,
        fail: bool,
    }

    impl InputSource for SlotInput {
        fn install(&mut self, sender: Sender<InkSample>) -> Result<()> {
            if self.fail {
                return Err(anyhow!("input refused"));
            }
            *self.slot.lock().unwrap() = Some(sender);
            Ok(())
        }

        fn uninstall(&mut self) -> Result<()> {
            self.slot.lock().unwrap().take();
            Ok(())
        }
    }

    #[test]
    fn draw_overlay_reports_visible_ink() {
        let now = Instant::now();
        let mut overlay = DrawOverlay::new(OverlayConfig::default());
        assert!(!overlay.has_visible_ink());

        overlay.handle_event(
            &InkEvent::MouseDown {
                button: MouseButton::Primary,
                point: Point::new(0.0, 0.0),
            },
            now,
        );
        assert!(!overlay.has_visible_ink());
        overlay.handle_event(
            &InkEvent::MouseMove {
                point: Point::new(3.0, 3.0),
                primary_down: true,
            },
            now,
        );
        assert!(overlay.has_visible_ink());
    }

    #[test]
    fn unmount_detaches_input_and_shuts_surface_down() {
        let log = Arc::new(Mutex::new(SurfaceLog::default()));
        let slot = Arc::new(Mutex::new(None));
        let surface_log = log.clone();

        let mounted = mount(
            OverlayConfig {
                frame_interval: Duration::from_millis(1),
                ..OverlayConfig::default()
            },
            move || Ok(LoggingSurface { log: surface_log }),
            Box::new(SlotInput {
                slot: slot.clone(),
                fail: false,
            }),
        )
        .expect("mount overlay");
        assert!(slot.lock().unwrap().is_some());

        let sender = slot.lock().unwrap().clone().expect("installed sender");
        sender
            .send(InkSample::now(InkEvent::Resize {
                width: 80,
                height: 40,
            }))
            .expect("send resize");

        let mut waited = 0;
        while log.lock().unwrap().resizes.is_empty() && waited < 200 {
            thread::sleep(Duration::from_millis(5));
            waited += 1;
        }

        assert_eq!(mounted.unmount(), Some(ExitReason::Unmounted));
        assert!(slot.lock().unwrap().is_none());

        let log = log.lock().unwrap();
        assert_eq!(log.shutdowns, 1);
        assert_eq!(log.resizes, vec![(80, 40)]);
    }

    #[test]
    fn failed_input_install_stops_the_overlay_thread() {
        let log = Arc::new(Mutex::new(SurfaceLog::default()));
        let surface_log = log.clone();

        let result = mount(
            OverlayConfig::default(),
            move || Ok(LoggingSurface { log: surface_log }),
            Box::new(SlotInput {
                slot: Arc::default(),
                fail: true,
            }),
        );

        assert!(result.is_err());
        assert_eq!(log.lock().unwrap().shutdowns, 1);
    }

    #[test]
    fn surface_failure_is_reported_from_mount() {
        let slot = Arc::new(Mutex::new(None));
        let result = mount(
            OverlayConfig::default(),
            || -> Result<LoggingSurface> { Err(anyhow!("no display")) },
            Box::new(SlotInput {
                slot: slot.clone(),
                fail: false,
            }),
        );

        let err = result.err().expect("mount must fail");
        assert!(format!("{err:#}").contains("no display"));
        assert!(slot.lock().unwrap().is_none());
    }

    struct PanickingSurface;

    impl OverlaySurface for PanickingSurface {
        fn viewport(&mut self) -> (u32, u32) {
            (8, 8)
        }

        fn present(&mut self, _frame: &RenderFrameBuffer) -> Result<()> {
            panic!("present exploded");
        }

        fn shutdown(&mut self) {}
    }

    #[test]
    fn wait_survives_a_panicking_overlay_thread() {
        let slot = Arc::new(Mutex::new(None));
        let mounted = mount(
            OverlayConfig::default(),
            || Ok(PanickingSurface),
            Box::new(SlotInput {
                slot: slot.clone(),
                fail: false,
            }),
        )
        .expect("mount overlay");

        mounted.wait();
        assert!(slot.lock().unwrap().is_none());
    }
}
