pub mod egui_host;
pub mod fade;
pub mod input;
pub mod messages;
pub mod model;
pub mod overlay;
pub mod render;
pub mod state;
#[cfg(windows)]
pub mod win32;

pub use fade::{fade_alpha, FadeOutcome, FadeSettings};
pub use input::{EventDisposition, InkEvent, InkInputState, MouseButton};
pub use model::{Color, Point, Stroke, StrokeStyle};
pub use overlay::{mount, DrawOverlay, InputSource, MountedOverlay, OverlayConfig, OverlaySurface};
pub use render::{render_frame, InkPainter, RenderFrameBuffer};
pub use state::InkLifecycle;

/// Mounts the overlay on the desktop using the platform's layered window and
/// global mouse hook.
#[cfg(windows)]
pub fn mount_native(config: OverlayConfig) -> anyhow::Result<MountedOverlay> {
    mount(
        config,
        win32::LayeredOverlayWindow::create,
        Box::new(win32::MouseHookInput::default()),
    )
}

#[cfg(not(windows))]
pub fn mount_native(_config: OverlayConfig) -> anyhow::Result<MountedOverlay> {
    Err(anyhow::anyhow!(
        "the click-through desktop overlay is only available on Windows; use --preview"
    ))
}
