use crate::draw::fade::FadeSettings;
use crate::draw::model::{Color, StrokeStyle, DEFAULT_INK_COLOR, DEFAULT_INK_WIDTH};
use crate::draw::overlay::OverlayConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct InkSettings {
    /// Idle time in milliseconds before committed strokes begin to fade.
    #[serde(default = "default_fade_delay_ms")]
    pub fade_delay_ms: u64,
    /// Length of the linear fade in milliseconds. `0` clears strokes as soon
    /// as the delay elapses.
    #[serde(default = "default_fade_duration_ms")]
    pub fade_duration_ms: u64,
    #[serde(default = "default_stroke_color")]
    pub stroke_color: Color,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,
    /// Pacing of the overlay thread's frame loop.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// When enabled the logger starts at debug level and honours `RUST_LOG`.
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_fade_delay_ms() -> u64 {
    5000
}

fn default_fade_duration_ms() -> u64 {
    1000
}

fn default_stroke_color() -> Color {
    DEFAULT_INK_COLOR
}

fn default_stroke_width() -> u32 {
    DEFAULT_INK_WIDTH
}

fn default_frame_interval_ms() -> u64 {
    16
}

impl Default for InkSettings {
    fn default() -> Self {
        Self {
            fade_delay_ms: default_fade_delay_ms(),
            fade_duration_ms: default_fade_duration_ms(),
            stroke_color: default_stroke_color(),
            stroke_width: default_stroke_width(),
            frame_interval_ms: default_frame_interval_ms(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl InkSettings {
    /// Reads settings from `path`. A missing or empty file yields the
    /// defaults; anything else must parse.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Clamps values the overlay cannot work with. Returns `true` when
    /// anything was changed.
    pub fn sanitize(&mut self) -> bool {
        let mut changed = false;
        if self.stroke_width == 0 {
            self.stroke_width = 1;
            changed = true;
        }
        if self.frame_interval_ms == 0 {
            self.frame_interval_ms = 1;
            changed = true;
        }
        changed
    }

    pub fn overlay_config(&self) -> OverlayConfig {
        OverlayConfig {
            style: StrokeStyle {
                width: self.stroke_width.max(1),
                color: self.stroke_color,
            },
            fade: FadeSettings {
                delay: Duration::from_millis(self.fade_delay_ms),
                duration: Duration::from_millis(self.fade_duration_ms),
            },
            frame_interval: Duration::from_millis(self.frame_interval_ms.max(1)),
        }
    }
}
