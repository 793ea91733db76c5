//! eframe host: a transparent, undecorated, always-on-top viewport that feeds
//! egui pointer and touch events into a [`DrawOverlay`] and paints it with the
//! egui painter once per repaint.

use crate::draw::input::{InkEvent, MouseButton};
use crate::draw::model::{Point, StrokeStyle};
use crate::draw::overlay::{DrawOverlay, OverlayConfig};
use crate::draw::render::InkPainter;
use anyhow::{anyhow, Result};
use eframe::egui;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct EguiInkPainter {
    shapes: Vec<egui::Shape>,
}

impl EguiInkPainter {
    pub fn into_shapes(self) -> Vec<egui::Shape> {
        self.shapes
    }
}

impl InkPainter for EguiInkPainter {
    fn clear(&mut self) {
        self.shapes.clear();
    }

    fn polyline(&mut self, points: &[Point], style: StrokeStyle, alpha: u8) {
        if points.len() < 2 || alpha == 0 {
            return;
        }
        let effective = (u32::from(style.color.a) * u32::from(alpha) + 127) / 255;
        let color = egui::Color32::from_rgba_unmultiplied(
            style.color.r,
            style.color.g,
            style.color.b,
            effective as u8,
        );
        let path = points.iter().map(|p| egui::pos2(p.x, p.y)).collect();
        self.shapes.push(egui::Shape::line(
            path,
            egui::Stroke::new(style.width as f32, color),
        ));
    }
}

/// Converts egui's input stream into overlay events.
///
/// egui-winit also emulates a mouse for the first finger; those emulated
/// pointer events are dropped while any finger is down.
#[derive(Debug, Default)]
pub struct EguiInputTranslator {
    primary_down: bool,
    touches: Vec<(egui::TouchId, Point)>,
    viewport: Option<(u32, u32)>,
}

impl EguiInputTranslator {
    pub fn translate(&mut self, event: &egui::Event) -> Option<InkEvent> {
        match event {
            egui::Event::PointerButton {
                pos,
                button,
                pressed,
                ..
            } if self.touches.is_empty() => {
                let button = map_button(*button);
                if button == MouseButton::Primary {
                    self.primary_down = *pressed;
                }
                Some(if *pressed {
                    InkEvent::MouseDown {
                        button,
                        point: Point::new(pos.x, pos.y),
                    }
                } else {
                    InkEvent::MouseUp { button }
                })
            }
            egui::Event::PointerMoved(pos) if self.touches.is_empty() => Some(InkEvent::MouseMove {
                point: Point::new(pos.x, pos.y),
                primary_down: self.primary_down,
            }),
            egui::Event::Touch { id, phase, pos, .. } => {
                Some(self.translate_touch(*id, *phase, Point::new(pos.x, pos.y)))
            }
            _ => None,
        }
    }

    pub fn translate_touch(
        &mut self,
        id: egui::TouchId,
        phase: egui::TouchPhase,
        point: Point,
    ) -> InkEvent {
        match phase {
            egui::TouchPhase::Start => {
                self.touches.push((id, point));
                InkEvent::TouchStart {
                    touches: self.touch_points(),
                }
            }
            egui::TouchPhase::Move => {
                if let Some(entry) = self.touches.iter_mut().find(|(tid, _)| *tid == id) {
                    entry.1 = point;
                }
                InkEvent::TouchMove {
                    touches: self.touch_points(),
                }
            }
            egui::TouchPhase::End => {
                self.touches.retain(|(tid, _)| *tid != id);
                InkEvent::TouchEnd
            }
            egui::TouchPhase::Cancel => {
                self.touches.retain(|(tid, _)| *tid != id);
                InkEvent::TouchCancel
            }
        }
    }

    pub fn track_viewport(&mut self, rect: egui::Rect) -> Option<InkEvent> {
        let size = (rect.width().max(0.0) as u32, rect.height().max(0.0) as u32);
        if self.viewport == Some(size) {
            return None;
        }
        self.viewport = Some(size);
        Some(InkEvent::Resize {
            width: size.0,
            height: size.1,
        })
    }

    fn touch_points(&self) -> Vec<Point> {
        self.touches.iter().map(|(_, point)| *point).collect()
    }
}

fn map_button(button: egui::PointerButton) -> MouseButton {
    match button {
        egui::PointerButton::Primary => MouseButton::Primary,
        egui::PointerButton::Secondary => MouseButton::Secondary,
        egui::PointerButton::Middle => MouseButton::Middle,
        _ => MouseButton::Other,
    }
}

pub struct InkPreviewApp {
    overlay: DrawOverlay,
    input: EguiInputTranslator,
}

impl InkPreviewApp {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            overlay: DrawOverlay::new(config),
            input: EguiInputTranslator::default(),
        }
    }
}

impl InkPreviewApp {
    /// Feeds egui's raw events to the overlay and hands back the ones egui
    /// should still process. Touches that drive a gesture are consumed so
    /// nothing underneath scrolls.
    pub fn route_events(&mut self, events: Vec<egui::Event>, now: Instant) -> Vec<egui::Event> {
        events
            .into_iter()
            .filter(|event| match self.input.translate(event) {
                Some(ink) => self.deliver(&ink, now),
                None => true,
            })
            .collect()
    }

    /// Returns `false` when the event was claimed by an ink gesture.
    fn deliver(&mut self, event: &InkEvent, now: Instant) -> bool {
        !self.overlay.handle_event(event, now).suppresses_default()
    }
}

impl eframe::App for InkPreviewApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0; 4]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        if let Some(resize) = self.input.track_viewport(ctx.screen_rect()) {
            self.deliver(&resize, now);
        }
        ctx.input_mut(|i| {
            let events = std::mem::take(&mut i.events);
            i.events = self.route_events(events, now);
        });

        let mut painter = EguiInkPainter::default();
        self.overlay.render(&mut painter, now);

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                ui.painter().extend(painter.into_shapes());
            });

        // Fade timing runs off the wall clock, so keep frames coming.
        ctx.request_repaint();
    }
}

pub fn run_preview(config: OverlayConfig) -> Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("fade_ink")
            .with_transparent(true)
            .with_decorations(false)
            .with_maximized(true)
            .with_always_on_top(),
        ..Default::default()
    };

    tracing::info!("starting ink preview window");
    eframe::run_native(
        "fade_ink",
        native_options,
        Box::new(move |_cc| Box::new(InkPreviewApp::new(config))),
    )
    .map_err(|err| anyhow!("ink preview window failed: {err}"))
}
