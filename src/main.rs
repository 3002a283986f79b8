use anyhow::Context as _;
use clap::Parser;
use eframe::egui;
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use dirscape::camera::{Gesture, Viewport};
use dirscape::cli::HostArgs;
use dirscape::config::Rgba;
use dirscape::draw::{DrawCmd, TextAlign};
use dirscape::logging;
use dirscape::map_view::{ClickOutcome, MapView, MouseButton};
use dirscape::renderer::FrameStats;

/// Scroll distance (points) treated as one wheel notch.
const POINTS_PER_NOTCH: f32 = 50.0;
const PREVIEW_BYTES: u64 = 4096;

fn main() -> anyhow::Result<()> {
    let args = HostArgs::parse();
    logging::init(&args.log_options()).context("failed to initialise logging")?;

    // The egui context only exists once the window is up; workers reach it
    // through this slot.
    let repaint: Arc<OnceLock<egui::Context>> = Arc::new(OnceLock::new());
    let slot = Arc::clone(&repaint);
    let refresh = Arc::new(move || {
        if let Some(ctx) = slot.get() {
            ctx.request_repaint();
        }
    });

    let view = args
        .open_view(Viewport::new(1200.0, 800.0), Some(refresh))
        .with_context(|| format!("failed to open {}", args.path.display()))?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("dirscape"),
        ..Default::default()
    };

    eframe::run_native(
        "dirscape",
        options,
        Box::new(move |cc| {
            configure_custom_style(&cc.egui_ctx);
            let _ = repaint.set(cc.egui_ctx.clone());
            Box::new(DirscapeApp::new(view))
        }),
    )
    .map_err(|err| anyhow::anyhow!("window error: {err}"))
}

fn configure_custom_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();

    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = egui::Color32::from_rgba_unmultiplied(30, 41, 59, 240);
    visuals.window_fill = egui::Color32::from_rgba_unmultiplied(30, 41, 59, 230);
    visuals.window_stroke = egui::Stroke::new(1.0, egui::Color32::from_rgba_unmultiplied(255, 255, 255, 26));
    visuals.window_rounding = egui::Rounding::same(8.0);
    style.visuals = visuals;

    style.spacing.item_spacing = egui::vec2(12.0, 6.0);
    ctx.set_style(style);
}

struct Preview {
    path: PathBuf,
    text: String,
}

struct DirscapeApp {
    view: MapView,
    fitted: bool,
    last_stats: FrameStats,
    preview: Option<Preview>,
    status: String,
}

impl DirscapeApp {
    fn new(view: MapView) -> Self {
        Self {
            view,
            fitted: false,
            last_stats: FrameStats::default(),
            preview: None,
            status: String::from("Scroll to zoom, drag to pan, click a folder to open or close it"),
        }
    }

    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response, origin: egui::Pos2) {
        let drag = response.drag_delta();
        if drag != egui::Vec2::ZERO {
            self.view.gesture(Gesture::Pan {
                dx: drag.x as f64,
                dy: drag.y as f64,
            });
        }

        if let Some(hover) = response.hover_pos() {
            let anchor = hover - origin;
            let (scroll, pinch) = ui.input(|i| (i.smooth_scroll_delta.y, i.zoom_delta()));
            let mut notches = (scroll / POINTS_PER_NOTCH) as f64;
            if pinch != 1.0 {
                notches += (pinch as f64).ln() / dirscape::camera::ZOOM_STEP.ln();
            }
            if notches != 0.0 {
                self.view.gesture(Gesture::Zoom {
                    delta: notches,
                    anchor_x: anchor.x as f64,
                    anchor_y: anchor.y as f64,
                });
            }
        }

        if ui.input(|i| i.key_pressed(egui::Key::Num0) || i.key_pressed(egui::Key::Home)) {
            self.view.fit_to_root();
        }

        let button = if response.clicked() {
            Some(MouseButton::Primary)
        } else if response.secondary_clicked() {
            Some(MouseButton::Secondary)
        } else if response.middle_clicked() {
            Some(MouseButton::Middle)
        } else {
            None
        };
        if let (Some(button), Some(pos)) = (button, response.interact_pointer_pos()) {
            let local = pos - origin;
            let outcome = self.view.click(local.x as f64, local.y as f64, button);
            self.on_click(outcome);
        }
    }

    fn on_click(&mut self, outcome: ClickOutcome) {
        match outcome {
            ClickOutcome::None => {}
            ClickOutcome::OpenFile(path) => self.open_preview(path),
            ClickOutcome::Toggled { path, open } => {
                let verb = if open { "Opened" } else { "Closed" };
                self.status = format!("{verb} {}", path.display());
            }
            ClickOutcome::Retry(path) => self.status = format!("Retrying {}", path.display()),
            ClickOutcome::ClearedOverride(path) => {
                self.status = format!("{} follows zoom again", path.display());
            }
        }
    }

    fn open_preview(&mut self, path: PathBuf) {
        let mut bytes = Vec::new();
        let read = self
            .view
            .open_content(&path)
            .map_err(|err| err.to_string())
            .and_then(|reader| {
                reader
                    .take(PREVIEW_BYTES)
                    .read_to_end(&mut bytes)
                    .map_err(|err| err.to_string())
            });
        let text = match read {
            Ok(_) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cannot preview file");
                format!("cannot read file: {err}")
            }
        };
        self.preview = Some(Preview { path, text });
    }
}

fn color(c: Rgba) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

fn to_egui(rect: dirscape::area::Rect, origin: egui::Pos2) -> egui::Rect {
    egui::Rect::from_min_size(
        origin + egui::vec2(rect.x as f32, rect.y as f32),
        egui::vec2(rect.width as f32, rect.height as f32),
    )
}

fn paint(painter: &egui::Painter, origin: egui::Pos2, cmd: &DrawCmd) {
    match cmd {
        DrawCmd::FillRect { rect, color: c } => {
            painter.rect_filled(to_egui(*rect, origin), 0.0, color(*c));
        }
        DrawCmd::StrokeRect { rect, color: c, width } => {
            painter.rect_stroke(to_egui(*rect, origin), 0.0, egui::Stroke::new(*width, color(*c)));
        }
        // No image loaders are installed, so every image falls back to its color.
        DrawCmd::Image { rect, fallback, .. } => {
            painter.rect_filled(to_egui(*rect, origin), 0.0, color(*fallback));
        }
        DrawCmd::Text {
            x,
            y,
            text,
            size,
            color: c,
            align,
            clip,
        } => {
            let anchor = match align {
                TextAlign::Left => egui::Align2::LEFT_CENTER,
                TextAlign::Center => egui::Align2::CENTER_CENTER,
            };
            let clip = to_egui(*clip, origin).intersect(painter.clip_rect());
            painter.with_clip_rect(clip).text(
                origin + egui::vec2(*x as f32, *y as f32),
                anchor,
                text,
                egui::FontId::proportional(*size),
                color(*c),
            );
        }
    }
}

impl eframe::App for DirscapeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status);
                ui.separator();
                ui.label(format!(
                    "tiles {}  culled {}  loading {}  zoom {:.3}",
                    self.last_stats.drawn,
                    self.last_stats.culled,
                    self.view.pending_loads(),
                    self.view.camera().scale
                ));
                if ui.button("Fit").clicked() {
                    self.view.fit_to_root();
                }
            });
        });

        let mut close_preview = false;
        if let Some(preview) = &self.preview {
            egui::SidePanel::right("preview").resizable(true).show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.strong(preview.path.display().to_string());
                    if ui.small_button("✕").clicked() {
                        close_preview = true;
                    }
                });
                ui.separator();
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.monospace(&preview.text);
                });
            });
        }
        if close_preview {
            self.preview = None;
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::from_rgb(15, 23, 42)))
            .show(ctx, |ui| {
                let available = ui.available_size();
                let (response, painter) = ui.allocate_painter(available, egui::Sense::click_and_drag());
                let canvas = response.rect;

                self.view
                    .resize(Viewport::new(canvas.width() as f64, canvas.height() as f64));
                if !self.fitted {
                    self.view.fit_to_root();
                    self.fitted = true;
                }

                self.handle_input(ui, &response, canvas.min);

                let frame = self.view.frame();
                for cmd in &frame.commands {
                    paint(&painter, canvas.min, cmd);
                }
                self.last_stats = frame.stats;
            });
    }
}
