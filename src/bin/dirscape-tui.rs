use anyhow::Context as _;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton as TermButton,
    MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect as UiRect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};
use ratatui::{Frame, Terminal};
use std::io::{self, stdout, Read};
use std::path::PathBuf;
use std::time::Duration;

use dirscape::area::Rect;
use dirscape::camera::{Gesture, Viewport};
use dirscape::cli::HostArgs;
use dirscape::config::Rgba;
use dirscape::draw::{DrawCmd, TextAlign};
use dirscape::logging;
use dirscape::map_view::{ClickOutcome, MapView, MouseButton};
use dirscape::renderer::FrameStats;

/// Pixel size of one terminal cell in map coordinates.
const CELL_W: f64 = 8.0;
const CELL_H: f64 = 16.0;
const KEY_PAN_CELLS: f64 = 4.0;
const PREVIEW_BYTES: u64 = 2048;

struct Preview {
    path: PathBuf,
    text: String,
}

struct App {
    view: MapView,
    fitted: bool,
    map_area: Option<UiRect>,
    drag_from: Option<(u16, u16)>,
    dragged: bool,
    status: String,
    preview: Option<Preview>,
    last_stats: FrameStats,
    should_quit: bool,
}

impl App {
    fn new(view: MapView) -> Self {
        Self {
            view,
            fitted: false,
            map_area: None,
            drag_from: None,
            dragged: false,
            status: String::from("scroll: zoom  drag: pan  click: open/close  0: fit  q: quit"),
            preview: None,
            last_stats: FrameStats::default(),
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        let viewport = self.view.viewport();
        let (cx, cy) = (viewport.width / 2.0, viewport.height / 2.0);
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => self.preview = None,
            KeyCode::Char('0') | KeyCode::Home => self.view.fit_to_root(),
            KeyCode::Char('+') | KeyCode::Char('=') => self.zoom(1.0, cx, cy),
            KeyCode::Char('-') => self.zoom(-1.0, cx, cy),
            KeyCode::Left => self.pan(KEY_PAN_CELLS * CELL_W, 0.0),
            KeyCode::Right => self.pan(-KEY_PAN_CELLS * CELL_W, 0.0),
            KeyCode::Up => self.pan(0.0, KEY_PAN_CELLS * CELL_H),
            KeyCode::Down => self.pan(0.0, -KEY_PAN_CELLS * CELL_H),
            _ => {}
        }
    }

    fn pan(&mut self, dx: f64, dy: f64) {
        self.view.gesture(Gesture::Pan { dx, dy });
    }

    fn zoom(&mut self, delta: f64, anchor_x: f64, anchor_y: f64) {
        self.view.gesture(Gesture::Zoom {
            delta,
            anchor_x,
            anchor_y,
        });
    }

    /// Center of the cell under the pointer, in map pixels.
    fn map_point(&self, column: u16, row: u16) -> Option<(f64, f64)> {
        let area = self.map_area?;
        if !point_in_rect(area, column, row) {
            return None;
        }
        Some((
            (column - area.x) as f64 * CELL_W + CELL_W / 2.0,
            (row - area.y) as f64 * CELL_H + CELL_H / 2.0,
        ))
    }

    fn on_mouse(&mut self, event: MouseEvent) {
        match event.kind {
            MouseEventKind::Down(TermButton::Left) => {
                self.drag_from = Some((event.column, event.row));
                self.dragged = false;
            }
            MouseEventKind::Drag(TermButton::Left) => {
                if let Some((col, row)) = self.drag_from {
                    let dx = (event.column as f64 - col as f64) * CELL_W;
                    let dy = (event.row as f64 - row as f64) * CELL_H;
                    if dx != 0.0 || dy != 0.0 {
                        self.pan(dx, dy);
                        self.dragged = true;
                    }
                    self.drag_from = Some((event.column, event.row));
                }
            }
            MouseEventKind::Up(TermButton::Left) => {
                let clicked = self.drag_from.take().is_some() && !self.dragged;
                if clicked {
                    self.click(event.column, event.row, MouseButton::Primary);
                }
            }
            MouseEventKind::Down(TermButton::Right) => self.click(event.column, event.row, MouseButton::Secondary),
            MouseEventKind::Down(TermButton::Middle) => self.click(event.column, event.row, MouseButton::Middle),
            MouseEventKind::ScrollUp => {
                if let Some((x, y)) = self.map_point(event.column, event.row) {
                    self.zoom(1.0, x, y);
                }
            }
            MouseEventKind::ScrollDown => {
                if let Some((x, y)) = self.map_point(event.column, event.row) {
                    self.zoom(-1.0, x, y);
                }
            }
            _ => {}
        }
    }

    fn click(&mut self, column: u16, row: u16, button: MouseButton) {
        let Some((x, y)) = self.map_point(column, row) else {
            return;
        };
        match self.view.click(x, y, button) {
            ClickOutcome::None => {}
            ClickOutcome::OpenFile(path) => self.open_preview(path),
            ClickOutcome::Toggled { path, open } => {
                let verb = if open { "opened" } else { "closed" };
                self.status = format!("{verb} {}", path.display());
            }
            ClickOutcome::Retry(path) => self.status = format!("retrying {}", path.display()),
            ClickOutcome::ClearedOverride(path) => {
                self.status = format!("{} follows zoom again", path.display());
            }
        }
    }

    fn open_preview(&mut self, path: PathBuf) {
        let mut bytes = Vec::new();
        let text = match self.view.open_content(&path) {
            Ok(reader) => match reader.take(PREVIEW_BYTES).read_to_end(&mut bytes) {
                Ok(_) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => format!("cannot read file: {err}"),
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cannot preview file");
                format!("cannot open file: {err}")
            }
        };
        self.status = format!("previewing {}", path.display());
        self.preview = Some(Preview { path, text });
    }
}

fn point_in_rect(rect: UiRect, x: u16, y: u16) -> bool {
    x >= rect.x && x < rect.x.saturating_add(rect.width) && y >= rect.y && y < rect.y.saturating_add(rect.height)
}

fn term_color(c: Rgba, under: Color) -> Color {
    if c.a == 255 {
        return Color::Rgb(c.r, c.g, c.b);
    }
    let (ur, ug, ub) = match under {
        Color::Rgb(r, g, b) => (r, g, b),
        _ => (0, 0, 0),
    };
    let a = c.a as u16;
    let mix = |top: u8, bottom: u8| ((top as u16 * a + bottom as u16 * (255 - a)) / 255) as u8;
    Color::Rgb(mix(c.r, ur), mix(c.g, ug), mix(c.b, ub))
}

/// Cell range `(x0, y0, x1, y1)` (inclusive) covered by a pixel rect, clipped to `area`.
fn cell_bounds(rect: Rect, area: UiRect) -> Option<(u16, u16, u16, u16)> {
    if area.width == 0 || area.height == 0 || rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }
    let max_x = area.width as f64;
    let max_y = area.height as f64;
    let left = (rect.x / CELL_W).floor().max(0.0);
    let top = (rect.y / CELL_H).floor().max(0.0);
    let right = (rect.right() / CELL_W).ceil().min(max_x);
    let bottom = (rect.bottom() / CELL_H).ceil().min(max_y);
    if left >= right || top >= bottom {
        return None;
    }
    Some((
        area.x + left as u16,
        area.y + top as u16,
        area.x + right as u16 - 1,
        area.y + bottom as u16 - 1,
    ))
}

/// Executes a draw list into the terminal buffer, one cell per 8×16 pixels.
struct MapWidget<'a> {
    commands: &'a [DrawCmd],
}

impl MapWidget<'_> {
    fn fill(buf: &mut Buffer, area: UiRect, rect: Rect, c: Rgba) {
        let Some((x0, y0, x1, y1)) = cell_bounds(rect, area) else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                let bg = term_color(c, buf[(x, y)].bg);
                buf[(x, y)].set_char(' ').set_bg(bg);
            }
        }
    }

    fn stroke(buf: &mut Buffer, area: UiRect, rect: Rect, c: Rgba) {
        let Some((x0, y0, x1, y1)) = cell_bounds(rect, area) else {
            return;
        };
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let fg = term_color(c, Color::Rgb(0, 0, 0));
        for x in x0..=x1 {
            buf[(x, y0)].set_char('─').set_fg(fg);
            buf[(x, y1)].set_char('─').set_fg(fg);
        }
        for y in y0..=y1 {
            buf[(x0, y)].set_char('│').set_fg(fg);
            buf[(x1, y)].set_char('│').set_fg(fg);
        }
        buf[(x0, y0)].set_char('┌').set_fg(fg);
        buf[(x1, y0)].set_char('┐').set_fg(fg);
        buf[(x0, y1)].set_char('└').set_fg(fg);
        buf[(x1, y1)].set_char('┘').set_fg(fg);
    }

    #[allow(clippy::too_many_arguments)]
    fn text(buf: &mut Buffer, area: UiRect, x: f64, y: f64, text: &str, c: Rgba, align: TextAlign, clip: Rect) {
        let Some((cx0, cy0, cx1, cy1)) = cell_bounds(clip, area) else {
            return;
        };
        let row = area.y as f64 + (y / CELL_H).floor();
        if row < cy0 as f64 || row > cy1 as f64 {
            return;
        }
        let width = text.chars().count() as f64;
        let start = match align {
            TextAlign::Left => (x / CELL_W).floor(),
            TextAlign::Center => (x / CELL_W - width / 2.0).floor(),
        } + area.x as f64;

        let row = row as u16;
        let bold = Style::default().add_modifier(Modifier::BOLD);
        for (i, ch) in text.chars().enumerate() {
            let col = start + i as f64;
            if col < cx0 as f64 {
                continue;
            }
            if col > cx1 as f64 {
                break;
            }
            let fg = term_color(c, buf[(col as u16, row)].bg);
            buf[(col as u16, row)].set_char(ch).set_fg(fg).set_style(bold);
        }
    }
}

impl Widget for MapWidget<'_> {
    fn render(self, area: UiRect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        for y in area.y..area.y.saturating_add(area.height) {
            for x in area.x..area.x.saturating_add(area.width) {
                buf[(x, y)]
                    .set_char(' ')
                    .set_style(Style::default().bg(Color::Rgb(15, 23, 42)).fg(Color::White));
            }
        }

        for cmd in self.commands {
            match cmd {
                DrawCmd::FillRect { rect, color } => Self::fill(buf, area, *rect, *color),
                DrawCmd::StrokeRect { rect, color, .. } => Self::stroke(buf, area, *rect, *color),
                DrawCmd::Image { rect, fallback, .. } => Self::fill(buf, area, *rect, *fallback),
                DrawCmd::Text {
                    x,
                    y,
                    text,
                    color,
                    align,
                    clip,
                    ..
                } => Self::text(buf, area, *x, *y, text, *color, *align, *clip),
            }
        }
    }
}

fn draw_ui(frame: &mut Frame, app: &mut App) {
    let rows = Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).split(frame.area());
    let (main, status_row) = (rows[0], rows[1]);

    let map_outer = if let Some(preview) = &app.preview {
        let split = Layout::horizontal([Constraint::Min(30), Constraint::Percentage(35)]).split(main);
        let block = Block::default()
            .title(format!(" {} (Esc closes) ", preview.path.display()))
            .borders(Borders::ALL);
        frame.render_widget(
            Paragraph::new(preview.text.as_str())
                .wrap(Wrap { trim: false })
                .block(block),
            split[1],
        );
        split[0]
    } else {
        main
    };

    let root_label = app
        .view
        .tree()
        .get(app.view.tree().root())
        .map(|n| n.label.clone())
        .unwrap_or_default();
    let map_block = Block::default().title(format!(" dirscape: {root_label} ")).borders(Borders::ALL);
    let map_inner = map_block.inner(map_outer);
    frame.render_widget(map_block, map_outer);
    app.map_area = Some(map_inner);

    app.view.resize(Viewport::new(
        map_inner.width as f64 * CELL_W,
        map_inner.height as f64 * CELL_H,
    ));
    if !app.fitted && map_inner.width > 0 {
        app.view.fit_to_root();
        app.fitted = true;
    }

    let map_frame = app.view.frame();
    app.last_stats = map_frame.stats;
    frame.render_widget(MapWidget { commands: &map_frame.commands }, map_inner);

    let status = Line::from(vec![
        Span::styled(app.status.clone(), Style::default().fg(Color::White)),
        Span::raw("  "),
        Span::styled(
            format!(
                "tiles {}  culled {}  loading {}  zoom {:.3}",
                app.last_stats.drawn,
                app.last_stats.culled,
                app.view.pending_loads(),
                app.view.camera().scale
            ),
            Style::default().fg(Color::Gray),
        ),
    ]);
    frame.render_widget(Paragraph::new(status), status_row);
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, mut app: App) -> io::Result<()> {
    loop {
        terminal.draw(|frame| {
            draw_ui(frame, &mut app);
        })?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse),
                Event::Resize(_, _) => {}
                Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = HostArgs::parse();
    // stderr would draw over the alternate screen
    let mut log = args.log_options();
    if log.file.is_none() {
        log.file = Some(std::env::temp_dir().join("dirscape-tui.log"));
    }
    logging::init(&log).context("failed to initialise logging")?;

    let view = args
        .open_view(Viewport::new(800.0, 600.0), None)
        .with_context(|| format!("failed to open {}", args.path.display()))?;
    let app = App::new(view);

    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let app_result = run_app(&mut terminal, app);

    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    app_result.context("terminal error")
}
