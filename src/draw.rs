use crate::area::Rect;
use crate::config::Rgba;

/// One drawing primitive in screen pixels, executed in order by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    FillRect {
        rect: Rect,
        color: Rgba,
    },
    StrokeRect {
        rect: Rect,
        color: Rgba,
        width: f32,
    },
    /// Blit a host-resolved image over `rect`; hosts that cannot resolve
    /// `image` fill with `fallback` instead.
    Image {
        rect: Rect,
        image: String,
        fallback: Rgba,
    },
    /// Text anchored at `(x, y)`, vertically centered on `y`, clipped to `clip`.
    Text {
        x: f64,
        y: f64,
        text: String,
        size: f32,
        color: Rgba,
        align: TextAlign,
        clip: Rect,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    /// `x` is the left edge.
    Left,
    /// `x` is the horizontal center.
    Center,
}

/// Glyph drawn in the middle of a solid tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileIcon {
    File,
    ClosedDir,
    Loading,
    Locked,
    Error,
}

impl TileIcon {
    pub fn glyph(self) -> &'static str {
        match self {
            TileIcon::File => "✓",
            TileIcon::ClosedDir => "▣",
            TileIcon::Loading => "…",
            TileIcon::Locked => "⊘",
            TileIcon::Error => "!",
        }
    }
}
