use crate::area::Rect;

/// Smallest and largest world-to-pixel factors the camera will accept.
pub const MIN_SCALE: f64 = 1e-4;
pub const MAX_SCALE: f64 = 1e6;

/// Scale multiplier per zoom notch.
pub const ZOOM_STEP: f64 = 1.1;

/// Fraction of the viewport left empty around the root when fitting.
const FIT_MARGIN: f64 = 0.05;

/// Size of the host drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }
}

/// Pan/zoom input in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Drag by `(dx, dy)` pixels; the content follows the pointer.
    Pan { dx: f64, dy: f64 },
    /// Zoom by `delta` notches (positive zooms in) about a screen point.
    Zoom { delta: f64, anchor_x: f64, anchor_y: f64 },
}

/// World-space viewport: top-left corner plus world-to-pixel scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

impl Camera {
    pub fn new(x: f64, y: f64, scale: f64) -> Self {
        Self {
            x,
            y,
            scale: scale.clamp(MIN_SCALE, MAX_SCALE),
        }
    }

    /// Center `world` in the viewport, scaled to fit with a small margin.
    pub fn fit(world: Rect, viewport: Viewport) -> Self {
        if world.width <= 0.0 || world.height <= 0.0 || viewport.width <= 0.0 || viewport.height <= 0.0 {
            return Self::new(world.x, world.y, 1.0);
        }
        let usable = 1.0 - 2.0 * FIT_MARGIN;
        let scale = (viewport.width * usable / world.width)
            .min(viewport.height * usable / world.height)
            .clamp(MIN_SCALE, MAX_SCALE);
        let visible_w = viewport.width / scale;
        let visible_h = viewport.height / scale;
        Self {
            x: world.x - (visible_w - world.width) / 2.0,
            y: world.y - (visible_h - world.height) / 2.0,
            scale,
        }
    }

    /// The camera after `gesture`.
    pub fn apply(self, gesture: Gesture) -> Self {
        match gesture {
            Gesture::Pan { dx, dy } => self.panned(dx, dy),
            Gesture::Zoom {
                delta,
                anchor_x,
                anchor_y,
            } => self.zoomed(delta, anchor_x, anchor_y),
        }
    }

    fn panned(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x - dx / self.scale,
            y: self.y - dy / self.scale,
            ..self
        }
    }

    fn zoomed(self, delta: f64, anchor_x: f64, anchor_y: f64) -> Self {
        // Keep the world point under the anchor fixed on screen.
        let (world_x, world_y) = self.screen_to_world(anchor_x, anchor_y);
        let scale = (self.scale * ZOOM_STEP.powf(delta)).clamp(MIN_SCALE, MAX_SCALE);
        Self {
            x: world_x - anchor_x / scale,
            y: world_y - anchor_y / scale,
            scale,
        }
    }

    pub fn world_to_screen(&self, wx: f64, wy: f64) -> (f64, f64) {
        ((wx - self.x) * self.scale, (wy - self.y) * self.scale)
    }

    pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
        (sx / self.scale + self.x, sy / self.scale + self.y)
    }

    /// World-space rectangle to screen pixels.
    pub fn rect_to_screen(&self, world: Rect) -> Rect {
        let (x, y) = self.world_to_screen(world.x, world.y);
        Rect::new(x, y, world.width * self.scale, world.height * self.scale)
    }

    /// World rectangle currently shown in `viewport`.
    pub fn visible_area(&self, viewport: Viewport) -> Rect {
        Rect::new(self.x, self.y, viewport.width / self.scale, viewport.height / self.scale)
    }
}
