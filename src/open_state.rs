use crate::config::StyleConfig;

/// Whether a directory is drawn expanded, and who decided it.
///
/// Explicit states come from the user and are only overridden by the wider
/// "hard" thresholds; automatic states follow the auto thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenState {
    #[default]
    AutoClosed,
    AutoOpen,
    ExplicitOpen,
    ExplicitClosed,
}

impl OpenState {
    pub fn is_open(self) -> bool {
        matches!(self, OpenState::AutoOpen | OpenState::ExplicitOpen)
    }

    pub fn is_explicit(self) -> bool {
        matches!(self, OpenState::ExplicitOpen | OpenState::ExplicitClosed)
    }

    /// User toggle: an open node becomes explicitly closed and vice versa.
    pub fn toggled(self) -> Self {
        if self.is_open() {
            OpenState::ExplicitClosed
        } else {
            OpenState::ExplicitOpen
        }
    }

    /// Drop the user override, keeping the current openness.
    pub fn automatic(self) -> Self {
        if self.is_open() {
            OpenState::AutoOpen
        } else {
            OpenState::AutoClosed
        }
    }

    /// Apply the threshold decision for a node whose larger on-screen side is
    /// `size_px` pixels.
    ///
    /// Opening an already open node (or closing a closed one) keeps the state,
    /// so explicit choices survive inside the band. Any actual transition
    /// lands in an automatic state.
    pub fn next(self, size_px: f64, thresholds: &Thresholds) -> Self {
        match thresholds.decide(self, size_px) {
            AutoAction::Open if !self.is_open() => OpenState::AutoOpen,
            AutoAction::Close if self.is_open() => OpenState::AutoClosed,
            _ => self,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAction {
    Open,
    Close,
    Keep,
}

/// Pixel sizes at which directories open and close on their own.
///
/// A value of zero or below disables that direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub auto_open_px: f64,
    pub auto_close_px: f64,
    pub hard_open_px: f64,
    pub hard_close_px: f64,
}

impl Thresholds {
    pub fn from_style(style: &StyleConfig) -> Self {
        Self {
            auto_open_px: style.auto_open_dir_px,
            auto_close_px: style.auto_close_dir_px,
            hard_open_px: style.hard_open_dir_px,
            hard_close_px: style.hard_close_dir_px,
        }
    }

    pub fn decide(&self, state: OpenState, size_px: f64) -> AutoAction {
        let opening = if state == OpenState::ExplicitClosed {
            self.hard_open_px
        } else {
            self.auto_open_px
        };
        let closing = if state == OpenState::ExplicitOpen {
            self.hard_close_px
        } else {
            self.auto_close_px
        };

        if opening > 0.0 && size_px > opening {
            AutoAction::Open
        } else if closing > 0.0 && size_px < closing {
            AutoAction::Close
        } else {
            AutoAction::Keep
        }
    }
}
