//! Zoomable spatial map of a directory tree.
//!
//! Directories are tiled rectangles holding their children, files are leaf
//! tiles, and a camera pans and zooms over the resulting world plane. Children
//! are listed lazily as their parent becomes large enough on screen, and are
//! dropped again when the parent closes or scrolls out of view.

pub mod area;
pub mod camera;
pub mod cli;
pub mod config;
pub mod draw;
pub mod layout;
pub mod loader;
pub mod logging;
pub mod map_view;
pub mod open_state;
pub mod provider;
pub mod renderer;
pub mod tree;
