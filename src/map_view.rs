use indextree::NodeId;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::area::SpatialArea;
use crate::camera::{Camera, Gesture, Viewport};
use crate::config::{ConfigProvider, StyleConfig};
use crate::loader::Loader;
use crate::provider::{self, FileSystemProvider};
use crate::renderer::{self, Frame};
use crate::tree::{LoadState, MapTree, NodeKind};

/// Side length of the root tile in world units.
pub const ROOT_EXTENT: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
}

/// What a click did, for the host to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    None,
    /// A file was activated; `path` is relative to the mapped root.
    OpenFile(PathBuf),
    Toggled { path: PathBuf, open: bool },
    Retry(PathBuf),
    ClearedOverride(PathBuf),
}

/// One interactive map session: tree, camera and the loader feeding it.
///
/// All tree mutation happens on the thread that owns the view; background
/// listings are applied at the start of [`MapView::frame`].
pub struct MapView {
    tree: MapTree,
    camera: Camera,
    viewport: Viewport,
    style: StyleConfig,
    loader: Loader,
    fs: Arc<dyn FileSystemProvider>,
}

impl MapView {
    pub fn new(
        root_label: String,
        fs: Arc<dyn FileSystemProvider>,
        config: Arc<dyn ConfigProvider>,
        style: StyleConfig,
        viewport: Viewport,
    ) -> Self {
        let loader = Loader::new(Arc::clone(&fs), Arc::clone(&config));
        Self::with_loader(root_label, fs, config, style, viewport, loader)
    }

    /// Like [`MapView::new`] with a preconfigured loader (refresh hook, mode, cap).
    pub fn with_loader(
        root_label: String,
        fs: Arc<dyn FileSystemProvider>,
        config: Arc<dyn ConfigProvider>,
        style: StyleConfig,
        viewport: Viewport,
        loader: Loader,
    ) -> Self {
        let options = config.options_for(Path::new(""));
        let tree = MapTree::with_root_dir(root_label, SpatialArea::root(ROOT_EXTENT, ROOT_EXTENT), options);
        let camera = Camera::fit(tree_root_rect(&tree), viewport);
        Self {
            tree,
            camera,
            viewport,
            style,
            loader,
            fs,
        }
    }

    pub fn tree(&self) -> &MapTree {
        &self.tree
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn pending_loads(&self) -> usize {
        self.loader.in_flight()
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn gesture(&mut self, gesture: Gesture) {
        self.camera = self.camera.apply(gesture);
    }

    pub fn fit_to_root(&mut self) {
        self.camera = Camera::fit(tree_root_rect(&self.tree), self.viewport);
    }

    /// Apply finished listings, then walk and draw the visible tree.
    pub fn frame(&mut self) -> Frame {
        self.loader.apply_completed(&mut self.tree);
        renderer::render_frame(&mut self.tree, &self.camera, self.viewport, &self.style, &mut self.loader)
    }

    pub fn node_at(&self, sx: f64, sy: f64) -> Option<NodeId> {
        renderer::hit_test(&self.tree, &self.camera, sx, sy)
    }

    pub fn click(&mut self, sx: f64, sy: f64, button: MouseButton) -> ClickOutcome {
        let Some(id) = self.node_at(sx, sy) else {
            return ClickOutcome::None;
        };
        let Some(node) = self.tree.get(id) else {
            return ClickOutcome::None;
        };
        let path = node.path.clone();

        match (button, node.kind) {
            (MouseButton::Primary, NodeKind::Leaf) => ClickOutcome::OpenFile(path),
            (MouseButton::Primary, NodeKind::Branch) => {
                if matches!(node.load, LoadState::Failed(_)) {
                    tracing::info!(path = %path.display(), "retrying failed directory");
                    self.tree.unload_children(id);
                    return ClickOutcome::Retry(path);
                }
                let open = node.open.toggled();
                if let Some(node) = self.tree.get_mut(id) {
                    node.open = open;
                }
                if !open.is_open() {
                    self.tree.unload_children(id);
                }
                ClickOutcome::Toggled {
                    path,
                    open: open.is_open(),
                }
            }
            (MouseButton::Secondary, NodeKind::Branch) if node.open.is_explicit() => {
                let open = node.open.automatic();
                if let Some(node) = self.tree.get_mut(id) {
                    node.open = open;
                }
                ClickOutcome::ClearedOverride(path)
            }
            _ => ClickOutcome::None,
        }
    }

    /// Stream the contents of a file under the mapped root.
    pub fn open_content(&self, path: &Path) -> provider::Result<Box<dyn Read + Send>> {
        self.fs.open_content(path)
    }
}

fn tree_root_rect(tree: &MapTree) -> crate::area::Rect {
    tree.get(tree.root())
        .map(|n| n.area.absolute_rect())
        .unwrap_or_else(|| crate::area::Rect::new(0.0, 0.0, ROOT_EXTENT, ROOT_EXTENT))
}
