use indextree::NodeId;

use crate::area::Rect;
use crate::camera::{Camera, Viewport};
use crate::config::{Rgba, StyleConfig};
use crate::draw::{DrawCmd, TextAlign, TileIcon};
use crate::loader::LoadTrigger;
use crate::open_state::Thresholds;
use crate::tree::{LoadState, MapTree, NodeKind, TreeNode};

/// Tiles narrower than this on screen get no label.
pub const SHOW_LABEL_PX: f64 = 60.0;

const MAX_LABEL_FONT_PX: f64 = 16.0;
const MAX_LABEL_BAR_PX: f64 = 30.0;
const LABEL_BAR_RATIO: f64 = 0.15;
const LABEL_PADDING_PX: f64 = 4.0;

const ICON_RATIO: f64 = 0.618_033_988;
const MIN_ICON_PX: f64 = 6.0;
const MAX_ICON_PX: f64 = 256.0;

/// Counters for one walk, mostly for status lines and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub drawn: usize,
    pub culled: usize,
    pub loads_started: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub commands: Vec<DrawCmd>,
    pub stats: FrameStats,
}

/// Walk the tree top-down for one frame.
///
/// Updates open states, discards children of closed and off-camera
/// directories, asks `loads` for children of newly opened ones, and returns
/// the draw list in back-to-front order.
pub fn render_frame(
    tree: &mut MapTree,
    camera: &Camera,
    viewport: Viewport,
    style: &StyleConfig,
    loads: &mut dyn LoadTrigger,
) -> Frame {
    let mut walk = Walk {
        camera: *camera,
        visible: camera.visible_area(viewport),
        style,
        thresholds: Thresholds::from_style(style),
        loads,
        frame: Frame::default(),
    };
    let root = tree.root();
    walk.node(tree, root, (0.0, 0.0));
    walk.frame
}

/// Deepest materialised node under a screen point.
pub fn hit_test(tree: &MapTree, camera: &Camera, sx: f64, sy: f64) -> Option<NodeId> {
    let (wx, wy) = camera.screen_to_world(sx, sy);
    let contains = |id: NodeId| {
        tree.get(id)
            .map(|n| n.area.absolute_rect().contains(wx, wy))
            .unwrap_or(false)
    };

    let mut current = tree.root();
    if !contains(current) {
        return None;
    }
    while let Some(child) = tree.children(current).into_iter().find(|&c| contains(c)) {
        current = child;
    }
    Some(current)
}

struct Walk<'a> {
    camera: Camera,
    visible: Rect,
    style: &'a StyleConfig,
    thresholds: Thresholds,
    loads: &'a mut dyn LoadTrigger,
    frame: Frame,
}

impl Walk<'_> {
    /// `origin` is the absolute top-left of the parent; the node's own area
    /// is relative to it.
    fn node(&mut self, tree: &mut MapTree, id: NodeId, origin: (f64, f64)) {
        let Some(node) = tree.get(id) else {
            return;
        };

        if !node.area.absolute_rect().intersects(&self.visible) {
            tree.unload_children(id);
            self.frame.stats.culled += 1;
            return;
        }

        let area = &node.area;
        let world = Rect::new(origin.0 + area.left(), origin.1 + area.top(), area.width(), area.height());
        let screen = self.camera.rect_to_screen(world);
        self.frame.stats.drawn += 1;

        let kind = node.kind;
        match kind {
            NodeKind::Leaf => self.solid(node, screen, self.style.file_color, TileIcon::File),
            NodeKind::LockedBranch => self.solid(node, screen, self.style.locked_dir_color, TileIcon::Locked),
            NodeKind::Branch => self.directory(tree, id, world, screen),
        }
    }

    fn directory(&mut self, tree: &mut MapTree, id: NodeId, world: Rect, screen: Rect) {
        let size_px = world.long_side() * self.camera.scale;
        let open = match tree.get_mut(id) {
            Some(node) => {
                node.open = node.open.next(size_px, &self.thresholds);
                node.open.is_open()
            }
            None => return,
        };

        if !open {
            tree.unload_children(id);
            if let Some(node) = tree.get(id) {
                self.solid(node, screen, self.style.closed_dir_color, TileIcon::ClosedDir);
            }
            return;
        }

        let load = match tree.get(id) {
            Some(node) => node.load.clone(),
            None => return,
        };
        match load {
            LoadState::Unchecked => {
                if self.loads.request(tree, id) {
                    self.frame.stats.loads_started += 1;
                }
                self.placeholder(tree, id, screen);
            }
            LoadState::Loading => self.placeholder(tree, id, screen),
            LoadState::Failed(_) => {
                if let Some(node) = tree.get(id) {
                    self.solid(node, screen, self.style.error_dir_color, TileIcon::Error);
                }
            }
            LoadState::Loaded => {
                if let Some(node) = tree.get(id) {
                    self.open_directory(node, screen);
                }
                for child in tree.children(id) {
                    self.node(tree, child, (world.x, world.y));
                }
            }
        }
    }

    fn placeholder(&mut self, tree: &MapTree, id: NodeId, screen: Rect) {
        // A request may have resolved synchronously into a locked or failed
        // state; the next frame draws that.
        if let Some(node) = tree.get(id) {
            self.solid(node, screen, self.style.loading_dir_color, TileIcon::Loading);
        }
    }

    fn open_directory(&mut self, node: &TreeNode, screen: Rect) {
        let options = &node.options;
        match &options.image {
            Some(image) => self.image(screen, image, self.style.open_dir_color),
            None => {
                let fill = options
                    .open_color
                    .or(options.color)
                    .unwrap_or(self.style.open_dir_color);
                self.frame.commands.push(DrawCmd::FillRect { rect: screen, color: fill });
                self.border(node, screen);
            }
        }
        self.label(node, screen);
    }

    fn solid(&mut self, node: &TreeNode, screen: Rect, default_color: Rgba, icon: TileIcon) {
        let fill = node.options.color.unwrap_or(default_color);
        match &node.options.image {
            Some(image) => self.image(screen, image, fill),
            None => self.frame.commands.push(DrawCmd::FillRect { rect: screen, color: fill }),
        }
        self.border(node, screen);

        if !node.options.hide_icon {
            self.icon(icon, screen);
        }
        self.label(node, screen);
    }

    fn image(&mut self, screen: Rect, image: &str, fallback: Rgba) {
        self.frame.commands.push(DrawCmd::Image {
            rect: screen,
            image: image.to_string(),
            fallback,
        });
    }

    fn border(&mut self, node: &TreeNode, screen: Rect) {
        self.frame.commands.push(DrawCmd::StrokeRect {
            rect: screen,
            color: node.options.border_color.unwrap_or(self.style.border_color),
            width: node.options.border_width.unwrap_or(self.style.border_width),
        });
    }

    fn icon(&mut self, icon: TileIcon, screen: Rect) {
        let size = screen.width * ICON_RATIO;
        if size < MIN_ICON_PX {
            return;
        }
        self.frame.commands.push(DrawCmd::Text {
            x: screen.x + screen.width / 2.0,
            y: screen.y + screen.height / 2.0,
            text: icon.glyph().to_string(),
            size: size.min(MAX_ICON_PX) as f32,
            color: self.style.icon_color,
            align: TextAlign::Center,
            clip: screen,
        });
    }

    fn label(&mut self, node: &TreeNode, screen: Rect) {
        if screen.width <= SHOW_LABEL_PX {
            return;
        }
        let bar = Rect::new(
            screen.x,
            screen.y,
            screen.width,
            (screen.height * LABEL_BAR_RATIO).min(MAX_LABEL_BAR_PX),
        );
        let font = (screen.width / 10.0).min(MAX_LABEL_FONT_PX).round();

        self.frame.commands.push(DrawCmd::FillRect {
            rect: bar,
            color: self.style.label_background,
        });
        self.frame.commands.push(DrawCmd::Text {
            x: bar.x + LABEL_PADDING_PX,
            y: bar.y + bar.height / 2.0,
            text: node.label.clone(),
            size: font as f32,
            color: self.style.label_color,
            align: TextAlign::Left,
            clip: bar,
        });
    }
}
