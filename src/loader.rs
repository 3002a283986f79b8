use indextree::NodeId;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigProvider, NodeOptions, Visibility};
use crate::layout::GridLayout;
use crate::provider::{DirEntry, FileSystemProvider, ProviderError};
use crate::tree::{LoadState, MapTree, NodeKind, TreeNode};

/// Directories with more visible entries than this are locked instead of laid out.
pub const CHILD_CAP: usize = 100;

/// Called whenever the map should be redrawn because load state changed.
/// May be invoked from a worker thread.
pub type RefreshFn = Arc<dyn Fn() + Send + Sync>;

/// Something the renderer can ask to populate a directory.
pub trait LoadTrigger {
    /// Start loading the children of `id` if it is an unchecked branch.
    /// Returns true if a load was started.
    fn request(&mut self, tree: &mut MapTree, id: NodeId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// List directories on the rayon pool.
    Background,
    /// List directories on the calling thread. Results are still applied
    /// through [`Loader::apply_completed`].
    Inline,
}

struct Listed {
    entry: DirEntry,
    options: NodeOptions,
}

struct Completion {
    node: NodeId,
    generation: u64,
    path: PathBuf,
    result: Result<Vec<Listed>, ProviderError>,
}

struct Job {
    node: NodeId,
    generation: u64,
    path: PathBuf,
    limit: usize,
    fs: Arc<dyn FileSystemProvider>,
    config: Arc<dyn ConfigProvider>,
    tx: Sender<Completion>,
    refresh: Option<RefreshFn>,
}

impl Job {
    fn run(self) {
        let result = self.fs.list_children(&self.path, self.limit).map(|entries| {
            entries
                .into_iter()
                .filter_map(|entry| {
                    let options = self.config.options_for(&entry.path);
                    (options.visibility != Visibility::Hidden).then_some(Listed { entry, options })
                })
                .collect()
        });

        // The receiver is gone only when the view was dropped.
        let _ = self.tx.send(Completion {
            node: self.node,
            generation: self.generation,
            path: self.path,
            result,
        });
        if let Some(refresh) = &self.refresh {
            refresh();
        }
    }
}

/// Lazily populates directory nodes.
///
/// A node is listed at most once per open session: the `Loading` state gates
/// further requests, and results are written back only on the thread that
/// calls [`Loader::apply_completed`], after checking the node was not
/// unloaded in the meantime.
pub struct Loader {
    fs: Arc<dyn FileSystemProvider>,
    config: Arc<dyn ConfigProvider>,
    cap: usize,
    mode: LoadMode,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    refresh: Option<RefreshFn>,
    in_flight: usize,
}

impl Loader {
    pub fn new(fs: Arc<dyn FileSystemProvider>, config: Arc<dyn ConfigProvider>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            fs,
            config,
            cap: CHILD_CAP,
            mode: LoadMode::Background,
            tx,
            rx,
            refresh: None,
            in_flight: 0,
        }
    }

    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshFn) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Listings started but not yet applied (including stale ones).
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn notify(&self) {
        if let Some(refresh) = &self.refresh {
            refresh();
        }
    }

    /// Write every finished listing back onto the tree. Returns how many
    /// were applied; stale listings are dropped and not counted.
    pub fn apply_completed(&mut self, tree: &mut MapTree) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            if self.apply(tree, completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait up to `timeout` for one listing, then apply everything pending.
    pub fn apply_blocking(&mut self, tree: &mut MapTree, timeout: Duration) -> usize {
        if self.in_flight == 0 {
            return 0;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => {
                let first = usize::from(self.apply(tree, completion));
                first + self.apply_completed(tree)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn apply(&mut self, tree: &mut MapTree, completion: Completion) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);

        let current = tree
            .get(completion.node)
            .map(|n| (n.load == LoadState::Loading && n.generation == completion.generation, Arc::clone(&n.area)));
        let parent_area = match current {
            Some((true, area)) => area,
            _ => {
                tracing::debug!(path = %completion.path.display(), "discarding stale listing");
                return false;
            }
        };

        let id = completion.node;
        match completion.result {
            Err(err) => {
                tracing::warn!(path = %completion.path.display(), error = %err, "failed to list directory");
                if let Some(node) = tree.get_mut(id) {
                    node.load = LoadState::Failed(err.to_string());
                }
            }
            Ok(listed) if listed.len() > self.cap => {
                tracing::info!(
                    path = %completion.path.display(),
                    cap = self.cap,
                    "directory exceeds child cap, locking"
                );
                if let Some(node) = tree.get_mut(id) {
                    node.kind = NodeKind::LockedBranch;
                    node.load = LoadState::Loaded;
                }
            }
            Ok(listed) => {
                let count = listed.len();
                for (item, area) in GridLayout::layout(&parent_area, listed) {
                    let kind = classify(&item.entry, &item.options);
                    let child = TreeNode::new(item.entry.path, item.entry.name, kind, area, item.options);
                    tree.append_child(id, child);
                }
                if let Some(node) = tree.get_mut(id) {
                    node.load = LoadState::Loaded;
                }
                tracing::debug!(path = %completion.path.display(), children = count, "loaded children");
            }
        }

        self.notify();
        true
    }
}

impl LoadTrigger for Loader {
    fn request(&mut self, tree: &mut MapTree, id: NodeId) -> bool {
        let Some(node) = tree.get_mut(id) else {
            return false;
        };
        if node.kind != NodeKind::Branch || node.load != LoadState::Unchecked {
            return false;
        }
        node.load = LoadState::Loading;

        let job = Job {
            node: id,
            generation: node.generation,
            path: node.path.clone(),
            // One past the cap so overflow is detectable without listing everything.
            limit: self.cap.saturating_add(1),
            fs: Arc::clone(&self.fs),
            config: Arc::clone(&self.config),
            tx: self.tx.clone(),
            refresh: self.refresh.clone(),
        };
        tracing::debug!(path = %job.path.display(), generation = job.generation, "loading children");

        self.in_flight += 1;
        self.notify();
        match self.mode {
            LoadMode::Background => rayon::spawn(move || job.run()),
            LoadMode::Inline => job.run(),
        }
        true
    }
}

fn classify(entry: &DirEntry, options: &NodeOptions) -> NodeKind {
    if entry.is_dir {
        NodeKind::directory(options)
    } else {
        NodeKind::Leaf
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::area::SpatialArea;
    use crate::provider;
    use std::collections::HashMap;
    use std::io::Read;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory directory tree for tests. Directories are the keys of `dirs`.
    #[derive(Default)]
    pub(crate) struct FakeFs {
        pub dirs: HashMap<PathBuf, Vec<(String, bool)>>,
        pub failing: Vec<PathBuf>,
        pub calls: AtomicUsize,
        pub limits: Mutex<Vec<usize>>,
    }

    impl FakeFs {
        pub fn with_dir(mut self, path: &str, entries: &[(&str, bool)]) -> Self {
            self.dirs.insert(
                PathBuf::from(path),
                entries.iter().map(|(n, d)| (n.to_string(), *d)).collect(),
            );
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FileSystemProvider for FakeFs {
        fn list_children(&self, path: &Path, limit: usize) -> provider::Result<Vec<DirEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.limits.lock().unwrap().push(limit);
            if self.failing.iter().any(|p| p == path) {
                return Err(ProviderError::Walk {
                    path: path.to_path_buf(),
                    message: "permission denied".into(),
                });
            }
            let entries = self.dirs.get(path).cloned().unwrap_or_default();
            Ok(entries
                .into_iter()
                .take(limit)
                .map(|(name, is_dir)| DirEntry {
                    path: path.join(&name),
                    name,
                    is_dir,
                })
                .collect())
        }

        fn open_content(&self, path: &Path) -> provider::Result<Box<dyn Read + Send>> {
            Ok(Box::new(std::io::Cursor::new(path.display().to_string().into_bytes())))
        }
    }

    pub(crate) struct FakeConfig(pub HashMap<PathBuf, Visibility>);

    impl ConfigProvider for FakeConfig {
        fn options_for(&self, path: &Path) -> NodeOptions {
            NodeOptions {
                visibility: self.0.get(path).copied().unwrap_or_default(),
                ..NodeOptions::default()
            }
        }
    }

    fn setup(fs: FakeFs) -> (Arc<FakeFs>, Loader, MapTree) {
        setup_with_config(fs, HashMap::new())
    }

    fn setup_with_config(fs: FakeFs, rules: HashMap<PathBuf, Visibility>) -> (Arc<FakeFs>, Loader, MapTree) {
        let fs = Arc::new(fs);
        let loader = Loader::new(fs.clone(), Arc::new(FakeConfig(rules))).with_mode(LoadMode::Inline);
        let tree = MapTree::with_root_dir("root".into(), SpatialArea::root(100.0, 100.0), NodeOptions::default());
        (fs, loader, tree)
    }

    fn many(n: usize) -> Vec<(String, bool)> {
        (0..n).map(|i| (format!("f{i:03}"), false)).collect()
    }

    #[test]
    fn test_double_request_lists_once() {
        let (fs, mut loader, mut tree) = setup(FakeFs::default().with_dir("", &[("a", false)]));
        let root = tree.root();

        assert!(loader.request(&mut tree, root));
        assert_eq!(tree.get(root).unwrap().load, LoadState::Loading);
        assert!(!loader.request(&mut tree, root));
        assert_eq!(fs.calls(), 1);

        assert_eq!(loader.apply_completed(&mut tree), 1);
        assert_eq!(tree.get(root).unwrap().load, LoadState::Loaded);
        assert!(!loader.request(&mut tree, root));
        assert_eq!(fs.calls(), 1);
        assert_eq!(loader.in_flight(), 0);
    }

    #[test]
    fn test_asks_for_one_past_cap() {
        let (fs, mut loader, mut tree) = setup(FakeFs::default());
        let root = tree.root();
        loader.request(&mut tree, root);
        assert_eq!(*fs.limits.lock().unwrap(), vec![CHILD_CAP + 1]);
    }

    #[test]
    fn test_cap_overflow_locks() {
        let mut fs = FakeFs::default();
        fs.dirs.insert(PathBuf::new(), many(101));
        let (_fs, mut loader, mut tree) = setup(fs);
        let root = tree.root();

        loader.request(&mut tree, root);
        loader.apply_completed(&mut tree);

        let node = tree.get(root).unwrap();
        assert_eq!(node.kind, NodeKind::LockedBranch);
        assert_eq!(node.load, LoadState::Loaded);
        assert!(tree.children(root).is_empty());

        // locked nodes are terminal
        assert!(!tree.unload_children(root));
        assert!(!loader.request(&mut tree, root));
    }

    #[test]
    fn test_custom_cap() {
        let mut fs = FakeFs::default();
        fs.dirs.insert(PathBuf::new(), many(4));
        let fs = Arc::new(fs);
        let mut loader = Loader::new(fs.clone(), Arc::new(FakeConfig(HashMap::new())))
            .with_mode(LoadMode::Inline)
            .with_cap(3);
        let mut tree =
            MapTree::with_root_dir("root".into(), SpatialArea::root(100.0, 100.0), NodeOptions::default());
        let root = tree.root();

        loader.request(&mut tree, root);
        loader.apply_completed(&mut tree);
        assert_eq!(*fs.limits.lock().unwrap(), vec![4]);
        assert_eq!(tree.get(root).unwrap().kind, NodeKind::LockedBranch);
    }

    #[test]
    fn test_exactly_cap_is_laid_out() {
        let mut fs = FakeFs::default();
        fs.dirs.insert(PathBuf::new(), many(100));
        let (_fs, mut loader, mut tree) = setup(fs);
        let root = tree.root();

        loader.request(&mut tree, root);
        loader.apply_completed(&mut tree);
        assert_eq!(tree.get(root).unwrap().kind, NodeKind::Branch);
        assert_eq!(tree.children(root).len(), 100);
    }

    #[test]
    fn test_classifies_children() {
        let fs = FakeFs::default().with_dir("", &[("file.rs", false), ("src", true), ("target", true)]);
        let rules = HashMap::from([(PathBuf::from("target"), Visibility::Closed)]);
        let (_fs, mut loader, mut tree) = setup_with_config(fs, rules);
        let root = tree.root();

        loader.request(&mut tree, root);
        loader.apply_completed(&mut tree);

        let kinds: Vec<_> = tree
            .children(root)
            .into_iter()
            .map(|id| {
                let n = tree.get(id).unwrap();
                (n.label.clone(), n.kind, n.load.clone())
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("file.rs".to_string(), NodeKind::Leaf, LoadState::Loaded),
                ("src".to_string(), NodeKind::Branch, LoadState::Unchecked),
                ("target".to_string(), NodeKind::LockedBranch, LoadState::Loaded),
            ]
        );
    }

    #[test]
    fn test_hidden_entries_are_never_materialised() {
        let fs = FakeFs::default().with_dir("", &[("keep", false), ("secret", false)]);
        let rules = HashMap::from([(PathBuf::from("secret"), Visibility::Hidden)]);
        let (_fs, mut loader, mut tree) = setup_with_config(fs, rules);
        let root = tree.root();

        loader.request(&mut tree, root);
        loader.apply_completed(&mut tree);
        assert_eq!(tree.children(root).len(), 1);
        assert!(tree.find(Path::new("secret")).is_none());
    }

    #[test]
    fn test_children_laid_out_against_parent() {
        let fs = FakeFs::default().with_dir("", &[("a", false), ("b", false), ("c", false), ("d", false)]);
        let (_fs, mut loader, mut tree) = setup(fs);
        let root = tree.root();

        loader.request(&mut tree, root);
        loader.apply_completed(&mut tree);

        let root_area = Arc::clone(&tree.get(root).unwrap().area);
        let areas: Vec<_> = tree
            .children(root)
            .into_iter()
            .map(|id| Arc::clone(&tree.get(id).unwrap().area))
            .collect();
        assert_eq!(areas.len(), 4);
        for area in &areas {
            assert!(Arc::ptr_eq(area.parent().unwrap(), &root_area));
            assert!((area.width() - 42.5).abs() < 1e-9);
        }
        assert!(areas[1].left() > areas[0].left());
        assert!(areas[2].top() > areas[0].top());
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let fs = FakeFs::default().with_dir("", &[("a", false)]);
        let (fs, mut loader, mut tree) = setup(fs);
        let root = tree.root();

        loader.request(&mut tree, root);
        // scrolled away before the listing landed
        assert!(tree.unload_children(root));
        assert_eq!(loader.apply_completed(&mut tree), 0);
        assert_eq!(tree.get(root).unwrap().load, LoadState::Unchecked);
        assert!(tree.children(root).is_empty());

        // a fresh request after the reset is applied normally
        assert!(loader.request(&mut tree, root));
        assert_eq!(loader.apply_completed(&mut tree), 1);
        assert_eq!(tree.children(root).len(), 1);
        assert_eq!(fs.calls(), 2);
    }

    #[test]
    fn test_old_generation_does_not_clobber_new_load() {
        let fs = FakeFs::default().with_dir("", &[("a", false)]);
        let (_fs, mut loader, mut tree) = setup(fs);
        let root = tree.root();

        loader.request(&mut tree, root);
        tree.unload_children(root);
        loader.request(&mut tree, root);

        // first completion is stale (old generation), second applies
        assert_eq!(loader.apply_completed(&mut tree), 1);
        assert_eq!(tree.children(root).len(), 1);
    }

    #[test]
    fn test_provider_failure_marks_node() {
        let mut fs = FakeFs::default();
        fs.failing.push(PathBuf::new());
        let (_fs, mut loader, mut tree) = setup(fs);
        let root = tree.root();

        loader.request(&mut tree, root);
        loader.apply_completed(&mut tree);
        match &tree.get(root).unwrap().load {
            LoadState::Failed(msg) => assert!(msg.contains("permission denied")),
            other => panic!("expected failure, got {other:?}"),
        }

        // unloading allows a retry
        assert!(tree.unload_children(root));
        assert_eq!(tree.get(root).unwrap().load, LoadState::Unchecked);
    }

    #[test]
    fn test_background_load_and_refresh() {
        let fs = Arc::new(FakeFs::default().with_dir("", &[("a", false), ("b", true)]));
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = refreshes.clone();
        let mut loader = Loader::new(fs, Arc::new(FakeConfig(HashMap::new())))
            .with_refresh(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        let mut tree =
            MapTree::with_root_dir("root".into(), SpatialArea::root(100.0, 100.0), NodeOptions::default());
        let root = tree.root();

        assert!(loader.request(&mut tree, root));
        assert_eq!(loader.apply_blocking(&mut tree, Duration::from_secs(5)), 1);
        assert_eq!(tree.get(root).unwrap().load, LoadState::Loaded);
        assert_eq!(tree.children(root).len(), 2);
        // begin and apply; the worker's own signal may still be in flight
        assert!(refreshes.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_leaf_request_is_noop() {
        let fs = FakeFs::default().with_dir("", &[("a", false)]);
        let (fs, mut loader, mut tree) = setup(fs);
        let root = tree.root();
        loader.request(&mut tree, root);
        loader.apply_completed(&mut tree);
        let leaf = tree.children(root)[0];
        assert!(!loader.request(&mut tree, leaf));
        assert_eq!(fs.calls(), 1);
    }
}
