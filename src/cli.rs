use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::camera::Viewport;
use crate::config::{self, ConfigProvider, RuleConfig};
use crate::loader::{Loader, RefreshFn};
use crate::logging::LogOptions;
use crate::map_view::MapView;
use crate::provider::{FileSystemProvider, FsProvider};

/// Command line shared by the GUI and terminal hosts.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Zoomable map of a directory tree", long_about = None)]
pub struct HostArgs {
    /// Directory to map
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Configuration file (defaults to dirscape.json in the mapped directory)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "dirscape=trace"
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl HostArgs {
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            filter: self.log_level.clone(),
            file: self.log_file.clone(),
        }
    }

    /// Mapped root, canonicalized when possible.
    pub fn root(&self) -> PathBuf {
        std::fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone())
    }

    /// Build a map session over [`HostArgs::root`]. `refresh` is called from
    /// worker threads whenever a redraw is due.
    pub fn open_view(&self, viewport: Viewport, refresh: Option<RefreshFn>) -> config::Result<MapView> {
        let root = self.root();
        let rules = Arc::new(RuleConfig::load(&root, self.config.as_deref())?);
        let style = rules.style().clone();
        tracing::info!(root = %root.display(), rules = rules.rule_count(), "opening map");

        let config: Arc<dyn ConfigProvider> = rules;
        let fs: Arc<dyn FileSystemProvider> = Arc::new(FsProvider::new(&root, Arc::clone(&config)));
        let mut loader = Loader::new(Arc::clone(&fs), Arc::clone(&config));
        if let Some(refresh) = refresh {
            loader = loader.with_refresh(refresh);
        }
        Ok(MapView::with_loader(root_label(&root), fs, config, style, viewport, loader))
    }
}

/// Display name for the root tile: the directory name, or the full path for
/// roots like `/`.
pub fn root_label(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}
