use jwalk::WalkDir;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ConfigProvider, Visibility};

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Filesystem access failure for a single path.
#[derive(Debug)]
pub enum ProviderError {
    Io { path: PathBuf, source: std::io::Error },
    NotADirectory(PathBuf),
    Walk { path: PathBuf, message: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            ProviderError::NotADirectory(path) => write!(f, "{}: not a directory", path.display()),
            ProviderError::Walk { path, message } => write!(f, "{}: {}", path.display(), message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Io { source, .. } => Some(source),
            ProviderError::NotADirectory(_) | ProviderError::Walk { .. } => None,
        }
    }
}

/// One directory entry. `path` is relative to the mapped root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Source of directory listings and file contents.
///
/// Implementations may be called from worker threads.
pub trait FileSystemProvider: Send + Sync {
    /// List at most `limit` visible children of `path`, in a stable order.
    fn list_children(&self, path: &Path, limit: usize) -> Result<Vec<DirEntry>>;

    fn open_content(&self, path: &Path) -> Result<Box<dyn Read + Send>>;
}

/// Lists the real filesystem beneath a root directory.
///
/// Entries resolved as `Hidden` are dropped before the limit is applied, so
/// hidden entries never count towards it.
pub struct FsProvider {
    root: PathBuf,
    config: Arc<dyn ConfigProvider>,
}

impl FsProvider {
    pub fn new<P: AsRef<Path>>(root: P, config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.as_os_str().is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }
}

impl FileSystemProvider for FsProvider {
    fn list_children(&self, path: &Path, limit: usize) -> Result<Vec<DirEntry>> {
        let dir = self.resolve(path);
        let metadata = std::fs::metadata(&dir).map_err(|source| ProviderError::Io {
            path: dir.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ProviderError::NotADirectory(dir));
        }

        let walker = WalkDir::new(&dir)
            .skip_hidden(false)
            .min_depth(1)
            .max_depth(1)
            .sort(true)
            .parallelism(jwalk::Parallelism::Serial);

        let mut entries = Vec::new();
        for entry in walker {
            if entries.len() >= limit {
                break;
            }
            let entry = entry.map_err(|err| ProviderError::Walk {
                path: dir.clone(),
                message: err.to_string(),
            })?;

            // The path keeps the raw OS name; `name` is only a display label.
            let relative = path.join(entry.file_name());
            let name = entry.file_name().to_string_lossy().to_string();
            if self.config.options_for(&relative).visibility == Visibility::Hidden {
                continue;
            }
            entries.push(DirEntry {
                name,
                path: relative,
                is_dir: entry.file_type().is_dir(),
            });
        }

        Ok(entries)
    }

    fn open_content(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let full = self.resolve(path);
        let file = File::open(&full).map_err(|source| ProviderError::Io { path: full, source })?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("b.txt"), "bee").unwrap();
        fs::write(dir.path().join("a.txt"), "ay").unwrap();
        fs::write(dir.path().join("src").join("lib.rs"), "// lib").unwrap();
        dir
    }

    fn provider(dir: &tempfile::TempDir) -> FsProvider {
        FsProvider::new(dir.path(), Arc::new(RuleConfig::builtin().unwrap()))
    }

    #[test]
    fn test_lists_sorted_and_hides() {
        let dir = fixture();
        let entries = provider(&dir).list_children(Path::new(""), 100).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "src"]);
        assert!(entries[2].is_dir);
        assert!(!entries[0].is_dir);
        assert_eq!(entries[2].path, PathBuf::from("src"));
    }

    #[test]
    fn test_nested_paths_are_relative() {
        let dir = fixture();
        let entries = provider(&dir).list_children(Path::new("src"), 100).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, PathBuf::from("src").join("lib.rs"));
    }

    #[test]
    fn test_limit_applies_after_hiding() {
        let dir = fixture();
        let entries = provider(&dir).list_children(Path::new(""), 2).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = fixture();
        let p = provider(&dir);
        assert!(matches!(
            p.list_children(Path::new("nope"), 10),
            Err(ProviderError::Io { .. })
        ));
        assert!(matches!(
            p.list_children(Path::new("a.txt"), 10),
            Err(ProviderError::NotADirectory(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_stay_openable() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = fixture();
        let raw = OsStr::from_bytes(b"bad\xffname");
        fs::write(dir.path().join(raw), "raw").unwrap();
        fs::create_dir(dir.path().join("src").join(raw)).unwrap();
        fs::write(dir.path().join("src").join(raw).join("inner.rs"), "").unwrap();

        let p = provider(&dir);
        let entries = p.list_children(Path::new(""), 100).unwrap();
        let entry = entries.iter().find(|e| e.name.starts_with("bad")).unwrap();
        assert_eq!(entry.name, "bad\u{fffd}name");
        assert_eq!(entry.path, PathBuf::from(raw));

        let mut content = String::new();
        p.open_content(&entry.path).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "raw");

        let nested = p.list_children(Path::new("src"), 100).unwrap();
        let sub = nested.iter().find(|e| e.is_dir).unwrap();
        let inner = p.list_children(&sub.path, 100).unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].path, Path::new("src").join(raw).join("inner.rs"));
    }

    #[test]
    fn test_open_content() {
        let dir = fixture();
        let mut content = String::new();
        provider(&dir)
            .open_content(Path::new("b.txt"))
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "bee");
    }
}
