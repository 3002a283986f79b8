use dashmap::DashMap;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File looked up at the mapped root when no explicit config path is given.
pub const CONFIG_FILE_NAME: &str = "dirscape.json";

const DEFAULT_CONFIG: &str = r##"{
  "rules": [
    { "pattern": "(.*/)?\\.git", "visibility": "hidden" },
    { "pattern": "(.*/)?(target|node_modules)", "visibility": "closed" }
  ]
}"##;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading configuration. All of them are fatal at startup.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
    Pattern { pattern: String, source: regex::Error },
    Color(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config {}: {}", path.display(), source)
            }
            ConfigError::Json(err) => write!(f, "malformed config: {}", err),
            ConfigError::Pattern { pattern, source } => {
                write!(f, "invalid rule pattern {:?}: {}", pattern, source)
            }
            ConfigError::Color(value) => write!(f, "invalid color {:?}", value),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Json(err) => Some(err),
            ConfigError::Pattern { source, .. } => Some(source),
            ConfigError::Color(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn parse(value: &str) -> Result<Self> {
        let bad = || ConfigError::Color(value.to_string());
        let hex = value.strip_prefix('#').ok_or_else(bad)?;
        if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
            return Err(bad());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
        let a = if hex.len() == 8 { byte(6)? } else { 255 };
        Ok(Self {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    Closed,
}

/// Display options resolved for one path. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeOptions {
    pub visibility: Visibility,
    pub color: Option<Rgba>,
    pub open_color: Option<Rgba>,
    pub border_color: Option<Rgba>,
    pub border_width: Option<f32>,
    pub image: Option<String>,
    pub hide_icon: bool,
}

/// Resolves per-path display options.
///
/// Paths are relative to the mapped root; the root itself is the empty path.
pub trait ConfigProvider: Send + Sync {
    fn options_for(&self, path: &Path) -> NodeOptions;
}

/// Colors, stroke widths and open/close thresholds used by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub file_color: Rgba,
    pub open_dir_color: Rgba,
    pub closed_dir_color: Rgba,
    pub loading_dir_color: Rgba,
    pub locked_dir_color: Rgba,
    pub error_dir_color: Rgba,
    pub border_color: Rgba,
    pub border_width: f32,
    pub label_background: Rgba,
    pub label_color: Rgba,
    pub icon_color: Rgba,
    pub auto_open_dir_px: f64,
    pub auto_close_dir_px: f64,
    pub hard_open_dir_px: f64,
    pub hard_close_dir_px: f64,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            file_color: Rgba::rgb(59, 130, 246),
            open_dir_color: Rgba::rgb(30, 41, 59),
            closed_dir_color: Rgba::rgb(139, 92, 246),
            loading_dir_color: Rgba::rgb(71, 85, 105),
            locked_dir_color: Rgba::rgb(100, 116, 139),
            error_dir_color: Rgba::rgb(239, 68, 68),
            border_color: Rgba::rgb(226, 232, 240),
            border_width: 1.0,
            label_background: Rgba { r: 15, g: 23, b: 42, a: 200 },
            label_color: Rgba::rgb(255, 255, 255),
            icon_color: Rgba { r: 255, g: 255, b: 255, a: 160 },
            auto_open_dir_px: 200.0,
            auto_close_dir_px: 50.0,
            hard_open_dir_px: 1200.0,
            hard_close_dir_px: 20.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawStyle {
    file_color: Option<String>,
    open_dir_color: Option<String>,
    closed_dir_color: Option<String>,
    loading_dir_color: Option<String>,
    locked_dir_color: Option<String>,
    error_dir_color: Option<String>,
    border_color: Option<String>,
    border_width: Option<f32>,
    label_background: Option<String>,
    label_color: Option<String>,
    icon_color: Option<String>,
    auto_open_dir_px: Option<f64>,
    auto_close_dir_px: Option<f64>,
    hard_open_dir_px: Option<f64>,
    hard_close_dir_px: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    pattern: String,
    #[serde(default)]
    visibility: Visibility,
    color: Option<String>,
    open_color: Option<String>,
    border_color: Option<String>,
    border_width: Option<f32>,
    image: Option<String>,
    #[serde(default)]
    hide_icon: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    style: RawStyle,
    rules: Vec<RawRule>,
}

fn parse_color(value: Option<String>) -> Result<Option<Rgba>> {
    value.as_deref().map(Rgba::parse).transpose()
}

impl RawStyle {
    fn resolve(self) -> Result<StyleConfig> {
        let d = StyleConfig::default();
        Ok(StyleConfig {
            file_color: parse_color(self.file_color)?.unwrap_or(d.file_color),
            open_dir_color: parse_color(self.open_dir_color)?.unwrap_or(d.open_dir_color),
            closed_dir_color: parse_color(self.closed_dir_color)?.unwrap_or(d.closed_dir_color),
            loading_dir_color: parse_color(self.loading_dir_color)?.unwrap_or(d.loading_dir_color),
            locked_dir_color: parse_color(self.locked_dir_color)?.unwrap_or(d.locked_dir_color),
            error_dir_color: parse_color(self.error_dir_color)?.unwrap_or(d.error_dir_color),
            border_color: parse_color(self.border_color)?.unwrap_or(d.border_color),
            border_width: self.border_width.unwrap_or(d.border_width),
            label_background: parse_color(self.label_background)?.unwrap_or(d.label_background),
            label_color: parse_color(self.label_color)?.unwrap_or(d.label_color),
            icon_color: parse_color(self.icon_color)?.unwrap_or(d.icon_color),
            auto_open_dir_px: self.auto_open_dir_px.unwrap_or(d.auto_open_dir_px),
            auto_close_dir_px: self.auto_close_dir_px.unwrap_or(d.auto_close_dir_px),
            hard_open_dir_px: self.hard_open_dir_px.unwrap_or(d.hard_open_dir_px),
            hard_close_dir_px: self.hard_close_dir_px.unwrap_or(d.hard_close_dir_px),
        })
    }
}

struct Rule {
    regex: Regex,
    options: NodeOptions,
}

impl RawRule {
    fn compile(self) -> Result<Rule> {
        // Rules match the whole relative path, not a substring of it.
        let regex = Regex::new(&format!("^(?:{})$", self.pattern)).map_err(|source| {
            ConfigError::Pattern {
                pattern: self.pattern.clone(),
                source,
            }
        })?;
        Ok(Rule {
            regex,
            options: NodeOptions {
                visibility: self.visibility,
                color: parse_color(self.color)?,
                open_color: parse_color(self.open_color)?,
                border_color: parse_color(self.border_color)?,
                border_width: self.border_width,
                image: self.image,
                hide_icon: self.hide_icon,
            },
        })
    }
}

/// Ordered path-pattern rules plus the renderer style, loaded from JSON.
///
/// The first matching rule wins; unmatched paths are visible with no
/// overrides. Resolutions are memoised per path.
pub struct RuleConfig {
    rules: Vec<Rule>,
    style: StyleConfig,
    /// Never evicted: holds at most one entry per path visited under the
    /// mapped root, so it is bounded by the size of that directory tree.
    resolved: DashMap<PathBuf, NodeOptions>,
}

impl RuleConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(source)?;
        let style = raw.style.resolve()?;
        let rules = raw
            .rules
            .into_iter()
            .map(RawRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            style,
            resolved: DashMap::new(),
        })
    }

    /// Built-in rules: hide `.git`, close build output directories.
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_CONFIG)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&source)?;
        tracing::info!(path = %path.display(), rules = config.rules.len(), "loaded config");
        Ok(config)
    }

    /// Load `explicit` if given, else `<root>/dirscape.json` if it exists,
    /// else the built-in rules.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::from_file(&candidate)
        } else {
            tracing::info!(root = %root.display(), "no {} found, using built-in rules", CONFIG_FILE_NAME);
            Self::builtin()
        }
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn resolve(&self, path: &Path) -> NodeOptions {
        let key = normalized(path);
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(&key))
            .map(|rule| rule.options.clone())
            .unwrap_or_default()
    }
}

impl ConfigProvider for RuleConfig {
    fn options_for(&self, path: &Path) -> NodeOptions {
        if let Some(hit) = self.resolved.get(path) {
            return hit.clone();
        }
        let options = self.resolve(path);
        self.resolved.insert(path.to_path_buf(), options.clone());
        options
    }
}

/// Relative path with `/` separators regardless of platform.
fn normalized(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
