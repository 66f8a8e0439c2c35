use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fingerprint::DEFAULT_CHUNK_SIZE;
use crate::pdf::DEFAULT_IMAGE_SCALE;

const SETTINGS_FILENAME: &str = "config.yaml";
pub(crate) const APP_NAME: &str = "litcache";

/// Verbosity of the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Where cache entries live; the platform data directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Bytes read per step while fingerprinting
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Zoom used when rasterising embedded images (1.0 = 72 dpi)
    #[serde(default = "default_image_scale")]
    pub image_scale: f32,
}

fn default_read_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_image_scale() -> f32 {
    DEFAULT_IMAGE_SCALE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: LogLevel::default(),
            read_chunk_size: default_read_chunk_size(),
            image_scale: default_image_scale(),
        }
    }
}

/// `<config dir>/litcache/config.yaml`, if the platform has a config dir
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

impl Settings {
    /// Load settings from `path`, writing defaults there first if the file
    /// does not exist yet. Unreadable or malformed files fall back to
    /// defaults and are left untouched.
    pub fn load_or_create(path: &Path) -> Self {
        if !path.exists() {
            info!("Settings file not found, creating with defaults at {path:?}");
            let settings = Self::default();
            settings.save_to_path(path);
            return settings;
        }
        Self::load_from_path(path).unwrap_or_default()
    }

    /// Parse the settings file at `path`. Out-of-range numbers are replaced
    /// by their defaults; unknown keys are ignored.
    pub fn load_from_path(path: &Path) -> Option<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                error!("Failed to read settings file {path:?}: {e}");
                return None;
            }
        };

        let mut settings = match serde_yaml::from_str::<Settings>(&content) {
            Ok(settings) => settings,
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
                return None;
            }
        };
        debug!("Loaded settings from {path:?}");

        if settings.read_chunk_size == 0 {
            warn!("read_chunk_size must be positive, using {DEFAULT_CHUNK_SIZE}");
            settings.read_chunk_size = DEFAULT_CHUNK_SIZE;
        }
        if !(settings.image_scale > 0.0 && settings.image_scale.is_finite()) {
            warn!("image_scale must be positive, using {DEFAULT_IMAGE_SCALE}");
            settings.image_scale = DEFAULT_IMAGE_SCALE;
        }

        Some(settings)
    }

    pub fn save_to_path(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!("Failed to create config directory {parent:?}: {e}");
                    return;
                }
            }
        }

        match fs::write(path, generate_settings_yaml(self)) {
            Ok(()) => debug!("Saved settings to {path:?}"),
            Err(e) => error!("Failed to save settings to {path:?}: {e}"),
        }
    }
}

#[derive(Serialize)]
struct CacheDirEntry<'a> {
    cache_dir: &'a Path,
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("log_level: {}\n", settings.log_level.as_str()));
    content.push_str(&format!("read_chunk_size: {}\n", settings.read_chunk_size));
    content.push_str(&format!("image_scale: {:?}\n", settings.image_scale));
    content.push('\n');
    content.push_str(CACHE_DIR_TEMPLATE);

    // serde_yaml does the quoting; paths can hold anything YAML must escape
    let entry = settings
        .cache_dir
        .as_deref()
        .map(|cache_dir| serde_yaml::to_string(&CacheDirEntry { cache_dir }));
    match entry {
        Some(Ok(line)) => content.push_str(&line),
        Some(Err(e)) => {
            error!("Cannot write cache_dir {:?} to settings: {e}", settings.cache_dir);
            content.push_str("# cache_dir: \"/path/to/cache\"\n");
        }
        None => content.push_str("# cache_dir: \"/path/to/cache\"\n"),
    }

    content
}

const CACHE_DIR_TEMPLATE: &str = r#"# ============================================================================
# Cache location
# ============================================================================
# Extracted text and images are stored under this directory, one
# subdirectory per document fingerprint. Defaults to the platform data
# directory (for example ~/.local/share/litcache/storage on Linux).
"#;
