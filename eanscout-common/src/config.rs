//! Configuration loading and root folder resolution
//!
//! Two layers:
//! 1. **TOML bootstrap** (`eanscout.toml`): every field has a built-in default,
//!    a missing file is not an error.
//! 2. **Process overrides**: command-line arguments and environment variables
//!    applied on top by the binary.
//!
//! The loaded configuration is read-only for the lifetime of the process.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "EANSCOUT_ROOT_FOLDER";

/// Environment variable overriding `images.max_images_per_product`
pub const MAX_IMAGES_ENV: &str = "MAX_IMAGES_PER_PRODUCT";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder for the database and stored images
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    pub port: u16,

    /// SQLite database file (default: `<root>/ean_results.db`)
    pub database_path: Option<PathBuf>,

    /// Directory for product images (default: `<root>/static/product_images`)
    pub image_storage_path: Option<PathBuf>,

    pub logging: LoggingConfig,
    pub scraper: ScraperConfig,
    pub images: ImageConfig,
    pub tasks: TaskConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset
    pub level: String,
}

/// Whether a cached record may be re-scraped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Any stored record is authoritative
    #[default]
    Always,
    /// Stored records that never matched a source are resolved again
    RetryUnresolved,
}

/// Outbound scraping configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Per-request timeout for adapter and image fetches
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub cache_policy: CachePolicy,
    /// Tried first, in list order
    pub celio_sites: Vec<SiteConfig>,
    /// Tried after every celio site, ordered by `priority`
    pub modov_domains: Vec<SiteConfig>,
}

/// One adapter instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteConfig {
    /// Search endpoint (celio)
    #[serde(default)]
    pub base_url: String,

    /// Host name used for absolute image URLs; the whole target for modov
    #[serde(default, alias = "domain")]
    pub site_name: String,

    /// Query parameter carrying the EAN (celio)
    #[serde(default = "default_query_param")]
    pub param: String,

    #[serde(default)]
    pub country: String,

    /// Lower runs first (modov)
    #[serde(default)]
    pub priority: u32,
}

/// Image storage limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub max_images_per_product: usize,
    /// Lowercase, with leading dot
    pub allowed_extensions: Vec<String>,
    pub max_file_size_mb: u64,
}

/// Background task execution
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Resolutions running at once; further tasks wait in `pending`
    pub max_concurrent: usize,
    /// Records older than this are swept regardless of state
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
}

fn default_query_param() -> String {
    "q".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: 8000,
            database_path: None,
            image_storage_path: None,
            logging: LoggingConfig::default(),
            scraper: ScraperConfig::default(),
            images: ImageConfig::default(),
            tasks: TaskConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_policy: CachePolicy::Always,
            celio_sites: vec![
                SiteConfig::celio("https://www.celiostore.cz/hledat", "celiostore.cz", "query", "CZ"),
                SiteConfig::celio("https://www.celiostore.sk/hladat", "celiostore.sk", "query", "SK"),
                SiteConfig::celio("https://www.celio.tn/search", "celio.tn", "q", "TN"),
                SiteConfig::celio("https://www.celio.it/cerca", "celio.it", "q", "IT"),
            ],
            modov_domains: vec![
                SiteConfig::modov("modov.sk", 1, "SK"),
                SiteConfig::modov("zbozi.cz", 2, "CZ"),
                SiteConfig::modov("hledejceny.cz", 3, "CZ"),
                SiteConfig::modov("arukereso.hu", 4, "HU"),
                SiteConfig::modov("ceneo.pl", 5, "PL"),
                SiteConfig::modov("idealo.de", 6, "DE"),
            ],
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_images_per_product: 3,
            allowed_extensions: [".jpg", ".jpeg", ".png", ".webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size_mb: 5,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            retention_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

impl SiteConfig {
    /// Celio-style search endpoint
    pub fn celio(base_url: &str, site_name: &str, param: &str, country: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            site_name: site_name.to_string(),
            param: param.to_string(),
            country: country.to_string(),
            priority: 0,
        }
    }

    /// Price-comparison domain with a fixed URL template
    pub fn modov(domain: &str, priority: u32, country: &str) -> Self {
        Self {
            base_url: String::new(),
            site_name: domain.to_string(),
            param: default_query_param(),
            country: country.to_string(),
            priority,
        }
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Modov domains sorted by priority; equal priorities keep list order
    pub fn modov_by_priority(&self) -> Vec<&SiteConfig> {
        let mut domains: Vec<&SiteConfig> = self.modov_domains.iter().collect();
        domains.sort_by_key(|d| d.priority);
        domains
    }
}

impl ImageConfig {
    pub fn max_file_size_bytes(&self) -> usize {
        (self.max_file_size_mb as usize) * 1024 * 1024
    }

    /// Case-insensitive check of a `.ext` suffix against the allow list
    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }
}

impl TomlConfig {
    /// Database file, relative to the root folder unless configured
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| root_folder.join("ean_results.db"))
    }

    /// Image directory, relative to the root folder unless configured
    pub fn image_storage_path(&self, root_folder: &Path) -> PathBuf {
        self.image_storage_path
            .clone()
            .unwrap_or_else(|| root_folder.join("static").join("product_images"))
    }

    /// Apply process environment overrides (`MAX_IMAGES_PER_PRODUCT`)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(MAX_IMAGES_ENV) {
            match value.trim().parse::<usize>() {
                Ok(cap) => self.images.max_images_per_product = cap,
                Err(_) => warn!("Ignoring non-numeric {}={}", MAX_IMAGES_ENV, value),
            }
        }
    }
}

/// Load TOML configuration
///
/// A missing file logs a warning and yields defaults. A file that exists but
/// does not parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Default configuration file location (`~/.config/eanscout/eanscout.toml`)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("eanscout").join("eanscout.toml"))
        .unwrap_or_else(|| PathBuf::from("eanscout.toml"))
}

/// Root folder resolution, priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("eanscout"))
        .unwrap_or_else(|| PathBuf::from("./eanscout_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modov_by_priority_sorts_and_keeps_ties_stable() {
        let config = ScraperConfig {
            modov_domains: vec![
                SiteConfig::modov("c.example", 3, "CZ"),
                SiteConfig::modov("a.example", 1, "SK"),
                SiteConfig::modov("b.example", 3, "HU"),
            ],
            ..ScraperConfig::default()
        };

        let order: Vec<&str> = config
            .modov_by_priority()
            .iter()
            .map(|d| d.site_name.as_str())
            .collect();
        assert_eq!(order, vec!["a.example", "c.example", "b.example"]);
    }

    #[test]
    fn test_allowed_extension_is_case_insensitive() {
        let images = ImageConfig::default();
        assert!(images.is_allowed_extension(".JPG"));
        assert!(images.is_allowed_extension(".webp"));
        assert!(!images.is_allowed_extension(".gif"));
    }

    #[test]
    fn test_paths_default_under_root() {
        let config = TomlConfig::default();
        let root = Path::new("/srv/eanscout");
        assert_eq!(config.database_path(root), root.join("ean_results.db"));
        assert_eq!(
            config.image_storage_path(root),
            root.join("static").join("product_images")
        );
    }
}
