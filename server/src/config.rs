use std::path::PathBuf;

use branchmap_shared::{FilterPolicy, SheetLayout};

pub const DEFAULT_SITES_PATH: &str = "LongLat_Geocode_Smartfren.xlsx";
pub const DEFAULT_COLOR_TAGS_PATH: &str = "color_tags.json";
pub const DEFAULT_STATIC_DIR: &str = "server/static";
pub const DEFAULT_SERVER_PORT: u16 = 3000;

pub const FILTERED_EXPORT_FILENAME: &str = "filtered_sites.xlsx";
pub const TAGGED_EXPORT_SUFFIX: &str = "_color_tags.xlsx";
pub const TAGGED_EXPORT_FALLBACK_STEM: &str = "all_regions";

/// Settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sites_path: PathBuf,
    pub layout: SheetLayout,
    pub policy: FilterPolicy,
    /// `None` keeps color tags in memory only.
    pub color_tags_path: Option<PathBuf>,
    pub static_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        let layout = sheet_layout();
        Self {
            sites_path: sites_path(),
            layout,
            policy: filter_policy(layout),
            color_tags_path: color_tags_persist().then(color_tags_path),
            static_dir: static_dir(),
        }
    }
}

pub fn sites_path() -> PathBuf {
    path_var("SITES_PATH").unwrap_or_else(|| PathBuf::from(DEFAULT_SITES_PATH))
}

pub fn sheet_layout() -> SheetLayout {
    std::env::var("SHEET_LAYOUT")
        .ok()
        .and_then(|value| SheetLayout::parse(&value))
        .unwrap_or_default()
}

/// Explicit `FILTER_POLICY` wins; otherwise regional sheets start blank.
pub fn filter_policy(layout: SheetLayout) -> FilterPolicy {
    std::env::var("FILTER_POLICY")
        .ok()
        .and_then(|value| FilterPolicy::parse(&value))
        .unwrap_or(match layout {
            SheetLayout::Regional => FilterPolicy::BlankUntilChosen,
            SheetLayout::Provincial => FilterPolicy::Cascading,
        })
}

pub fn color_tags_path() -> PathBuf {
    path_var("COLOR_TAGS_PATH").unwrap_or_else(|| PathBuf::from(DEFAULT_COLOR_TAGS_PATH))
}

pub fn color_tags_persist() -> bool {
    std::env::var("COLOR_TAGS_PERSIST")
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(true)
}

pub fn static_dir() -> PathBuf {
    path_var("STATIC_DIR").unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR))
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

fn path_var(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
