use dirs::data_dir;
use std::{
    fs,
    path::{Path, PathBuf},
};

const APP_DIR: &str = "offi-scrape";

pub fn data_root() -> PathBuf {
    data_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .join(APP_DIR)
}

pub fn config_path() -> PathBuf {
    data_root().join("config.json")
}

pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
