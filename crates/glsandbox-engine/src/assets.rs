use std::path::{Path, PathBuf};

use crate::error::EngineError;

pub const ASSETS_ENV: &str = "GLSANDBOX_ASSETS";

/// A located `assets/` directory holding `sandbox.json` and the user's shaders.
#[derive(Debug, Clone)]
pub struct AssetsRoot {
    path: PathBuf,
}

impl AssetsRoot {
    /// Locate the `assets/` directory.
    ///
    /// Resolution order:
    /// 1) `GLSANDBOX_ASSETS` env var (if set and existing)
    /// 2) Search upward from `start_dir` for a folder named `assets`
    pub fn discover(start_dir: &Path) -> Result<Self, EngineError> {
        if let Ok(p) = std::env::var(ASSETS_ENV) {
            let pb = PathBuf::from(p);
            if pb.is_dir() {
                return Ok(Self { path: pb });
            }
        }
        Self::search_upward(start_dir)
    }

    fn search_upward(start_dir: &Path) -> Result<Self, EngineError> {
        let mut cur = start_dir.to_path_buf();
        loop {
            let cand = cur.join("assets");
            if cand.is_dir() {
                return Ok(Self { path: cand });
            }
            if !cur.pop() {
                break;
            }
        }
        Err(EngineError::AssetsNotFound {
            start_dir: start_dir.to_path_buf(),
        })
    }

    /// Use `path` as-is (the `--assets` flag).
    pub fn at(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        if path.is_dir() {
            Ok(Self { path })
        } else {
            Err(EngineError::AssetsNotFound { start_dir: path })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.path.join(rel)
    }

    /// Relative paths from config files are resolved against the assets directory.
    pub fn resolve(&self, s: &str) -> PathBuf {
        let p = PathBuf::from(s);
        if p.is_absolute() {
            p
        } else {
            self.path.join(p)
        }
    }

    pub fn pick_platform_json(&self, stem: &str) -> PathBuf {
        pick_platform_json(&self.path, stem)
    }
}

/// `<stem>.<os>.json` when present, else `<stem>.json`.
pub fn pick_platform_json(assets: &Path, stem: &str) -> PathBuf {
    let os = if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "other"
    };

    let platform = assets.join(format!("{stem}.{os}.json"));
    if platform.exists() {
        platform
    } else {
        assets.join(format!("{stem}.json"))
    }
}

pub fn read_to_string(path: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
