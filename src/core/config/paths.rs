use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub log_dir: PathBuf,
    pub history_dir: PathBuf,
    pub default_data_dir: PathBuf,
    pub config_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        Self::from_root(discover_project_root())
    }

    pub fn from_root(project_root: PathBuf) -> Self {
        let log_dir = project_root.join("logs");
        let history_dir = project_root.join("history");
        let default_data_dir = project_root.join("data");
        let config_path = env::var("STUDY_ASSISTANT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| project_root.join("config.yml"));
        let secrets_path = project_root.join("secrets.yaml");

        for dir in [&log_dir, &history_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            log_dir,
            history_dir,
            default_data_dir,
            config_path,
            secrets_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("STUDY_ASSISTANT_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if has_config(&manifest_dir) {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

fn has_config(dir: &Path) -> bool {
    dir.join("config.yml").exists()
}
