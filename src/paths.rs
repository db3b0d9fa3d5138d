use std::path::{Path, PathBuf};

use directories::BaseDirs;

const DATA_DIR_NAME: &str = ".kovri";
const CONFIG_FILE_NAME: &str = "kovri.conf";
const TUNNELS_FILE_NAME: &str = "tunnels.conf";
const LOGS_DIR_NAME: &str = "logs";

/// Layout of the router data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$HOME/.kovri`, or `./.kovri` when no home directory is known
    pub fn default_root() -> PathBuf {
        match BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(DATA_DIR_NAME),
            None => PathBuf::from(DATA_DIR_NAME),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn tunnels_file(&self) -> PathBuf {
        self.root.join(TUNNELS_FILE_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR_NAME)
    }
}

impl Default for DataDir {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}
