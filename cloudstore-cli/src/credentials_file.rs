use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use cloudstore_core::Credentials;

const APP_DIR: &str = "cloudstore";
const FILE_NAME: &str = "box-credentials.json";

/// Box credentials persisted as JSON under the user's config directory.
#[derive(Debug, Clone)]
pub struct CredentialsFile {
    path: PathBuf,
}

impl CredentialsFile {
    pub fn default_location() -> anyhow::Result<Self> {
        let base = dirs::config_dir().context("no configuration directory for this user")?;
        Ok(Self::at(base.join(APP_DIR).join(FILE_NAME)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let credentials = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(credentials))
    }

    pub fn save(&self, credentials: &Credentials) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(credentials)?;
        fs::write(&self.path, raw).with_context(|| format!("writing {}", self.path.display()))
    }
}
