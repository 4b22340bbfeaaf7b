use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// String key-value pairs persisted as a TOML table.
///
/// Every write goes straight to disk.
#[derive(Debug, Clone)]
pub struct Preferences {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl Preferences {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                values: BTreeMap::new(),
            });
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read preferences at {path:?}"))?;
        let values: BTreeMap<String, String> = toml::from_str(&content)
            .with_context(|| format!("Failed to parse preferences at {path:?}"))?;
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write preferences at {:?}", self.path))?;
        restrict_permissions(&self.path)?;
        Ok(())
    }
}

/// The file holds a password, so keep it owner-only.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
