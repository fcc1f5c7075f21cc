//! rc-file configuration (`~/.immocrm/rc`).
//!
//! Plain `key=value` lines; blank lines and `#` comments are ignored.
//! Recognised keys:
//!
//! - `data.location` - database path, relative paths resolve against the rc directory
//! - `session.user` - user id handed over by the auth collaborator
//! - `session.organization` - currently selected organization (tenant)
//! - `compose.command` - shell command used to draft email bodies

use crate::models::{AuthContext, Session, TenantId};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const DATA_LOCATION: &str = "data.location";
pub const SESSION_USER: &str = "session.user";
pub const SESSION_ORGANIZATION: &str = "session.organization";
pub const COMPOSE_COMMAND: &str = "compose.command";

#[derive(Debug, Clone, Default)]
pub struct Config {
    path: PathBuf,
    entries: Vec<(String, String)>,
}

impl Config {
    /// Directory holding the rc file and the default database
    pub fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".immocrm"))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("rc"))
    }

    /// Load the rc file from the default location (missing file = empty config)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Config {
            path: path.to_path_buf(),
            entries: Vec::new(),
        };
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            config.entries = parse_entries(&content);
        }
        Ok(config)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.retain(|(k, _)| k != key);
        self.entries.push((key.to_string(), value.to_string()));
    }

    pub fn unset(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content: String = self
            .entries
            .iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect();
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write config file: {}", self.path.display()))
    }

    /// Database location, resolved against the rc file directory when relative
    pub fn data_location(&self) -> Result<PathBuf> {
        match self.get(DATA_LOCATION) {
            Some(location) => {
                let path = PathBuf::from(location);
                if path.is_relative() {
                    let base = self.path.parent().map(Path::to_path_buf).unwrap_or_default();
                    Ok(base.join(path))
                } else {
                    Ok(path)
                }
            }
            None => Ok(Self::home_dir()?.join("crm.db")),
        }
    }

    /// Session built from the configured user and organization
    pub fn session(&self) -> Option<Session> {
        let user = self.get(SESSION_USER)?;
        let tenant = self.get(SESSION_ORGANIZATION).map(TenantId::from);
        Some(Session::new(AuthContext::new(user), tenant))
    }
}

fn parse_entries(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_entries_skips_comments() {
        let entries = parse_entries("# comment\n\ndata.location=./crm.db\nsession.user = alice \n");
        assert_eq!(
            entries,
            vec![
                ("data.location".to_string(), "./crm.db".to_string()),
                ("session.user".to_string(), "alice".to_string()),
            ]
        );
    }

    #[test]
    fn test_relative_data_location() {
        let temp_dir = TempDir::new().unwrap();
        let rc = temp_dir.path().join("rc");
        std::fs::write(&rc, "data.location=./custom.db\n").unwrap();
        let config = Config::load_from(&rc).unwrap();
        assert_eq!(config.data_location().unwrap(), temp_dir.path().join("./custom.db"));
    }

    #[test]
    fn test_set_save_roundtrip_and_session() {
        let temp_dir = TempDir::new().unwrap();
        let rc = temp_dir.path().join("nested").join("rc");
        let mut config = Config::load_from(&rc).unwrap();
        assert!(config.session().is_none());

        config.set(SESSION_USER, "alice");
        config.save().unwrap();
        let reloaded = Config::load_from(&rc).unwrap();
        let session = reloaded.session().unwrap();
        assert_eq!(session.auth().user_id, "alice");
        assert!(!session.has_tenant());

        let mut reloaded = reloaded;
        reloaded.set(SESSION_ORGANIZATION, "org-1");
        reloaded.unset(SESSION_USER);
        assert!(reloaded.session().is_none());
    }
}
