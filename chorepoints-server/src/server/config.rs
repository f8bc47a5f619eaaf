use chorepoints_shared::domain::{Child, Chore, Reward};
use chorepoints_shared::ledger::MAX_ENTRY_POINTS;
use chorepoints_shared::milestones::MilestoneTable;
use serde::Deserialize;
use std::{env, fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt_secret: String,
    /// Parent accounts.
    pub users: Vec<UserConfig>,
    #[serde(default)]
    pub children: Vec<Child>,
    #[serde(default)]
    pub chores: Vec<Chore>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    /// Replaces the built-in milestone table when present.
    #[serde(default)]
    pub milestones: Option<MilestoneTable>,
    pub dev_cors_origin: Option<String>,
    pub listen_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub password_hash: String, // bcrypt hash
}

/// Chore and reward definitions loaded by the `import` command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub chores: Vec<Chore>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
}

impl Catalog {
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Every entry must belong to a parent known to `cfg`.
    pub fn check_parents(&self, cfg: &AppConfig) -> Result<(), ConfigError> {
        let parents = self
            .chores
            .iter()
            .map(|c| (&c.parent, &c.title))
            .chain(self.rewards.iter().map(|r| (&r.parent, &r.title)));
        for (parent, title) in parents {
            if cfg.find_user(parent).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "'{title}' names unknown parent '{parent}'"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Milestone table in effect: the configured override or the default.
    pub fn milestone_table(&self) -> MilestoneTable {
        self.milestones.clone().unwrap_or_default()
    }

    pub fn find_user(&self, username: &str) -> Option<&UserConfig> {
        self.users.iter().find(|u| u.username == username)
    }

    // Milestone tables validate themselves during deserialization.
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.jwt_secret.trim().is_empty() {
            return invalid("jwt_secret is empty".into());
        }
        if self.users.is_empty() {
            return invalid("at least one user is required".into());
        }
        for (i, u) in self.users.iter().enumerate() {
            if u.username.trim().is_empty() {
                return invalid(format!("users[{i}]: username is empty"));
            }
            if self.users[..i].iter().any(|o| o.username == u.username) {
                return invalid(format!("duplicate user '{}'", u.username));
            }
        }
        for c in &self.children {
            if self.find_user(&c.parent).is_none() {
                return invalid(format!(
                    "child '{}' names unknown parent '{}'",
                    c.display_name, c.parent
                ));
            }
        }
        for c in &self.chores {
            if self.find_user(&c.parent).is_none() {
                return invalid(format!(
                    "chore '{}' names unknown parent '{}'",
                    c.title, c.parent
                ));
            }
            if !(0..=MAX_ENTRY_POINTS).contains(&c.points) {
                return invalid(format!("chore '{}' points out of range", c.title));
            }
        }
        for r in &self.rewards {
            if self.find_user(&r.parent).is_none() {
                return invalid(format!(
                    "reward '{}' names unknown parent '{}'",
                    r.title, r.parent
                ));
            }
            if !(0..=MAX_ENTRY_POINTS).contains(&r.cost_points) {
                return invalid(format!("reward '{}' cost out of range", r.title));
            }
        }
        Ok(())
    }
}
