use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a chore completion or reward redemption record.
///
/// Records are created `Pending` and move exactly once to `Approved` or
/// `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Pending,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Pending => "PENDING",
            RecordStatus::Approved => "APPROVED",
            RecordStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_pending(self) -> bool {
        self == RecordStatus::Pending
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown record status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for RecordStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(RecordStatus::Pending),
            "APPROVED" => Ok(RecordStatus::Approved),
            "REJECTED" => Ok(RecordStatus::Rejected),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Visual theme of a child's adventure map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapTheme {
    #[default]
    Island,
    Space,
    Rainbow,
}

impl MapTheme {
    pub const fn as_str(self) -> &'static str {
        match self {
            MapTheme::Island => "ISLAND",
            MapTheme::Space => "SPACE",
            MapTheme::Rainbow => "RAINBOW",
        }
    }
}

impl FromStr for MapTheme {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ISLAND" => Ok(MapTheme::Island),
            "SPACE" => Ok(MapTheme::Space),
            "RAINBOW" => Ok(MapTheme::Rainbow),
            other => Err(format!("unknown map theme: {other}")),
        }
    }
}

/// Child account as declared in the server config for seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Child {
    pub display_name: String,
    /// Username of the owning parent.
    pub parent: String,
    /// bcrypt hash of the child's PIN
    pub pin_hash: String,
    #[serde(default)]
    pub avatar_emoji: Option<String>,
    #[serde(default)]
    pub map_theme: MapTheme,
}

/// Chore definition as declared in config or an import catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chore {
    pub parent: String,
    pub title: String,
    pub points: i32,
    #[serde(default)]
    pub icon_emoji: Option<String>,
}

/// Reward definition as declared in config or an import catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub parent: String,
    pub title: String,
    pub cost_points: i32,
    #[serde(default)]
    pub icon_emoji: Option<String>,
}

pub const DEFAULT_CHORE_ICON: &str = "🧹";
pub const DEFAULT_REWARD_ICON: &str = "🎁";

/// Letter shown in place of an avatar when no emoji is set.
pub fn display_letter(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_string())
}
