//! Game realms and the characters a player has on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum RealmStatus {
    Online,
    Offline,
    Maintenance,
}

impl RealmStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RealmStatus::Online => "Online",
            RealmStatus::Offline => "Offline",
            RealmStatus::Maintenance => "Maintenance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Realm {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub region: String,
    pub status: RealmStatus,
    pub current_population: u32,
    pub max_population: u32,
    #[serde(default)]
    pub user_character_count: u32,
    #[serde(rename = "isPvP", default)]
    pub is_pvp: bool,
    pub created_at: DateTime<Utc>,
}

impl Realm {
    /// Population as a rounded percentage of capacity (0 when capacity is unknown).
    pub fn population_percentage(&self) -> u32 {
        if self.max_population == 0 {
            return 0;
        }
        let pct = f64::from(self.current_population) / f64::from(self.max_population) * 100.0;
        pct.round() as u32
    }

    /// Format population like "1,234 / 5,000"
    pub fn population_display(&self) -> String {
        format!(
            "{} / {}",
            group_thousands(self.current_population),
            group_thousands(self.max_population)
        )
    }

    pub fn is_joinable(&self) -> bool {
        self.status == RealmStatus::Online && self.current_population < self.max_population
    }
}

fn group_thousands(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub name: String,
    pub level: u32,
    #[serde(rename = "class")]
    pub class_name: String,
    pub realm_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub last_played_at: DateTime<Utc>,
}

/// Body of the realm characters endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealmCharactersResponse {
    #[serde(default)]
    pub characters: Vec<Character>,
}
