//! Index page content: speakers and team
//!
//! Read from a TOML file (`site.content_file`) so the lineup can change
//! without a rebuild; the built-in lineup is used when no file is set.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ConfigError;

/// Team members per carousel slide
pub const TEAM_PER_SLIDE: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,
    pub organization: String,
    #[serde(default)]
    pub bio: String,
    /// Image path relative to /static
    pub img: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    #[serde(default)]
    pub position: String,
    pub img: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteContent {
    #[serde(default, rename = "speaker")]
    pub speakers: Vec<Speaker>,
    #[serde(default, rename = "team")]
    pub team: Vec<TeamMember>,
}

impl SiteContent {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Content from `path` when given, else the built-in lineup
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn builtin() -> Self {
        let organizers = [
            ("Emmett Souder", "assets/team/emmett.jpg"),
            ("Maddie Feldman", "assets/team/maddie.jpg"),
        ];

        Self {
            speakers: organizers
                .iter()
                .map(|(name, img)| Speaker {
                    name: name.to_string(),
                    organization: "Envision Princeton".to_string(),
                    bio: String::new(),
                    img: img.to_string(),
                })
                .collect(),
            team: organizers
                .iter()
                .map(|(name, img)| TeamMember {
                    name: name.to_string(),
                    position: "Co-Director".to_string(),
                    img: img.to_string(),
                })
                .collect(),
        }
    }

    /// Carousel slide count for the team section
    pub fn team_slides(&self) -> usize {
        (self.team.len() as f64 / TEAM_PER_SLIDE as f64 + 0.5) as usize + 1
    }
}
