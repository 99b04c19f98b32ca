use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

const VENDOR_BASE: &str = "https://virginia.campusdish.com/en/locationsandmenus/";

/// The dining halls whose vendor pages are scraped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HallId {
    Ohill,
    Newcomb,
    Runk,
}

impl HallId {
    pub const ALL: [Self; 3] = [Self::Ohill, Self::Newcomb, Self::Runk];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Ohill => "ohill",
            Self::Newcomb => "newcomb",
            Self::Runk => "runk",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Ohill => "Observatory Hill Dining Room",
            Self::Newcomb => "Fresh Food Company",
            Self::Runk => "Runk Dining Hall",
        }
    }

    const fn page_slug(self) -> &'static str {
        match self {
            Self::Ohill => "observatoryhilldiningroom/",
            Self::Newcomb => "freshfoodcompany/",
            Self::Runk => "runk/",
        }
    }

    pub fn default_url(self) -> Url {
        Url::parse(VENDOR_BASE)
            .and_then(|base| base.join(self.page_slug()))
            .expect("vendor urls should be valid")
    }
}

impl FromStr for HallId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|hall| hall.key() == key)
            .ok_or_else(|| Error::UnknownHall(s.to_string()))
    }
}

impl Display for HallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
