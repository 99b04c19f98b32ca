use std::{collections::BTreeMap, env, num::NonZeroU32, path::PathBuf, time::Duration};

use chrono_tz::Tz;
use url::Url;

use crate::{
    error::{Error, Result},
    hall::HallId,
};

#[derive(Debug, Clone)]
pub struct Config {
    /// Zone the vendor's hours are written in.
    pub timezone: Tz,
    pub timeout: Duration,
    /// Whether to fetch each meal period's page after the top-level one.
    pub fetch_periods: bool,
    pub rate_limit: NonZeroU32,
    pub store: Option<PathBuf>,
    pub(crate) urls: BTreeMap<HallId, Url>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            timeout: Duration::from_secs(20),
            fetch_periods: true,
            rate_limit: NonZeroU32::new(20).expect("20 is non-zero"),
            store: None,
            urls: HallId::ALL
                .into_iter()
                .map(|hall| (hall, hall.default_url()))
                .collect(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds a config from `lookup`, falling back to the defaults for unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(tz) = lookup("MENU_TIMEZONE") {
            config.timezone = tz
                .trim()
                .parse()
                .map_err(|e| Error::config("MENU_TIMEZONE", e))?;
        }
        if let Some(secs) = lookup("FETCH_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::config("FETCH_TIMEOUT_SECS", e))?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(flag) = lookup("FETCH_PERIODS") {
            config.fetch_periods = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        if let Some(limit) = lookup("RATE_LIMIT") {
            config.rate_limit = limit
                .trim()
                .parse()
                .map_err(|e| Error::config("RATE_LIMIT", e))?;
        }
        match lookup("STORE").as_deref() {
            Some(":memory:") => {}
            Some(p) => config.store = Some(PathBuf::from(p)),
            None => log::warn!("env var STORE not set, using ad-hoc memory store."),
        }
        for hall in HallId::ALL {
            let var = match hall {
                HallId::Ohill => "OHILL_URL",
                HallId::Newcomb => "NEWCOMB_URL",
                HallId::Runk => "RUNK_URL",
            };
            if let Some(url) = lookup(var) {
                let url = Url::parse(url.trim()).map_err(|e| Error::config(var, e))?;
                config.urls.insert(hall, url);
            }
        }
        Ok(config)
    }

    pub fn url(&self, hall: HallId) -> Url {
        self.urls
            .get(&hall)
            .cloned()
            .unwrap_or_else(|| hall.default_url())
    }
}
