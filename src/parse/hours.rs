use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    extract::{extract_balanced, hours_anchor, strip_trailing_commas, unescape_js_string},
    vendor_id::de_opt_id,
    ExtractionError,
};
use crate::error::{Error, Result};

/// One slice of the hours blob. A meal period may be split over several slices.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HoursEntry {
    /// Sunday = 0.
    #[serde(deserialize_with = "de_day_of_week")]
    pub day_of_week: u32,
    #[serde(default)]
    pub is_closed: Option<bool>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub meal_period_id: Option<String>,
}

fn de_day_of_week<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let day = match &value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    day.filter(|d| *d < 7)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid day of week {value}")))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodHours {
    pub start: String,
    pub end: String,
}

/// Opening hours of one hall on one local day. Times are zero-padded `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursResult {
    pub date: NaiveDate,
    pub day_of_week: u32,
    pub open: String,
    pub close: String,
    pub periods: BTreeMap<String, PeriodHours>,
}

impl HoursResult {
    pub const MIDNIGHT: &'static str = "00:00";

    pub fn closed(date: NaiveDate) -> Self {
        Self {
            date,
            day_of_week: sunday_first_weekday(date.weekday().num_days_from_monday()),
            open: Self::MIDNIGHT.to_string(),
            close: Self::MIDNIGHT.to_string(),
            periods: BTreeMap::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.periods.is_empty() && self.open == self.close
    }

    pub fn period(&self, vendor_id: &str) -> Option<&PeriodHours> {
        self.periods.get(vendor_id)
    }
}

/// Converts a Monday = 0 weekday into the vendor's Sunday = 0 numbering.
pub const fn sunday_first_weekday(monday_first: u32) -> u32 {
    (monday_first + 1) % 7
}

pub fn local_date(as_of: DateTime<Utc>, tz: Tz) -> NaiveDate {
    as_of.with_timezone(&tz).date_naive()
}

/// Cuts the hours array out of a page. A page without the anchor has no hours.
pub fn parse_hours_blob(html: &str, source: &str) -> Result<Vec<HoursEntry>> {
    let literal = extract_balanced(html, hours_anchor()).map_err(|e| match e {
        ExtractionError::AnchorNotFound(_) => Error::HoursNotFound(source.to_string()),
        e => Error::Extraction(e),
    })?;
    let literal = unescape_js_string(literal);
    let raw: Vec<Value> = serde_json::from_str(&strip_trailing_commas(&literal))?;
    let entries = raw
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<HoursEntry>(v) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("skipping hours entry on {source}: {e}");
                None
            }
        })
        .collect();
    Ok(entries)
}

fn parse_local_timestamp(s: &str, date: NaiveDate) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    const DATE_TIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    if let Some(dt) = DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt);
    }
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
        .map(|t| date.and_time(t))
}

fn hh_mm(dt: NaiveDateTime) -> String {
    dt.format("%H:%M").to_string()
}

/// Aggregates the slices that apply to `date` into per-period windows and the day's
/// overall window.
pub fn hours_for_date(entries: &[HoursEntry], date: NaiveDate) -> HoursResult {
    let day_of_week = sunday_first_weekday(date.weekday().num_days_from_monday());
    let mut day: Option<(NaiveDateTime, NaiveDateTime)> = None;
    let mut periods: BTreeMap<String, (NaiveDateTime, NaiveDateTime)> = BTreeMap::new();

    let today = entries
        .iter()
        .filter(|e| e.day_of_week == day_of_week && !e.is_closed.unwrap_or(false));
    for entry in today {
        let window = entry
            .start_time
            .as_deref()
            .and_then(|s| parse_local_timestamp(s, date))
            .zip(
                entry
                    .end_time
                    .as_deref()
                    .and_then(|s| parse_local_timestamp(s, date)),
            );
        let Some((start, end)) = window else {
            log::warn!("hours slice without readable times: {entry:?}");
            continue;
        };
        merge(&mut day, start, end);
        if let Some(id) = &entry.meal_period_id {
            let slot = periods.entry(id.clone()).or_insert((start, end));
            slot.0 = slot.0.min(start);
            slot.1 = slot.1.max(end);
        }
    }

    let Some((open, close)) = day else {
        return HoursResult::closed(date);
    };
    HoursResult {
        date,
        day_of_week,
        open: hh_mm(open),
        close: hh_mm(close),
        periods: periods
            .into_iter()
            .map(|(id, (start, end))| {
                (
                    id,
                    PeriodHours {
                        start: hh_mm(start),
                        end: hh_mm(end),
                    },
                )
            })
            .collect(),
    }
}

fn merge(
    window: &mut Option<(NaiveDateTime, NaiveDateTime)>,
    start: NaiveDateTime,
    end: NaiveDateTime,
) {
    *window = Some(match *window {
        Some((s, e)) => (s.min(start), e.max(end)),
        None => (start, end),
    });
}
