//! Core domain model for the internship finder: canonical records, filter
//! selections, saved presets and page envelopes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "internship-core";

pub const ITEMS_PER_PAGE: usize = 10;
pub const MAX_STIPEND_VALUE: u64 = 50_000;
pub const DEFAULT_STIPEND_RANGE: StipendRange = StipendRange { min: 0, max: 20_000 };

/// Display stipend as parsed from the listing, e.g. `{"₹ 20,000", "month"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stipend {
    pub amount: String,
    pub period: String,
}

impl Default for Stipend {
    fn default() -> Self {
        Self {
            amount: "0".to_string(),
            period: "month".to_string(),
        }
    }
}

/// Where an application deadline sits relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "days", rename_all = "camelCase")]
pub enum DeadlineStatus {
    #[default]
    NoDeadline,
    Overdue(u32),
    DueToday,
    Upcoming(u32),
}

impl DeadlineStatus {
    /// Classifies a signed day difference (`deadline - today`).
    pub fn from_day_difference(diff: i64) -> Self {
        match diff {
            d if d < 0 => Self::Overdue(u32::try_from(-d).unwrap_or(u32::MAX)),
            0 => Self::DueToday,
            d => Self::Upcoming(u32::try_from(d).unwrap_or(u32::MAX)),
        }
    }

    /// Clamped days remaining; overdue and due-today both report `0`.
    pub fn days_left(&self) -> Option<u32> {
        match self {
            Self::NoDeadline => None,
            Self::Overdue(_) | Self::DueToday => Some(0),
            Self::Upcoming(days) => Some(*days),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::NoDeadline => String::new(),
            Self::Overdue(_) => "Expired".to_string(),
            Self::DueToday => "Today".to_string(),
            Self::Upcoming(1) => "1 day left".to_string(),
            Self::Upcoming(days) => format!("{days} days left"),
        }
    }
}

/// Canonical internship record produced by normalization. Never partially
/// populated: absent source fields become `""`, `false` or `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Internship {
    pub id: String,
    pub title: String,
    pub company: String,
    pub profile: String,
    pub location: String,
    pub is_remote: bool,
    pub duration: String,
    pub stipend: Stipend,
    pub start_date: String,
    pub apply_by: String,
    pub posted_on: String,
    pub openings: Option<u32>,
    pub applicants: Option<u32>,
    pub skills: Vec<String>,
    pub description: String,
    pub is_part_time: bool,
    pub logo: String,
    pub is_hiring: bool,
    pub days_left: Option<u32>,
    pub deadline_status: DeadlineStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StipendRange {
    pub min: u64,
    pub max: u64,
}

impl StipendRange {
    pub fn contains(&self, amount: f64) -> bool {
        !amount.is_nan() && amount >= self.min as f64 && amount <= self.max as f64
    }
}

/// Current filter selection. `None` on the optional fields means "don't care"
/// and is kept out of the serialized form, so absence survives persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    #[serde(default)]
    pub profile: Vec<String>,
    #[serde(default)]
    pub location: Vec<String>,
    #[serde(default)]
    pub duration: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_remote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_part_time: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stipend_range: Option<StipendRange>,
}

impl Filters {
    pub fn is_unconstrained(&self) -> bool {
        self.profile.is_empty()
            && self.location.is_empty()
            && self.duration.is_empty()
            && self.is_remote.is_none()
            && self.is_part_time.is_none()
            && self.stipend_range.is_none()
    }

    /// Shallow merge: every field present in the patch replaces the current value.
    pub fn merge(&mut self, patch: FilterPatch) {
        if let Some(profile) = patch.profile {
            self.profile = profile;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(is_remote) = patch.is_remote {
            self.is_remote = Some(is_remote);
        }
        if let Some(is_part_time) = patch.is_part_time {
            self.is_part_time = Some(is_part_time);
        }
        if let Some(range) = patch.stipend_range {
            self.stipend_range = Some(range);
        }
    }

    /// Set fields reset to empty; optional fields are removed.
    pub fn clear_key(&mut self, key: FilterKey) {
        match key {
            FilterKey::Profile => self.profile.clear(),
            FilterKey::Location => self.location.clear(),
            FilterKey::Duration => self.duration.clear(),
            FilterKey::IsRemote => self.is_remote = None,
            FilterKey::IsPartTime => self.is_part_time = None,
            FilterKey::StipendRange => self.stipend_range = None,
        }
    }
}

/// Partial filter update. Fields left `None` are not touched by [`Filters::merge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilterPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_remote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_part_time: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stipend_range: Option<StipendRange>,
}

impl From<Filters> for FilterPatch {
    fn from(filters: Filters) -> Self {
        Self {
            profile: Some(filters.profile),
            location: Some(filters.location),
            duration: Some(filters.duration),
            is_remote: filters.is_remote,
            is_part_time: filters.is_part_time,
            stipend_range: filters.stipend_range,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKey {
    Profile,
    Location,
    Duration,
    IsRemote,
    IsPartTime,
    StipendRange,
}

impl FilterKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Location => "location",
            Self::Duration => "duration",
            Self::IsRemote => "isRemote",
            Self::IsPartTime => "isPartTime",
            Self::StipendRange => "stipendRange",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFilterKey(pub String);

impl fmt::Display for UnknownFilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown filter key '{}'", self.0)
    }
}

impl std::error::Error for UnknownFilterKey {}

impl FromStr for FilterKey {
    type Err = UnknownFilterKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile" => Ok(Self::Profile),
            "location" => Ok(Self::Location),
            "duration" => Ok(Self::Duration),
            "isRemote" => Ok(Self::IsRemote),
            "isPartTime" => Ok(Self::IsPartTime),
            "stipendRange" => Ok(Self::StipendRange),
            other => Err(UnknownFilterKey(other.to_string())),
        }
    }
}

/// Named snapshot of a filter selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPreference {
    pub id: String,
    pub name: String,
    pub filters: Filters,
    pub created_at: DateTime<Utc>,
}

impl SavedPreference {
    pub fn new(name: impl Into<String>, filters: Filters, created_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("pref-{}", Uuid::new_v4()),
            name: name.into(),
            filters,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.page.saturating_mul(self.page_size) < self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FilterOptions {
    pub profiles: Vec<String>,
    pub locations: Vec<String>,
    pub durations: Vec<String>,
}
