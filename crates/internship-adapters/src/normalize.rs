//! Raw listing payload -> canonical [`Internship`] records.
//!
//! Payloads arrive in one of three shapes:
//! - `{"internships_meta": {id: entry}, "internship_ids": [id, ...]}`, ordered by the id list
//! - a JSON array of entries
//! - a JSON object whose values are entries
//!
//! Normalization never fails. Missing or mistyped fields fall back to their
//! defaults and are reported in [`NormalizedInternship::defaulted`].

use std::sync::OnceLock;

use chrono::{Local, NaiveDate};
use internship_core::{DeadlineStatus, Internship, Stipend};
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::deadline::deadline_status_on;
use crate::stipend::match_stipend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedInternship {
    pub record: Internship,
    /// Record fields (wire names) that were filled with a default value.
    pub defaulted: Vec<&'static str>,
}

impl NormalizedInternship {
    pub fn was_defaulted(&self, field: &str) -> bool {
        self.defaulted.contains(&field)
    }
}

fn applicants_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)([0-9]+)\s*applicants?").expect("applicants pattern is valid")
    })
}

/// Entries of a payload in source order. Ids listed in `internship_ids`
/// without a matching `internships_meta` entry are skipped.
pub fn payload_entries(payload: &JsonValue) -> Vec<&JsonValue> {
    match payload {
        JsonValue::Object(map) => match (map.get("internships_meta"), map.get("internship_ids")) {
            (Some(meta), Some(ids)) if !meta.is_null() && !ids.is_null() => {
                indexed_entries(meta, ids)
            }
            _ => map.values().collect(),
        },
        JsonValue::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    }
}

fn indexed_entries<'a>(meta: &'a JsonValue, ids: &'a JsonValue) -> Vec<&'a JsonValue> {
    let (Some(meta), Some(ids)) = (meta.as_object(), ids.as_array()) else {
        return Vec::new();
    };
    ids.iter()
        .filter_map(|id| {
            let key = match id {
                JsonValue::String(s) => s.clone(),
                JsonValue::Number(n) => n.to_string(),
                _ => return None,
            };
            meta.get(&key)
        })
        .collect()
}

pub fn normalize_payload(payload: &JsonValue) -> Vec<Internship> {
    normalize_payload_on(payload, Local::now().date_naive())
}

pub fn normalize_payload_on(payload: &JsonValue, today: NaiveDate) -> Vec<Internship> {
    normalize_payload_detailed(payload, today)
        .into_iter()
        .map(|n| n.record)
        .collect()
}

pub fn normalize_payload_detailed(payload: &JsonValue, today: NaiveDate) -> Vec<NormalizedInternship> {
    let entries = payload_entries(payload);
    let total = entries.len();
    let normalized = entries
        .into_iter()
        .filter_map(|entry| normalize_entry(entry, today))
        .collect::<Vec<_>>();
    let defaulted_fields: usize = normalized.iter().map(|n| n.defaulted.len()).sum();
    debug!(
        entries = total,
        records = normalized.len(),
        skipped = total - normalized.len(),
        defaulted_fields,
        "normalized internship payload"
    );
    normalized
}

/// Normalizes one entry. Returns `None` only when the entry is not a JSON object.
pub fn normalize_entry(entry: &JsonValue, today: NaiveDate) -> Option<NormalizedInternship> {
    let map = entry.as_object()?;
    let mut reader = EntryReader {
        map,
        defaulted: Vec::new(),
    };

    let id = reader.id();
    let title = reader.string("title", "title");
    let company = reader.string("company", "company_name");
    let profile = reader.string("profile", "profile_name");
    let location = reader.location();
    let is_remote = reader.flag("isRemote", "work_from_home");
    let duration = reader.string("duration", "duration");
    let stipend = reader.stipend();
    let start_date = reader.string("startDate", "start_date");
    let apply_by = reader.apply_by();
    let posted_on = reader.string("postedOn", "posted_on");
    let openings = reader.openings();
    let applicants = reader.applicants();
    let skills = reader.skills();
    let description = reader.string("description", "description");
    let is_part_time = reader.flag("isPartTime", "part_time");
    let logo = reader.string("logo", "company_logo");
    let is_hiring = reader.flag("isHiring", "is_ppo");
    let deadline_status = reader.deadline(today);

    let record = Internship {
        id,
        title,
        company,
        profile,
        location,
        is_remote,
        duration,
        stipend,
        start_date,
        apply_by,
        posted_on,
        openings,
        applicants,
        skills,
        description,
        is_part_time,
        logo,
        is_hiring,
        days_left: deadline_status.days_left(),
        deadline_status,
    };
    Some(NormalizedInternship {
        record,
        defaulted: reader.defaulted,
    })
}

struct EntryReader<'a> {
    map: &'a Map<String, JsonValue>,
    defaulted: Vec<&'static str>,
}

impl<'a> EntryReader<'a> {
    fn non_empty_str(&self, key: &str) -> Option<&'a str> {
        self.map
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    }

    fn string(&mut self, field: &'static str, key: &str) -> String {
        match self.non_empty_str(key) {
            Some(s) => s.to_string(),
            None => {
                self.defaulted.push(field);
                String::new()
            }
        }
    }

    fn flag(&mut self, field: &'static str, key: &str) -> bool {
        match self.map.get(key).and_then(JsonValue::as_bool) {
            Some(value) => value,
            None => {
                self.defaulted.push(field);
                false
            }
        }
    }

    fn id(&mut self) -> String {
        match self.map.get("id") {
            Some(JsonValue::String(s)) if !s.is_empty() => s.clone(),
            Some(JsonValue::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
            _ => {
                self.defaulted.push("id");
                String::new()
            }
        }
    }

    fn location(&mut self) -> String {
        let joined = match self.map.get("location_names") {
            Some(JsonValue::Array(names)) => names
                .iter()
                .filter_map(JsonValue::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            Some(JsonValue::String(s)) => s.clone(),
            _ => String::new(),
        };
        if joined.is_empty() {
            self.defaulted.push("location");
        }
        joined
    }

    fn stipend(&mut self) -> Stipend {
        let salary = self
            .map
            .get("stipend")
            .and_then(|s| s.get("salary"))
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        match match_stipend(salary) {
            Some(stipend) => stipend,
            None => {
                self.defaulted.push("stipend");
                Stipend::default()
            }
        }
    }

    fn apply_by(&mut self) -> String {
        match self
            .non_empty_str("application_deadline")
            .or_else(|| self.non_empty_str("expiring_in"))
        {
            Some(s) => s.to_string(),
            None => {
                self.defaulted.push("applyBy");
                String::new()
            }
        }
    }

    /// Passed through without parsing; `0` counts as absent.
    fn openings(&mut self) -> Option<u32> {
        let value = self
            .map
            .get("openings")
            .and_then(JsonValue::as_u64)
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok());
        if value.is_none() {
            self.defaulted.push("openings");
        }
        value
    }

    fn applicants(&mut self) -> Option<u32> {
        let message = match self.map.get("application_status_message") {
            Some(JsonValue::String(s)) => Some(s.as_str()),
            Some(JsonValue::Object(obj)) => obj.get("message").and_then(JsonValue::as_str),
            _ => None,
        };
        let count = message
            .and_then(|m| applicants_pattern().captures(m))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());
        if count.is_none() {
            self.defaulted.push("applicants");
        }
        count
    }

    fn skills(&mut self) -> Vec<String> {
        match self.map.get("skills").and_then(JsonValue::as_array) {
            Some(items) => items
                .iter()
                .filter_map(JsonValue::as_str)
                .map(ToString::to_string)
                .collect(),
            None => {
                self.defaulted.push("skills");
                Vec::new()
            }
        }
    }

    fn deadline(&mut self, today: NaiveDate) -> DeadlineStatus {
        let status = deadline_status_on(self.non_empty_str("application_deadline"), today);
        if status == DeadlineStatus::NoDeadline {
            self.defaulted.push("daysLeft");
        }
        status
    }
}
