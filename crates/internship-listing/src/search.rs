//! Free-text search, sorting and option derivation over normalized records.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use internship_adapters::{listing_timestamp, parse_stipend_amount};
use internship_core::Internship;
use serde::{Deserialize, Serialize};

/// Case-insensitive substring match over title, company, profile, location
/// and description. A blank query returns every record.
pub fn search(records: &[Internship], query: &str) -> Vec<Internship> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| {
            [&r.title, &r.company, &r.profile, &r.location, &r.description]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Title,
    Company,
    Profile,
    Location,
    Duration,
    Stipend,
    StartDate,
    ApplyBy,
    PostedOn,
    Openings,
    Applicants,
    DaysLeft,
    IsRemote,
    IsPartTime,
    Skills,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Sort presets offered to the listing UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    Newest,
    Oldest,
    StipendHighToLow,
    StipendLowToHigh,
    DeadlineNearest,
}

impl SortOption {
    pub fn key_and_order(self) -> (SortKey, SortOrder) {
        match self {
            Self::Newest => (SortKey::PostedOn, SortOrder::Desc),
            Self::Oldest => (SortKey::PostedOn, SortOrder::Asc),
            Self::StipendHighToLow => (SortKey::Stipend, SortOrder::Desc),
            Self::StipendLowToHigh => (SortKey::Stipend, SortOrder::Asc),
            Self::DeadlineNearest => (SortKey::DaysLeft, SortOrder::Asc),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::StipendHighToLow => "stipend_high_to_low",
            Self::StipendLowToHigh => "stipend_low_to_high",
            Self::DeadlineNearest => "deadline_nearest",
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSortOption(pub String);

impl fmt::Display for UnknownSortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sort option '{}'", self.0)
    }
}

impl std::error::Error for UnknownSortOption {}

impl FromStr for SortOption {
    type Err = UnknownSortOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Newest,
            Self::Oldest,
            Self::StipendHighToLow,
            Self::StipendLowToHigh,
            Self::DeadlineNearest,
        ]
        .into_iter()
        .find(|option| option.as_str() == s)
        .ok_or_else(|| UnknownSortOption(s.to_string()))
    }
}

fn compare_by(a: &Internship, b: &Internship, key: SortKey) -> Ordering {
    fn numbers(a: Option<u32>, b: Option<u32>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => Ordering::Equal,
        }
    }
    fn text(a: &str, b: &str) -> Ordering {
        a.to_lowercase().cmp(&b.to_lowercase())
    }
    fn dates(a: &str, b: &str) -> Ordering {
        listing_timestamp(a).cmp(&listing_timestamp(b))
    }

    match key {
        SortKey::Title => text(&a.title, &b.title),
        SortKey::Company => text(&a.company, &b.company),
        SortKey::Profile => text(&a.profile, &b.profile),
        SortKey::Location => text(&a.location, &b.location),
        SortKey::Duration => text(&a.duration, &b.duration),
        SortKey::Stipend => parse_stipend_amount(&a.stipend.amount)
            .partial_cmp(&parse_stipend_amount(&b.stipend.amount))
            .unwrap_or(Ordering::Equal),
        SortKey::StartDate => dates(&a.start_date, &b.start_date),
        SortKey::ApplyBy => dates(&a.apply_by, &b.apply_by),
        SortKey::PostedOn => dates(&a.posted_on, &b.posted_on),
        SortKey::Openings => numbers(a.openings, b.openings),
        SortKey::Applicants => numbers(a.applicants, b.applicants),
        SortKey::DaysLeft => numbers(a.days_left, b.days_left),
        SortKey::IsRemote | SortKey::IsPartTime | SortKey::Skills => Ordering::Equal,
    }
}

/// Returns a new, stably ordered sequence. Keys that cannot be compared
/// (a missing number, booleans, skill lists) count as equal and keep their
/// relative order.
pub fn sort(records: &[Internship], key: SortKey, order: SortOrder) -> Vec<Internship> {
    let mut sorted = records.to_vec();
    stable_merge_sort(&mut sorted, &|a, b| {
        let ordering = compare_by(a, b, key);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    sorted
}

pub fn sort_by_option(records: &[Internship], option: SortOption) -> Vec<Internship> {
    let (key, order) = option.key_and_order();
    sort(records, key, order)
}

// The comparator above is not a total order once missing numbers are
// involved, so it is kept away from `slice::sort_by`.
fn stable_merge_sort<T: Clone>(items: &mut [T], cmp: &dyn Fn(&T, &T) -> Ordering) {
    if items.len() <= 1 {
        return;
    }
    let mid = items.len() / 2;
    stable_merge_sort(&mut items[..mid], cmp);
    stable_merge_sort(&mut items[mid..], cmp);

    let left = items[..mid].to_vec();
    let right = items[mid..].to_vec();
    let (mut i, mut j) = (0, 0);
    for slot in items.iter_mut() {
        let take_left = j >= right.len()
            || (i < left.len() && cmp(&right[j], &left[i]) != Ordering::Less);
        if take_left {
            *slot = left[i].clone();
            i += 1;
        } else {
            *slot = right[j].clone();
            j += 1;
        }
    }
}

/// Sorted, de-duplicated, non-empty values of one record field.
pub fn unique_values<F>(records: &[Internship], field: F) -> Vec<String>
where
    F: Fn(&Internship) -> &str,
{
    records
        .iter()
        .map(&field)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
