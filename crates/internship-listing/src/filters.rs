//! Filter predicates over normalized records. Every active criterion is ANDed.

use internship_adapters::parse_stipend_amount;
use internship_core::{Filters, Internship};

fn in_set(value: &str, allowed: &[String]) -> bool {
    allowed.is_empty() || (!value.is_empty() && allowed.iter().any(|a| a == value))
}

/// Set fields use exact membership. `location` is compared as the whole
/// joined string, so `"Delhi, Mumbai"` only matches a filter value equal to it.
pub fn matches(record: &Internship, filters: &Filters) -> bool {
    if !in_set(&record.profile, &filters.profile)
        || !in_set(&record.location, &filters.location)
        || !in_set(&record.duration, &filters.duration)
    {
        return false;
    }
    if filters.is_remote.is_some_and(|want| want != record.is_remote) {
        return false;
    }
    if filters.is_part_time.is_some_and(|want| want != record.is_part_time) {
        return false;
    }
    if let Some(range) = filters.stipend_range {
        // Re-parsed on every call; the record only keeps the display text.
        if !range.contains(parse_stipend_amount(&record.stipend.amount)) {
            return false;
        }
    }
    true
}

/// Order-preserving; the input slice is left untouched.
pub fn apply_filters(records: &[Internship], filters: &Filters) -> Vec<Internship> {
    if filters.is_unconstrained() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| matches(record, filters))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use internship_core::{Stipend, StipendRange};

    fn record(id: &str, remote: bool, location: &str, amount: &str) -> Internship {
        Internship {
            id: id.to_string(),
            title: format!("Role {id}"),
            profile: "Web Development".to_string(),
            location: location.to_string(),
            is_remote: remote,
            duration: "3 Months".to_string(),
            stipend: Stipend {
                amount: amount.to_string(),
                period: "month".to_string(),
            },
            ..Internship::default()
        }
    }

    fn sample() -> Vec<Internship> {
        vec![
            record("1", true, "", "₹ 5,000"),
            record("2", false, "Delhi", "₹ 12,000"),
            record("3", false, "Delhi, Mumbai", "25K"),
            record("4", true, "Pune", "10000-20000"),
        ]
    }

    fn ids(records: &[Internship]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn empty_filters_keep_everything_in_order() {
        let records = sample();
        assert_eq!(apply_filters(&records, &Filters::default()), records);
    }

    #[test]
    fn remote_false_differs_from_absent() {
        let records = sample();
        let only_onsite = Filters {
            is_remote: Some(false),
            ..Filters::default()
        };
        assert_eq!(ids(&apply_filters(&records, &only_onsite)), vec!["2", "3"]);
        let only_remote = Filters {
            is_remote: Some(true),
            ..Filters::default()
        };
        assert_eq!(ids(&apply_filters(&records, &only_remote)), vec!["1", "4"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let records = sample();
        let filters = Filters {
            location: vec!["Delhi".to_string(), "Pune".to_string()],
            stipend_range: Some(StipendRange { min: 0, max: 20_000 }),
            ..Filters::default()
        };
        let once = apply_filters(&records, &filters);
        let twice = apply_filters(&once, &filters);
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec!["2", "4"]);
    }

    #[test]
    fn joined_location_only_matches_whole_string() {
        let records = sample();
        let delhi = Filters {
            location: vec!["Delhi".to_string()],
            ..Filters::default()
        };
        assert_eq!(ids(&apply_filters(&records, &delhi)), vec!["2"]);
        let joined = Filters {
            location: vec!["Delhi, Mumbai".to_string()],
            ..Filters::default()
        };
        assert_eq!(ids(&apply_filters(&records, &joined)), vec!["3"]);
    }

    #[test]
    fn empty_record_field_never_matches_active_set() {
        let records = sample();
        let filters = Filters {
            location: vec!["".to_string()],
            ..Filters::default()
        };
        assert!(apply_filters(&records, &filters).is_empty());
    }

    #[test]
    fn stipend_range_is_inclusive_and_uses_parsed_amounts() {
        let records = sample();
        let filters = Filters {
            stipend_range: Some(StipendRange { min: 12_000, max: 25_000 }),
            ..Filters::default()
        };
        assert_eq!(ids(&apply_filters(&records, &filters)), vec!["2", "3", "4"]);
    }

    #[test]
    fn criteria_are_anded() {
        let records = sample();
        let filters = Filters {
            profile: vec!["Web Development".to_string()],
            is_remote: Some(true),
            stipend_range: Some(StipendRange { min: 6_000, max: 50_000 }),
            ..Filters::default()
        };
        assert_eq!(ids(&apply_filters(&records, &filters)), vec!["4"]);
    }
}
