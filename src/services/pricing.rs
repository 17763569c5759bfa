use chrono::{NaiveDate, NaiveTime};

use crate::models::PricingRule;
use crate::services::clock::venue_weekday;

#[derive(Debug, PartialEq)]
pub enum PricingError {
    /// No rule covers the window start on that day.
    NoRule { date: NaiveDate, start: NaiveTime },
    /// The window starts inside one tariff band but ends past it. Callers
    /// must split the booking instead of guessing a blended rate.
    Ambiguous {
        date: NaiveDate,
        band_end: NaiveTime,
    },
    InvalidBand,
    InvalidDayOfWeek(u8),
    OverlappingBands,
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::NoRule { date, start } => {
                write!(f, "no pricing rule covers {date} at {start}")
            }
            PricingError::Ambiguous { date, band_end } => {
                write!(
                    f,
                    "the requested window on {date} crosses a tariff boundary at {band_end}; book the segments separately"
                )
            }
            PricingError::InvalidBand => {
                write!(f, "pricing band start must be before its end")
            }
            PricingError::InvalidDayOfWeek(d) => {
                write!(f, "invalid day of week value in pricing rule: {d}")
            }
            PricingError::OverlappingBands => {
                write!(f, "pricing bands overlap for the same day")
            }
        }
    }
}

/// First-match rate lookup. `rules` must already be in `rule_order`; the
/// first rule whose day mask holds the date's venue weekday and whose band
/// `[start, end)` contains the window start decides the rate. A window
/// running past that band is ambiguous and rejected outright.
pub fn resolve_rate(
    rules: &[PricingRule],
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> Result<i64, PricingError> {
    let day = venue_weekday(date);

    for rule in rules {
        if !rule.days_of_week.contains(&day) {
            continue;
        }
        if start >= rule.start_time && start < rule.end_time {
            if end > rule.end_time {
                return Err(PricingError::Ambiguous {
                    date,
                    band_end: rule.end_time,
                });
            }
            return Ok(rule.price_per_hour);
        }
    }

    Err(PricingError::NoRule { date, start })
}

/// Court charge for one window at an hourly rate, rounded to the nearest
/// minor unit.
pub fn window_amount(price_per_hour: i64, start: NaiveTime, end: NaiveTime) -> i64 {
    let minutes = (end - start).num_minutes();
    (price_per_hour * minutes + 30) / 60
}

/// Sanity checks for a court's rule set before it is persisted.
pub fn validate_rules(rules: &[PricingRule]) -> Result<(), PricingError> {
    for rule in rules {
        if rule.start_time >= rule.end_time {
            return Err(PricingError::InvalidBand);
        }
        for &d in &rule.days_of_week {
            if !(2..=8).contains(&d) {
                return Err(PricingError::InvalidDayOfWeek(d));
            }
        }
    }

    for (i, a) in rules.iter().enumerate() {
        for b in &rules[i + 1..] {
            let shares_day = a.days_of_week.iter().any(|d| b.days_of_week.contains(d));
            if shares_day && a.start_time < b.end_time && b.start_time < a.end_time {
                return Err(PricingError::OverlappingBands);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn rule(days: &[u8], start: &str, end: &str, rate: i64, order: i64) -> PricingRule {
        PricingRule {
            id: order,
            court_id: "court-1".to_string(),
            days_of_week: days.to_vec(),
            start_time: t(start),
            end_time: t(end),
            price_per_hour: rate,
            rule_order: order,
        }
    }

    // 2025-06-16 is a Monday (venue day 2).

    #[test]
    fn test_resolves_first_matching_rule() {
        let rules = vec![
            rule(&[2, 3, 4, 5, 6], "06:00", "18:00", 100_000, 0),
            rule(&[2, 3, 4, 5, 6], "18:00", "22:00", 150_000, 1),
        ];
        let rate = resolve_rate(&rules, d("2025-06-16"), t("10:00"), t("11:00")).unwrap();
        assert_eq!(rate, 100_000);

        let evening = resolve_rate(&rules, d("2025-06-16"), t("18:00"), t("20:00")).unwrap();
        assert_eq!(evening, 150_000);
    }

    #[test]
    fn test_order_breaks_ties() {
        let rules = vec![
            rule(&[2], "06:00", "22:00", 90_000, 0),
            rule(&[2], "06:00", "22:00", 120_000, 1),
        ];
        let rate = resolve_rate(&rules, d("2025-06-16"), t("10:00"), t("11:00")).unwrap();
        assert_eq!(rate, 90_000);
    }

    #[test]
    fn test_window_ending_at_band_edge_is_fine() {
        let rules = vec![rule(&[2], "06:00", "18:00", 100_000, 0)];
        let rate = resolve_rate(&rules, d("2025-06-16"), t("17:00"), t("18:00")).unwrap();
        assert_eq!(rate, 100_000);
    }

    #[test]
    fn test_window_crossing_band_boundary_is_ambiguous() {
        let rules = vec![
            rule(&[2], "06:00", "18:00", 100_000, 0),
            rule(&[2], "18:00", "22:00", 150_000, 1),
        ];
        let result = resolve_rate(&rules, d("2025-06-16"), t("17:00"), t("19:00"));
        assert_eq!(
            result.unwrap_err(),
            PricingError::Ambiguous {
                date: d("2025-06-16"),
                band_end: t("18:00"),
            }
        );
    }

    #[test]
    fn test_no_rule_for_day() {
        let rules = vec![rule(&[8], "06:00", "22:00", 100_000, 0)];
        let result = resolve_rate(&rules, d("2025-06-16"), t("10:00"), t("11:00"));
        assert!(matches!(result.unwrap_err(), PricingError::NoRule { .. }));
    }

    #[test]
    fn test_no_rule_before_opening() {
        let rules = vec![rule(&[2], "06:00", "22:00", 100_000, 0)];
        let result = resolve_rate(&rules, d("2025-06-16"), t("05:00"), t("06:30"));
        assert!(matches!(result.unwrap_err(), PricingError::NoRule { .. }));
    }

    #[test]
    fn test_window_amount_rounds_minutes() {
        assert_eq!(window_amount(100_000, t("10:00"), t("11:00")), 100_000);
        assert_eq!(window_amount(100_000, t("10:00"), t("11:30")), 150_000);
        // 50 minutes at 100 000/h rounds to 83 333
        assert_eq!(window_amount(100_000, t("10:00"), t("10:50")), 83_333);
    }

    #[test]
    fn test_validate_rejects_overlapping_bands_same_day() {
        let rules = vec![
            rule(&[2], "06:00", "18:00", 100_000, 0),
            rule(&[2], "17:00", "22:00", 150_000, 1),
        ];
        assert_eq!(
            validate_rules(&rules).unwrap_err(),
            PricingError::OverlappingBands
        );
    }

    #[test]
    fn test_validate_allows_same_band_different_days() {
        let rules = vec![
            rule(&[2, 3], "06:00", "18:00", 100_000, 0),
            rule(&[7, 8], "06:00", "18:00", 150_000, 1),
        ];
        assert!(validate_rules(&rules).is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_band() {
        let rules = vec![rule(&[2], "18:00", "06:00", 100_000, 0)];
        assert_eq!(validate_rules(&rules).unwrap_err(), PricingError::InvalidBand);
    }

    #[test]
    fn test_validate_rejects_bad_day_code() {
        let rules = vec![rule(&[9], "06:00", "18:00", 100_000, 0)];
        assert_eq!(
            validate_rules(&rules).unwrap_err(),
            PricingError::InvalidDayOfWeek(9)
        );
    }
}
