//! Cheap heuristic query classification.
//!
//! Produces advisory flags that feed retrieval and the time-aware
//! adapters (history, downloads). Pure string inspection; never blocks
//! on a model call.

use chrono::NaiveDate;

use crate::text::tokenize_raw;

/// Time filter implied by the query wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Today,
    Yesterday,
    /// "last N days" (hours and weeks are normalized to whole days,
    /// rounding up).
    LastDays(u32),
}

/// Advisory classification of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTraits {
    pub time_window: Option<TimeWindow>,
    /// The user asked specifically about their searches.
    pub searches_only: bool,
    /// Explicit numeric limit, e.g. "top 5 downloads".
    pub explicit_limit: Option<usize>,
    /// Explicit `YYYY-MM-DD` date in the query.
    pub explicit_date: Option<NaiveDate>,
}

/// Classify a query into [`QueryTraits`]. Deterministic and cheap.
pub fn classify_query(query: &str) -> QueryTraits {
    let lower = query.to_lowercase();
    let tokens = tokenize_raw(&lower);

    let mut traits = QueryTraits::default();

    if lower.contains("today") {
        traits.time_window = Some(TimeWindow::Today);
    } else if lower.contains("yesterday") {
        traits.time_window = Some(TimeWindow::Yesterday);
    } else {
        traits.time_window = last_n_window(&tokens);
    }

    traits.searches_only = tokens
        .iter()
        .any(|t| t == "search" || t == "searches" || t == "searched");

    traits.explicit_limit = explicit_limit(&tokens);
    traits.explicit_date = explicit_date(query);

    traits
}

/// "last 3 days", "past 2 weeks", "last 12 hours".
fn last_n_window(tokens: &[String]) -> Option<TimeWindow> {
    for window in tokens.windows(3) {
        if window[0] != "last" && window[0] != "past" {
            continue;
        }
        let n: u32 = match window[1].parse() {
            Ok(n) => n,
            Err(_) => continue,
        };
        let days = match window[2].as_str() {
            "day" | "days" => n,
            "week" | "weeks" => n * 7,
            "hour" | "hours" => n.div_ceil(24).max(1),
            _ => continue,
        };
        return Some(TimeWindow::LastDays(days));
    }
    None
}

/// "top 5 ...", "first 3 ...", "... limit 10".
fn explicit_limit(tokens: &[String]) -> Option<usize> {
    for window in tokens.windows(2) {
        if window[0] == "top" || window[0] == "first" || window[0] == "limit" {
            if let Ok(n) = window[1].parse::<usize>() {
                if n > 0 {
                    return Some(n);
                }
            }
        }
    }
    None
}

/// First `YYYY-MM-DD` token in the raw query.
fn explicit_date(query: &str) -> Option<NaiveDate> {
    query
        .split_whitespace()
        .filter_map(|t| t.get(..10))
        .filter_map(|t| NaiveDate::parse_from_str(t, "%Y-%m-%d").ok())
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_today_and_yesterday() {
        assert_eq!(
            classify_query("what did I read today").time_window,
            Some(TimeWindow::Today)
        );
        assert_eq!(
            classify_query("downloads from yesterday").time_window,
            Some(TimeWindow::Yesterday)
        );
    }

    #[test]
    fn detects_last_n() {
        assert_eq!(
            classify_query("history from the last 3 days").time_window,
            Some(TimeWindow::LastDays(3))
        );
        assert_eq!(
            classify_query("pages visited in the past 2 weeks").time_window,
            Some(TimeWindow::LastDays(14))
        );
        assert_eq!(
            classify_query("last 12 hours of browsing").time_window,
            Some(TimeWindow::LastDays(1))
        );
    }

    #[test]
    fn detects_searches_only_and_limit() {
        let t = classify_query("show my top 5 searches about rust");
        assert!(t.searches_only);
        assert_eq!(t.explicit_limit, Some(5));
    }

    #[test]
    fn detects_explicit_date() {
        let t = classify_query("what did I download on 2026-08-15?");
        assert_eq!(
            t.explicit_date,
            NaiveDate::from_ymd_opt(2026, 8, 15)
        );
    }

    #[test]
    fn plain_query_has_no_flags() {
        let t = classify_query("what HTTP methods exist?");
        assert_eq!(t, QueryTraits::default());
    }
}
