//! # Template Filters
//!
//! Filters are the `| name:arg` stages of a template expression. They are looked
//! up by name in a [`FilterRegistry`]; an unknown name is a passthrough so that a
//! stale or misspelled pipeline stage never breaks rendering.
//!
//! ## Filters Provided
//!
//! - **`uppercase`**: Uppercases string values.
//! - **`trim`**: Trims surrounding whitespace from string values.
//! - **`format_date`**: Formats a unix timestamp or RFC 3339 string.

use std::collections::HashMap;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Locale, SecondsFormat, Utc};
use serde_json::Value;

/// Signature of a filter: the resolved value plus the optional `:arg` text.
pub type FilterFn = fn(&Value, Option<&str>) -> Value;

/// Name → filter lookup table.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, filter: FilterFn) {
        self.filters.insert(name.into(), filter);
    }

    pub fn get(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Applies filter `name`; unknown names return the value unchanged.
    pub fn apply(&self, name: &str, value: &Value, arg: Option<&str>) -> Value {
        match self.get(name) {
            Some(filter) => filter(value, arg),
            None => {
                tracing::trace!(filter = name, "unknown filter, passing value through");
                value.clone()
            }
        }
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.filters.keys().collect();
        names.sort();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}

/// Builds a registry with every standard filter registered.
///
/// ```
/// use hypernote::template::filters::build_default_filter_registry;
/// let registry = build_default_filter_registry();
/// assert!(registry.contains("format_date"));
/// ```
pub fn build_default_filter_registry() -> FilterRegistry {
    let mut registry = FilterRegistry::new();
    registry.register("uppercase", FILTER_UPPERCASE);
    registry.register("trim", FILTER_TRIM);
    registry.register("format_date", FILTER_FORMAT_DATE);
    registry
}

// ============================================================================
// STRING FILTERS
// ============================================================================

pub const FILTER_UPPERCASE: FilterFn = |value, _| match value {
    Value::String(s) => Value::String(s.to_uppercase()),
    other => other.clone(),
};

pub const FILTER_TRIM: FilterFn = |value, _| match value {
    Value::String(s) => Value::String(s.trim().to_string()),
    other => other.clone(),
};

// ============================================================================
// DATES
// ============================================================================

/// Formats a timestamp.
///
/// Usage: `{{ value | format_date }}` or `{{ value | format_date:<arg> }}`
///   - `<arg>` is a preset (`date`, `time`, `datetime`, `short`, `medium`,
///     `long`, `full`, `iso`), a locale tag (`en-US`, `fr`), or a strftime
///     pattern containing `%`.
///
/// Returns: the formatted string, or the input unchanged when it is not a date.
pub const FILTER_FORMAT_DATE: FilterFn = |value, arg| {
    let Some(datetime) = to_datetime(value) else {
        return value.clone();
    };
    let arg = arg.map(str::trim).filter(|a| !a.is_empty()).unwrap_or("datetime");
    Value::String(format_datetime(&datetime, arg))
};

fn format_datetime(datetime: &DateTime<Utc>, arg: &str) -> String {
    if arg.contains('%') {
        let valid = StrftimeItems::new(arg).all(|item| !matches!(item, Item::Error));
        if valid {
            return datetime.format(arg).to_string();
        }
        tracing::debug!(pattern = arg, "invalid date pattern, using default format");
        return datetime.format("%Y-%m-%d %H:%M").to_string();
    }
    match arg {
        "iso" => datetime.to_rfc3339_opts(SecondsFormat::Secs, true),
        "date" => datetime.format("%Y-%m-%d").to_string(),
        "time" => datetime.format("%H:%M").to_string(),
        "datetime" => datetime.format("%Y-%m-%d %H:%M").to_string(),
        "short" => datetime.format("%-m/%-d/%y").to_string(),
        "medium" => datetime.format("%b %-d, %Y").to_string(),
        "long" => datetime.format("%B %-d, %Y").to_string(),
        "full" => datetime.format("%A, %B %-d, %Y").to_string(),
        locale => match Locale::try_from(locale.replace('-', "_").as_str()) {
            Ok(locale) => datetime.format_localized("%x %X", locale).to_string(),
            Err(_) => datetime.format("%Y-%m-%d %H:%M").to_string(),
        },
    }
}

fn to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(n) => from_epoch(n),
                Err(_) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
            }
        }
        _ => None,
    }
}

fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() {
        return None;
    }
    // Values this large are milliseconds.
    let millis = if n.abs() > 1e11 { n } else { n * 1000.0 };
    DateTime::from_timestamp_millis(millis as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const TS: i64 = 1_700_000_000; // 2023-11-14T22:13:20Z

    #[rstest]
    #[case(None, "2023-11-14 22:13")]
    #[case(Some("date"), "2023-11-14")]
    #[case(Some("time"), "22:13")]
    #[case(Some("iso"), "2023-11-14T22:13:20Z")]
    #[case(Some("short"), "11/14/23")]
    #[case(Some("medium"), "Nov 14, 2023")]
    #[case(Some("long"), "November 14, 2023")]
    #[case(Some("full"), "Tuesday, November 14, 2023")]
    #[case(Some("%Y"), "2023")]
    #[case(Some("%Q"), "2023-11-14 22:13")]
    fn format_date_presets(#[case] arg: Option<&str>, #[case] expected: &str) {
        assert_eq!(FILTER_FORMAT_DATE(&json!(TS), arg), json!(expected));
    }

    #[test]
    fn format_date_accepts_millis_and_strings() {
        assert_eq!(
            FILTER_FORMAT_DATE(&json!(TS * 1000), Some("date")),
            json!("2023-11-14")
        );
        assert_eq!(
            FILTER_FORMAT_DATE(&json!("1700000000"), Some("date")),
            json!("2023-11-14")
        );
        assert_eq!(
            FILTER_FORMAT_DATE(&json!("2023-11-14T22:13:20+00:00"), Some("time")),
            json!("22:13")
        );
    }

    #[test]
    fn format_date_locale_form_produces_text() {
        let out = FILTER_FORMAT_DATE(&json!(TS), Some("en-US"));
        assert!(out.as_str().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn format_date_leaves_non_dates_alone() {
        assert_eq!(FILTER_FORMAT_DATE(&json!("soon"), None), json!("soon"));
        assert_eq!(FILTER_FORMAT_DATE(&json!(true), None), json!(true));
    }

    #[test]
    fn unknown_filter_is_passthrough() {
        let registry = build_default_filter_registry();
        assert_eq!(registry.apply("sparkle", &json!("x"), None), json!("x"));
        assert_eq!(registry.apply("uppercase", &json!("x"), None), json!("X"));
        assert_eq!(registry.apply("trim", &json!("  x "), None), json!("x"));
    }

    #[test]
    fn custom_filters_can_be_registered() {
        let mut registry = build_default_filter_registry();
        registry.register("shout", |v, _| json!(format!("{}!", v.as_str().unwrap_or_default())));
        assert_eq!(registry.apply("shout", &json!("hey"), None), json!("hey!"));
    }
}
