//! Date normalization. Every date comes out as `YYYY-MM-01`.

use std::str::FromStr;

use chrono::{Datelike, Month, NaiveDate};

/// Formats tried in order when a date has no `date_pattern`.
const DEFAULT_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%Y-%m",
    "%Y/%m",
    "%m/%Y",
    "%m-%Y",
    "%b-%y",
    "%b-%Y",
    "%b %y",
    "%b %Y",
    "%Y %b",
    "%Y-%b",
    "%B-%y",
    "%B-%Y",
    "%B %y",
    "%B %Y",
    "%Y %B",
    "%Y-%B",
];

fn has_any(pattern: &str, specifiers: &[&str]) -> bool {
    specifiers.iter().any(|s| pattern.contains(s))
}

/// Parse with a strftime pattern, filling in the fields it does not carry:
/// day 1, and for year/month parts, January and a placeholder year.
fn parse_partial(text: &str, pattern: &str) -> Option<NaiveDate> {
    let mut text = text.trim().to_string();
    let mut pattern = pattern.to_string();
    if !has_any(&pattern, &["%Y", "%y", "%G", "%C"]) {
        text.push_str(" 2000");
        pattern.push_str(" %Y");
    }
    if !has_any(&pattern, &["%m", "%b", "%B", "%h"]) {
        text.push_str(" 01");
        pattern.push_str(" %m");
    }
    if !has_any(&pattern, &["%d", "%e"]) {
        text.push_str(" 01");
        pattern.push_str(" %d");
    }
    NaiveDate::parse_from_str(&text, &pattern).ok()
}

fn month_start(date: NaiveDate) -> String {
    format!("{:04}-{:02}-01", date.year(), date.month())
}

/// Normalize a full date.
pub fn parse_date(text: &str, pattern: Option<&str>) -> Result<String, String> {
    let text = text.trim();
    match pattern {
        Some(pattern) => {
            if !has_any(pattern, &["%Y", "%y", "%G", "%C"]) {
                return Err(format!("date_pattern '{}' carries no year", pattern));
            }
            parse_partial(text, pattern)
                .map(month_start)
                .ok_or_else(|| format!("does not match date_pattern '{}'", pattern))
        }
        None => DEFAULT_FORMATS
            .iter()
            .find_map(|format| parse_partial(text, format))
            .map(month_start)
            .ok_or_else(|| "not a recognizable date".to_string()),
    }
}

/// A year part: four digits, or two digits meaning 20xx.
pub fn parse_year(text: &str, pattern: Option<&str>) -> Result<i32, String> {
    let text = text.trim();
    if let Some(pattern) = pattern {
        return parse_partial(text, pattern)
            .map(|d| d.year())
            .ok_or_else(|| format!("does not match date_pattern '{}'", pattern));
    }
    let digits = text.strip_suffix(".0").unwrap_or(text);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err("not a year".to_string());
    }
    match (digits.len(), digits.parse::<i32>()) {
        (4, Ok(year)) => Ok(year),
        (2, Ok(year)) => Ok(2000 + year),
        _ => Err("not a year".to_string()),
    }
}

/// A month part: 1-12 or an English month name.
pub fn parse_month(text: &str, pattern: Option<&str>) -> Result<u32, String> {
    let text = text.trim();
    if let Some(pattern) = pattern {
        return parse_partial(text, pattern)
            .map(|d| d.month())
            .ok_or_else(|| format!("does not match date_pattern '{}'", pattern));
    }
    let digits = text.strip_suffix(".0").unwrap_or(text);
    if let Ok(month) = digits.parse::<u32>() {
        return if (1..=12).contains(&month) {
            Ok(month)
        } else {
            Err(format!("month {} out of range", month))
        };
    }
    Month::from_str(text)
        .map(|m| m.number_from_month())
        .map_err(|_| "not a month".to_string())
}

/// Combine extracted year and month parts. Parts that were passed through
/// raw and do not parse are joined as-is.
pub fn combine(year: &str, month: &str) -> String {
    match (parse_year(year, None), parse_month(month, None)) {
        (Ok(y), Ok(m)) => format!("{:04}-{:02}-01", y, m),
        _ => format!("{}-{}", year, month),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_formats() {
        assert_eq!(parse_date("Jan-21", None).unwrap(), "2021-01-01");
        assert_eq!(parse_date("2021-03", None).unwrap(), "2021-03-01");
        assert_eq!(parse_date("2021-03-17", None).unwrap(), "2021-03-01");
        assert_eq!(parse_date("January 2021", None).unwrap(), "2021-01-01");
        assert_eq!(parse_date("11/2020", None).unwrap(), "2020-11-01");
        assert!(parse_date("Total", None).is_err());
    }

    #[test]
    fn test_full_month_names() {
        assert_eq!(parse_date("March 2021", None).unwrap(), "2021-03-01");
        assert_eq!(parse_date("September-21", None).unwrap(), "2021-09-01");
        assert_eq!(parse_date("2020 December", None).unwrap(), "2020-12-01");
        assert_eq!(parse_date("Jan 2021", None).unwrap(), "2021-01-01");
    }

    #[test]
    fn test_pattern_without_day() {
        assert_eq!(parse_date("Feb-21", Some("%b-%y")).unwrap(), "2021-02-01");
        assert_eq!(parse_date("2021 M04", Some("%Y M%m")).unwrap(), "2021-04-01");
        assert!(parse_date("Feb-21", Some("%Y-%m")).is_err());
        assert!(parse_date("Feb", Some("%b")).is_err());
    }

    #[test]
    fn test_year_and_month_parts() {
        assert_eq!(parse_year("2021", None).unwrap(), 2021);
        assert_eq!(parse_year("21", None).unwrap(), 2021);
        assert!(parse_year("202", None).is_err());
        assert_eq!(parse_month("3", None).unwrap(), 3);
        assert_eq!(parse_month("March", None).unwrap(), 3);
        assert_eq!(parse_month("mar", None).unwrap(), 3);
        assert!(parse_month("13", None).is_err());
        assert_eq!(parse_month("Sep 2020", Some("%b %Y")).unwrap(), 9);
    }

    #[test]
    fn test_combine() {
        assert_eq!(combine("2021", "3"), "2021-03-01");
        assert_eq!(combine("2021", "??"), "2021-??");
    }
}
