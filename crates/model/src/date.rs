use regex::Regex;
use std::sync::LazyLock;
use time::{Date, Month};

// Year, separator, month, the same separator again, day. Anything around it
// (a time of day, "Updated: ", trailing text) is ignored.
static DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2,4})([-/.])(\d{1,2})([-/.])(\d{1,2})").unwrap());

/// Parse a calendar date out of free text supplied by a site.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` and `YYYY.MM.DD`, optionally followed
/// by a time or embedded in surrounding text. Two-digit years are read as
/// 20xx. Returns `None` when no valid date can be found; unknown dates are
/// never replaced by a placeholder.
pub fn parse_date(text: impl AsRef<str>) -> Option<Date> {
    // Both separators must agree: "2024-01/02" is not a date.
    let captures = DATE_REGEX.captures_iter(text.as_ref()).find(|c| c[2] == c[4])?;
    let year: i32 = captures[1].parse().ok()?;
    let year = if captures[1].len() == 2 { 2000 + year } else { year };
    let month: u8 = captures[3].parse().ok()?;
    let day: u8 = captures[5].parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

/// Canonical text form of a date, as stored in the database.
pub fn format_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::date;

    #[rstest]
    #[case("2023-05-17", Some(date!(2023 - 05 - 17)))]
    #[case("2023/5/7", Some(date!(2023 - 05 - 07)))]
    #[case("2023.12.01", Some(date!(2023 - 12 - 01)))]
    #[case("2023-05-17 08:30:00", Some(date!(2023 - 05 - 17)))]
    #[case("Last updated: 2021-11-30 23:59", Some(date!(2021 - 11 - 30)))]
    #[case("23-05-17", Some(date!(2023 - 05 - 17)))]
    #[case("2023-13-01", None)]
    #[case("2023-02-30", None)]
    #[case("2023-05/17", None)]
    #[case("yesterday", None)]
    #[case("", None)]
    fn test_parse_date(#[case] input: &str, #[case] expected: Option<Date>) {
        assert_eq!(parse_date(input), expected);
    }

    #[test]
    fn test_format_date_parses_back() {
        let date = date!(2009 - 01 - 02);
        assert_eq!(format_date(date), "2009-01-02");
        assert_eq!(parse_date(format_date(date)), Some(date));
    }
}
