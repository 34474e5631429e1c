//! Calendar values used by the event query path.
//!
//! Dates are plain `(year, month, day)` triples. Arithmetic on them uses a fixed
//! 365-day year and 30-day month; see [`EventDate::days_between`].

use serde::de::{self, Error, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Marker appended to approximate dates in the source data.
const APPROXIMATE_MARKER: &str = "(~)";

/// Error returned when a date or month-region string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParseError {
    pub input: String,
    pub reason: &'static str,
}

impl fmt::Display for DateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse {:?}: {}", self.input, self.reason)
    }
}

impl std::error::Error for DateParseError {}

/// A day in the proleptic calendar, as carried by event rows.
///
/// Serialized as `"YYYY/MM/DD"`, with a trailing `" (~)"` when approximate.
/// Ordering and equality ignore the approximate flag.
///
/// # Examples
///
/// ```
/// use geoscope_types::date::EventDate;
///
/// let d: EventDate = "1815/06/18".parse().unwrap();
/// assert_eq!((d.year, d.month, d.day), (1815, 6, 18));
///
/// let approx: EventDate = "-44/03/15 (~)".parse().unwrap();
/// assert!(approx.is_approximate);
/// assert!(d.is_on_or_after(&approx));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EventDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub is_approximate: bool,
}

impl EventDate {
    pub fn new(year: i32, month: u8, day: u8) -> Self {
        Self {
            year,
            month,
            day,
            is_approximate: false,
        }
    }

    fn key(&self) -> (i32, u8, u8) {
        (self.year, self.month, self.day)
    }

    /// `self >= other`, comparing year, then month, then day.
    pub fn is_on_or_after(&self, other: &EventDate) -> bool {
        self.key() >= other.key()
    }

    /// Signed day distance `self - other`.
    ///
    /// This is an approximation: every year counts 365 days and every month 30
    /// days, so results near month ends and leap days are off by a few days.
    pub fn days_between(&self, other: &EventDate) -> i64 {
        let year_gap = 365 * (i64::from(self.year) - i64::from(other.year));
        let month_gap = 30 * (i64::from(self.month) - i64::from(other.month));
        let day_gap = i64::from(self.day) - i64::from(other.day);
        year_gap + month_gap + day_gap
    }
}

impl PartialEq for EventDate {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EventDate {}

impl PartialOrd for EventDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventDate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl FromStr for EventDate {
    type Err = DateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| DateParseError {
            input: s.to_string(),
            reason,
        };
        let trimmed = s.trim();
        let (body, is_approximate) = match trimmed.strip_suffix(APPROXIMATE_MARKER) {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };

        let mut parts = body.split('/');
        let year = parts
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(|| err("invalid year"))?;
        let month = parts
            .next()
            .and_then(|p| p.parse::<u8>().ok())
            .ok_or_else(|| err("invalid month"))?;
        let day = parts
            .next()
            .and_then(|p| p.parse::<u8>().ok())
            .ok_or_else(|| err("invalid day"))?;
        if parts.next().is_some() {
            return Err(err("too many components"));
        }
        if !(1..=12).contains(&month) {
            return Err(err("month out of range"));
        }
        if !(1..=31).contains(&day) {
            return Err(err("day out of range"));
        }

        Ok(Self {
            year,
            month,
            day,
            is_approximate,
        })
    }
}

impl fmt::Display for EventDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}/{:02}", self.year, self.month, self.day)?;
        if self.is_approximate {
            write!(f, " {}", APPROXIMATE_MARKER)?;
        }
        Ok(())
    }
}

impl Serialize for EventDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// A month or day component of a query date: a concrete value or "all".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePart {
    All,
    Value(u8),
}

impl DatePart {
    /// The concrete value, or `fallback` for `All`.
    pub fn or(self, fallback: u8) -> u8 {
        match self {
            DatePart::All => fallback,
            DatePart::Value(v) => v,
        }
    }

    pub fn is_all(self) -> bool {
        matches!(self, DatePart::All)
    }
}

impl Serialize for DatePart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DatePart::All => serializer.serialize_str("all"),
            DatePart::Value(v) => serializer.serialize_u8(*v),
        }
    }
}

impl<'de> Deserialize<'de> for DatePart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DatePartVisitor;

        impl Visitor<'_> for DatePartVisitor {
            type Value = DatePart;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a positive integer or \"all\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<DatePart, E> {
                u8::try_from(v)
                    .map(DatePart::Value)
                    .map_err(|_| E::custom(format!("date part out of range: {}", v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<DatePart, E> {
                u8::try_from(v)
                    .map(DatePart::Value)
                    .map_err(|_| E::custom(format!("date part out of range: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<DatePart, E> {
                if v.eq_ignore_ascii_case("all") {
                    Ok(DatePart::All)
                } else {
                    v.parse::<u8>()
                        .map(DatePart::Value)
                        .map_err(|_| E::custom(format!("invalid date part: {:?}", v)))
                }
            }
        }

        deserializer.deserialize_any(DatePartVisitor)
    }
}

/// The date a viewport query is scoped to. Month and day may be "all".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryDate {
    pub year: i32,
    pub month: DatePart,
    pub day: DatePart,
}

impl QueryDate {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: DatePart::All,
            day: DatePart::All,
        }
    }

    pub fn month(year: i32, month: u8) -> Self {
        Self {
            year,
            month: DatePart::Value(month),
            day: DatePart::All,
        }
    }

    pub fn day(year: i32, month: u8, day: u8) -> Self {
        Self {
            year,
            month: DatePart::Value(month),
            day: DatePart::Value(day),
        }
    }

    /// First day of the window ("all" parts become 1).
    pub fn lower_bound(&self) -> EventDate {
        EventDate::new(self.year, self.month.or(1), self.day.or(1))
    }

    /// Last day of the window ("all" month becomes 12, "all" day becomes 31).
    pub fn upper_bound(&self) -> EventDate {
        EventDate::new(self.year, self.month.or(12), self.day.or(31))
    }

    /// Month buckets to fetch for this date. `None` is the bucket of events
    /// known only to the year.
    pub fn month_buckets(&self, strict: bool) -> Vec<Option<u8>> {
        match self.month {
            DatePart::All => (1..=12).map(Some).chain(std::iter::once(None)).collect(),
            DatePart::Value(m) if strict => vec![Some(m)],
            DatePart::Value(m) => vec![Some(m), None],
        }
    }
}

/// Composite key of a year-month bucket and a one-character region.
///
/// Rendered as `"{year}-{month}-{region}"`, with an empty month for events
/// known only to the year.
///
/// # Examples
///
/// ```
/// use geoscope_types::date::MonthRegion;
///
/// let key = MonthRegion::new(1815, Some(6), 'u');
/// assert_eq!(key.to_string(), "1815-6-u");
/// assert_eq!(MonthRegion::new(1815, None, 'u').to_string(), "1815--u");
/// assert_eq!("1815--u".parse::<MonthRegion>().unwrap().month, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthRegion {
    pub year: i32,
    pub month: Option<u8>,
    pub region: char,
}

impl MonthRegion {
    pub fn new(year: i32, month: Option<u8>, region: char) -> Self {
        Self {
            year,
            month,
            region,
        }
    }
}

impl fmt::Display for MonthRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(m) => write!(f, "{}-{}-{}", self.year, m, self.region),
            None => write!(f, "{}--{}", self.year, self.region),
        }
    }
}

impl FromStr for MonthRegion {
    type Err = DateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| DateParseError {
            input: s.to_string(),
            reason,
        };
        // Split from the right: the year itself may carry a leading minus sign.
        let mut parts = s.rsplitn(3, '-');
        let region_part = parts.next().ok_or_else(|| err("missing region"))?;
        let month_part = parts.next().ok_or_else(|| err("missing month"))?;
        let year_part = parts.next().ok_or_else(|| err("missing year"))?;

        let mut region_chars = region_part.chars();
        let region = match (region_chars.next(), region_chars.next()) {
            (Some(c), None) => c,
            _ => return Err(err("region must be one character")),
        };
        let month = if month_part.is_empty() {
            None
        } else {
            Some(
                month_part
                    .parse::<u8>()
                    .map_err(|_| err("invalid month"))?,
            )
        };
        let year = year_part.parse::<i32>().map_err(|_| err("invalid year"))?;

        Ok(Self {
            year,
            month,
            region,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_date() {
        let d: EventDate = "2001/09/11".parse().unwrap();
        assert_eq!(d, EventDate::new(2001, 9, 11));
        assert!(!d.is_approximate);

        let approx: EventDate = "1200/01/01 (~)".parse().unwrap();
        assert!(approx.is_approximate);
        assert_eq!(approx, EventDate::new(1200, 1, 1));

        assert!("2001/13/01".parse::<EventDate>().is_err());
        assert!("2001/01".parse::<EventDate>().is_err());
        assert!("abc".parse::<EventDate>().is_err());
    }

    #[test]
    fn test_days_between_uses_fixed_month_length() {
        let a = EventDate::new(2000, 3, 1);
        let b = EventDate::new(2000, 2, 1);
        // February has 29 days in 2000; the approximation counts 30.
        assert_eq!(a.days_between(&b), 30);
        assert_eq!(b.days_between(&a), -30);
        assert_eq!(
            EventDate::new(2001, 1, 1).days_between(&EventDate::new(2000, 1, 1)),
            365
        );
    }

    #[test]
    fn test_ordering_ignores_approximate_flag() {
        let mut a = EventDate::new(1000, 5, 5);
        let b = EventDate::new(1000, 5, 5);
        a.is_approximate = true;
        assert_eq!(a, b);
        assert!(a.is_on_or_after(&b));
        assert!(b.is_on_or_after(&a));
        assert!(EventDate::new(1000, 5, 6) > a);
    }

    #[test]
    fn test_query_date_window() {
        let year = QueryDate::year(1500);
        assert_eq!(year.lower_bound(), EventDate::new(1500, 1, 1));
        assert_eq!(year.upper_bound(), EventDate::new(1500, 12, 31));

        let month = QueryDate::month(1500, 4);
        assert_eq!(month.lower_bound(), EventDate::new(1500, 4, 1));
        assert_eq!(month.upper_bound(), EventDate::new(1500, 4, 31));
    }

    #[test]
    fn test_month_buckets() {
        assert_eq!(QueryDate::year(1).month_buckets(true).len(), 13);
        assert_eq!(QueryDate::month(1, 2).month_buckets(true), vec![Some(2)]);
        assert_eq!(
            QueryDate::month(1, 2).month_buckets(false),
            vec![Some(2), None]
        );
    }

    #[test]
    fn test_month_region_negative_year() {
        let key = MonthRegion::new(-44, Some(3), 's');
        assert_eq!(key.to_string(), "-44-3-s");
        assert_eq!("-44-3-s".parse::<MonthRegion>().unwrap(), key);
        assert!("2000-1-".parse::<MonthRegion>().is_err());
    }

    #[test]
    fn test_date_part_serde() {
        let d: QueryDate = serde_json::from_str(r#"{"year":1900,"month":"all","day":"all"}"#)
            .unwrap();
        assert_eq!(d, QueryDate::year(1900));
        let d: QueryDate = serde_json::from_str(r#"{"year":1900,"month":7,"day":"all"}"#).unwrap();
        assert_eq!(d, QueryDate::month(1900, 7));
        assert_eq!(
            serde_json::to_string(&QueryDate::day(1, 2, 3)).unwrap(),
            r#"{"year":1,"month":2,"day":3}"#
        );
    }
}
