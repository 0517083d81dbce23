//! Permissive timestamp parsing.
//!
//! Feeds in the wild emit every timestamp dialect imaginable: RFC 822 with
//! named zones, RFC 3339, Unix `date` output, localized month names, IANA zone
//! names where an abbreviation belongs, and plenty of ad hoc formats.
//! [`parse_date`] normalizes the input in a few passes and then walks a fixed,
//! ordered table of layouts until one matches.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use thiserror::Error;

/// Smallest real-world UTC offset (UTC-12:00), in seconds.
const MIN_OFFSET_SECS: i32 = -12 * 3600;
/// Largest real-world UTC offset (UTC+14:00), in seconds.
const MAX_OFFSET_SECS: i32 = 14 * 3600;

/// Errors returned by [`parse_date`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    /// Input was empty or whitespace only.
    #[error("Date string is empty")]
    Empty,
    /// No known layout matched.
    #[error("Unable to parse date: {0:?}")]
    Unrecognized(String),
}

impl DateError {
    /// Stable translation key for this error.
    pub fn key(&self) -> &'static str {
        match self {
            DateError::Empty => "error.date_empty",
            DateError::Unrecognized(_) => "error.date_unrecognized",
        }
    }
}

// ============================================================================
// Lookup tables
// ============================================================================

/// Localized day and month names mapped to their English abbreviation.
/// Longer forms come first so alternation prefers them.
static LOCALIZED_NAMES: &[(&str, &str)] = &[
    // French
    ("lundi", "Mon"),
    ("mardi", "Tue"),
    ("mercredi", "Wed"),
    ("jeudi", "Thu"),
    ("vendredi", "Fri"),
    ("samedi", "Sat"),
    ("dimanche", "Sun"),
    ("janvier", "Jan"),
    ("février", "Feb"),
    ("fevrier", "Feb"),
    ("mars", "Mar"),
    ("avril", "Apr"),
    ("mai", "May"),
    ("juin", "Jun"),
    ("juillet", "Jul"),
    ("août", "Aug"),
    ("aout", "Aug"),
    ("septembre", "Sep"),
    ("octobre", "Oct"),
    ("novembre", "Nov"),
    ("décembre", "Dec"),
    ("decembre", "Dec"),
    ("janv", "Jan"),
    ("févr", "Feb"),
    ("fevr", "Feb"),
    ("avr", "Apr"),
    ("juil", "Jul"),
    ("sept", "Sep"),
    ("déc", "Dec"),
    ("lun", "Mon"),
    ("mer", "Wed"),
    ("jeu", "Thu"),
    ("ven", "Fri"),
    ("sam", "Sat"),
    ("dim", "Sun"),
    // German
    ("montag", "Mon"),
    ("dienstag", "Tue"),
    ("mittwoch", "Wed"),
    ("donnerstag", "Thu"),
    ("freitag", "Fri"),
    ("samstag", "Sat"),
    ("sonntag", "Sun"),
    ("januar", "Jan"),
    ("februar", "Feb"),
    ("märz", "Mar"),
    ("maerz", "Mar"),
    ("juni", "Jun"),
    ("juli", "Jul"),
    ("oktober", "Oct"),
    ("dezember", "Dec"),
    ("mär", "Mar"),
    ("okt", "Oct"),
    ("dez", "Dec"),
];

/// Two-letter German weekday abbreviations, only recognized before a comma.
static GERMAN_SHORT_WEEKDAYS: &[(&str, &str)] = &[
    ("Mo", "Mon"),
    ("Di", "Tue"),
    ("Mi", "Wed"),
    ("Do", "Thu"),
    ("Fr", "Fri"),
    ("Sa", "Sat"),
    ("So", "Sun"),
];

/// Literal zone spellings that are not abbreviations, replaced verbatim.
static ZONE_REPLACEMENTS: &[(&str, &str)] = &[
    ("GMT+0000 (Coordinated Universal Time)", "GMT"),
    ("(Coordinated Universal Time)", "UTC"),
    ("Europe/Brussels", "CET"),
    ("Europe/Paris", "CET"),
    ("Europe/Berlin", "CET"),
    ("Europe/Amsterdam", "CET"),
    ("Europe/Madrid", "CET"),
    ("Europe/Rome", "CET"),
    ("Europe/London", "GMT"),
    ("America/Los_Angeles", "PST"),
    ("America/Denver", "MST"),
    ("America/Chicago", "CST"),
    ("America/New_York", "EST"),
    ("Asia/Tokyo", "JST"),
    ("Etc/UTC", "UTC"),
    ("Etc/GMT", "GMT"),
];

/// Zone abbreviations and their offsets. The RFC 822 North American zones
/// keep their local meaning instead of collapsing to UTC.
static ZONE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Z", "+0000"),
    ("UT", "+0000"),
    ("UTC", "+0000"),
    ("GMT", "+0000"),
    ("WET", "+0000"),
    ("WEST", "+0100"),
    ("BST", "+0100"),
    ("CET", "+0100"),
    ("MET", "+0100"),
    ("WAT", "+0100"),
    ("CEST", "+0200"),
    ("MEST", "+0200"),
    ("EET", "+0200"),
    ("SAST", "+0200"),
    ("EEST", "+0300"),
    ("MSK", "+0300"),
    ("EAT", "+0300"),
    ("PKT", "+0500"),
    ("IST", "+0530"),
    ("ICT", "+0700"),
    ("WIB", "+0700"),
    ("SGT", "+0800"),
    ("HKT", "+0800"),
    ("AWST", "+0800"),
    ("JST", "+0900"),
    ("KST", "+0900"),
    ("ACST", "+0930"),
    ("AEST", "+1000"),
    ("AEDT", "+1100"),
    ("NZST", "+1200"),
    ("NZDT", "+1300"),
    ("NDT", "-0230"),
    ("NST", "-0330"),
    ("ADT", "-0300"),
    ("AST", "-0400"),
    ("EDT", "-0400"),
    ("EST", "-0500"),
    ("CDT", "-0500"),
    ("CST", "-0600"),
    ("MDT", "-0600"),
    ("MST", "-0700"),
    ("PDT", "-0700"),
    ("PST", "-0800"),
    ("AKDT", "-0800"),
    ("AKST", "-0900"),
    ("HST", "-1000"),
];

/// Layouts that do not fit the date × time grid, tried first.
static SPECIAL_OFFSET_LAYOUTS: &[&str] = &[
    // Unix date / Ruby Time#to_s
    "%b %d %H:%M:%S %z %Y",
    "%b %d %H:%M:%S%.f %z %Y",
    // ISO 8601 basic format
    "%Y%m%dT%H%M%S %z",
    // Common log format
    "%d/%b/%Y:%H:%M:%S %z",
    // Zone before the time
    "%d %b %Y %z %H:%M:%S",
];

static SPECIAL_NAIVE_LAYOUTS: &[&str] = &[
    // ANSI C asctime()
    "%b %d %H:%M:%S %Y",
    "%b %d %H:%M:%S%.f %Y",
    "%Y%m%dT%H%M%S",
    "%Y-%m-%d-%H:%M:%S",
    "%Y-%m-%dT%H",
];

/// Date components of the layout grid. Two-digit-year variants precede their
/// four-digit siblings since `%Y` happily parses "06" as year 6.
static DATE_STYLES: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d %b %y",
    "%d %b %Y",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%d %b, %Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%d.%m.%Y",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
];

static DATE_TIME_SEPARATORS: &[&str] = &["T", " ", ", ", " at "];

static TIME_STYLES: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// Layouts carrying a UTC offset: the specials, then date × separator × time × zone.
static OFFSET_LAYOUTS: LazyLock<Vec<String>> = LazyLock::new(|| {
    SPECIAL_OFFSET_LAYOUTS
        .iter()
        .map(|layout| (*layout).to_owned())
        .chain(grid_layouts().map(|layout| format!("{layout} %z")))
        .collect()
});

/// Layouts without an offset, interpreted as UTC.
static NAIVE_LAYOUTS: LazyLock<Vec<String>> = LazyLock::new(|| {
    SPECIAL_NAIVE_LAYOUTS
        .iter()
        .map(|layout| (*layout).to_owned())
        .chain(grid_layouts())
        .collect()
});

fn grid_layouts() -> impl Iterator<Item = String> {
    DATE_STYLES.iter().flat_map(|date| {
        DATE_TIME_SEPARATORS.iter().flat_map(move |separator| {
            TIME_STYLES
                .iter()
                .map(move |time| format!("{date}{separator}{time}"))
        })
    })
}

static LOCALIZED_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = LOCALIZED_NAMES
        .iter()
        .map(|(name, _)| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({alternation})\b\.?")).expect("localized name pattern is valid")
});

static GERMAN_WEEKDAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Mo|Di|Mi|Do|Fr|Sa|So)\.?,").expect("weekday pattern is valid"));

static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s*")
        .expect("weekday pattern is valid")
});

static PAREN_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(([^)]*)\)\s*$").expect("comment pattern is valid"));

static TRAILING_Z_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)[zZ]$").expect("zulu pattern is valid"));

static PREFIXED_OFFSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:GMT|UTC|UT)([+-])(\d{1,2})(?::?(\d{2}))?$").expect("offset pattern is valid")
});

static NUMERIC_OFFSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]\d{2}:?\d{2}$").expect("offset pattern is valid"));

// ============================================================================
// Parsing
// ============================================================================

/// Parses a timestamp in any of the supported dialects.
///
/// A bare integer is read as seconds since the Unix epoch. Otherwise the input
/// goes through localized-name and timezone normalization before being matched
/// against the layout table. Resolved offsets outside UTC-12:00..UTC+14:00 are
/// coerced to UTC, keeping the wall-clock fields.
///
/// # Errors
///
/// [`DateError::Empty`] for empty or whitespace-only input,
/// [`DateError::Unrecognized`] when no layout matches.
///
/// # Examples
///
/// ```
/// use feedwright::date::parse_date;
///
/// let date = parse_date("Mon, 02 Jan 2006 15:04:05 PST").unwrap();
/// assert_eq!(date.to_rfc3339(), "2006-01-02T15:04:05-08:00");
///
/// assert!(parse_date("   ").is_err());
/// ```
pub fn parse_date(raw: &str) -> Result<DateTime<FixedOffset>, DateError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DateError::Empty);
    }

    if let Ok(seconds) = trimmed.parse::<i64>() {
        if let Some(instant) = Utc.timestamp_opt(seconds, 0).single() {
            return Ok(instant.fixed_offset());
        }
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(clamp_offset(parsed));
    }

    let normalized = normalize(trimmed);
    parse_normalized(&normalized)
        .map(clamp_offset)
        .ok_or_else(|| DateError::Unrecognized(trimmed.to_owned()))
}

/// Applies the replacement passes: localized names, literal zone spellings,
/// leading weekday removal and zone abbreviation to numeric offset.
fn normalize(input: &str) -> String {
    let mut value = GERMAN_WEEKDAY_RE
        .replace(input, |caps: &Captures<'_>| {
            let english = GERMAN_SHORT_WEEKDAYS
                .iter()
                .find(|(short, _)| *short == &caps[1])
                .map_or("", |(_, english)| *english);
            format!("{english},")
        })
        .into_owned();

    value = LOCALIZED_RE
        .replace_all(&value, |caps: &Captures<'_>| {
            let found = caps[1].to_lowercase();
            LOCALIZED_NAMES
                .iter()
                .find(|(name, _)| *name == found)
                .map_or_else(|| caps[0].to_owned(), |(_, english)| (*english).to_owned())
        })
        .into_owned();

    for (from, to) in ZONE_REPLACEMENTS {
        if value.contains(from) {
            value = value.replace(from, to);
        }
    }

    value = WEEKDAY_RE.replace(&value, "").into_owned();
    value = TRAILING_Z_RE.replace(&value, "$1 +0000").into_owned();

    // "GMT+0100 (CET)" keeps the offset; "... (PST)" alone keeps the zone.
    if let Some(caps) = PAREN_COMMENT_RE.captures(&value) {
        let inner = caps[1].trim().to_owned();
        let start = caps.get(0).map_or(value.len(), |m| m.start());
        value.truncate(start);
        if zone_offset(&inner).is_some() && !has_zone_token(&value) {
            value.push(' ');
            value.push_str(&inner);
        }
    }

    normalize_zone_tokens(&value)
}

/// Rewrites zone abbreviations and `GMT+hh[:mm]` tokens as `±hhmm`.
fn normalize_zone_tokens(value: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();

    for token in value.split_whitespace() {
        let previous_is_offset = tokens
            .last()
            .is_some_and(|last| NUMERIC_OFFSET_RE.is_match(last));

        if let Some(offset) = zone_offset(token) {
            if !previous_is_offset {
                tokens.push(offset.to_owned());
            }
            continue;
        }

        if let Some(caps) = PREFIXED_OFFSET_RE.captures(token) {
            let hours: u32 = caps[2].parse().unwrap_or(0);
            let minutes: u32 = caps.get(3).map_or(0, |m| m.as_str().parse().unwrap_or(0));
            tokens.push(format!("{}{hours:02}{minutes:02}", &caps[1]));
            continue;
        }

        tokens.push(token.to_owned());
    }

    tokens.join(" ")
}

fn zone_offset(token: &str) -> Option<&'static str> {
    if token.is_empty() || token.len() > 5 || !token.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let upper = token.to_ascii_uppercase();
    ZONE_ABBREVIATIONS
        .iter()
        .find(|(abbreviation, _)| *abbreviation == upper)
        .map(|(_, offset)| *offset)
}

fn has_zone_token(value: &str) -> bool {
    value.split_whitespace().any(|token| {
        zone_offset(token).is_some()
            || NUMERIC_OFFSET_RE.is_match(token)
            || PREFIXED_OFFSET_RE.is_match(token)
    })
}

fn parse_normalized(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed);
    }

    for layout in OFFSET_LAYOUTS.iter() {
        if let Ok(parsed) = DateTime::parse_from_str(value, layout) {
            return Some(parsed);
        }
    }

    for layout in NAIVE_LAYOUTS.iter() {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(parsed.and_utc().fixed_offset());
        }
    }

    for layout in DATE_STYLES {
        if let Ok(date) = NaiveDate::parse_from_str(value, layout) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc().fixed_offset());
        }
    }

    None
}

/// Coerces offsets outside the real-world range to UTC, keeping wall-clock fields.
fn clamp_offset(parsed: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let offset = parsed.offset().local_minus_utc();
    if (MIN_OFFSET_SECS..=MAX_OFFSET_SECS).contains(&offset) {
        parsed
    } else {
        parsed.naive_local().and_utc().fixed_offset()
    }
}

/// Parses `raw` and converts to UTC, falling back to the current time.
///
/// Entries without a usable date are treated as published now; the failure
/// is logged rather than propagated.
pub fn parse_or_now(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Utc::now();
    };

    match parse_date(raw) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(e) => {
            tracing::warn!(date = %raw, error = %e, "Unparsable entry date, using current time");
            Utc::now()
        }
    }
}
