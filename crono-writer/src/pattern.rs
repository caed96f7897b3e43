//! Path patterns and the time zone they are rendered in.
//!
//! A [`Pattern`] is a strftime-style template such as
//! `/var/log/app/%Y/%m/%d/app.log`. It is validated once, when compiled;
//! resolving it for an instant afterwards is pure and cannot fail.

use std::fmt::{self, Display, Write as _};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};

use crate::error::{Error, Result};

/// Time zone used to turn an instant into calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    /// The process-local time zone.
    #[default]
    Local,
    Utc,
    /// A fixed offset from UTC, e.g. `+09:00`.
    Fixed(FixedOffset),
}

/// Error from parsing a [`Location`] string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid location {0:?}: expected \"local\", \"utc\" or an offset like \"+09:00\"")]
pub struct LocationParseError(String);

impl FromStr for Location {
    type Err = LocationParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            t if t.eq_ignore_ascii_case("local") => Ok(Location::Local),
            t if t.eq_ignore_ascii_case("utc") || t == "Z" => Ok(Location::Utc),
            t => t
                .parse::<FixedOffset>()
                .map(Location::Fixed)
                .map_err(|_| LocationParseError(s.to_string())),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local => f.write_str("local"),
            Location::Utc => f.write_str("utc"),
            Location::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    items: Vec<Item<'static>>,
}

impl Pattern {
    /// Parse and validate a template.
    ///
    /// Unknown or truncated specifiers (`%Q`, a trailing `%`) are rejected
    /// here so they can never surface at write time.
    pub fn compile(source: &str) -> Result<Self> {
        let compile_error = |reason: String| Error::PatternCompile {
            pattern: source.to_string(),
            reason,
        };

        let items = StrftimeItems::new(source)
            .parse_to_owned()
            .map_err(|e| compile_error(e.to_string()))?;
        let pattern = Self {
            source: source.to_string(),
            items,
        };

        // Some specifiers parse but cannot be rendered; find out now.
        let mut probe = String::new();
        pattern
            .render_into(&mut probe, &DateTime::<Utc>::default().fixed_offset())
            .map_err(|_| compile_error("pattern cannot be rendered".to_string()))?;

        Ok(pattern)
    }

    /// The template this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Resolve the concrete path for `now`, converted to `location` first.
    pub fn resolve(&self, now: DateTime<Utc>, location: Location) -> PathBuf {
        match location {
            Location::Local => self.render(&now.with_timezone(&Local)),
            Location::Utc => self.render(&now),
            Location::Fixed(offset) => self.render(&now.with_timezone(&offset)),
        }
    }

    fn render<Tz>(&self, at: &DateTime<Tz>) -> PathBuf
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let mut out = String::with_capacity(self.source.len() + 8);
        // compile() proved every item renders, so this cannot fail.
        let _ = self.render_into(&mut out, at);
        PathBuf::from(out)
    }

    fn render_into<Tz>(&self, out: &mut String, at: &DateTime<Tz>) -> fmt::Result
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        write!(out, "{}", at.format_with_items(self.items.iter()))
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
