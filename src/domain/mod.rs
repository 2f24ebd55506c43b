//! Domain types for report generation.
//!
//! Identifiers are newtypes so a report id can never be passed where a user
//! identifier is expected (and vice versa).

pub mod user;

pub use user::{FlatRecord, IdentityDocument, UserRecord, scalar_text};

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque external key of one user, taken verbatim from the uploaded table.
///
/// # Examples
///
/// ```rust
/// use reportd::domain::UserId;
///
/// let id = UserId::new(" 0b6f4f2e-1c1a-4c6e-9f55-9d3c1f0a7b21 ");
/// assert_eq!(id.as_str(), "0b6f4f2e-1c1a-4c6e-9f55-9d3c1f0a7b21");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one generated report.
///
/// The value is the creation time in centiseconds since the Unix epoch, so
/// ids sort in creation order and render as plain digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportId(u64);

impl ReportId {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a path segment is not a well-formed report id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid report id: {0:?}")]
pub struct InvalidReportId(pub String);

impl FromStr for ReportId {
    type Err = InvalidReportId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Digits only: no sign, no whitespace, nothing that could escape the
        // storage directory once formatted into a file name.
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidReportId(s.to_string()));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| InvalidReportId(s.to_string()))
    }
}

impl Serialize for ReportId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Hands out strictly increasing report ids.
///
/// Ids follow the wall clock at centisecond resolution; when two reports are
/// created within the same tick (or the clock steps backwards) the next id is
/// `last + 1`, so ids never repeat within one process.
#[derive(Debug, Default)]
pub struct ReportIdGenerator {
    last: AtomicU64,
}

impl ReportIdGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> ReportId {
        let now = current_centis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return ReportId(candidate),
                Err(actual) => last = actual,
            }
        }
    }
}

fn current_centis() -> u64 {
    let millis = chrono::Utc::now().timestamp_millis();
    u64::try_from(millis / 10).unwrap_or(0)
}

/// Random secret protecting one report archive.
///
/// Only ever leaves the process inside the completion email; `Debug` is
/// redacted so it cannot end up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessPassword(String);

impl AccessPassword {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessPassword(***)")
    }
}
