use chrono::{DateTime, Datelike, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::storage;
use crate::error::AiboxError;

/// One recorded exchange. Field names match the on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    /// What the user sent.
    pub user: String,
    /// What the model replied.
    pub ai: String,
}

impl HistoryEntry {
    pub fn new(user: impl Into<String>, ai: impl Into<String>) -> Self {
        Self::at(&Local::now(), user, ai)
    }

    pub fn at<Tz: TimeZone>(now: &DateTime<Tz>, user: impl Into<String>, ai: impl Into<String>) -> Self {
        Self {
            timestamp: now.naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            user: user.into(),
            ai: ai.into(),
        }
    }
}

/// A year-month partition of the history, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (0..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn current() -> Self {
        Self::of(&Local::now())
    }

    pub fn of<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let date = now.naive_local();
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePeriodError(String);

impl fmt::Display for ParsePeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid period '{}', expected YYYY-MM", self.0)
    }
}

impl std::error::Error for ParsePeriodError {}

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePeriodError(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(err)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(err());
        }
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let year = year.parse().map_err(|_| err())?;
        let month = month.parse().map_err(|_| err())?;
        Period::new(year, month).ok_or_else(err)
    }
}

/// Monthly JSON history files for one user.
///
/// Every write reads and rewrites the whole month file, so the log assumes it
/// is the only writer for its directory. The session controller owns one log
/// per logged-in user.
pub struct HistoryLog {
    dir: PathBuf,
}

impl HistoryLog {
    pub fn new(data_dir: impl AsRef<Path>, username: &str) -> Self {
        let dir = data_dir
            .as_ref()
            .join(storage::USERS_DIR)
            .join(username)
            .join(storage::HISTORY_DIR);
        Self::with_dir(dir)
    }

    /// Use `dir` directly as the history directory.
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn period_path(&self, period: &Period) -> PathBuf {
        self.dir.join(format!("{}.{}", period, storage::HISTORY_EXT))
    }

    /// Record an exchange under the current month.
    pub fn append(&self, user_message: &str, reply_text: &str) -> HistoryEntry {
        self.append_at(&Local::now(), user_message, reply_text)
    }

    /// Record an exchange stamped with `now`. Failures are logged, not returned.
    pub fn append_at<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        user_message: &str,
        reply_text: &str,
    ) -> HistoryEntry {
        let entry = HistoryEntry::at(now, user_message, reply_text);
        let period = Period::of(now);

        if let Err(e) = self.write_entry(&period, entry.clone()) {
            tracing::warn!("failed to save history for {period}: {e}");
        } else {
            tracing::debug!("appended history entry for {period}");
        }
        entry
    }

    fn write_entry(&self, period: &Period, entry: HistoryEntry) -> Result<(), AiboxError> {
        let path = self.period_path(period);
        let mut entries = match self.load_file(&path) {
            Ok(entries) => entries,
            Err(e) => {
                // Keep the unreadable file aside instead of overwriting it.
                let backup = backup_path(&path);
                tracing::warn!(
                    "history file {} unreadable ({e}), moving it to {}",
                    path.display(),
                    backup.display()
                );
                fs::rename(&path, &backup)?;
                Vec::new()
            }
        };
        entries.push(entry);

        fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(&entries)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Entries for `period`, or for the current month when `None`.
    /// Missing or unparsable files read as empty.
    pub fn read(&self, period: Option<&Period>) -> Vec<HistoryEntry> {
        let period = period.copied().unwrap_or_else(Period::current);
        match self.load_file(&self.period_path(&period)) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("ignoring unreadable history for {period}: {e}");
                Vec::new()
            }
        }
    }

    /// Periods that have a history file, oldest first.
    pub fn list_periods(&self) -> Vec<Period> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(_) => return Vec::new(),
        };

        let mut periods: Vec<Period> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(storage::HISTORY_EXT)
            })
            .filter_map(|path| path.file_stem()?.to_str()?.parse().ok())
            .collect();
        periods.sort();
        periods
    }

    fn load_file(&self, path: &Path) -> Result<Vec<HistoryEntry>, AiboxError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// First free name of `<file>.corrupt`, `<file>.corrupt.1`, `<file>.corrupt.2`, ...
fn backup_path(path: &Path) -> PathBuf {
    let first = path.with_extension(format!("{}.corrupt", storage::HISTORY_EXT));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| path.with_extension(format!("{}.corrupt.{n}", storage::HISTORY_EXT)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
