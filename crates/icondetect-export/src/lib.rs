//! # Backup Export
//!
//! Writes the detection snapshot in the host's registry export format so an
//! operator can restore the overlay list by importing the file, and reads
//! such files back for [`restore`](https://docs.rs/icondetect-repair) and
//! offline snapshot repair.
//!
//! ## Format
//!
//! CRLF line endings, entries sorted by raw name:
//!
//! ```text
//! Windows Registry Editor Version 5.00
//!
//! [HKEY_LOCAL_MACHINE\<parent>]
//!
//! [HKEY_LOCAL_MACHINE\<parent>\<raw name>]
//! @="<value>"
//!
//! ```
//!
//! Backslashes and double quotes inside values are escaped as `\\` and `\"`.
//!
//! ## Quick Start
//!
//! ```
//! use icondetect_core::{Hive, KeyLocation};
//! use icondetect_export::{parse_backup, render_backup};
//! use std::collections::BTreeMap;
//!
//! # fn main() -> icondetect_core::Result<()> {
//! let location = KeyLocation::new(Hive::LocalMachine, "SOFTWARE\\Overlays");
//! let entries = BTreeMap::from([(" Foo".to_string(), "{A}".to_string())]);
//!
//! let text = render_backup(&location, &entries);
//! let parsed = parse_backup(&text)?;
//! assert_eq!(parsed.entries, entries);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, TimeZone};
use icondetect_core::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// First line of every export file
pub const HEADER: &str = "Windows Registry Editor Version 5.00";

const CRLF: &str = "\r\n";

/// Contents of a backup file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub location: KeyLocation,
    /// Raw name to default value
    pub entries: BTreeMap<String, String>,
}

impl BackupFile {
    /// Entries in raw-name order
    pub fn to_entries(&self) -> Vec<Entry> {
        self.entries
            .iter()
            .map(|(name, value)| Entry::new(name.clone(), value.clone()))
            .collect()
    }

    pub fn render(&self) -> String {
        render_backup(&self.location, &self.entries)
    }
}

/// Render `entries` in export format. Output depends only on the map
/// contents, never on enumeration order.
pub fn render_backup(location: &KeyLocation, entries: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push_str(CRLF);
    out.push_str(CRLF);

    let root = location.to_string();
    out.push_str(&format!("[{}]{}{}", root, CRLF, CRLF));

    for (name, value) in entries {
        out.push_str(&format!("[{}\\{}]{}", root, name, CRLF));
        out.push_str(&format!("@=\"{}\"{}{}", escape(value), CRLF, CRLF));
    }
    out
}

/// Write a backup file.
///
/// Content goes to a temporary file next to `path` first and is moved into
/// place only once fully written.
pub fn write_backup(
    path: &Path,
    location: &KeyLocation,
    entries: &BTreeMap<String, String>,
) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let text = render_backup(location, entries);

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::backup(path, e))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| Error::backup(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::backup(path, e))?;
    tmp.persist(path).map_err(|e| Error::backup(path, e.error))?;

    log::info!("wrote backup of {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Default backup file name for a run started at `at`.
pub fn backup_file_name<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("backup_%Y%m%d%H%M%S.reg").to_string()
}

/// Read and parse a backup file
pub fn read_backup(path: &Path) -> Result<BackupFile> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::backup(path, e))?;
    parse_backup(&text)
}

/// Parse export text produced by [`render_backup`] (CRLF or LF).
pub fn parse_backup(text: &str) -> Result<BackupFile> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    match lines.next() {
        Some((_, line)) if line.trim_end() == HEADER => {}
        Some((n, _)) => return Err(Error::backup_format(n, "missing export header")),
        None => return Err(Error::backup_format(0, "empty backup")),
    }

    let (n, line) = lines
        .next()
        .ok_or_else(|| Error::backup_format(0, "missing parent key section"))?;
    let location = parse_location(n, section_name(n, line)?)?;
    let prefix = format!("{}\\", location);

    let mut entries = BTreeMap::new();
    let mut current: Option<String> = None;

    for (n, line) in lines {
        if line.starts_with('[') {
            let section = section_name(n, line)?;
            let name = section
                .strip_prefix(&prefix)
                .ok_or_else(|| Error::backup_format(n, format!("key outside {}", location)))?;
            if name.is_empty() || name.contains('\\') {
                return Err(Error::backup_format(
                    n,
                    format!("unsupported nested key {:?}", name),
                ));
            }
            current = Some(name.to_string());
        } else if let Some(quoted) = line.strip_prefix("@=") {
            let name = current
                .take()
                .ok_or_else(|| Error::backup_format(n, "value outside an entry section"))?;
            let value = unquote(n, quoted.trim_end())?;
            if entries.insert(name.clone(), value).is_some() {
                return Err(Error::backup_format(n, format!("duplicate entry {:?}", name)));
            }
        } else {
            return Err(Error::backup_format(n, format!("unexpected line {:?}", line)));
        }
    }

    Ok(BackupFile { location, entries })
}

fn section_name(n: usize, line: &str) -> Result<&str> {
    let line = line.trim_end();
    if line.starts_with("[-") {
        return Err(Error::backup_format(n, "key deletions are not supported"));
    }
    line.strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .ok_or_else(|| Error::backup_format(n, format!("malformed section {:?}", line)))
}

fn parse_location(n: usize, section: &str) -> Result<KeyLocation> {
    let (root, path) = section
        .split_once('\\')
        .ok_or_else(|| Error::backup_format(n, "parent key has no path"))?;
    let hive = Hive::from_export_name(root)
        .ok_or_else(|| Error::backup_format(n, format!("unknown root key {}", root)))?;
    Ok(KeyLocation::new(hive, path))
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unquote(n: usize, quoted: &str) -> Result<String> {
    let inner = quoted
        .strip_prefix('"')
        .and_then(|q| q.strip_suffix('"'))
        .ok_or_else(|| Error::backup_format(n, "value must be a quoted string"))?;

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('\\' | '"')) => value.push(escaped),
                _ => return Err(Error::backup_format(n, "invalid escape sequence")),
            },
            '"' => return Err(Error::backup_format(n, "unescaped quote in value")),
            c => value.push(c),
        }
    }
    Ok(value)
}
