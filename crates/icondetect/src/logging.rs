//! Log sink: `env_logger` formatting into a size-rotated, append-only file.
//!
//! When the active file would grow past `max_size_bytes` it is renamed to
//! `<file>.1` (older backups shift to `.2`, `.3`, ...), backups beyond
//! `max_backups` are removed, and backups older than `max_age_days` are
//! pruned.

use chrono::Local;
use env_logger::{Builder, Env, Target};
use icondetect_core::LogConfig;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Environment variable overriding the configured filter
pub const LOG_ENV: &str = "ICONDETECT_LOG";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Append-only file writer that rotates by size.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_size: u64,
    max_backups: usize,
    max_age: Duration,
    file: Option<File>,
    size: u64,
}

impl RotatingFile {
    /// Open (or create) `config.file` for appending.
    pub fn open(config: &LogConfig) -> io::Result<Self> {
        let mut writer = Self {
            path: config.file.clone(),
            max_size: config.max_size_bytes,
            max_backups: config.max_backups,
            max_age: Duration::from_secs(u64::from(config.max_age_days) * SECONDS_PER_DAY),
            file: None,
            size: 0,
        };
        writer.reopen()?;
        writer.prune_old()?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reopen(&mut self) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        if self.max_backups == 0 {
            fs::remove_file(&self.path)?;
        } else {
            let oldest = self.backup_path(self.max_backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for n in (1..self.max_backups).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }

        self.prune_old()?;
        self.reopen()
    }

    /// Remove rotated files older than the configured age.
    fn prune_old(&self) -> io::Result<()> {
        if self.max_age.is_zero() {
            return Ok(());
        }
        let now = SystemTime::now();
        for n in 1..=self.max_backups {
            let path = self.backup_path(n);
            let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) else {
                continue;
            };
            let expired = now
                .duration_since(modified)
                .map(|age| age > self.max_age)
                .unwrap_or(false);
            if expired {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => {
                self.reopen()?;
                self.file
                    .as_mut()
                    .ok_or_else(|| io::Error::other("log file is not open"))?
            }
        };
        let n = file.write(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Cloneable handle to one [`RotatingFile`]
#[derive(Debug, Clone)]
struct SharedWriter(Arc<Mutex<RotatingFile>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

/// Keeps the log sink open. Dropping it flushes pending output.
#[must_use = "dropping the guard flushes and detaches the log file"]
pub struct LogGuard {
    writer: SharedWriter,
}

impl LogGuard {
    pub fn path(&self) -> PathBuf {
        self.writer.0.lock().path().to_path_buf()
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        log::logger().flush();
        let _ = self.writer.flush();
    }
}

/// Install the global logger writing to the configured file.
///
/// The filter comes from `config.level`, overridden by `ICONDETECT_LOG`.
pub fn init(config: &LogConfig) -> io::Result<LogGuard> {
    let writer = SharedWriter(Arc::new(Mutex::new(RotatingFile::open(config)?)));

    Builder::new()
        .parse_filters(&config.level)
        .parse_env(Env::new().filter(LOG_ENV))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                Local::now().format("%Y/%m/%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(writer.clone())))
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LogGuard { writer })
}
