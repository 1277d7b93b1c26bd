//! Command line interface.

use clap::Parser;
use std::path::PathBuf;

/// Keeps the Explorer icon overlay list free of duplicates and in priority order
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "icon-detect", author, long_about = None, disable_version_flag = true)]
pub struct Args {
    /// Show version
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// Write a backup file before repairing
    #[arg(short, long)]
    pub backup: bool,

    /// Register the URI scheme used by the notification "Restart" button
    #[arg(short, long, conflicts_with = "unregister")]
    pub register: bool,

    /// Unregister the URI scheme
    #[arg(short, long)]
    pub unregister: bool,

    /// Configuration file (YAML)
    #[arg(short, long, env = "ICONDETECT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Detect only and print the planned changes as JSON
    #[arg(long)]
    pub dry_run: bool,

    /// Restore the overlay list from a backup file
    #[arg(long, value_name = "FILE", conflicts_with_all = ["dry_run", "backup"])]
    pub restore: Option<PathBuf>,

    /// Operate on an exported .reg file instead of the live registry
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Restart callback URI, e.g. icon-detect://TOTALCMD64.EXE
    #[arg(value_name = "URI")]
    pub uri: Option<String>,
}

/// What one invocation does, in precedence order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Version,
    PrintConfig,
    Register,
    Unregister,
    Restart(String),
    Restore(PathBuf),
    Repair,
}

impl Args {
    pub fn command(&self) -> Command {
        if self.version {
            Command::Version
        } else if self.print_config {
            Command::PrintConfig
        } else if self.register {
            Command::Register
        } else if self.unregister {
            Command::Unregister
        } else if let Some(uri) = &self.uri {
            Command::Restart(uri.clone())
        } else if let Some(path) = &self.restore {
            Command::Restore(path.clone())
        } else {
            Command::Repair
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("icon-detect").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_is_repair() {
        let args = parse(&[]);
        assert_eq!(args.command(), Command::Repair);
        assert!(!args.backup);
    }

    #[test]
    fn test_short_flags() {
        assert_eq!(parse(&["-v"]).command(), Command::Version);
        assert_eq!(parse(&["-r"]).command(), Command::Register);
        assert_eq!(parse(&["-u"]).command(), Command::Unregister);
        assert!(parse(&["-b"]).backup);
    }

    #[test]
    fn test_uri_argument_restarts() {
        assert_eq!(
            parse(&["icon-detect://TOTALCMD64.EXE"]).command(),
            Command::Restart("icon-detect://TOTALCMD64.EXE".to_string())
        );
    }

    #[test]
    fn test_snapshot_combines_with_repair_and_restore() {
        let args = parse(&["--snapshot", "list.reg", "-b"]);
        assert_eq!(args.command(), Command::Repair);
        assert_eq!(args.snapshot, Some(PathBuf::from("list.reg")));

        let args = parse(&["--snapshot", "list.reg", "--restore", "backup.reg"]);
        assert_eq!(args.command(), Command::Restore(PathBuf::from("backup.reg")));
    }

    #[test]
    fn test_conflicting_flags_are_rejected() {
        assert!(Args::try_parse_from(["icon-detect", "-r", "-u"]).is_err());
        assert!(Args::try_parse_from(["icon-detect", "--restore", "a.reg", "--dry-run"]).is_err());
        assert!(Args::try_parse_from(["icon-detect", "a://b", "c://d"]).is_err());
    }
}
