use std::path::PathBuf;

use clap::Parser;

use crate::sync::SyncOptions;

/// CLI arguments for the mirrorsync daemon.
#[derive(Parser, Debug)]
#[command(name = "mirrorsync")]
#[command(about = "Mirror filesystem changes into a target directory", version)]
pub struct Args {
    /// Directory to be watched (repeatable)
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub include: Vec<PathBuf>,

    /// Directory or file to be excluded (repeatable)
    #[arg(short = 'X', long = "exclude", value_name = "PATH")]
    pub exclude: Vec<PathBuf>,

    /// Target directory of the synchronisation
    #[arg(short = 't', long = "target", value_name = "DIR")]
    pub target: PathBuf,

    /// Seconds the front queue holds requests before forwarding
    #[arg(long, value_name = "SECS")]
    pub front_delay: Option<u64>,

    /// Seconds the main queue holds requests before the backend runs
    #[arg(long, value_name = "SECS")]
    pub main_delay: Option<u64>,
}

impl From<Args> for SyncOptions {
    fn from(args: Args) -> Self {
        let mut options = SyncOptions::new(args.target, args.include, args.exclude);
        if let Some(secs) = args.front_delay {
            options.front_delay = std::time::Duration::from_secs(secs);
        }
        if let Some(secs) = args.main_delay {
            options.main_delay = std::time::Duration::from_secs(secs);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{DEFAULT_FRONT_DELAY, DEFAULT_MAIN_DELAY};

    #[test]
    fn parses_repeatable_includes_and_excludes() {
        let args = Args::parse_from([
            "mirrorsync",
            "-I",
            "/data/a",
            "-I",
            "/data/b",
            "-X",
            "/data/a/tmp",
            "-t",
            "/mirror",
        ]);
        assert_eq!(args.include.len(), 2);
        assert_eq!(args.exclude, vec![PathBuf::from("/data/a/tmp")]);

        let options = SyncOptions::from(args);
        assert_eq!(options.target, PathBuf::from("/mirror"));
        assert_eq!(options.front_delay, DEFAULT_FRONT_DELAY);
        assert_eq!(options.main_delay, DEFAULT_MAIN_DELAY);
    }

    #[test]
    fn delay_overrides_apply() {
        let args = Args::parse_from([
            "mirrorsync",
            "-t",
            "/mirror",
            "--front-delay",
            "1",
            "--main-delay",
            "2",
        ]);
        let options = SyncOptions::from(args);
        assert_eq!(options.front_delay, std::time::Duration::from_secs(1));
        assert_eq!(options.main_delay, std::time::Duration::from_secs(2));
    }
}
