use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "audiolink")]
#[command(version)]
#[command(about = "Embeds stable ids in audio files and mirrors them as hard links named by id", long_about = None)]
pub struct Cli {
    /// Worker threads for scanning (defaults to one per CPU)
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Audio library to scan
    #[arg(short = 's', long = "source", env = "AUDIOLINK_SOURCE")]
    pub source: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct MirrorArgs {
    /// Directory holding the hard links named by id
    #[arg(short = 'm', long = "mirror", env = "AUDIOLINK_MIRROR")]
    pub mirror: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report the identifier state of every audio file
    Scan {
        #[command(flatten)]
        source: SourceArgs,

        /// Also report the link status of each file in this mirror
        #[arg(short = 'm', long = "mirror", env = "AUDIOLINK_MIRROR")]
        mirror: Option<PathBuf>,

        /// Write a CSV row per file
        #[arg(short = 'o', long = "report")]
        report: Option<PathBuf>,
    },

    /// Write fresh identifiers into files that lack a valid unique one
    Assign {
        #[command(flatten)]
        source: SourceArgs,

        /// Mirror used to recover identifiers of files whose tag was lost
        #[arg(short = 'm', long = "mirror", env = "AUDIOLINK_MIRROR")]
        mirror: Option<PathBuf>,

        /// Reuse the name of a mirror link that still points at the file
        #[arg(short = 'r', long, requires = "mirror")]
        recover: bool,

        /// Show what would be written without touching any file
        #[arg(short = 'd', long)]
        dry_run: bool,
    },

    /// Bring the mirror directory in line with the identified files
    Link {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        mirror: MirrorArgs,

        /// Show the link operations without performing them
        #[arg(short = 'd', long)]
        dry_run: bool,
    },

    /// Scan, assign identifiers and reconcile links in one pass
    Run {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        mirror: MirrorArgs,

        /// Reuse the name of a mirror link that still points at the file
        #[arg(short = 'r', long)]
        recover: bool,

        /// Show the planned writes and link operations only
        #[arg(short = 'd', long)]
        dry_run: bool,

        /// Write a CSV row per action taken
        #[arg(short = 'o', long = "report")]
        report: Option<PathBuf>,
    },

    /// Remove the identifier field from every audio file
    Clear {
        #[command(flatten)]
        source: SourceArgs,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_parses_paths_and_flags() {
        let cli = Cli::try_parse_from([
            "audiolink", "run", "-s", "/music", "-m", "/links", "--dry-run", "--threads", "2",
        ])
        .unwrap();

        assert_eq!(cli.threads, Some(2));
        match cli.command {
            Commands::Run { source, mirror, dry_run, recover, report } => {
                assert_eq!(source.source, PathBuf::from("/music"));
                assert_eq!(mirror.mirror, PathBuf::from("/links"));
                assert!(dry_run);
                assert!(!recover);
                assert!(report.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_recover_requires_mirror_for_assign() {
        let parsed = Cli::try_parse_from(["audiolink", "assign", "-s", "/music", "--recover"]);
        if std::env::var_os("AUDIOLINK_MIRROR").is_none() {
            assert!(parsed.is_err());
        }
    }
}
