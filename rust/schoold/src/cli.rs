use std::path::PathBuf;

use clap::Parser;

use crate::logging::Verbosity;

/// schoold - school administration sidecar
///
/// Reads one JSON request per line on stdin and writes one JSON response per
/// line on stdout. Diagnostics go to stderr.
#[derive(Debug, Parser)]
#[command(name = "schoold")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Workspace directory to open at startup
    #[arg(short, long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::parse_from(["schoold", "-vv", "--workspace", "/tmp/ws"]);
        assert_eq!(cli.verbosity(), Verbosity::Trace);
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert!(cli.config.is_none());

        let cli = Cli::parse_from(["schoold", "-q"]);
        assert_eq!(cli.verbosity(), Verbosity::Quiet);
    }
}
