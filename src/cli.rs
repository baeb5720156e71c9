use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::models::Coalesce;

#[derive(Parser, Debug)]
#[command(
    name = "bomcheck",
    about = "Check a bill of materials for license conflicts and undeclared license files",
    version
)]
pub struct Cli {
    /// Manifest to read [default: ./.bom.yaml, or stdin when piped]
    #[arg(short = 'f', long = "file", value_name = "FILE", global = true)]
    pub file: Option<PathBuf>,

    /// Config file [default: ./.bomcheck/config.toml, fallback ~/.config/bomcheck/config.toml]
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print the summary line
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report license conflicts between components and their dependencies
    Analyze(AnalyzeArgs),
    /// Find license files and licenses the manifest does not declare
    Scan(ScanArgs),
    /// Check that the manifest agrees with the files it describes
    Verify(VerifyArgs),
    /// Render the dependency tree as Graphviz DOT, conflicts highlighted
    Graph(GraphArgs),
}

#[derive(Args, Debug, Clone, Copy)]
pub struct Distribution {
    /// Treat development dependencies as shipped
    #[arg(long = "source-distribution")]
    pub source_distribution: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub distribution: Distribution,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub distribution: Distribution,

    /// Also scan dependencies declared in their own manifest files
    #[arg(short, long)]
    pub recursive: bool,

    /// Add what was found to the manifest instead of failing
    #[arg(short, long)]
    pub add: bool,

    /// Merge license files with the same license in one directory [default: from config, else all]
    #[arg(long, value_name = "MODE")]
    pub coalesce: Option<CoalesceArg>,

    /// Classify one directory at a time
    #[arg(long)]
    pub sequential: bool,

    /// Write the updated manifest here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub distribution: Distribution,

    /// Check that origins exist
    #[arg(long = "check-origins", value_name = "MODE")]
    pub check_origins: Option<OriginCheck>,

    /// Write the verified manifest here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    #[command(flatten)]
    pub distribution: Distribution,

    /// Write the DOT text here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CoalesceArg {
    All,
    None,
}

impl From<CoalesceArg> for Coalesce {
    fn from(arg: CoalesceArg) -> Self {
        match arg {
            CoalesceArg::All => Coalesce::All,
            CoalesceArg::None => Coalesce::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OriginCheck {
    /// The origin URI answers with a success status
    Uri,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_flags() {
        let cli = Cli::parse_from([
            "bomcheck", "-f", "app/.bom.yaml", "scan", "-r", "-a", "--coalesce", "none", "--sequential",
        ]);
        assert_eq!(cli.file, Some(PathBuf::from("app/.bom.yaml")));
        match cli.command {
            Command::Scan(args) => {
                assert!(args.recursive && args.add && args.sequential);
                assert!(!args.distribution.source_distribution);
                assert_eq!(args.coalesce.map(Coalesce::from), Some(Coalesce::None));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_command() {
        let cli = Cli::parse_from(["bomcheck", "verify", "--source-distribution", "--check-origins", "uri", "-vv", "-q"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
        match cli.command {
            Command::Verify(args) => {
                assert!(args.distribution.source_distribution);
                assert_eq!(args.check_origins, Some(OriginCheck::Uri));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_report_defaults_to_terminal() {
        let cli = Cli::parse_from(["bomcheck", "analyze"]);
        assert!(matches!(
            cli.command,
            Command::Analyze(AnalyzeArgs {
                report: ReportFormat::Terminal,
                ..
            })
        ));
    }
}
