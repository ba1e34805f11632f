//! Command line interface definition.

use clap::Parser;
use std::path::PathBuf;

/// Help text for the configuration file, shown at the bottom of --help.
const CONFIG_HELP: &str = "\
CONFIGURATION FILE (JSON or TOML):
  Declares the analysis predicates. All regex fields are unanchored
  unless the pattern anchors itself; an empty pattern matches everything.

  {
    \"Sources\":     [{\"PackageRE\": \"creds\", \"TypeRE\": \"Secret\"}],
    \"Sinks\":       [{\"PackageRE\": \"log\", \"MethodRE\": \"Print\"}],
    \"Sanitizers\":  [{\"PackageRE\": \"redact\", \"MethodRE\": \"Scrub\"}],
    \"Propagators\": [{\"PackageRE\": \"codec\", \"MethodRE\": \"Decode\"}],
    \"FieldTags\":   [{\"Key\": \"levee\", \"Val\": \"source\"}],
    \"Exclude\":     [{\"PackageRE\": \"vendor/\"}]
  }

SUPPRESSION:
  A comment beginning with `levee.DoNotReport` suppresses findings at the
  call it annotates.
";

/// Command line interface configuration using `clap`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = CONFIG_HELP)]
pub struct Cli {
    /// Path to the analysis configuration file (JSON or TOML).
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// SSA program dump to analyze (JSON, as produced by the front end).
    pub program: PathBuf,

    /// Directory holding the program's source files, scanned for
    /// suppression comments. File names must match the dump's file table.
    #[arg(long, value_name = "DIR")]
    pub source_root: Option<PathBuf>,

    /// Output raw JSON.
    #[arg(long)]
    pub json: bool,

    /// Quiet mode: print only the summary line, no findings table.
    #[arg(short, long)]
    pub quiet: bool,
}
