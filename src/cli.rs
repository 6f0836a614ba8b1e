// Author: kelexine (https://github.com/kelexine)
// cli.rs — Outer shell options via clap derive; command tokens go to the option engine

use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// lockscan — lock-ordering deadlock detection for captured target state
///
/// Global options come first; everything from the command name onwards is
/// parsed by lockscan's own command table.
///
/// Author: kelexine (https://github.com/kelexine)
#[derive(Parser, Debug)]
#[command(
    name = "lockscan",
    version,
    author = "kelexine <https://github.com/kelexine>",
    about = "Deadlock detection over mutex owner/waiter snapshots",
    after_help = "\
COMMANDS:
  deadlock     Look for wait-for cycles in one or more processes
  primitives   List the synchronization primitives of a process
  processes    List the processes contained in a snapshot
  help         Show every command and its options

EXAMPLES:
  lockscan processes -s target.json
  lockscan deadlock -s target.json -p 0x1010200
  lockscan deadlock -s target.json -p 0x1010200 0x1010300 --detailed
  lockscan deadlock -s target.json -p 1 --json --compact
  lockscan deadlock -s target.json -p 1 -e report.json
  lockscan -vv primitives -s target.json -p 1

EXIT STATUS:
  0 no deadlock, 1 runtime error, 2 invalid arguments, 3 deadlock found"
)]
pub struct Args {
    /// Load settings from this TOML file instead of the global config
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Command name followed by its options
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}
