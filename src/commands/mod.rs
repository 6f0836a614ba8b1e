// Author: kelexine (https://github.com/kelexine)
// commands/mod.rs — Command table built on the argument engine
//
// Parsing runs in two stages over the same handler: the first matches the
// leading token against the command keywords, the second resets the handler
// and parses every token against that command's full option set.

use std::path::PathBuf;

use lockscan::args::{ArgError, ArgHandle, CommandLineHandler, Command, Flag, MultiValue, SingleValue};
use lockscan::deadlock::ProcessId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
enum Task {
    Help = 1,
    Deadlock,
    Primitives,
    Processes,
}

impl Task {
    const ALL: [Task; 4] = [Task::Deadlock, Task::Primitives, Task::Processes, Task::Help];

    fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u32 == tag)
    }

    fn name(self) -> &'static str {
        match self {
            Task::Help => "help",
            Task::Deadlock => "deadlock",
            Task::Primitives => "primitives",
            Task::Processes => "processes",
        }
    }

    fn about(self) -> &'static str {
        match self {
            Task::Help => "Show every command and its options",
            Task::Deadlock => "Look for wait-for cycles in one or more processes",
            Task::Primitives => "List the synchronization primitives of a process",
            Task::Processes => "List the processes contained in a snapshot",
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Arg(#[from] ArgError),
    #[error("no command given (expected one of: deadlock, primitives, processes, help)")]
    NoCommand,
    #[error("unexpected argument(s): {}", .0.join(" "))]
    Unexpected(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeadlockArgs {
    pub snapshot: Option<PathBuf>,
    pub pids: Vec<ProcessId>,
    pub capacity: Option<usize>,
    pub export: Option<PathBuf>,
    pub json: bool,
    pub compact: bool,
    pub detailed: bool,
    pub show_skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Help,
    Deadlock(DeadlockArgs),
    Primitives {
        snapshot: Option<PathBuf>,
        pid: ProcessId,
    },
    Processes {
        snapshot: Option<PathBuf>,
    },
}

/// Parse the command tokens (everything after the global options).
pub fn parse(tokens: &[String]) -> Result<Invocation, CommandError> {
    let mut cli = CommandLineHandler::new();
    let task = select_command(&mut cli, tokens)?;
    tracing::debug!(command = task.name(), "selected command");

    cli.reset();
    let invocation = match task {
        Task::Help => {
            cli.add(command(Task::Help));
            cli.parse(tokens)?;
            ensure_consumed(&cli)?;
            Invocation::Help
        }
        Task::Deadlock => {
            let table = DeadlockTable::register(&mut cli)?;
            cli.parse(tokens)?;
            ensure_consumed(&cli)?;
            Invocation::Deadlock(table.read(&cli))
        }
        Task::Primitives => {
            let table = PrimitivesTable::register(&mut cli)?;
            cli.parse(tokens)?;
            ensure_consumed(&cli)?;
            Invocation::Primitives {
                snapshot: cli[table.snapshot].value().cloned(),
                pid: cli[table.pid].value().copied().unwrap_or_default(),
            }
        }
        Task::Processes => {
            let command = cli.add(command(Task::Processes));
            let snapshot = cli.add(snapshot_option());
            cli.set_parent_dependency(snapshot, command)?;
            cli.parse(tokens)?;
            ensure_consumed(&cli)?;
            Invocation::Processes {
                snapshot: cli[snapshot].value().cloned(),
            }
        }
    };
    Ok(invocation)
}

/// Usage text for every command.
pub fn usage() -> String {
    let mut out = String::from(
        "Usage: lockscan [--config FILE] [-v...] [--no-color] <COMMAND> [OPTIONS]\n",
    );
    let mut cli = CommandLineHandler::new();
    for task in Task::ALL {
        cli.reset();
        // Registration only fails on foreign handles, which cannot happen here
        let registered = match task {
            Task::Deadlock => DeadlockTable::register(&mut cli).map(|_| ()),
            Task::Primitives => PrimitivesTable::register(&mut cli).map(|_| ()),
            Task::Processes => {
                cli.add(command(Task::Processes));
                cli.add(snapshot_option());
                Ok(())
            }
            Task::Help => {
                cli.add(command(Task::Help));
                Ok(())
            }
        };
        if registered.is_ok() {
            out.push('\n');
            out.push_str(&cli.usage());
            out.push('\n');
        }
    }
    out
}

fn select_command(cli: &mut CommandLineHandler, tokens: &[String]) -> Result<Task, CommandError> {
    for task in Task::ALL {
        cli.add(command(task));
    }
    // The command always comes first; later tokens may be option values
    // that happen to spell a command name
    let head = tokens.get(..1).unwrap_or_default();
    cli.parse(head)?;

    cli.matched_tasks()
        .find_map(Task::from_tag)
        .ok_or(CommandError::NoCommand)
}

fn ensure_consumed(cli: &CommandLineHandler) -> Result<(), CommandError> {
    let leftover: Vec<String> = cli
        .unrecognized()
        .iter()
        .chain(cli.remaining_args())
        .cloned()
        .collect();
    if leftover.is_empty() {
        Ok(())
    } else {
        Err(CommandError::Unexpected(leftover))
    }
}

fn command(task: Task) -> Command {
    Command::new(task.name())
        .task(task as u32)
        .help(task.about())
}

fn snapshot_option() -> SingleValue<PathBuf> {
    SingleValue::new("s", "snapshot").help("Captured target-state dump (JSON)")
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-command option sets
// ─────────────────────────────────────────────────────────────────────────────

struct DeadlockTable {
    snapshot: ArgHandle<SingleValue<PathBuf>>,
    pid: ArgHandle<MultiValue<ProcessId>>,
    capacity: ArgHandle<SingleValue<usize>>,
    export: ArgHandle<SingleValue<PathBuf>>,
    json: ArgHandle<Flag>,
    compact: ArgHandle<Flag>,
    detailed: ArgHandle<Flag>,
    show_skipped: ArgHandle<Flag>,
}

impl DeadlockTable {
    fn register(cli: &mut CommandLineHandler) -> Result<Self, ArgError> {
        let command = cli.add(command(Task::Deadlock));
        let table = Self {
            snapshot: cli.add(snapshot_option()),
            pid: cli.add(
                MultiValue::new("p", "pid")
                    .required(true)
                    .help("Process id(s) to check, hex accepted"),
            ),
            capacity: cli.add(
                SingleValue::new("c", "capacity").help("Maximum owner/waiter records per process"),
            ),
            export: cli.add(SingleValue::new("e", "export").help("Write the JSON report to FILE")),
            json: cli.add(Flag::new("j", "json").help("Print the report as JSON")),
            compact: cli.add(Flag::new("", "compact").help("Single-line JSON (with --json)")),
            detailed: cli.add(
                Flag::new("d", "detailed").help("Show owner and waiter tables (implies --show-skipped)"),
            ),
            show_skipped: cli.add(
                Flag::new("", "show-skipped").help("List primitives whose query failed"),
            ),
        };

        for child in [table.snapshot.id(), table.capacity.id(), table.export.id()] {
            cli.set_parent_dependency(child, command)?;
        }
        for child in [table.json, table.detailed, table.show_skipped] {
            cli.set_parent_dependency(child, command)?;
        }
        cli.set_parent_dependency(table.pid, command)?;
        cli.set_parent_dependency(table.compact, table.json)?;
        cli.set_implied_argument(table.detailed, table.show_skipped)?;
        Ok(table)
    }

    fn read(&self, cli: &CommandLineHandler) -> DeadlockArgs {
        DeadlockArgs {
            snapshot: cli[self.snapshot].value().cloned(),
            pids: cli[self.pid].values().to_vec(),
            capacity: cli[self.capacity].value().copied(),
            export: cli[self.export].value().cloned(),
            json: cli[self.json].is_set(),
            compact: cli[self.compact].is_set(),
            detailed: cli[self.detailed].is_set(),
            show_skipped: cli[self.show_skipped].is_set(),
        }
    }
}

struct PrimitivesTable {
    snapshot: ArgHandle<SingleValue<PathBuf>>,
    pid: ArgHandle<SingleValue<ProcessId>>,
}

impl PrimitivesTable {
    fn register(cli: &mut CommandLineHandler) -> Result<Self, ArgError> {
        let command = cli.add(command(Task::Primitives));
        let table = Self {
            snapshot: cli.add(snapshot_option()),
            pid: cli.add(
                SingleValue::new("p", "pid")
                    .required(true)
                    .help("Process id, hex accepted"),
            ),
        };
        cli.set_parent_dependency(table.snapshot, command)?;
        cli.set_parent_dependency(table.pid, command)?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockscan::args::DependencyReason;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_deadlock_full_option_set() {
        let inv = parse(&tokens(&[
            "deadlock", "-s", "t.json", "-p", "0x10", "17", "-c", "64", "--json", "--compact",
            "-d",
        ]))
        .unwrap();
        let Invocation::Deadlock(args) = inv else {
            panic!("expected deadlock invocation");
        };
        assert_eq!(args.snapshot, Some(PathBuf::from("t.json")));
        assert_eq!(args.pids, vec![0x10, 17]);
        assert_eq!(args.capacity, Some(64));
        assert!(args.json && args.compact && args.detailed);
        assert!(args.show_skipped, "--detailed implies --show-skipped");
    }

    #[test]
    fn test_deadlock_requires_pid() {
        let err = parse(&tokens(&["deadlock", "-s", "t.json"])).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Arg(ArgError::Dependency {
                reason: DependencyReason::DependentAbsent,
                ..
            })
        ));
    }

    #[test]
    fn test_compact_needs_json() {
        let err = parse(&tokens(&["deadlock", "-p", "1", "--compact"])).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Arg(ArgError::Dependency {
                reason: DependencyReason::ParentAbsent,
                ..
            })
        ));
    }

    #[test]
    fn test_command_selection_errors() {
        assert!(matches!(
            parse(&tokens(&["-s", "t.json"])),
            Err(CommandError::NoCommand)
        ));
        assert!(matches!(
            parse(&tokens(&["-s", "t.json", "processes"])),
            Err(CommandError::NoCommand)
        ));
        assert!(matches!(
            parse(&tokens(&["processes", "help"])),
            Err(CommandError::Unexpected(_))
        ));
    }

    #[test]
    fn test_leftover_tokens_are_rejected() {
        let err = parse(&tokens(&["processes", "-s", "t.json", "extra"])).unwrap_err();
        match err {
            CommandError::Unexpected(left) => assert_eq!(left, vec!["extra".to_string()]),
            other => panic!("unexpected error: {other}"),
        }

        let err = parse(&tokens(&["processes", "--bogus", "-s", "t.json"])).unwrap_err();
        assert!(matches!(err, CommandError::Unexpected(_)));
    }

    #[test]
    fn test_option_value_named_like_a_command() {
        let inv = parse(&tokens(&["deadlock", "-s", "help", "-p", "1"])).unwrap();
        let Invocation::Deadlock(args) = inv else {
            panic!("expected deadlock invocation");
        };
        assert_eq!(args.snapshot, Some(PathBuf::from("help")));
        assert_eq!(args.pids, vec![1]);

        let inv = parse(&tokens(&["primitives", "-s", "processes", "-p", "0x10"])).unwrap();
        assert_eq!(
            inv,
            Invocation::Primitives {
                snapshot: Some(PathBuf::from("processes")),
                pid: 0x10,
            }
        );
    }

    #[test]
    fn test_primitives_pid_conversion_error() {
        let err = parse(&tokens(&["primitives", "-p", "abc"])).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Arg(ArgError::Conversion { .. })
        ));
        assert!(err.to_string().contains("'pid'"));
    }

    #[test]
    fn test_usage_covers_every_command() {
        let text = usage();
        for name in ["deadlock", "primitives", "processes", "help", "--pid", "--show-skipped"] {
            assert!(text.contains(name), "usage missing {name}:\n{text}");
        }
    }
}
