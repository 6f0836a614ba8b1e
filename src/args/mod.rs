// Author: kelexine (https://github.com/kelexine)
// args/mod.rs — Declarative command-line argument engine

pub mod convert;
pub mod handler;
pub mod options;

pub use convert::{parse_integer, FromToken};
pub use handler::CommandLineHandler;
pub use options::{Command, Flag, MultiValue, SingleValue};

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use thiserror::Error;

/// A token is flag-shaped iff it starts with `-` (which covers `--`).
#[inline]
pub fn is_flag_token(token: &str) -> bool {
    token.starts_with('-')
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Which half of a parent/dependent relationship was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyReason {
    /// The argument was passed but its parent was not.
    ParentAbsent,
    /// The parent was passed but the required dependent was not.
    DependentAbsent,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArgError {
    #[error("'{argument}': cannot convert '{value}' to {expected}")]
    Conversion {
        argument: String,
        value: String,
        expected: &'static str,
    },
    #[error("'{argument}': expected a value after the flag")]
    MissingValue { argument: String },
    #[error("'{argument}': expected exactly {expected} value(s), got {found}")]
    Arity {
        argument: String,
        expected: usize,
        found: usize,
    },
    #[error("{}", describe_dependency(.argument, .parent, .reason))]
    Dependency {
        argument: String,
        parent: String,
        reason: DependencyReason,
    },
    #[error("missing required argument(s): {} (expected {expected}, found {found})", join_long(.missing))]
    RequiredMissing {
        expected: usize,
        found: usize,
        missing: Vec<String>,
    },
    #[error("argument id {0} is not registered with this handler")]
    UnknownArgument(ArgId),
}

fn describe_dependency(argument: &str, parent: &str, reason: &DependencyReason) -> String {
    match reason {
        DependencyReason::ParentAbsent => {
            format!("'{argument}' can only be used together with '{parent}'")
        }
        DependencyReason::DependentAbsent => {
            format!("'{parent}' requires '{argument}'")
        }
    }
}

fn join_long(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity and handles
// ─────────────────────────────────────────────────────────────────────────────

/// Untyped registry key of an argument inside a `CommandLineHandler`.
///
/// Carries the registration generation so ids issued before a `reset()` do
/// not alias arguments registered afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl fmt::Display for ArgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

/// Typed registry key returned by `CommandLineHandler::add`.
pub struct ArgHandle<A> {
    pub(crate) id: ArgId,
    _marker: PhantomData<fn() -> A>,
}

impl<A> ArgHandle<A> {
    pub(crate) fn new(id: ArgId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> ArgId {
        self.id
    }
}

impl<A> Clone for ArgHandle<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for ArgHandle<A> {}

impl<A> fmt::Debug for ArgHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArgHandle").field(&self.id).finish()
    }
}

impl<A> From<ArgHandle<A>> for ArgId {
    fn from(handle: ArgHandle<A>) -> Self {
        handle.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared metadata
// ─────────────────────────────────────────────────────────────────────────────

/// State common to every argument variant.
#[derive(Debug, Clone, Default)]
pub struct ArgMeta {
    short: Option<String>,
    long: String,
    help: Option<String>,
    required: bool,
    task: Option<u32>,
    pub(crate) passed: bool,
    pub(crate) sort_index: Option<usize>,
    pub(crate) parent: Option<ArgId>,
    pub(crate) implied: Option<ArgId>,
}

impl ArgMeta {
    pub fn new(short: &str, long: &str) -> Self {
        let short = short.trim_start_matches('-');
        Self {
            short: (!short.is_empty()).then(|| short.to_string()),
            long: long.trim_start_matches('-').to_string(),
            ..Self::default()
        }
    }

    pub fn short(&self) -> Option<&str> {
        self.short.as_deref()
    }

    pub fn long(&self) -> &str {
        &self.long
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_passed(&self) -> bool {
        self.passed
    }

    pub fn task(&self) -> Option<u32> {
        self.task
    }

    /// Position in match order, assigned during `parse`.
    pub fn sort_index(&self) -> Option<usize> {
        self.sort_index
    }

    pub fn parent(&self) -> Option<ArgId> {
        self.parent
    }

    pub fn implied(&self) -> Option<ArgId> {
        self.implied
    }

    pub(crate) fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    pub(crate) fn set_help(&mut self, help: &str) {
        self.help = Some(help.to_string());
    }

    pub(crate) fn set_task(&mut self, task: u32) {
        self.task = Some(task);
    }

    /// True if `token` is `-short` or `--long`.
    pub fn matches_flag(&self, token: &str) -> bool {
        if let Some(long) = token.strip_prefix("--") {
            return long == self.long;
        }
        match (token.strip_prefix('-'), &self.short) {
            (Some(short), Some(own)) => short == own,
            _ => false,
        }
    }

    pub(crate) fn clear_parse_state(&mut self) {
        self.passed = false;
        self.sort_index = None;
    }

    /// `-s, --long` as shown in usage text.
    pub fn display_name(&self) -> String {
        match &self.short {
            Some(short) => format!("-{}, --{}", short, self.long),
            None => format!("    --{}", self.long),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument capability
// ─────────────────────────────────────────────────────────────────────────────

/// One registrable command-line argument.
///
/// `process` inspects `tokens[*index]`. If the token belongs to this
/// argument it consumes any value tokens, leaves `*index` on the last token
/// it consumed, marks itself passed and returns `Ok(true)`. A token that
/// does not belong to this argument returns `Ok(false)` without mutation.
pub trait Argument: Any {
    fn meta(&self) -> &ArgMeta;

    fn meta_mut(&mut self) -> &mut ArgMeta;

    fn process(&mut self, index: &mut usize, tokens: &[String]) -> Result<bool, ArgError>;

    /// Drop any values extracted by a previous parse.
    fn clear_values(&mut self) {}

    /// Bare keywords (commands) rather than dash-prefixed flags.
    fn is_positional(&self) -> bool {
        false
    }

    /// Placeholder shown after the flag in usage text, e.g. `<PID>...`.
    fn value_hint(&self) -> Option<String> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}
