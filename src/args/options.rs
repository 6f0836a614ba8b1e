// Author: kelexine (https://github.com/kelexine)
// args/options.rs — Argument variants: flags, commands, single- and multi-value options

use std::any::Any;

use super::convert::FromToken;
use super::{is_flag_token, ArgError, ArgMeta, Argument};

/// Builder methods shared by every variant.
macro_rules! meta_builders {
    () => {
        pub fn required(mut self, required: bool) -> Self {
            self.meta.set_required(required);
            self
        }

        pub fn help(mut self, help: &str) -> Self {
            self.meta.set_help(help);
            self
        }

        /// Caller-defined tag used to branch on which option fired.
        pub fn task(mut self, task: u32) -> Self {
            self.meta.set_task(task);
            self
        }

        pub fn is_passed(&self) -> bool {
            self.meta.is_passed()
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// Flag
// ─────────────────────────────────────────────────────────────────────────────

/// A switch without a value: `-v` / `--verbose`.
#[derive(Debug, Clone)]
pub struct Flag {
    meta: ArgMeta,
}

impl Flag {
    pub fn new(short: &str, long: &str) -> Self {
        Self {
            meta: ArgMeta::new(short, long),
        }
    }

    meta_builders!();

    /// Set when matched on the command line or implied by another argument.
    pub fn is_set(&self) -> bool {
        self.meta.is_passed()
    }
}

impl Argument for Flag {
    fn meta(&self) -> &ArgMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ArgMeta {
        &mut self.meta
    }

    fn process(&mut self, index: &mut usize, tokens: &[String]) -> Result<bool, ArgError> {
        if !self.meta.matches_flag(&tokens[*index]) {
            return Ok(false);
        }
        self.meta.passed = true;
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command
// ─────────────────────────────────────────────────────────────────────────────

/// A bare positional keyword selecting a sub-command, e.g. `deadlock`.
#[derive(Debug, Clone)]
pub struct Command {
    meta: ArgMeta,
}

impl Command {
    pub fn new(name: &str) -> Self {
        Self {
            meta: ArgMeta::new("", name),
        }
    }

    meta_builders!();

    pub fn name(&self) -> &str {
        self.meta.long()
    }

    pub fn is_set(&self) -> bool {
        self.meta.is_passed()
    }
}

impl Argument for Command {
    fn meta(&self) -> &ArgMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ArgMeta {
        &mut self.meta
    }

    fn process(&mut self, index: &mut usize, tokens: &[String]) -> Result<bool, ArgError> {
        if tokens[*index] != self.meta.long() {
            return Ok(false);
        }
        self.meta.passed = true;
        Ok(true)
    }

    fn is_positional(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Single value
// ─────────────────────────────────────────────────────────────────────────────

/// A flag followed by exactly one value token: `-n 0x2A`.
///
/// The value token is taken verbatim even if it starts with `-`, so negative
/// numbers work.
#[derive(Debug, Clone)]
pub struct SingleValue<T> {
    meta: ArgMeta,
    value: Option<T>,
}

impl<T: FromToken + 'static> SingleValue<T> {
    pub fn new(short: &str, long: &str) -> Self {
        Self {
            meta: ArgMeta::new(short, long),
            value: None,
        }
    }

    meta_builders!();

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

impl<T: FromToken + 'static> Argument for SingleValue<T> {
    fn meta(&self) -> &ArgMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ArgMeta {
        &mut self.meta
    }

    fn process(&mut self, index: &mut usize, tokens: &[String]) -> Result<bool, ArgError> {
        if !self.meta.matches_flag(&tokens[*index]) {
            return Ok(false);
        }

        let value_index = *index + 1;
        let Some(token) = tokens.get(value_index) else {
            return Err(ArgError::MissingValue {
                argument: self.meta.long().to_string(),
            });
        };

        let value = T::from_token(token).ok_or_else(|| ArgError::Conversion {
            argument: self.meta.long().to_string(),
            value: token.clone(),
            expected: T::EXPECTED,
        })?;

        // Repeated occurrences keep the last value
        self.value = Some(value);
        self.meta.passed = true;
        *index = value_index;
        Ok(true)
    }

    fn clear_values(&mut self) {
        self.value = None;
    }

    fn value_hint(&self) -> Option<String> {
        Some(format!("<{}>", self.meta.long().to_uppercase()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Multi value
// ─────────────────────────────────────────────────────────────────────────────

/// A flag followed by zero or more value tokens: `-p 0x10 0x11`.
///
/// Consumption stops at the first flag-shaped token, the first token that
/// does not convert, the first token outside the whitelist, or once the
/// configured count is reached. The stopping token is left for later
/// matching.
#[derive(Debug, Clone)]
pub struct MultiValue<T> {
    meta: ArgMeta,
    count: Option<usize>,
    choices: Option<Vec<T>>,
    values: Vec<T>,
}

impl<T: FromToken + PartialEq + 'static> MultiValue<T> {
    pub fn new(short: &str, long: &str) -> Self {
        Self {
            meta: ArgMeta::new(short, long),
            count: None,
            choices: None,
            values: Vec::new(),
        }
    }

    meta_builders!();

    /// Require exactly `count` values per occurrence.
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Only accept values from this whitelist.
    pub fn choices(mut self, choices: Vec<T>) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    fn accepts(&self, value: &T) -> bool {
        self.choices
            .as_ref()
            .is_none_or(|choices| choices.contains(value))
    }
}

impl<T: FromToken + PartialEq + 'static> Argument for MultiValue<T> {
    fn meta(&self) -> &ArgMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ArgMeta {
        &mut self.meta
    }

    fn process(&mut self, index: &mut usize, tokens: &[String]) -> Result<bool, ArgError> {
        if !self.meta.matches_flag(&tokens[*index]) {
            return Ok(false);
        }

        let mut cursor = *index;
        let mut taken = Vec::new();
        while let Some(token) = tokens.get(cursor + 1) {
            if self.count.is_some_and(|count| taken.len() >= count) || is_flag_token(token) {
                break;
            }
            let Some(value) = T::from_token(token) else {
                break;
            };
            if !self.accepts(&value) {
                break;
            }
            taken.push(value);
            cursor += 1;
        }

        if let Some(expected) = self.count
            && taken.len() != expected
        {
            return Err(ArgError::Arity {
                argument: self.meta.long().to_string(),
                expected,
                found: taken.len(),
            });
        }

        self.values.extend(taken);
        self.meta.passed = true;
        *index = cursor;
        Ok(true)
    }

    fn clear_values(&mut self) {
        self.values.clear();
    }

    fn value_hint(&self) -> Option<String> {
        let name = self.meta.long().to_uppercase();
        Some(match self.count {
            Some(count) => format!("<{name}>{{{count}}}"),
            None => format!("<{name}>..."),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
