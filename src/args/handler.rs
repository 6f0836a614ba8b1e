// Author: kelexine (https://github.com/kelexine)
// args/handler.rs — Argument registry, token matching, and dependency validation

use std::ops::Index;

use tracing::{debug, trace};

use super::{ArgError, ArgHandle, ArgId, Argument, DependencyReason};

/// Registry of arguments for one command table.
///
/// Lifecycle: register with `add`, wire relations with
/// `set_parent_dependency` / `set_implied_argument`, call `parse` once per
/// token list, then read values through the returned handles. `reset`
/// clears the registry for reuse; handles from before the reset stop
/// resolving.
#[derive(Default)]
pub struct CommandLineHandler {
    args: Vec<Box<dyn Argument>>,
    generation: u32,
    required_count: usize,
    matched: Vec<ArgId>,
    remaining: Vec<String>,
    unrecognized: Vec<String>,
    last_flag_index: Option<usize>,
}

impl CommandLineHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an argument. Registration order decides which argument wins
    /// when several could match the same token.
    pub fn add<A: Argument>(&mut self, arg: A) -> ArgHandle<A> {
        if arg.meta().is_required() && arg.meta().parent().is_none() {
            self.required_count += 1;
        }
        let id = ArgId {
            index: self.args.len(),
            generation: self.generation,
        };
        self.args.push(Box::new(arg));
        ArgHandle::new(id)
    }

    /// `child` is only legal when `parent` was passed; a required `child`
    /// becomes required exactly when `parent` is passed.
    pub fn set_parent_dependency(
        &mut self,
        child: impl Into<ArgId>,
        parent: impl Into<ArgId>,
    ) -> Result<(), ArgError> {
        let parent = self.id_at(self.check(parent.into())?);
        let child = self.check(child.into())?;
        let meta = self.args[child].meta_mut();
        if meta.is_required() && meta.parent.is_none() {
            self.required_count -= 1;
        }
        meta.parent = Some(parent);
        Ok(())
    }

    /// Passing `arg` marks `implied` as passed too.
    pub fn set_implied_argument(
        &mut self,
        arg: impl Into<ArgId>,
        implied: impl Into<ArgId>,
    ) -> Result<(), ArgError> {
        let implied = self.id_at(self.check(implied.into())?);
        let arg = self.check(arg.into())?;
        self.args[arg].meta_mut().implied = Some(implied);
        Ok(())
    }

    /// Drop every registered argument and all parse results.
    pub fn reset(&mut self) {
        self.args.clear();
        self.generation = self.generation.wrapping_add(1);
        self.required_count = 0;
        self.clear_parse_state();
    }

    /// Match `tokens` against the registered arguments and validate the
    /// required, dependency and implied relations.
    pub fn parse<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<(), ArgError> {
        let tokens: Vec<String> = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        self.clear_parse_state();

        let mut order = 0usize;
        let mut skipped: Vec<usize> = Vec::new();
        let mut index = 0usize;
        while index < tokens.len() {
            let start = index;
            let mut claimed = false;
            for slot in 0..self.args.len() {
                let arg = &mut self.args[slot];
                if arg.process(&mut index, &tokens)? {
                    let meta = arg.meta_mut();
                    if meta.sort_index.is_none() {
                        meta.sort_index = Some(order);
                        order += 1;
                    }
                    trace!(token = %tokens[start], argument = meta.long(), "matched");
                    self.last_flag_index = Some(self.last_flag_index.map_or(index, |l| l.max(index)));
                    claimed = true;
                    break;
                }
            }
            if !claimed {
                skipped.push(start);
            }
            index += 1;
        }

        // Unclaimed tokens after the last match are trailing arguments
        for position in skipped {
            let token = tokens[position].clone();
            match self.last_flag_index {
                Some(last) if position < last => self.unrecognized.push(token),
                _ => self.remaining.push(token),
            }
        }

        self.apply_implied(&mut order);
        self.check_dependencies()?;
        self.check_required()?;

        let mut matched: Vec<(usize, ArgId)> = self
            .args
            .iter()
            .enumerate()
            .filter_map(|(slot, arg)| arg.meta().sort_index.map(|s| (s, self.id_at(slot))))
            .collect();
        matched.sort_by_key(|(sort, _)| *sort);
        self.matched = matched.into_iter().map(|(_, id)| id).collect();

        debug!(
            matched = self.matched.len(),
            remaining = self.remaining.len(),
            unrecognized = self.unrecognized.len(),
            "parsed command line"
        );
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn get<A: Argument>(&self, handle: ArgHandle<A>) -> Option<&A> {
        let slot = self.slot(handle.id)?;
        self.args[slot].as_any().downcast_ref::<A>()
    }

    pub fn argument(&self, id: impl Into<ArgId>) -> Option<&dyn Argument> {
        let slot = self.slot(id.into())?;
        Some(self.args[slot].as_ref())
    }

    pub fn is_passed(&self, id: impl Into<ArgId>) -> bool {
        self.argument(id).is_some_and(|arg| arg.meta().is_passed())
    }

    /// Passed arguments in the order they appeared on the command line,
    /// followed by implied arguments in cascade order.
    pub fn matched(&self) -> &[ArgId] {
        &self.matched
    }

    /// Task tags of `matched()`, skipping untagged arguments.
    pub fn matched_tasks(&self) -> impl Iterator<Item = u32> + '_ {
        self.matched
            .iter()
            .filter_map(|id| self.argument(*id).and_then(|arg| arg.meta().task()))
    }

    /// Tokens after the last matched position that no argument consumed.
    pub fn remaining_args(&self) -> &[String] {
        &self.remaining
    }

    /// Tokens before the last matched position that no argument consumed.
    pub fn unrecognized(&self) -> &[String] {
        &self.unrecognized
    }

    /// Index of the last token claimed by an argument.
    pub fn last_flag_index(&self) -> Option<usize> {
        self.last_flag_index
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// One line per registered argument, in registration order.
    pub fn usage(&self) -> String {
        let rows: Vec<(String, &str)> = self
            .args
            .iter()
            .map(|arg| {
                let meta = arg.meta();
                let mut name = if arg.is_positional() {
                    meta.long().to_string()
                } else {
                    meta.display_name()
                };
                if let Some(hint) = arg.value_hint() {
                    name.push(' ');
                    name.push_str(&hint);
                }
                if meta.is_required() {
                    name.push_str(" (required)");
                }
                (name, meta.help().unwrap_or(""))
            })
            .collect();

        let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        rows.iter()
            .map(|(name, help)| format!("  {:<width$}  {}", name, help, width = width))
            .map(|line| line.trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ── Validation ──────────────────────────────────────────────────────────

    fn apply_implied(&mut self, order: &mut usize) {
        // Cascade to a fixpoint; each pass can only flip unpassed arguments
        loop {
            let mut changed = false;
            for slot in 0..self.args.len() {
                let meta = self.args[slot].meta();
                if !meta.is_passed() {
                    continue;
                }
                let Some(target) = meta.implied().and_then(|id| self.slot(id)) else {
                    continue;
                };
                let implied = self.args[target].meta_mut();
                if !implied.passed {
                    implied.passed = true;
                    implied.sort_index = Some(*order);
                    *order += 1;
                    changed = true;
                    trace!(argument = implied.long(), "implied");
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn check_dependencies(&self) -> Result<(), ArgError> {
        for arg in &self.args {
            let meta = arg.meta();
            let Some(parent) = meta.parent().and_then(|id| self.slot(id)) else {
                continue;
            };
            let parent = self.args[parent].meta();
            let reason = match (parent.is_passed(), meta.is_passed()) {
                (true, false) if meta.is_required() => DependencyReason::DependentAbsent,
                (false, true) => DependencyReason::ParentAbsent,
                _ => continue,
            };
            return Err(ArgError::Dependency {
                argument: meta.long().to_string(),
                parent: parent.long().to_string(),
                reason,
            });
        }
        Ok(())
    }

    fn check_required(&self) -> Result<(), ArgError> {
        let mut expected = self.required_count;
        let mut found = 0;
        let mut missing = Vec::new();
        for arg in &self.args {
            let meta = arg.meta();
            if !meta.is_required() {
                continue;
            }
            let parent_passed = match meta.parent() {
                Some(parent) => {
                    let passed = self.is_passed(parent);
                    if passed {
                        expected += 1;
                    }
                    passed
                }
                None => true,
            };
            if meta.is_passed() {
                found += 1;
            } else if parent_passed {
                missing.push(meta.long().to_string());
            }
        }

        if found != expected {
            return Err(ArgError::RequiredMissing {
                expected,
                found,
                missing,
            });
        }
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn clear_parse_state(&mut self) {
        for arg in &mut self.args {
            arg.meta_mut().clear_parse_state();
            arg.clear_values();
        }
        self.matched.clear();
        self.remaining.clear();
        self.unrecognized.clear();
        self.last_flag_index = None;
    }

    fn slot(&self, id: ArgId) -> Option<usize> {
        (id.generation == self.generation && id.index < self.args.len()).then_some(id.index)
    }

    fn check(&self, id: ArgId) -> Result<usize, ArgError> {
        self.slot(id).ok_or(ArgError::UnknownArgument(id))
    }

    fn id_at(&self, slot: usize) -> ArgId {
        ArgId {
            index: slot,
            generation: self.generation,
        }
    }
}

impl<A: Argument> Index<ArgHandle<A>> for CommandLineHandler {
    type Output = A;

    /// Panics if the handle was issued by another handler or before `reset`.
    fn index(&self, handle: ArgHandle<A>) -> &A {
        match self.get(handle) {
            Some(arg) => arg,
            None => panic!("stale argument handle {}", handle.id),
        }
    }
}
