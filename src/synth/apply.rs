// src/synth/apply.rs

//! Structural effect of synthesized commands on a value tree.
//!
//! This is the in-process model of what replaying a command does to the
//! store. `prefwatch diff --verify` and the round-trip tests use it to check
//! that the commands for `diff(A, B)` turn `A` into `B`.

use crate::value::Value;

use super::{Operation, SynthesizedCommand};

impl SynthesizedCommand {
    /// Apply this command to `tree`. Returns `false` when the command could
    /// not be applied (placeholder literal, missing parent, wrong shape).
    pub fn apply_to(&self, tree: &mut Value) -> bool {
        match self.operation {
            Operation::Set => match &self.payload {
                Some(value) => tree.set(&self.path, value.clone()),
                None => false,
            },
            Operation::Delete => tree.remove(&self.path).is_some(),
            Operation::AppendRecord => {
                let (Some(value), Some(array_path)) = (&self.payload, self.path.parent()) else {
                    return false;
                };
                match tree.get_mut(&array_path) {
                    Some(Value::Array(items)) => {
                        items.push(value.clone());
                        true
                    }
                    _ => false,
                }
            }
        }
    }
}

/// Apply `commands` in order; returns how many could not be applied.
pub fn apply_all<'a, I>(commands: I, tree: &mut Value) -> usize
where
    I: IntoIterator<Item = &'a SynthesizedCommand>,
{
    commands
        .into_iter()
        .filter(|command| !command.apply_to(tree))
        .count()
}
