// ── Per-entity pending command stack ──
//
// Commands an entity wants transmitted. The stack is LIFO: draining pops
// until empty, so single pushes come out newest first. Multi-step
// operations go through `push_sequence`, which pushes in reverse so the
// drained order is the order the steps were listed in.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::protocol::Command;

#[derive(Debug, Default)]
pub struct CommandStack {
    inner: Mutex<Vec<Command>>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: Command) {
        self.lock().push(command);
    }

    /// Push a multi-step sequence so that it drains in the given order.
    pub fn push_sequence(&self, commands: impl IntoIterator<Item = Command>) {
        let mut steps: Vec<Command> = commands.into_iter().collect();
        steps.reverse();
        self.lock().extend(steps);
    }

    pub fn pop(&self) -> Option<Command> {
        self.lock().pop()
    }

    /// Pop every pending command, in transmit order.
    pub fn drain(&self) -> Vec<Command> {
        let mut guard = self.lock();
        let mut out = Vec::with_capacity(guard.len());
        while let Some(cmd) = guard.pop() {
            out.push(cmd);
        }
        out
    }

    /// Pending commands in drain order, leaving the stack untouched.
    pub fn pending(&self) -> Vec<Command> {
        self.lock().iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Command>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for CommandStack {
    fn clone(&self) -> Self {
        Self {
            inner: Mutex::new(self.lock().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pushes_drain_newest_first() {
        let stack = CommandStack::new();
        stack.push(Command::request(1000, &["view"]));
        stack.push(Command::get(1000, &["speed"]));

        let drained: Vec<_> = stack.drain().iter().map(|c| c.native().to_owned()).collect();
        assert_eq!(drained, ["get(1000, speed)", "request(1000, view)"]);
        assert!(stack.is_empty());
    }

    #[test]
    fn sequences_drain_in_listed_order() {
        let stack = CommandStack::new();
        stack.push_sequence([
            Command::request(5, &["control", "force"]),
            Command::get(5, &["dir"]),
            Command::release(5, &["control"]),
        ]);

        assert_eq!(stack.len(), 3);
        let pending: Vec<_> = stack.pending().iter().map(|c| c.native().to_owned()).collect();
        assert_eq!(
            pending,
            ["request(5, control, force)", "get(5, dir)", "release(5, control)"]
        );
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.pop().map(|c| c.native().to_owned()).as_deref(), Some("request(5, control, force)"));
    }

    #[test]
    fn clone_copies_pending_commands() {
        let stack = CommandStack::new();
        stack.push(Command::get(1, &["status"]));
        let copy = stack.clone();
        stack.drain();
        assert_eq!(copy.len(), 1);
        assert!(stack.is_empty());
    }
}
