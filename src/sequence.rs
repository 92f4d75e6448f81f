use crate::command::Command;
use std::collections::VecDeque;
use std::time::Duration;

/// Minimum spacing between commands that change stereo state
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// One command of a timed sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Wait after the previous step before sending
    pub delay: Duration,
    pub command: Command,
}

/// Queue of timed steps
///
/// Waits accumulate onto the next command sent; a wait with no command
/// after it is dropped.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    steps: VecDeque<Step>,
    pending_delay: Duration,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pause before the next command
    pub fn wait(&mut self, delay: Duration) -> &mut Self {
        self.pending_delay += delay;
        self
    }

    /// Append a command
    pub fn send(&mut self, command: Command) -> &mut Self {
        let delay = std::mem::take(&mut self.pending_delay);
        self.steps.push_back(Step { delay, command });
        self
    }

    /// Delay of the next step, `None` when the sequence is finished
    pub fn next_delay(&self) -> Option<Duration> {
        self.steps.front().map(|s| s.delay)
    }

    pub fn pop(&mut self) -> Option<Step> {
        self.steps.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_attach_to_the_next_command() {
        let mut seq = Sequence::new();
        seq.send(Command::PowerOn)
            .wait(SETTLE_DELAY)
            .wait(SETTLE_DELAY)
            .send(Command::Unmute)
            .wait(SETTLE_DELAY);

        assert_eq!(seq.len(), 2);
        assert_eq!(seq.next_delay(), Some(Duration::ZERO));
        assert_eq!(
            seq.pop(),
            Some(Step {
                delay: Duration::ZERO,
                command: Command::PowerOn
            })
        );
        assert_eq!(
            seq.pop(),
            Some(Step {
                delay: Duration::from_secs(2),
                command: Command::Unmute
            })
        );
        assert!(seq.is_empty());
    }

    #[test]
    fn pop_drains_in_order() {
        let mut seq = Sequence::new();
        seq.send(Command::Mute).send(Command::Status);
        assert_eq!(seq.pop().map(|s| s.command), Some(Command::Mute));
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.pop().map(|s| s.command), Some(Command::Status));
        assert_eq!(seq.next_delay(), None);
    }
}
