use std::collections::VecDeque;

/// A unit of scheduler work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Spawn `argv` as a child process.
    Execute {
        argv: Vec<String>,
        /// Shown in the progress display while the command runs.
        message: String,
        /// Reported verbatim when the command exits unsuccessfully.
        fail_message: String,
    },
    /// Wait for every running command before admitting more work.
    Barrier,
}

impl Command {
    pub fn execute(
        argv: Vec<String>,
        message: impl Into<String>,
        fail_message: impl Into<String>,
    ) -> Self {
        Command::Execute {
            argv,
            message: message.into(),
            fail_message: fail_message.into(),
        }
    }

    pub fn is_barrier(&self) -> bool {
        matches!(self, Command::Barrier)
    }
}

/// FIFO of commands handed to a [`Scheduler`](super::Scheduler).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandQueue {
    commands: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    pub fn execute(
        &mut self,
        argv: Vec<String>,
        message: impl Into<String>,
        fail_message: impl Into<String>,
    ) {
        self.push(Command::execute(argv, message, fail_message));
    }

    /// Append a barrier. Leading and repeated barriers are dropped since
    /// they cannot order anything.
    pub fn barrier(&mut self) {
        if self.commands.back().is_some_and(|c| !c.is_barrier()) {
            self.commands.push_back(Command::Barrier);
        }
    }

    pub fn pop(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Argument vectors of every execute command, in queue order.
    pub fn argvs(&self) -> impl Iterator<Item = &[String]> {
        self.commands.iter().filter_map(|c| match c {
            Command::Execute { argv, .. } => Some(argv.as_slice()),
            Command::Barrier => None,
        })
    }

    pub fn execute_count(&self) -> usize {
        self.argvs().count()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

impl IntoIterator for CommandQueue {
    type Item = Command;
    type IntoIter = std::collections::vec_deque::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}
