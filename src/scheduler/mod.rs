//! Command scheduling
//!
//! The orchestrator turns stale work into a [`CommandQueue`] and hands it to
//! a [`Scheduler`]. [`ProcessPool`] is the real implementation: it spawns
//! child processes under a [`Concurrency`] limit, honours barriers and stops
//! everything on the first failure.

pub mod command;
pub mod pool;
pub mod progress;

pub use command::{Command, CommandQueue};
pub use pool::ProcessPool;

use crate::errors::BuildError;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

/// Upper bound on commands running at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Limited(NonZeroUsize),
    /// Every ready command is dispatched immediately.
    Unbounded,
}

impl Concurrency {
    pub fn serial() -> Self {
        Concurrency::Limited(NonZeroUsize::MIN)
    }

    /// Three quarters of the available cores, at least one.
    pub fn from_cores() -> Self {
        let cores = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        let jobs = NonZeroUsize::new(cores * 3 / 4).unwrap_or(NonZeroUsize::MIN);
        Concurrency::Limited(jobs)
    }

    /// True when another command may start while `running` are in flight.
    pub fn admits(&self, running: usize) -> bool {
        match self {
            Concurrency::Limited(limit) => running < limit.get(),
            Concurrency::Unbounded => true,
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Concurrency::serial()
    }
}

impl FromStr for Concurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(Concurrency::Unbounded);
        }
        let jobs: usize = s
            .parse()
            .map_err(|_| format!("`{s}` is not a job count (expected a number or `unbounded`)"))?;
        NonZeroUsize::new(jobs)
            .map(Concurrency::Limited)
            .ok_or_else(|| "job count must be at least 1".to_string())
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concurrency::Limited(n) => write!(f, "{n}"),
            Concurrency::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Outcome of a fully successful queue run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub executed: usize,
}

/// Something that runs a command queue to completion or first failure.
pub trait Scheduler {
    fn execute(&mut self, queue: CommandQueue) -> Result<ExecutionSummary, BuildError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_concurrency() {
        assert_eq!("4".parse::<Concurrency>().unwrap().to_string(), "4");
        assert_eq!("unbounded".parse::<Concurrency>().unwrap(), Concurrency::Unbounded);
        assert!("0".parse::<Concurrency>().is_err());
        assert!("many".parse::<Concurrency>().is_err());
    }

    #[test]
    fn test_admission() {
        let two: Concurrency = "2".parse().unwrap();
        assert!(two.admits(1));
        assert!(!two.admits(2));
        assert!(Concurrency::Unbounded.admits(10_000));
        assert!(!Concurrency::default().admits(1));
    }

    #[test]
    fn test_from_cores_is_at_least_one() {
        assert!(Concurrency::from_cores().admits(0));
    }
}
