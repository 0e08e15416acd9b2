//! Progress rendering for the process pool.
//!
//! Purely cosmetic: the pool calls into it but never reads anything back.

use console::Term;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub enum Progress {
    /// Live bar on an interactive terminal.
    Bar(ProgressBar),
    /// One `[n/total] message` line per started command.
    Lines { done: usize, total: usize },
    Hidden,
}

impl Progress {
    /// Pick a display for `total` commands. A bar is only drawn on a tty.
    pub fn new(total: usize, enabled: bool) -> Self {
        if !enabled || total == 0 {
            return Progress::Hidden;
        }
        if !Term::stderr().is_term() {
            return Progress::Lines { done: 0, total };
        }

        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{pos}/{len}] {bar:30.cyan/blue} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Progress::Bar(bar)
    }

    pub fn started(&mut self, message: &str) {
        match self {
            Progress::Bar(bar) => bar.set_message(message.to_string()),
            Progress::Lines { done, total } => {
                eprintln!("[{}/{}] {}", *done + 1, total, message);
            }
            Progress::Hidden => {}
        }
    }

    pub fn finished(&mut self) {
        match self {
            Progress::Bar(bar) => bar.inc(1),
            Progress::Lines { done, .. } => *done += 1,
            Progress::Hidden => {}
        }
    }

    /// Print above the bar without tearing it.
    pub fn println(&self, text: &str) {
        match self {
            Progress::Bar(bar) => bar.println(text),
            _ => eprintln!("{text}"),
        }
    }

    pub fn clear(&self) {
        if let Progress::Bar(bar) = self {
            bar.finish_and_clear();
        }
    }
}
