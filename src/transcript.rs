//! Human-readable progress lines.
//!
//! The responder, the probe and the orchestrator report what happened as
//! plain lines. The binary sends them to stdout; tests record them.

use std::sync::Mutex;

/// Receives progress lines in the order they happen.
pub trait Transcript: Send + Sync {
    fn line(&self, line: &str);
}

/// Prints every line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stdout;

impl Transcript for Stdout {
    fn line(&self, line: &str) {
        println!("{}", line);
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct Recorded {
    lines: Mutex<Vec<String>>,
}

impl Recorded {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the lines recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Transcript for Recorded {
    fn line(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Lines written from several threads are all kept.
    #[test]
    fn recorded_keeps_every_line() {
        let recorded = Arc::new(Recorded::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let recorded = Arc::clone(&recorded);
                std::thread::spawn(move || recorded.line(&format!("line {}", i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut lines = recorded.lines();
        lines.sort();
        assert_eq!(lines, vec!["line 0", "line 1", "line 2", "line 3"]);
    }

    /// A recorder whose lock was poisoned reports it instead of
    /// pretending nothing was written.
    #[test]
    fn poisoned_recorder_panics() {
        let recorded = Arc::new(Recorded::new());
        let poisoner = Arc::clone(&recorded);
        let _: std::thread::Result<()> = std::thread::spawn(move || {
            let _guard = poisoner.lines.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| recorded.lines()));
        assert!(result.is_err());
    }
}
