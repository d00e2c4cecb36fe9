//! Progress output sink
//!
//! The engine reports per-migration progress as plain lines through an
//! injected sink; formatting and logging policy belong to the caller.

/// Line-oriented progress sink
///
/// Receives a line when a migration starts, commits, or fails. No
/// structured schema; the caller owns presentation.
pub trait OutputSink {
    fn writeln(&mut self, line: &str);
}

/// Sink that prints each line to stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn writeln(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Collects lines in memory; handy for tests and for callers that want to
/// post-process the progress log
impl OutputSink for Vec<String> {
    fn writeln(&mut self, line: &str) {
        self.push(line.to_string());
    }
}
