//! Console-based event reporter.

use std::io::{self, Write};
use std::net::Ipv4Addr;

use tracing::warn;

use crate::domain::CapturedFrame;
use crate::reporter::EventReporter;

/// Reports intercepted frames to stdout, one line each.
///
/// Output failures such as a closed pipe are logged, never raised, so a
/// consumer going away cannot abort the run before restoration.
pub struct ConsoleReporter {
    /// Whether to append the frame length
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Enable or disable verbose output.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn format_frame(&self, frame: &CapturedFrame) -> String {
        let mut output = format!("[*] Intercepted {}", frame);
        if self.verbose {
            output.push_str(&format!(" | {} bytes", frame.length));
        }
        output
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `text` followed by a newline. Returns false if the write failed.
fn write_line<W: Write>(out: &mut W, text: &str) -> bool {
    match writeln!(out, "{}", text).and_then(|_| out.flush()) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to write to stdout: {}", e);
            false
        }
    }
}

fn emit(text: &str) -> bool {
    write_line(&mut io::stdout().lock(), text)
}

impl EventReporter for ConsoleReporter {
    fn report(&self, frame: &CapturedFrame) {
        emit(&self.format_frame(frame));
    }

    fn on_start(&self, interface: &str, target: Ipv4Addr) {
        emit(&format!(
            "Intercepting traffic for {} on interface: {}",
            target, interface
        ));
        emit("Press Ctrl+C to stop and restore ARP tables.\n");
    }

    fn on_stop(&self, frames: u64) {
        emit(&format!("\nCapture stopped after {} frames.", frames));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Transport;

    fn frame() -> CapturedFrame {
        CapturedFrame::new(
            Ipv4Addr::new(192, 168, 1, 2),
            Ipv4Addr::new(8, 8, 8, 8),
            Transport::Udp {
                source_port: 40000,
                destination_port: 53,
            },
            60,
        )
    }

    #[test]
    fn formats_addresses_and_ports() {
        let line = ConsoleReporter::new().format_frame(&frame());
        assert_eq!(line, "[*] Intercepted 192.168.1.2:40000 -> 8.8.8.8:53 UDP");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn write_line_appends_newline() {
        let mut out = Vec::new();
        assert!(write_line(&mut out, "hello"));
        assert_eq!(out, b"hello\n");
    }

    #[test]
    fn closed_pipe_is_reported_not_raised() {
        assert!(!write_line(&mut ClosedPipe, "[*] Intercepted"));
    }

    #[test]
    fn verbose_adds_length() {
        let line = ConsoleReporter::new().with_verbose(true).format_frame(&frame());
        assert!(line.ends_with("| 60 bytes"));
    }
}
