/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!`; log
/// lines go through `tracing` to stderr, this is what the operator reads.
pub trait UserOutput: Send + Sync {
    /// Informational status message (e.g., "Stored version: 0.3.0")
    fn status(&self, message: &str);

    /// Success message (e.g., "Migrated 0.3.0 -> 0.6.1")
    fn success(&self, message: &str);

    /// Warning message (e.g., "Stored version is newer than this release")
    fn warning(&self, message: &str);

    /// Error message (e.g., "Error: Failed to stop services")
    fn error(&self, message: &str);

    /// A blank line separator.
    fn blank(&self);
}

/// Standard CLI output: writes to stdout/stderr with ANSI colors.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("\x1b[32m{}\x1b[0m", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m{}\x1b[0m", message);
    }

    fn error(&self, message: &str) {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    }

    fn blank(&self) {
        println!();
    }
}
