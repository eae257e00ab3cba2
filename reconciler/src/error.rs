use recon::error::ReconError;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns `true` when `RUST_BACKTRACE` asks for backtraces in terminal output.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type of the reconciler binary.
pub type ReconcilerResult<T> = Result<T, ReconcilerError>;

/// Backtrace captured when a non-engine error is wrapped.
///
/// Engine errors already carry their own, see [`ReconError::backtrace`].
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    /// Captures the backtrace of the current call site.
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    /// Prints the backtrace frames as-is.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the reconciler binary.
///
/// Wraps [`ReconError`] for failures of the run itself, and adds the failures that can happen
/// before a run starts.
#[derive(Debug)]
pub enum ReconcilerError {
    /// Failure of the reconciliation itself.
    Recon(ReconError),
    /// Configuration could not be loaded, validated or applied.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// Runtime could not be started.
    Io(std::io::Error, CapturedBacktrace),
}

impl ReconcilerError {
    /// Returns a short label for the class of failure, printed first in reports.
    pub fn category(&self) -> &'static str {
        match self {
            ReconcilerError::Recon(_) => "reconciliation error",
            ReconcilerError::Config(_, _) => "configuration error",
            ReconcilerError::Io(_, _) => "i/o error",
        }
    }

    /// Returns the backtrace of the engine error or the one captured on wrapping.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            ReconcilerError::Recon(err) => err.backtrace(),
            ReconcilerError::Config(_, cb) => Some(&cb.0),
            ReconcilerError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Wraps a configuration loading or validation failure.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ReconcilerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Renders a multi-line report for the terminal, including the cause chain and, when
    /// `RUST_BACKTRACE` is set, the backtrace.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("reconciler failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        if !matches!(self, ReconcilerError::Recon(err) if err.errors().is_some()) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for ReconcilerError {
    /// Renders a single line suitable for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcilerError::Recon(err) => write!(f, "{err}"),
            ReconcilerError::Config(source, _) => write!(f, "configuration error: {source}"),
            ReconcilerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for ReconcilerError {
    /// Returns the wrapped error's cause, or the wrapped error itself for non-engine variants.
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReconcilerError::Recon(err) => err.source(),
            ReconcilerError::Config(source, _) => Some(source.as_ref()),
            ReconcilerError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for ReconcilerError {
    /// Wraps a runtime startup failure, capturing a backtrace.
    fn from(err: std::io::Error) -> Self {
        ReconcilerError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<ReconError> for ReconcilerError {
    /// Wraps an engine error, keeping its kind for exit handling.
    fn from(err: ReconError) -> Self {
        ReconcilerError::Recon(err)
    }
}
