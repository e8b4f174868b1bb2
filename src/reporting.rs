//! Process-wide error sink shared by every pipeline stage.
//!
//! Two sticky flags record whether a syntax/static error or a runtime error
//! was reported during the current run.  The driver consults them to decide
//! whether to proceed to the next stage and which exit code to use.  The REPL
//! clears only the syntax flag between lines so one bad line does not poison
//! the session.

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::error::ProlangError;

static HAD_ERROR: AtomicBool = AtomicBool::new(false);
static HAD_RUNTIME_ERROR: AtomicBool = AtomicBool::new(false);

/// Report a compile-time (lex/parse/resolve) error with no location context.
pub fn error(line: usize, message: &str) {
    report(line, "", message);
}

/// Report a compile-time error annotated with where in the line it occurred.
pub fn report(line: usize, location: &str, message: &str) {
    debug!("Reporting error: line={}, loc={}, msg={}", line, location, message);

    eprintln!("[line {}] Error {}: {}", line, location, message);

    HAD_ERROR.store(true, Ordering::SeqCst);
}

/// Route an already-constructed frontend error into the sink.
pub fn syntax(err: &ProlangError) {
    match err {
        ProlangError::Lex { message, line }
        | ProlangError::Parse { message, line }
        | ProlangError::Resolve { message, line } => report(*line, "", message),

        other => eprintln!("{}", other),
    }
}

/// Report a runtime error.  Its `Display` form already carries the line.
pub fn runtime_error(err: &ProlangError) {
    debug!("Reporting runtime error: {}", err);

    eprintln!("{}", err);

    HAD_RUNTIME_ERROR.store(true, Ordering::SeqCst);
}

pub fn had_error() -> bool {
    HAD_ERROR.load(Ordering::SeqCst)
}

pub fn had_runtime_error() -> bool {
    HAD_RUNTIME_ERROR.load(Ordering::SeqCst)
}

/// Forget previously reported syntax errors.  The runtime flag is sticky.
pub fn clear_error() {
    HAD_ERROR.store(false, Ordering::SeqCst);
}
