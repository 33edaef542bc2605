//! Internal status reporting for the logging runtime itself
//!
//! The runtime cannot route its own problems through loggers it manages, so
//! status lines go straight to stderr with a `[LOGGER ...]` prefix. Quiet mode
//! silences everything; debug lines are off unless enabled.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);
static DEBUG: AtomicBool = AtomicBool::new(false);

/// Suppress all internal output (errors included).
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Enable `[LOGGER DEBUG]` lines (dispatcher lifecycle, reconnect attempts).
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

pub fn is_debug() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

pub fn debug(args: fmt::Arguments<'_>) {
    if is_debug() && !is_quiet() {
        eprintln!("[LOGGER DEBUG] {}", args);
    }
}

pub fn warn(args: fmt::Arguments<'_>) {
    if !is_quiet() {
        eprintln!("[LOGGER WARNING] {}", args);
    }
}

pub fn error(args: fmt::Arguments<'_>) {
    if !is_quiet() {
        eprintln!("[LOGGER ERROR] {}", args);
    }
}
