//! Panic containment
//!
//! [`catch_panic`] runs a closure and turns a panic inside it into one error
//! log entry carrying the panic message and the call stack, one `file:line`
//! frame per line. The stack is captured at the panic site by a process-wide
//! panic hook, installed on first use. The hook only intercepts panics on
//! threads currently inside `catch_panic`; every other panic still reaches the
//! previously installed hook.
//!
//! Limitations:
//!
//! - Frames are scraped from the `at file:line:col` lines of `Backtrace`'s
//!   `Display` output. That format is not a stable interface; if it changes,
//!   or the binary has no debug info, the trace shrinks to the panic location.
//! - A panic that the closure catches itself with `catch_unwind` still runs
//!   the hook while inside `catch_panic`, so the default hook does not print
//!   it. The trace it records is discarded when `catch_panic` returns.

use once_cell::sync::OnceCell;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe, Location};

use crate::log::Log;

thread_local! {
    static RECOVER_DEPTH: Cell<usize> = Cell::new(0);
    static PANIC_TRACE: RefCell<Option<String>> = RefCell::new(None);
}

static HOOK: OnceCell<()> = OnceCell::new();

fn install_hook() {
    HOOK.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let recovering = RECOVER_DEPTH.try_with(Cell::get).unwrap_or(0) > 0;
            if !recovering {
                previous(info);
                return;
            }

            let trace = format_trace(&Backtrace::force_capture(), info.location());
            let _ = PANIC_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
        }));
    });
}

/// Run `f`, logging and swallowing any panic it raises.
///
/// Returns `true` if `f` returned normally.
pub fn catch_panic<F: FnOnce()>(log: &dyn Log, f: F) -> bool {
    install_hook();
    take_trace();

    RECOVER_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    RECOVER_DEPTH.with(|depth| depth.set(depth.get() - 1));

    // Taken on both paths so a panic the closure caught itself leaves nothing behind
    let trace = take_trace();
    let Err(payload) = result else {
        return true;
    };

    let trace = trace.unwrap_or_else(|| format_trace(&Backtrace::force_capture(), None));
    log.error(format_args!("panic: {}\n{}", panic_message(payload.as_ref()), trace));
    false
}

fn take_trace() -> Option<String> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "Box<dyn Any>"
    }
}

/// One `file:line` per frame, panic location first
fn format_trace(backtrace: &Backtrace, location: Option<&Location<'_>>) -> String {
    let mut frames = Vec::new();
    if let Some(loc) = location {
        frames.push(format!("{}:{}", loc.file(), loc.line()));
    }

    let rendered = backtrace.to_string();
    for line in rendered.lines() {
        let Some(frame) = line.trim_start().strip_prefix("at ") else {
            continue;
        };
        frames.push(strip_column(frame).to_string());
    }

    frames.join("\n")
}

/// `path/file.rs:12:5` -> `path/file.rs:12`
fn strip_column(frame: &str) -> &str {
    match frame.rsplit_once(':') {
        Some((head, col)) if col.chars().all(|c| c.is_ascii_digit()) && head.contains(':') => head,
        _ => frame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::CaptureLog;

    #[test]
    fn test_panic_is_logged_once() {
        let log = CaptureLog::default();

        let completed = catch_panic(&log, || panic!("hello panic"));
        assert!(!completed);

        let errors = log.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("panic: hello panic\n"));
        assert!(errors[0].contains("recover.rs:"));
    }

    #[test]
    fn test_normal_return_logs_nothing() {
        let log = CaptureLog::default();
        let mut ran = false;

        assert!(catch_panic(&log, || ran = true));
        assert!(ran);
        assert!(log.errors().is_empty());
    }

    #[test]
    fn test_formatted_payload() {
        let log = CaptureLog::default();
        catch_panic(&log, || panic!("code {}", 7));
        assert!(log.errors()[0].starts_with("panic: code 7"));
    }

    #[test]
    fn test_self_caught_panic_leaves_no_trace() {
        let log = CaptureLog::default();

        let completed = catch_panic(&log, || {
            let inner = panic::catch_unwind(|| panic!("handled inside"));
            assert!(inner.is_err());
        });

        assert!(completed);
        assert!(log.errors().is_empty());
        assert!(take_trace().is_none());
    }

    #[test]
    fn test_stale_trace_is_not_reported() {
        let log = CaptureLog::default();
        PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some("stale.rs:1".to_string()));

        catch_panic(&log, || panic!("fresh"));

        let errors = log.errors();
        assert!(!errors[0].contains("stale.rs:1"));
        assert!(errors[0].contains("recover.rs:"));
    }

    #[test]
    fn test_strip_column() {
        assert_eq!(strip_column("src/lib.rs:10:5"), "src/lib.rs:10");
        assert_eq!(strip_column("src/lib.rs:10"), "src/lib.rs:10");
        assert_eq!(strip_column("./src/main.rs"), "./src/main.rs");
    }
}
