use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

static DEBUG: AtomicBool = AtomicBool::new(false);
static HOOK: Once = Once::new();

thread_local! {
    // Set while an observer runs under `invoke`; its panics are not reported
    // by the panic hook.
    static SILENCED: Cell<bool> = const { Cell::new(false) };
}

/// Turns logging of swallowed observer panics on or off for the whole process.
///
/// Off by default.
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

/// Returns whether swallowed observer panics are being logged.
pub fn is_debug() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

/// Runs a consumer callback so that a panic inside it can neither reach the
/// caller nor stop the remaining callbacks of the same batch.
///
/// Returns `None` when the callback panicked. The panic is reported only
/// through `tracing`, and only while [`set_debug`] is on.
pub(crate) fn invoke<R>(kind: &'static str, callback: impl FnOnce() -> R) -> Option<R> {
    install_hook();
    let outer = SILENCED.with(|silenced| silenced.replace(true));
    let _restore = Restore(outer);
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(result) => Some(result),
        Err(payload) => {
            if is_debug() {
                tracing::warn!(observer = kind, "observer panicked: {}", describe(payload.as_ref()));
            }
            None
        }
    }
}

struct Restore(bool);

impl Drop for Restore {
    fn drop(&mut self) {
        SILENCED.with(|silenced| silenced.set(self.0));
    }
}

// Wraps whatever hook is installed when the first observer runs. Panics
// outside `invoke` still reach it.
fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !SILENCED.with(|silenced| silenced.get()) {
                previous(info);
            }
        }));
    });
}

fn describe(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
