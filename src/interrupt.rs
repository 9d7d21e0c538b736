//! Process-wide interrupt handling for tuning runs.
//!
//! Active runs form a LIFO stack; the interrupt signal sets only the
//! innermost run's flag, which the tuning loop polls between steps.
//! With no active run the process terminates with the conventional
//! interrupt exit status, approximating the default signal
//! disposition.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use tracing::warn;

static HANDLER_INSTALL: Once = Once::new();
static ACTIVE_RUNS: Mutex<Vec<Arc<AtomicBool>>> = Mutex::new(Vec::new());

/// Registers the owning tuning run on the interrupt stack for its
/// lifetime.
pub(crate) struct InterruptGuard {
    flag: Arc<AtomicBool>,
}

impl InterruptGuard {
    pub(crate) fn register() -> Self {
        HANDLER_INSTALL.call_once(|| {
            let result = ctrlc::set_handler(|| {
                let runs = ACTIVE_RUNS.lock();
                match runs.last() {
                    Some(innermost) => {
                        warn!("interrupt received, terminating early");
                        innermost.store(true, Ordering::SeqCst);
                    }
                    None => std::process::exit(130),
                }
            });
            if let Err(error) = result {
                warn!(%error, "failed to install interrupt handler");
            }
        });

        let flag = Arc::new(AtomicBool::new(false));
        ACTIVE_RUNS.lock().push(Arc::clone(&flag));
        InterruptGuard { flag }
    }

    pub(crate) fn interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        let mut runs = ACTIVE_RUNS.lock();
        if let Some(position) = runs.iter().rposition(|f| Arc::ptr_eq(f, &self.flag)) {
            runs.remove(position);
        }
    }
}
