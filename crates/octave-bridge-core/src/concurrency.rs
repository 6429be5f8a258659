use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPT_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Invocations cannot be cancelled, so the first Ctrl-C only records the
/// request and lets the running call finish; a second one exits.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if INTERRUPT_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(130);
        }
        INTERRUPT_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\ninterrupt requested, letting the current invocation finish (Ctrl-C again to exit)...");
    });
}

pub fn interrupt_requested() -> bool {
    INTERRUPT_REQUESTED.load(Ordering::SeqCst)
}
