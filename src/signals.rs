//! Signal handling: SEGV and TERM both print a best-effort stack trace before exiting,
//! 255 and 0 respectively.
//!
//! The handlers call into the backtrace collector from signal context, which is technically
//! unsound — async-signal-unsafe allocation may occur inside `backtrace::trace`. This is a
//! deliberate tradeoff rather than a safer but behavior-changing alternative (e.g. a self-pipe
//! trick): the goal is a best-effort diagnostic dump on the way down, not a guarantee.

use std::os::raw::c_int;

fn dump_backtrace() {
    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |symbol| {
            if let Some(name) = symbol.name() {
                eprintln!("  {name}");
            }
        });
        true
    });
}

extern "C" fn handle_segv(_sig: c_int) {
    eprintln!("iocert: received SIGSEGV, dumping backtrace");
    dump_backtrace();
    std::process::exit(255);
}

extern "C" fn handle_term(_sig: c_int) {
    eprintln!("iocert: received SIGTERM, dumping backtrace");
    dump_backtrace();
    std::process::exit(0);
}

/// Install the SEGV and TERM handlers. Must run once, before any worker threads are spawned.
pub fn install() {
    unsafe {
        install_handler(libc::SIGSEGV, handle_segv);
        install_handler(libc::SIGTERM, handle_term);
    }
}

unsafe fn install_handler(signum: c_int, handler: extern "C" fn(c_int)) {
    let mut action: libc::sigaction = std::mem::zeroed();
    action.sa_sigaction = handler as usize;
    libc::sigemptyset(&mut action.sa_mask);
    action.sa_flags = 0;
    // SAFETY: `action` is fully initialized above; `signum` is a valid signal number.
    if libc::sigaction(signum, &action, std::ptr::null_mut()) != 0 {
        tracing::warn!(signum, "failed to install signal handler");
    }
}
