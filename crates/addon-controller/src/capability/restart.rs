use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::error;
use tracing::warn;

/// Forces the process to restart so a new watch set can be built.
///
/// Implementations must tolerate concurrent and repeated calls.
pub trait RestartTrigger: Send + Sync {
    fn trigger_restart(&self);
}

type SignalSender = Box<dyn Fn() -> io::Result<()> + Send + Sync>;

/// Restarts by sending SIGTERM to this process and leaving the rest to the
/// supervisor. Only the first call sends a signal.
///
/// If the signal cannot be delivered the process exits with status 1.
pub struct SignalRestart {
    fired: AtomicBool,
    send: SignalSender,
}

impl SignalRestart {
    pub fn sigterm() -> Self {
        Self::with_sender(Box::new(send_sigterm_to_self))
    }

    fn with_sender(send: SignalSender) -> Self {
        Self {
            fired: AtomicBool::new(false),
            send,
        }
    }

    #[cfg(test)]
    fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl RestartTrigger for SignalRestart {
    fn trigger_restart(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!("Restart already in flight");
            return;
        }

        warn!("Sending SIGTERM to self to rebuild the watch set");
        if let Err(e) = (self.send)() {
            error!("kill -TERM failed: {e}");
            std::process::exit(1);
        }
    }
}

fn send_sigterm_to_self() -> io::Result<()> {
    // SAFETY: kill(2) on our own pid touches no memory owned by this process.
    let rc = unsafe { libc::kill(libc::getpid(), libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
