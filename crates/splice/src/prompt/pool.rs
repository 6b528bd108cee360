use std::sync::{Mutex, OnceLock};

/// Buffers whose capacity grew beyond this are dropped instead of being
/// returned, so one oversized tool schema cannot pin memory for the life of
/// the process.
pub(crate) const RETURN_CAP: usize = 32 * 1024;

const MAX_IDLE: usize = 8;

/// A small pool of reusable string buffers for prompt assembly.
pub(crate) struct Pool {
    return_cap: usize,
    idle: Mutex<Vec<String>>,
}

impl Pool {
    pub(crate) const fn new(return_cap: usize) -> Self {
        Self {
            return_cap,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Take a cleared buffer, reusing capacity when available.
    pub(crate) fn acquire(&self) -> String {
        self.idle
            .lock()
            .map(|mut idle| idle.pop())
            .unwrap_or_default()
            .unwrap_or_default()
    }

    /// Return a buffer. Oversized buffers are dropped, and the idle list is
    /// bounded.
    pub(crate) fn release(&self, mut buffer: String) {
        if buffer.capacity() > self.return_cap {
            return;
        }

        buffer.clear();

        if let Ok(mut idle) = self.idle.lock()
            && idle.len() < MAX_IDLE
        {
            idle.push(buffer);
        }
    }
}

/// The process-wide pool used by prompt assembly.
pub(crate) fn shared() -> &'static Pool {
    static SHARED: OnceLock<Pool> = OnceLock::new();
    SHARED.get_or_init(|| Pool::new(RETURN_CAP))
}
