//! Process-wide driver library state.
//!
//! Client libraries typically need a global init before the first
//! connection and a global teardown after the last one. A `DriverLibrary`
//! lives in a `static` and counts live connections: `init` runs on the
//! 0 -> 1 transition and `end` runs when the last [`LibraryGuard`] drops.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::DriverResult;

pub struct DriverLibrary {
    live: Mutex<usize>,
    init: fn() -> DriverResult<()>,
    end: fn(),
}

impl DriverLibrary {
    pub const fn new(init: fn() -> DriverResult<()>, end: fn()) -> Self {
        Self {
            live: Mutex::new(0),
            init,
            end,
        }
    }

    /// Register one more user of the library, initializing it if needed.
    ///
    /// A failed init leaves the count at zero so the next call retries.
    pub fn acquire(&'static self) -> DriverResult<LibraryGuard> {
        let mut live = self.lock();
        if *live == 0 {
            (self.init)()?;
            debug!("driver library initialized");
        }
        *live += 1;
        Ok(LibraryGuard { library: self })
    }

    /// Number of live guards.
    pub fn live(&self) -> usize {
        *self.lock()
    }

    fn release(&self) {
        let mut live = self.lock();
        *live = live.saturating_sub(1);
        if *live == 0 {
            (self.end)();
            debug!("driver library torn down");
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DriverLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverLibrary")
            .field("live", &self.live())
            .finish()
    }
}

/// Keeps the library initialized while alive.
#[derive(Debug)]
pub struct LibraryGuard {
    library: &'static DriverLibrary,
}

impl LibraryGuard {
    pub fn library(&self) -> &'static DriverLibrary {
        self.library
    }
}

impl Drop for LibraryGuard {
    fn drop(&mut self) {
        self.library.release();
    }
}
