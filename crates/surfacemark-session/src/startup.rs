//! Explicit, idempotent process-wide startup.
//!
//! Sizing the global worker pool is a once-per-process decision. Call
//! [`init`] early, before any session schedules work; later calls return
//! the settings recorded by the first one. Skipping `init` is fine:
//! rayon then sizes the pool itself on first use.

use std::sync::OnceLock;

/// Options for [`init`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupOptions {
    /// Worker thread count; `None` lets rayon decide.
    pub worker_threads: Option<usize>,
}

/// What [`init`] actually configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Startup {
    /// Threads in the global pool.
    pub worker_threads: usize,
    /// `false` if the pool already existed and `options` were ignored.
    pub configured: bool,
}

static STARTUP: OnceLock<Startup> = OnceLock::new();

/// Configure the global worker pool once.
///
/// Only the first call has any effect.
pub fn init(options: StartupOptions) -> Startup {
    *STARTUP.get_or_init(|| {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("surfacemark-worker-{i}"));
        if let Some(n) = options.worker_threads {
            builder = builder.num_threads(n);
        }
        let configured = match builder.build_global() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "global worker pool already running");
                false
            }
        };
        let startup = Startup {
            worker_threads: rayon::current_num_threads(),
            configured,
        };
        tracing::info!(threads = startup.worker_threads, configured, "startup complete");
        startup
    })
}

/// The recorded startup, if [`init`] has run.
#[must_use]
pub fn get() -> Option<Startup> {
    STARTUP.get().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let first = init(StartupOptions::default());
        let second = init(StartupOptions {
            worker_threads: Some(1),
        });
        assert_eq!(first, second);
        assert_eq!(get(), Some(first));
        assert!(first.worker_threads >= 1);
    }
}
