//! Logging setup and the scoped verbosity threshold.
//!
//! All diagnostics go through `tracing`. Readers that are known to be noisy raise the
//! minimum reported level for the duration of a load with [`push_verbosity`]; the
//! returned [`VerbosityGuard`] restores the previous threshold when dropped, so an
//! early return through `?` cannot leave the threshold raised.
//!
//! The threshold stack is thread-local. A load running on one thread never changes
//! what another thread reports.

use std::cell::RefCell;
use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;
use tracing::{Metadata, subscriber::Interest};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt,
    layer::{Context, Filter},
    prelude::*,
};

thread_local! {
    static VERBOSITY_STACK: RefCell<Vec<LevelFilter>> = const { RefCell::new(Vec::new()) };
}

/// Restores the previous verbosity threshold when dropped.
///
/// Not `Send`: the guard must be dropped on the thread that pushed it.
#[must_use = "the previous verbosity is restored as soon as the guard is dropped"]
pub struct VerbosityGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for VerbosityGuard {
    fn drop(&mut self) {
        VERBOSITY_STACK.with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}

/// Limits reporting on the current thread to events at or above `level`.
///
/// Guards nest; dropping a guard also discards any thresholds pushed after it.
pub fn push_verbosity(level: LevelFilter) -> VerbosityGuard {
    VERBOSITY_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push(level);
        VerbosityGuard {
            depth,
            _not_send: PhantomData,
        }
    })
}

/// The threshold in effect on the current thread, if any guard is active.
pub fn current_verbosity() -> Option<LevelFilter> {
    VERBOSITY_STACK.with(|stack| stack.borrow().last().copied())
}

/// Per-layer filter that honours the thread-local verbosity threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerbosityFilter;

impl<S> Filter<S> for VerbosityFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        match current_verbosity() {
            Some(threshold) => threshold >= *meta.level(),
            None => true,
        }
    }

    fn callsite_enabled(&self, _meta: &'static Metadata<'static>) -> Interest {
        // The answer depends on the thread and the moment, never cache it.
        Interest::sometimes()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to create log file '{path}': {source}")]
    LogFile {
        path: String,
        source: std::io::Error,
    },
    #[error("A global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Installs the global subscriber: a compact stderr layer plus an optional file layer.
///
/// `verbosity` 0 reports warnings and errors, 1 adds info, 2 debug and anything higher
/// trace. `quiet` turns stderr output off entirely.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let level_filter = if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(level_filter)
        .with_filter(VerbosityFilter);

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|source| LoggingError::LogFile {
                path: path.to_string_lossy().to_string(),
                source,
            })?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_filter(VerbosityFilter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)
}

#[cfg(test)]
pub(crate) mod capture {
    //! Collects emitted events so tests can assert on severities.

    use super::VerbosityFilter;
    use std::fmt::Debug;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    #[derive(Debug, Clone)]
    pub struct CapturedEvent {
        pub level: Level,
        pub message: String,
    }

    #[derive(Clone, Default)]
    pub struct CaptureLayer {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    struct MessageVisitor<'a>(&'a mut String);

    impl Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
            if field.name() == "message" {
                self.0.push_str(&format!("{:?}", value));
            }
        }
    }

    impl<S: Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            if let Ok(mut events) = self.events.lock() {
                events.push(CapturedEvent {
                    level: *event.metadata().level(),
                    message,
                });
            }
        }
    }

    /// Runs `f` with a scoped subscriber and returns its result with every event
    /// that passed the verbosity filter.
    pub fn capture<T>(f: impl FnOnce() -> T) -> (T, Vec<CapturedEvent>) {
        let layer = CaptureLayer::default();
        let events = layer.events.clone();
        let subscriber =
            tracing_subscriber::registry().with(tracing_subscriber::Layer::with_filter(layer, VerbosityFilter));
        let result = tracing::subscriber::with_default(subscriber, f);
        let events = events.lock().map(|e| e.clone()).unwrap_or_default();
        (result, events)
    }

    pub fn has_event(events: &[CapturedEvent], level: Level, needle: &str) -> bool {
        events
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::capture::{capture, has_event};
    use super::*;
    use tracing::{Level, error, info, warn};

    #[test]
    fn guard_restores_previous_threshold() {
        assert_eq!(current_verbosity(), None);
        {
            let _outer = push_verbosity(LevelFilter::WARN);
            assert_eq!(current_verbosity(), Some(LevelFilter::WARN));
            {
                let _inner = push_verbosity(LevelFilter::ERROR);
                assert_eq!(current_verbosity(), Some(LevelFilter::ERROR));
            }
            assert_eq!(current_verbosity(), Some(LevelFilter::WARN));
        }
        assert_eq!(current_verbosity(), None);
    }

    #[test]
    fn guard_is_released_on_early_error_return() {
        fn noisy_load() -> Result<(), String> {
            let _guard = push_verbosity(LevelFilter::ERROR);
            Err("truncated file".to_string())?;
            Ok(())
        }

        assert!(noisy_load().is_err());
        assert_eq!(current_verbosity(), None);
    }

    #[test]
    fn filter_suppresses_events_below_threshold() {
        let ((), events) = capture(|| {
            let _guard = push_verbosity(LevelFilter::ERROR);
            info!("hidden info");
            warn!("hidden warning");
            error!("visible error");
        });
        assert!(!has_event(&events, Level::INFO, "hidden info"));
        assert!(!has_event(&events, Level::WARN, "hidden warning"));
        assert!(has_event(&events, Level::ERROR, "visible error"));
    }

    #[test]
    fn filter_passes_everything_without_guard() {
        let ((), events) = capture(|| {
            info!("plain info");
        });
        assert!(has_event(&events, Level::INFO, "plain info"));
    }

    #[test]
    fn invalid_log_file_path_propagates_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = setup_logging(0, false, Some(dir.path()));
        assert!(matches!(result, Err(LoggingError::LogFile { .. })));
    }
}
