use crate::core::models::chain::ChainName;

/// Events emitted while a preparation workflow runs.
#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// A non-polymer chain was copied into its own system.
    NonPolymerExtracted { chain: ChainName },

    /// A fault-tolerant fallback replaced a strict failure.
    Fallback { phase: &'static str, reason: String },
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    pub(crate) fn fallback(&self, phase: &'static str, reason: impl Into<String>) {
        self.report(Progress::Fallback {
            phase,
            reason: reason.into(),
        });
    }
}
