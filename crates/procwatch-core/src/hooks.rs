use std::fmt;

/// Called with every emitted line and whether it came from stdout.
/// The return value is an acknowledgment only; it does not alter the flow.
pub type OutputObserver = Box<dyn FnMut(&str, bool) -> bool + Send>;

/// Decides whether a line means the child is ready for use.
pub type ReadinessPredicate = Box<dyn FnMut(&str) -> bool + Send>;

/// Caller-supplied callbacks, moved into the watcher thread on start and
/// dropped when that thread exits.
#[derive(Default)]
pub struct WatchHooks {
    pub(crate) on_output: Option<OutputObserver>,
    pub(crate) is_ready: Option<ReadinessPredicate>,
}

impl WatchHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_output<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&str, bool) -> bool + Send + 'static,
    {
        self.on_output = Some(Box::new(observer));
        self
    }

    /// Without a predicate the child counts as ready after its first line.
    pub fn ready_when<F>(mut self, predicate: F) -> Self
    where
        F: FnMut(&str) -> bool + Send + 'static,
    {
        self.is_ready = Some(Box::new(predicate));
        self
    }

    pub fn has_observer(&self) -> bool {
        self.on_output.is_some()
    }

    pub fn has_readiness_predicate(&self) -> bool {
        self.is_ready.is_some()
    }
}

impl fmt::Debug for WatchHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHooks")
            .field("on_output", &self.has_observer())
            .field("is_ready", &self.has_readiness_predicate())
            .finish()
    }
}
