//! Observer configuration.

/// Settings for background observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObserverConfig {
    /// Name of the thread listeners are called on.
    pub queue_label: String,
    /// Whether the initial snapshot is delivered as a batch of inserts.
    pub deliver_initial: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            queue_label: "ripple.observer".into(),
            deliver_initial: true,
        }
    }
}

impl ObserverConfig {
    /// Sets the delivery thread name.
    pub fn with_queue_label(mut self, label: impl Into<String>) -> Self {
        self.queue_label = label.into();
        self
    }

    /// Sets whether the initial snapshot is delivered.
    pub fn with_deliver_initial(mut self, deliver: bool) -> Self {
        self.deliver_initial = deliver;
        self
    }
}
