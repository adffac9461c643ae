//! Line-status notification consumer

use crate::records::LineStatusUpdate;

/// Receives line-status changes from the
/// [`CallbackDispatcher`](crate::dispatch::CallbackDispatcher)
///
/// Called from the dispatch loop, never while any aggregator lock is held.
/// A slow subscriber delays later notifications but never blocks producers.
pub trait LineStatusSubscriber: Send + Sync {
    fn on_line_status(&self, update: &LineStatusUpdate);
}

impl<F> LineStatusSubscriber for F
where
    F: Fn(&LineStatusUpdate) + Send + Sync,
{
    fn on_line_status(&self, update: &LineStatusUpdate) {
        self(update)
    }
}
