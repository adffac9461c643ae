//! Line-status callback dispatch
//!
//! Producers never call the subscriber directly. A status change enqueues the
//! changed line number on a bounded channel; the [`DispatchLoop`] drains it,
//! reads the current status of every line and invokes the subscriber with no
//! aggregator lock held.
//!
//! ## Flow
//!
//! ```text
//! LineRegistry ── line number ──▶ channel ──▶ DispatchLoop ──▶ subscriber
//!   (line lock held,                            (snapshot,
//!    try_send only)                              no locks held)
//! ```
//!
//! ## Backpressure
//!
//! When the channel is full the notification is dropped and a resync flag is
//! raised. The loop answers the flag with one extra delivery carrying
//! `changed_line: None` and the current state of every line, so the
//! subscriber always converges on the latest state.

use crate::error::Result;
use crate::lines::LineRegistry;
use crate::records::LineStatusUpdate;
use crate::sync::lock;
use crate::traits::LineStatusSubscriber;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Producer half of the notification channel
#[derive(Debug, Clone)]
pub(crate) struct StatusNotifier {
    tx: mpsc::Sender<u32>,
    resync: Arc<AtomicBool>,
}

/// Consumer half of the notification channel
#[derive(Debug)]
pub(crate) struct StatusReceiver {
    rx: mpsc::Receiver<u32>,
    resync: Arc<AtomicBool>,
}

impl StatusNotifier {
    pub(crate) fn channel(capacity: usize) -> (Self, StatusReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        let resync = Arc::new(AtomicBool::new(false));
        (
            Self {
                tx,
                resync: resync.clone(),
            },
            StatusReceiver { rx, resync },
        )
    }

    /// Enqueue a change without blocking
    pub(crate) fn notify(&self, line_number: u32) {
        match self.tx.try_send(line_number) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.resync.store(true, Ordering::Release);
                warn!(
                    "Line status channel full, dropping notification for line {} (resync scheduled)",
                    line_number
                );
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Dispatch loop not running, notification for line {} discarded", line_number);
            }
        }
    }
}

struct Registration {
    id: u64,
    subscriber: Weak<dyn LineStatusSubscriber>,
}

#[derive(Default)]
struct SubscriberSlot {
    current: Mutex<Option<Registration>>,
    next_id: AtomicU64,
}

impl SubscriberSlot {
    fn subscriber(&self) -> Option<Arc<dyn LineStatusSubscriber>> {
        let mut current = lock(&self.current);
        let subscriber = current.as_ref()?.subscriber.upgrade();
        if subscriber.is_none() {
            debug!("Line status subscriber dropped, clearing registration");
            *current = None;
        }
        subscriber
    }
}

/// Holds the single line-status subscriber
///
/// Registering a new subscriber replaces the previous one. The dispatcher
/// keeps only a weak reference; dropping the last `Arc` of a subscriber
/// unregisters it.
#[derive(Clone, Default)]
pub struct CallbackDispatcher {
    slot: Arc<SubscriberSlot>,
}

impl CallbackDispatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register the subscriber, replacing any previous one
    pub fn register(&self, subscriber: &Arc<dyn LineStatusSubscriber>) -> Subscription {
        let id = self.slot.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let weak = Arc::downgrade(subscriber);
        let replaced = lock(&self.slot.current)
            .replace(Registration {
                id,
                subscriber: weak,
            })
            .is_some();

        if replaced {
            info!("Line status subscriber replaced");
        } else {
            info!("Line status subscriber registered");
        }
        Subscription {
            id,
            slot: Arc::downgrade(&self.slot),
        }
    }

    /// Whether a live subscriber is registered
    pub fn has_subscriber(&self) -> bool {
        lock(&self.slot.current)
            .as_ref()
            .is_some_and(|r| r.subscriber.strong_count() > 0)
    }
}

/// Registration handle; unregisters on drop
///
/// A handle whose registration was replaced by a later `register` becomes
/// inert: dropping it leaves the newer subscriber in place.
#[must_use = "dropping the subscription unregisters the subscriber"]
pub struct Subscription {
    id: u64,
    slot: Weak<SubscriberSlot>,
}

impl Subscription {
    /// Whether this handle still owns the subscriber slot
    pub fn is_active(&self) -> bool {
        self.slot.upgrade().is_some_and(|slot| {
            lock(&slot.current)
                .as_ref()
                .is_some_and(|r| r.id == self.id)
        })
    }

    pub fn unregister(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let mut current = lock(&slot.current);
        if current.as_ref().is_some_and(|r| r.id == self.id) {
            *current = None;
            info!("Line status subscriber unregistered");
        }
    }
}

/// Background task delivering line-status updates
///
/// Returned by the device builder; spawn it on the runtime. It ends when the
/// device is dropped or the shutdown signal fires.
pub struct DispatchLoop {
    rx: StatusReceiver,
    lines: Weak<LineRegistry>,
    slot: Arc<SubscriberSlot>,
    sequence: u64,
}

impl DispatchLoop {
    pub(crate) fn new(
        rx: StatusReceiver,
        lines: &Arc<LineRegistry>,
        dispatcher: &CallbackDispatcher,
    ) -> Self {
        Self {
            rx,
            lines: Arc::downgrade(lines),
            slot: dispatcher.slot.clone(),
            sequence: 0,
        }
    }

    /// Run until the device is dropped
    pub async fn run(self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run until the device is dropped or `shutdown_rx` fires
    pub async fn run_with_shutdown(mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        info!("Line status dispatch loop started");

        if let Some(mut shutdown) = shutdown_rx {
            loop {
                tokio::select! {
                    received = self.rx.rx.recv() => match received {
                        Some(line_number) => self.handle(line_number),
                        None => break,
                    },
                    _ = &mut shutdown => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        } else {
            while let Some(line_number) = self.rx.rx.recv().await {
                self.handle(line_number);
            }
        }

        info!(
            "Line status dispatch loop stopped after {} deliveries",
            self.sequence
        );
        Ok(())
    }

    fn handle(&mut self, line_number: u32) {
        self.deliver(Some(line_number));
        if self.rx.resync.swap(false, Ordering::AcqRel) {
            debug!("Delivering resync after dropped notifications");
            self.deliver(None);
        }
    }

    fn deliver(&mut self, changed_line: Option<u32>) {
        let Some(lines) = self.lines.upgrade() else {
            return;
        };
        let Some(subscriber) = self.slot.subscriber() else {
            return;
        };

        self.sequence += 1;
        let update = LineStatusUpdate {
            sequence: self.sequence,
            changed_line,
            statuses: lines.statuses(),
        };
        drop(lines);

        let delivered = catch_unwind(AssertUnwindSafe(|| subscriber.on_line_status(&update)));
        if delivered.is_err() {
            error!(
                "Line status subscriber panicked on delivery {}",
                update.sequence
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::DeviceClock;
    use crate::records::HookStatus;

    type Seen = Arc<Mutex<Vec<LineStatusUpdate>>>;

    fn recorder() -> (Arc<dyn LineStatusSubscriber>, Seen) {
        let seen: Seen = Arc::default();
        let sink = seen.clone();
        let subscriber: Arc<dyn LineStatusSubscriber> =
            Arc::new(move |update: &LineStatusUpdate| {
                sink.lock().unwrap().push(update.clone());
            });
        (subscriber, seen)
    }

    fn setup(capacity: usize) -> (Arc<LineRegistry>, CallbackDispatcher, DispatchLoop) {
        let (notifier, rx) = StatusNotifier::channel(capacity);
        let lines = Arc::new(LineRegistry::new(3, notifier, DeviceClock::new()));
        let dispatcher = CallbackDispatcher::new();
        let dispatch = DispatchLoop::new(rx, &lines, &dispatcher);
        (lines, dispatcher, dispatch)
    }

    #[tokio::test]
    async fn test_loop_ends_when_registry_dropped() {
        let (lines, dispatcher, dispatch) = setup(8);
        let (subscriber, seen) = recorder();
        let _subscription = dispatcher.register(&subscriber);
        let handle = tokio::spawn(dispatch.run());

        lines.update_hook_status(2, HookStatus::OffHook).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(lines);

        handle.await.unwrap().unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].changed_line, Some(2));
    }

    #[tokio::test]
    async fn test_overflow_triggers_resync() {
        let (lines, dispatcher, dispatch) = setup(1);
        let (subscriber, seen) = recorder();
        let _subscription = dispatcher.register(&subscriber);

        lines.update_hook_status(1, HookStatus::OffHook).unwrap();
        lines.update_hook_status(2, HookStatus::OffHook).unwrap();
        lines.update_hook_status(3, HookStatus::OffHook).unwrap();

        let statuses_before_drop = lines.statuses();
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(dispatch.run_with_shutdown(Some(rx)));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].changed_line, Some(1));
        assert_eq!(seen[1].changed_line, None);
        assert_eq!(seen[1].statuses, statuses_before_drop);
        drop(lines);
    }

    #[test]
    fn test_replaced_subscription_is_inert() {
        let dispatcher = CallbackDispatcher::new();
        let (first, _) = recorder();
        let (second, _) = recorder();

        let old = dispatcher.register(&first);
        let new = dispatcher.register(&second);
        assert!(!old.is_active());
        assert!(new.is_active());

        drop(old);
        assert!(dispatcher.has_subscriber());

        new.unregister();
        assert!(!dispatcher.has_subscriber());
    }

    #[test]
    fn test_dropped_subscriber_is_not_live() {
        let dispatcher = CallbackDispatcher::new();
        let (subscriber, _) = recorder();
        let _subscription = dispatcher.register(&subscriber);
        drop(subscriber);
        assert!(!dispatcher.has_subscriber());
    }
}
