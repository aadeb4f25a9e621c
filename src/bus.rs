//! Named-channel notification bus.
//!
//! Both the library store and the playback engine publish through a shared
//! [`NotificationBus`]; presentation code subscribes by event name. Delivery
//! is synchronous and in registration order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Small value payload carried by a notification. Never holds references into
/// the store or the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Empty,
    /// Id of the track the notification is about.
    Track(String),
    Progress {
        position: Duration,
        duration: Option<Duration>,
    },
    /// Duration reported once the sink has buffered enough to know it.
    Ready(Option<Duration>),
    Message(String),
}

/// Handle returned by [`NotificationBus::subscribe`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Registry<P> {
    next_id: u64,
    channels: HashMap<String, Vec<(SubscriptionId, Handler<P>)>>,
}

pub struct NotificationBus<P = Notice> {
    registry: Mutex<Registry<P>>,
}

impl<P> Default for NotificationBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> NotificationBus<P> {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                next_id: 0,
                channels: HashMap::new(),
            }),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry<P>> {
        // A panicking handler never runs under this lock, so a poisoned
        // registry is still consistent.
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `handler` for `event`. Registering the same handler twice
    /// makes it run twice per publish.
    pub fn subscribe<F>(&self, event: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let mut reg = self.registry();
        let id = SubscriptionId(reg.next_id);
        reg.next_id += 1;
        reg.channels
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut reg = self.registry();
        for handlers in reg.channels.values_mut() {
            if let Some(pos) = handlers.iter().position(|(sid, _)| *sid == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver `payload` to every subscriber of `event` and return how many
    /// handlers ran.
    ///
    /// The subscriber list is snapshotted and the lock released before the
    /// first handler runs: handlers may subscribe or publish re-entrantly, and
    /// anything they register only sees later publishes.
    pub fn publish(&self, event: &str, payload: &P) -> usize {
        let snapshot: Vec<Handler<P>> = match self.registry().channels.get(event) {
            Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };

        for handler in &snapshot {
            handler(payload);
        }
        snapshot.len()
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.registry().channels.get(event).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_run_in_registration_order() {
        let bus: NotificationBus<Notice> = NotificationBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.subscribe("track-changed", move |_| seen.lock().unwrap().push(tag));
        }

        assert_eq!(bus.publish("track-changed", &Notice::Empty), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn duplicate_registration_runs_once_per_registration() {
        let bus: NotificationBus<Notice> = NotificationBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handler = {
            let count = count.clone();
            move |_: &Notice| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };

        bus.subscribe("paused", handler.clone());
        bus.subscribe("paused", handler);
        bus.publish("paused", &Notice::Empty);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn publish_only_reaches_its_channel() {
        let bus: NotificationBus<Notice> = NotificationBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bus.subscribe("ended", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish("started", &Notice::Empty), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscribers_added_during_publish_wait_for_the_next_one() {
        let bus: Arc<NotificationBus<Notice>> = Arc::new(NotificationBus::new());
        let late_calls = Arc::new(AtomicUsize::new(0));

        {
            let bus_inner = bus.clone();
            let late_calls = late_calls.clone();
            bus.subscribe("metadata-loaded", move |_| {
                let late_calls = late_calls.clone();
                bus_inner.subscribe("metadata-loaded", move |_| {
                    late_calls.fetch_add(1, Ordering::SeqCst);
                });
            });
        }

        assert_eq!(bus.publish("metadata-loaded", &Notice::Empty), 1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        // The late subscriber is live now; the first handler adds another one.
        assert_eq!(bus.publish("metadata-loaded", &Notice::Empty), 2);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn payload_is_passed_through() {
        let bus: NotificationBus<Notice> = NotificationBus::new();
        let got = Arc::new(Mutex::new(None));
        let g = got.clone();
        bus.subscribe("failed", move |p| *g.lock().unwrap() = Some(p.clone()));

        bus.publish("failed", &Notice::Message("boom".into()));
        assert_eq!(*got.lock().unwrap(), Some(Notice::Message("boom".into())));
    }

    #[test]
    fn unsubscribe_removes_a_single_registration() {
        let bus: NotificationBus<Notice> = NotificationBus::new();
        let a = bus.subscribe("ready", |_| {});
        let _b = bus.subscribe("ready", |_| {});

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        assert_eq!(bus.subscriber_count("ready"), 1);
    }
}
