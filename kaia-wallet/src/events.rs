//! Normalized wallet events and the per-backend observer list.
//!
//! Each backend owns one [`EventEmitter`]: a map from [`EventKind`] to the
//! ordered list of listeners subscribed to it. Emission is synchronous and
//! happens at the point of the state transition, in subscription order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::WalletError;
use crate::types::Account;

/// A normalized event emitted by a wallet backend.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    /// A session was established.
    Connect(Account),
    /// The session was torn down.
    Disconnect,
    /// The provider switched accounts.
    AccountsChanged(Vec<String>),
    /// The provider switched chains; carries the hex chain id.
    ChainChanged(String),
    /// A connection attempt failed.
    Error(WalletError),
}

impl WalletEvent {
    /// The subscription key of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connect(_) => EventKind::Connect,
            Self::Disconnect => EventKind::Disconnect,
            Self::AccountsChanged(_) => EventKind::AccountsChanged,
            Self::ChainChanged(_) => EventKind::ChainChanged,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// Event names listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `connect(Account)`
    Connect,
    /// `disconnect()`
    Disconnect,
    /// `accountsChanged(string[])`
    AccountsChanged,
    /// `chainChanged(string)`
    ChainChanged,
    /// `error(Error)`
    Error,
}

/// Handle returned by [`EventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A subscriber callback.
pub type Listener = Arc<dyn Fn(&WalletEvent) + Send + Sync>;

/// Ordered observer lists keyed by event kind.
#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
}

impl EventEmitter {
    /// Create an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to `kind`. Listeners run in subscription order.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().entry(kind).or_default().push((id, Arc::new(listener)));
        id
    }

    /// Unsubscribe a listener. Returns `false` if it was not subscribed.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(list) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(listener_id, _)| *listener_id != id);
        before != list.len()
    }

    /// Number of listeners subscribed to `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every listener subscribed to the event's kind.
    ///
    /// The list is copied before dispatch so listeners may subscribe or
    /// unsubscribe from inside a callback.
    pub fn emit(&self, event: &WalletEvent) {
        let snapshot: Vec<Listener> = self
            .lock()
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        for listener in snapshot {
            listener(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EventKind, Vec<(ListenerId, Listener)>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<EventKind, usize> =
            self.lock().iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventEmitter")
            .field("listeners", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let make = move |tag: &str| -> Listener {
            let log = Arc::clone(&log_clone);
            let tag = tag.to_string();
            Arc::new(move |event: &WalletEvent| {
                log.lock().unwrap().push(format!("{tag}:{:?}", event.kind()));
            })
        };
        (log, make)
    }

    #[test]
    fn test_emit_in_subscription_order() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        let first = make("first");
        let second = make("second");
        emitter.on(EventKind::Disconnect, move |e| first(e));
        emitter.on(EventKind::Disconnect, move |e| second(e));

        emitter.emit(&WalletEvent::Disconnect);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:Disconnect", "second:Disconnect"]
        );
    }

    #[test]
    fn test_emit_only_matching_kind() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        let listener = make("connect");
        emitter.on(EventKind::Connect, move |e| listener(e));

        emitter.emit(&WalletEvent::ChainChanged("0x3e9".into()));
        assert!(log.lock().unwrap().is_empty());

        emitter.emit(&WalletEvent::Connect(Account::new("0xabc", "0")));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_off_removes_listener() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        let listener = make("x");
        let id = emitter.on(EventKind::Error, move |e| listener(e));
        assert_eq!(emitter.listener_count(EventKind::Error), 1);

        assert!(emitter.off(EventKind::Error, id));
        assert!(!emitter.off(EventKind::Error, id));
        emitter.emit(&WalletEvent::Error(WalletError::NoAccount));

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(emitter.listener_count(EventKind::Error), 0);
    }

    #[test]
    fn test_listener_can_unsubscribe_during_emit() {
        let emitter = Arc::new(EventEmitter::new());
        let inner = Arc::clone(&emitter);
        let id_slot = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&id_slot);
        let id = emitter.on(EventKind::Disconnect, move |_| {
            if let Some(id) = *slot.lock().unwrap() {
                inner.off(EventKind::Disconnect, id);
            }
        });
        *id_slot.lock().unwrap() = Some(id);

        emitter.emit(&WalletEvent::Disconnect);
        assert_eq!(emitter.listener_count(EventKind::Disconnect), 0);
    }
}
