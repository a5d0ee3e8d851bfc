//! Polling plus invalidation broadcast.
//!
//! Every subscription owns an independent repeating timer and may also listen
//! on one or more topics. `notify(topic)` wakes the listeners immediately, so a
//! view refreshes right after a known mutation instead of waiting for its next
//! tick. The timer still runs as the safety net for signals that never arrive.
//!
//! Controllers attached to the same [`SignalBus`] relay topics to each other,
//! which is how separate windows of the client learn about mutations made
//! elsewhere. Signals never carry state; receivers always re-fetch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::ClientError;

/// Name of the process-wide bus shared by all windows.
pub const WALLET_CHANNEL: &str = "wallet_channel";

/// Published after anything that moves wallet balance or exposure.
pub const UPDATE_WALLET: &str = "update_wallet";

/// Published after a bet is placed, cancelled, or settled.
pub const REFRESH_BETS: &str = "refresh_bets";

/// Buffered signals per bus receiver before the slowest one starts lagging.
const BUS_CAPACITY: usize = 64;

static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(1);

type Handler = Arc<dyn Fn() + Send + Sync>;

/// Refresh cadence and invalidation topics for one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPolicy {
    pub period_ms: u64,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl RefreshPolicy {
    /// Timer only, no topics.
    pub fn every(period: Duration) -> Self {
        Self {
            period_ms: period.as_millis().try_into().unwrap_or(u64::MAX),
            topics: Vec::new(),
        }
    }

    /// Also refresh whenever `topic` is notified.
    pub fn on(mut self, topic: &str) -> Self {
        if !self.topics.iter().any(|t| t == topic) {
            self.topics.push(topic.to_string());
        }
        self
    }

    /// Timer period; zero is raised to one millisecond.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.max(1))
    }
}

/// One invalidation travelling over a [`SignalBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub topic: String,
    origin: u64,
}

/// Best-effort broadcast medium shared by several controllers.
#[derive(Clone, Debug)]
pub struct SignalBus {
    name: Arc<str>,
    tx: broadcast::Sender<Signal>,
}

impl SignalBus {
    pub fn new(name: &str) -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            name: Arc::from(name),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

struct Inner {
    origin: u64,
    next_id: AtomicU64,
    handlers: Mutex<HashMap<String, Vec<(u64, Handler)>>>,
    bus: Option<broadcast::Sender<Signal>>,
    relay: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Run every handler registered for `topic` right now. Returns how many ran.
    fn dispatch(&self, topic: &str) -> usize {
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler();
        }
        handlers.len()
    }

    fn remove(&self, topic: &str, id: u64) {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = handlers.get_mut(topic) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                handlers.remove(topic);
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(relay) = self
            .relay
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            relay.abort();
        }
    }
}

/// Owns refresh timers and the invalidation topics. Cheap to clone.
#[derive(Clone)]
pub struct FreshnessController {
    inner: Arc<Inner>,
}

impl Default for FreshnessController {
    fn default() -> Self {
        Self::new()
    }
}

impl FreshnessController {
    /// Controller whose signals stay inside this process context.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Controller that also exchanges signals with every other controller on `bus`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attached(bus: &SignalBus) -> Self {
        let controller = Self::build(Some(bus.tx.clone()));
        let mut rx = bus.tx.subscribe();
        let weak: Weak<Inner> = Arc::downgrade(&controller.inner);
        let channel = bus.name.clone();
        let relay = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(signal) => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        if signal.origin != inner.origin {
                            let delivered = inner.dispatch(&signal.topic);
                            debug!("[{channel}] relayed {} to {delivered} handler(s)", signal.topic);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("[{channel}] dropped {skipped} signal(s), timers will catch up");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        *controller
            .inner
            .relay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(relay);
        controller
    }

    fn build(bus: Option<broadcast::Sender<Signal>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                origin: NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed),
                next_id: AtomicU64::new(1),
                handlers: Mutex::new(HashMap::new()),
                bus,
                relay: Mutex::new(None),
            }),
        }
    }

    /// Publish an invalidation for `topic`.
    ///
    /// Every local handler registered at call time has run once when this
    /// returns. Attached controllers receive the signal asynchronously.
    pub fn notify(&self, topic: &str) -> usize {
        let delivered = self.inner.dispatch(topic);
        if let Some(bus) = &self.inner.bus {
            // No receivers is fine: nobody else is listening.
            let _ = bus.send(Signal {
                topic: topic.to_string(),
                origin: self.inner.origin,
            });
        }
        debug!("notify({topic}) reached {delivered} local handler(s)");
        delivered
    }

    /// Run `handler` on every `notify(topic)` until the listener is dropped.
    pub fn on_notify<H>(&self, topic: &str, handler: H) -> Listener
    where
        H: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        Listener {
            inner: Arc::downgrade(&self.inner),
            topic: topic.to_string(),
            id,
        }
    }

    /// Start refreshing with `refresh` on `policy`'s timer and topics.
    ///
    /// The first tick fires one full period from now; the initial load is the
    /// caller's job. A failed refresh is logged and the loop carries on.
    /// Dropping the returned [`Subscription`] stops the timer and aborts any
    /// refresh still in flight, so its result is never observed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<F, Fut>(&self, name: &str, policy: &RefreshPolicy, refresh: F) -> Subscription
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ClientError>> + Send + 'static,
    {
        let wake = Arc::new(Notify::new());
        let listeners = policy
            .topics
            .iter()
            .map(|topic| {
                let wake = Arc::clone(&wake);
                self.on_notify(topic, move || wake.notify_one())
            })
            .collect();

        let period = policy.period();
        let label = name.to_string();
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                let trigger = tokio::select! {
                    _ = ticker.tick() => "timer",
                    _ = wake.notified() => "signal",
                };
                debug!("Refreshing {label} ({trigger})");
                if let Err(e) = refresh().await {
                    warn!("Refresh of {label} failed: {e}");
                }
            }
        });

        Subscription {
            name: name.to_string(),
            task,
            _listeners: listeners,
        }
    }
}

/// Registration returned by [`FreshnessController::on_notify`].
pub struct Listener {
    inner: Weak<Inner>,
    topic: String,
    id: u64,
}

impl Listener {
    pub fn unsubscribe(self) {}
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove(&self.topic, self.id);
        }
    }
}

/// Live refresh loop returned by [`FreshnessController::subscribe`].
pub struct Subscription {
    name: String,
    task: JoinHandle<()>,
    _listeners: Vec<Listener>,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!("Stopped refreshing {}", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn counting_refresh(
        count: &Arc<AtomicUsize>,
    ) -> impl Fn() -> std::future::Ready<Result<(), ClientError>> + Send + Sync + 'static {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        }
    }

    #[test]
    fn notify_runs_each_handler_once_per_call() {
        let ctl = FreshnessController::new();
        let a = counter();
        let b = counter();
        let a2 = Arc::clone(&a);
        let b2 = Arc::clone(&b);
        let _la = ctl.on_notify(UPDATE_WALLET, move || {
            a2.fetch_add(1, Ordering::SeqCst);
        });
        let _lb = ctl.on_notify(UPDATE_WALLET, move || {
            b2.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(ctl.notify(UPDATE_WALLET), 2);
        assert_eq!(ctl.notify(UPDATE_WALLET), 2);
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn notify_only_reaches_matching_topic() {
        let ctl = FreshnessController::new();
        let hits = counter();
        let h = Arc::clone(&hits);
        let _l = ctl.on_notify(REFRESH_BETS, move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ctl.notify(UPDATE_WALLET), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_listener_is_not_invoked() {
        let ctl = FreshnessController::new();
        let hits = counter();
        let h = Arc::clone(&hits);
        let listener = ctl.on_notify(UPDATE_WALLET, move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        ctl.notify(UPDATE_WALLET);
        listener.unsubscribe();
        assert_eq!(ctl.notify(UPDATE_WALLET), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_notify_reentrantly() {
        let ctl = FreshnessController::new();
        let hits = counter();
        let inner_ctl = ctl.clone();
        let _relay = ctl.on_notify(REFRESH_BETS, move || {
            inner_ctl.notify(UPDATE_WALLET);
        });
        let h = Arc::clone(&hits);
        let _wallet = ctl.on_notify(UPDATE_WALLET, move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        ctl.notify(REFRESH_BETS);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn policy_builder_dedups_topics() {
        let policy = RefreshPolicy::every(Duration::from_secs(15))
            .on(UPDATE_WALLET)
            .on(UPDATE_WALLET)
            .on(REFRESH_BETS);
        assert_eq!(policy.period_ms, 15_000);
        assert_eq!(policy.topics, vec![UPDATE_WALLET, REFRESH_BETS]);
        assert_eq!(
            RefreshPolicy::every(Duration::ZERO).period(),
            Duration::from_millis(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timer_ticks_once_per_period() {
        let ctl = FreshnessController::new();
        let calls = counter();
        let _sub = ctl.subscribe(
            "wallet",
            &RefreshPolicy::every(Duration::from_secs(15)),
            counting_refresh(&calls),
        );

        time::sleep(Duration::from_secs(14)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_secs(32)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_before_first_tick_never_refreshes() {
        let ctl = FreshnessController::new();
        let calls = counter();
        let sub = ctl.subscribe(
            "matches",
            &RefreshPolicy::every(Duration::from_secs(15)).on(UPDATE_WALLET),
            counting_refresh(&calls),
        );
        sub.unsubscribe();

        ctl.notify(UPDATE_WALLET);
        time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn notify_refreshes_without_waiting_for_tick() {
        let ctl = FreshnessController::new();
        let calls = counter();
        let _sub = ctl.subscribe(
            "sidebar",
            &RefreshPolicy::every(Duration::from_secs(15)).on(UPDATE_WALLET),
            counting_refresh(&calls),
        );

        time::sleep(Duration::from_secs(1)).await;
        ctl.notify(UPDATE_WALLET);
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_polling() {
        let ctl = FreshnessController::new();
        let calls = counter();
        let c = Arc::clone(&calls);
        let _sub = ctl.subscribe(
            "history",
            &RefreshPolicy::every(Duration::from_secs(20)),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(ClientError::Network {
                    message: "connection refused".into(),
                    timed_out: false,
                }))
            },
        );

        time::sleep(Duration::from_secs(61)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_refresh_is_discarded_after_unsubscribe() {
        let ctl = FreshnessController::new();
        let started = counter();
        let applied = counter();
        let (s, a) = (Arc::clone(&started), Arc::clone(&applied));
        let sub = ctl.subscribe(
            "bets",
            &RefreshPolicy::every(Duration::from_secs(15)),
            move || {
                let (s, a) = (Arc::clone(&s), Arc::clone(&a));
                async move {
                    s.fetch_add(1, Ordering::SeqCst);
                    time::sleep(Duration::from_secs(10)).await;
                    a.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        );

        time::sleep(Duration::from_secs(16)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        drop(sub);

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(applied.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn bus_relays_between_controllers() {
        let bus = SignalBus::new(WALLET_CHANNEL);
        let tab_a = FreshnessController::attached(&bus);
        let tab_b = FreshnessController::attached(&bus);
        let detached = FreshnessController::new();

        let (hits_a, hits_b, hits_d) = (counter(), counter(), counter());
        let (ha, hb, hd) = (
            Arc::clone(&hits_a),
            Arc::clone(&hits_b),
            Arc::clone(&hits_d),
        );
        let _la = tab_a.on_notify(UPDATE_WALLET, move || {
            ha.fetch_add(1, Ordering::SeqCst);
        });
        let _lb = tab_b.on_notify(UPDATE_WALLET, move || {
            hb.fetch_add(1, Ordering::SeqCst);
        });
        let _ld = detached.on_notify(UPDATE_WALLET, move || {
            hd.fetch_add(1, Ordering::SeqCst);
        });

        tab_a.notify(UPDATE_WALLET);
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(hits_a.load(Ordering::SeqCst), 1, "origin must not hear its own echo");
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);
        assert_eq!(hits_d.load(Ordering::SeqCst), 0);
        assert_eq!(bus.name(), WALLET_CHANNEL);
    }
}
