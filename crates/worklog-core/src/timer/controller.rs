//! Async driver around [`SessionTimer`]: owns the tick loop and fans events
//! out to subscribers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::clock::{Clock, SystemClock};
use super::engine::{SessionTimer, TimerSnapshot, TimerState};
use crate::error::CoreError;
use crate::events::Event;
use crate::notify::Notifier;
use crate::store::Store;

const EVENT_CAPACITY: usize = 256;

pub struct TimerController<S, N, C = SystemClock> {
    timer: Arc<Mutex<SessionTimer<S, N, C>>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    events: broadcast::Sender<Event>,
}

impl<S, N, C> TimerController<S, N, C>
where
    S: Store + Send + 'static,
    N: Notifier + Send + 'static,
    C: Clock + Send + 'static,
{
    pub fn new(timer: SessionTimer<S, N, C>, tick_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            timer: Arc::new(Mutex::new(timer)),
            ticker: Arc::new(Mutex::new(None)),
            tick_interval,
            events,
        }
    }

    /// Every event the controller produces, including one `StateSnapshot`
    /// per tick while running.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn recover(&self) -> Result<Option<Event>, CoreError> {
        let event = self.timer.lock().await.recover()?;
        self.publish(event.clone());
        self.ensure_ticking().await;
        Ok(event)
    }

    pub async fn start(&self, category_id: &str) -> Result<Event, CoreError> {
        let event = self.timer.lock().await.start(category_id)?;
        self.publish(Some(event.clone()));
        self.ensure_ticking().await;
        Ok(event)
    }

    pub async fn pause(&self) -> Result<Option<Event>, CoreError> {
        let event = self.timer.lock().await.pause()?;
        self.publish(event.clone());
        self.ensure_ticking().await;
        Ok(event)
    }

    pub async fn resume(&self) -> Result<Option<Event>, CoreError> {
        let event = self.timer.lock().await.resume()?;
        self.publish(event.clone());
        self.ensure_ticking().await;
        Ok(event)
    }

    pub async fn stop(&self) -> Result<Option<Event>, CoreError> {
        let event = self.timer.lock().await.stop()?;
        self.publish(event.clone());
        self.ensure_ticking().await;
        Ok(event)
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.timer.lock().await.snapshot()
    }

    /// Run `f` with exclusive access to the timer.
    pub async fn with_timer<R>(&self, f: impl FnOnce(&mut SessionTimer<S, N, C>) -> R) -> R {
        let mut timer = self.timer.lock().await;
        f(&mut timer)
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the tick loop; the timer state is left as is.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
    }

    fn publish(&self, event: Option<Event>) {
        if let Some(event) = event {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    /// Run the tick loop exactly while the timer is running. Needed once
    /// after wrapping a timer that is already running.
    pub async fn ensure_ticking(&self) {
        let running = self.timer.lock().await.state() == TimerState::Running;
        if running {
            if !self.is_ticking().await {
                self.spawn_ticker().await;
            }
        } else {
            self.cancel_ticker().await;
        }
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let timer = Arc::clone(&self.timer);
        let events = self.events.clone();
        let period = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;

                let mut guard = timer.lock().await;
                if guard.state() != TimerState::Running {
                    break;
                }
                for event in guard.tick() {
                    let _ = events.send(event);
                }
                let _ = events.send(guard.snapshot_event());
            }
            tracing::debug!("tick loop finished");
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }
}

impl<S, N, C> Drop for TimerController<S, N, C> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.ticker.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewCategory;
    use crate::notify::{NotificationKind, SilentNotifier};
    use crate::storage::MemoryStore;
    use crate::timer::ManualClock;
    use chrono::{TimeZone, Utc};

    fn controller() -> (TimerController<MemoryStore, SilentNotifier, ManualClock>, ManualClock, String) {
        let store = MemoryStore::new();
        let cat = store
            .create_category(NewCategory {
                name: "Dev".into(),
                color: "#3b82f6".into(),
            })
            .unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
        let timer = SessionTimer::new(store, SilentNotifier, clock.clone());
        (
            TimerController::new(timer, Duration::from_secs(1)),
            clock,
            cat.id,
        )
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn snapshots(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Event::StateSnapshot { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_interval_while_running() {
        let (ctl, _clock, cat) = controller();
        let mut rx = ctl.subscribe();

        ctl.start(&cat).await.unwrap();
        assert!(ctl.is_ticking().await);
        tokio::time::sleep(Duration::from_millis(3500)).await;

        let events = drain(&mut rx);
        assert!(matches!(events[0], Event::TimerStarted { .. }));
        assert_eq!(snapshots(&events), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_ticking_and_resume_restarts() {
        let (ctl, clock, cat) = controller();
        let mut rx = ctl.subscribe();

        ctl.start(&cat).await.unwrap();
        ctl.pause().await.unwrap();
        assert!(!ctl.is_ticking().await);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(snapshots(&drain(&mut rx)), 0);

        clock.advance(chrono::Duration::seconds(5));
        ctl.resume().await.unwrap();
        assert!(ctl.is_ticking().await);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(snapshots(&drain(&mut rx)), 1);
        assert_eq!(ctl.snapshot().await.pause_duration, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_loop_and_publishes_session() {
        let (ctl, clock, cat) = controller();
        let mut rx = ctl.subscribe();

        ctl.start(&cat).await.unwrap();
        clock.advance(chrono::Duration::seconds(90));
        let stopped = ctl.stop().await.unwrap();
        assert!(!ctl.is_ticking().await);

        let Some(Event::TimerStopped { session, .. }) = stopped else {
            panic!("expected TimerStopped");
        };
        assert_eq!(session.total_duration, Some(90));
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, Event::TimerStopped { .. })));
        assert_eq!(ctl.snapshot().await.state, TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_loop_publishes_due_notifications() {
        let (ctl, clock, cat) = controller();
        let mut rx = ctl.subscribe();

        ctl.start(&cat).await.unwrap();
        clock.advance(chrono::Duration::hours(2));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let fired: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                Event::NotificationFired { kind, delivered, .. } => Some((kind, delivered)),
                _ => None,
            })
            .collect();
        assert_eq!(fired, vec![(NotificationKind::LongSession, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_ticking_follows_wrapped_timer_state() {
        let (ctl, _clock, cat) = controller();
        ctl.with_timer(|timer| timer.start(&cat).map(|_| ()))
            .await
            .unwrap();
        assert!(!ctl.is_ticking().await);

        ctl.ensure_ticking().await;
        assert!(ctl.is_ticking().await);

        ctl.with_timer(|timer| timer.pause()).await.unwrap();
        ctl.ensure_ticking().await;
        assert!(!ctl.is_ticking().await);
    }

    #[tokio::test(start_paused = true)]
    async fn recover_resumes_ticking_for_open_session() {
        let (ctl, _clock, cat) = controller();
        ctl.start(&cat).await.unwrap();
        ctl.shutdown().await;
        assert!(!ctl.is_ticking().await);

        let event = ctl.recover().await.unwrap();
        assert!(matches!(event, Some(Event::TimerRecovered { .. })));
        assert!(ctl.is_ticking().await);

        let count = ctl
            .with_timer(|timer| timer.store().list_sessions().unwrap().len())
            .await;
        assert_eq!(count, 1);
    }
}
