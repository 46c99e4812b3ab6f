use clap::Subcommand;
use tokio::sync::broadcast::error::RecvError;
use worklog_core::timer::SystemClock;
use worklog_core::{
    Config, CoreError, Database, Event, LogNotifier, SessionTimer, Store, TimerContext,
    TimerController, TimerState, ValidationError,
};

use super::{find_category, CliResult};

const CONTEXT_KEY: &str = "timer_context";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a session (falls back to timer.default_category)
    Start {
        /// Category id or name
        category: Option<String>,
    },
    /// Pause the running session, or resume a paused one
    Pause,
    /// Resume a paused session
    Resume,
    /// Stop and record the active session
    Stop,
    /// Print current timer state as JSON
    Status,
    /// Follow the running session with live ticks until Ctrl-C
    Watch,
}

fn saved_context(db: &Database) -> Result<Option<TimerContext>, CoreError> {
    let Some(json) = db.kv_get(CONTEXT_KEY)? else {
        return Ok(None);
    };
    match serde_json::from_str(&json) {
        Ok(ctx) => Ok(Some(ctx)),
        Err(e) => {
            tracing::warn!("discarding unreadable timer context: {e}");
            db.kv_delete(CONTEXT_KEY)?;
            Ok(None)
        }
    }
}

fn save_context(db: &Database, ctx: &TimerContext) -> Result<(), CoreError> {
    let json = serde_json::to_string(ctx)?;
    db.kv_set(CONTEXT_KEY, &json)?;
    Ok(())
}

/// Timer over `store`, restored from `saved` or recovered from the store.
fn load_timer<S: Store>(
    store: S,
    config: &Config,
    saved: Option<TimerContext>,
) -> Result<SessionTimer<S, LogNotifier>, CoreError> {
    let mut timer = SessionTimer::new(store, LogNotifier, SystemClock)
        .with_thresholds(config.thresholds())
        .with_notifications(config.notifications.enabled);
    let recovered = match saved {
        Some(ctx) => timer.restore(ctx)?,
        None => timer.recover()?,
    };
    if let Some(event) = recovered {
        tracing::debug!(?event, "timer state recovered");
    }
    Ok(timer)
}

fn print_event(event: &Event) -> CliResult {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}

pub fn run(action: TimerAction) -> CliResult {
    let config = Config::load_or_default();
    let db = Database::open()?;
    let saved = saved_context(&db)?;

    match action {
        TimerAction::Watch => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(watch(db, &config, saved))
        }
        action => run_once(&db, &config, saved, action),
    }
}

fn run_once(
    db: &Database,
    config: &Config,
    saved: Option<TimerContext>,
    action: TimerAction,
) -> CliResult {
    let mut timer = load_timer(db, config, saved)?;
    let outcome = match action {
        TimerAction::Start { category } => {
            let key = category
                .or_else(|| config.timer.default_category.clone())
                .ok_or(ValidationError::CategoryRequired)?;
            let category = find_category(db, &key)?;
            timer.start(&category.id).map(Some)
        }
        TimerAction::Pause => timer.pause(),
        TimerAction::Resume => timer.resume(),
        TimerAction::Stop => timer.stop(),
        TimerAction::Status | TimerAction::Watch => {
            for event in timer.tick() {
                print_event(&event)?;
            }
            Ok(None)
        }
    };

    // Persist whatever state we ended in, even when the command failed.
    save_context(db, timer.context())?;

    match outcome? {
        Some(event) => print_event(&event)?,
        None => print_event(&timer.snapshot_event())?,
    }
    Ok(())
}

async fn watch(db: Database, config: &Config, saved: Option<TimerContext>) -> CliResult {
    let timer = load_timer(db, config, saved)?;
    if timer.state() != TimerState::Running {
        print_event(&timer.snapshot_event())?;
        return Ok(());
    }
    save_context(timer.store(), timer.context())?;

    let controller = TimerController::new(timer, config.tick_interval());
    let mut events = controller.subscribe();
    controller.ensure_ticking().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = events.recv() => match received {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    match event {
                        Event::NotificationFired { .. } => {
                            if !controller.with_timer(|t| save_unless_changed(t)).await? {
                                tracing::info!("timer changed by another invocation");
                                controller.shutdown().await;
                                return Ok(());
                            }
                        }
                        Event::StateSnapshot { .. } => {
                            if controller.with_timer(|t| changed_elsewhere(t)).await? {
                                tracing::info!("timer changed by another invocation");
                                controller.shutdown().await;
                                return Ok(());
                            }
                        }
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }

    controller.shutdown().await;
    if !controller.with_timer(|t| save_unless_changed(t)).await? {
        tracing::info!("timer changed by another invocation; keeping its state");
    }
    Ok(())
}

/// Whether another invocation paused or stopped the session being watched.
fn changed_elsewhere(timer: &SessionTimer<Database, LogNotifier>) -> Result<bool, CoreError> {
    let ours = timer.context();
    let Some(saved) = saved_context(timer.store())? else {
        return Ok(false);
    };
    let same_session = saved.session.as_ref().map(|s| &s.id) == ours.session.as_ref().map(|s| &s.id);
    Ok(saved.state != ours.state || !same_session)
}

/// Save our context unless another invocation changed the timer first.
/// Returns whether it was saved.
fn save_unless_changed(timer: &SessionTimer<Database, LogNotifier>) -> Result<bool, CoreError> {
    if changed_elsewhere(timer)? {
        return Ok(false);
    }
    save_context(timer.store(), timer.context())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use worklog_core::NewCategory;

    fn running_timer() -> SessionTimer<Database, LogNotifier> {
        let db = Database::open_memory().unwrap();
        let cat = db
            .create_category(NewCategory::new("Dev", "#3b82f6").unwrap())
            .unwrap();
        let mut timer = SessionTimer::new(db, LogNotifier, SystemClock);
        timer.start(&cat.id).unwrap();
        save_context(timer.store(), timer.context()).unwrap();
        timer
    }

    #[test]
    fn save_keeps_context_written_by_another_invocation() {
        let timer = running_timer();
        let mut theirs = timer.context().clone();
        theirs.state = TimerState::Paused;
        save_context(timer.store(), &theirs).unwrap();

        assert!(!save_unless_changed(&timer).unwrap());
        let saved = saved_context(timer.store()).unwrap().unwrap();
        assert_eq!(saved.state, TimerState::Paused);
    }

    #[test]
    fn save_overwrites_our_own_context() {
        let timer = running_timer();
        assert!(save_unless_changed(&timer).unwrap());
        let saved = saved_context(timer.store()).unwrap().unwrap();
        assert_eq!(&saved, timer.context());
    }

    #[test]
    fn unreadable_context_is_discarded() {
        let db = Database::open_memory().unwrap();
        db.kv_set(CONTEXT_KEY, "{not json").unwrap();
        assert!(saved_context(&db).unwrap().is_none());
        assert!(db.kv_get(CONTEXT_KEY).unwrap().is_none());
    }
}
