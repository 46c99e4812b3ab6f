//! Session alerts: the decision policy and the sink they are delivered to.

mod policy;

pub use policy::{evaluate, NotificationFlags, NotificationKind, Thresholds};

/// Fire-and-forget notification sink.
///
/// Permission is tracked by the implementor (e.g. an OS prompt); the timer
/// only asks whether it is granted before calling [`Notifier::notify`].
pub trait Notifier {
    fn permission_granted(&self) -> bool {
        true
    }

    fn notify(&self, title: &str, body: &str);
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn permission_granted(&self) -> bool {
        (**self).permission_granted()
    }

    fn notify(&self, title: &str, body: &str) {
        (**self).notify(title, body)
    }
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    fn permission_granted(&self) -> bool {
        (**self).permission_granted()
    }

    fn notify(&self, title: &str, body: &str) {
        (**self).notify(title, body)
    }
}

/// Delivers notifications as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(target: "worklog::notify", title, "{body}");
    }
}

/// Swallows every notification; used when alerts are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn permission_granted(&self) -> bool {
        false
    }

    fn notify(&self, _title: &str, _body: &str) {}
}
