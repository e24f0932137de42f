use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;

/// Idle state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    /// No activity for the whole timeout
    TimedOut,
    /// First activity after a timeout; the monitor is armed again
    Resumed,
}

type IdleHandler = Box<dyn Fn() + Send + Sync>;

/// Fires once after a period without user activity
///
/// The UI layer calls [`note_activity()`](Self::note_activity) for every raw
/// input event. After `timeout` of silence the monitor fires
/// [`IdleEvent::TimedOut`] (and the registered handlers) exactly once, then
/// stays quiet until the next activity re-arms it. It knows nothing about the
/// content engine; the host decides what "go home" means.
pub struct IdleMonitor {
    activity: Arc<Notify>,
    events: broadcast::Sender<IdleEvent>,
    handlers: Arc<Mutex<Vec<IdleHandler>>>,
    timeout: Duration,
    task: JoinHandle<()>,
}

impl IdleMonitor {
    /// Start monitoring; the first countdown begins immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(timeout: Duration) -> Self {
        let activity = Arc::new(Notify::new());
        let (events, _) = broadcast::channel(16);
        let handlers: Arc<Mutex<Vec<IdleHandler>>> = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn(run(
            timeout,
            Arc::clone(&activity),
            events.clone(),
            Arc::clone(&handlers),
        ));

        tracing::debug!("Idle monitor started with a {:?} timeout", timeout);

        Self {
            activity,
            events,
            handlers,
            timeout,
            task,
        }
    }

    /// Record user activity, restarting the countdown
    pub fn note_activity(&self) {
        self.activity.notify_one();
    }

    /// Subscribe to idle transitions
    pub fn subscribe(&self) -> broadcast::Receiver<IdleEvent> {
        self.events.subscribe()
    }

    /// Register a callback run on every timeout
    pub fn on_idle_timeout<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    timeout: Duration,
    activity: Arc<Notify>,
    events: broadcast::Sender<IdleEvent>,
    handlers: Arc<Mutex<Vec<IdleHandler>>>,
) {
    loop {
        // Armed: any activity restarts the countdown
        if tokio::time::timeout(timeout, activity.notified()).await.is_ok() {
            continue;
        }

        tracing::info!("No activity for {:?}, idle timeout fired", timeout);
        let _ = events.send(IdleEvent::TimedOut);
        for handler in handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            handler();
        }

        // Fired: stay quiet until someone interacts again
        activity.notified().await;
        tracing::debug!("Activity after idle timeout, monitor re-armed");
        let _ = events.send(IdleEvent::Resumed);
    }
}
