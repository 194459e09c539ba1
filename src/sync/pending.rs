use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::{oneshot, watch};

use crate::sync::error::{SyncError, SyncResult};

/// Delivers terminal and completion callbacks for pending results.
///
/// Interactive callers plug in a dispatcher that hops to their preferred
/// context; headless callers run callbacks inline.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>);
}

/// Runs callbacks inline on the completing task
pub struct CallerDispatcher;

impl Dispatcher for CallerDispatcher {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

/// Hands callbacks off to a spawned blocking task
pub struct SpawnDispatcher;

impl Dispatcher for SpawnDispatcher {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>) {
        let _ = tokio::task::spawn_blocking(task);
    }
}

enum Hooks {
    Pending(Vec<Box<dyn FnOnce() + Send>>),
    Fired,
}

struct Shared {
    dispatcher: Arc<dyn Dispatcher>,
    terminal: AtomicBool,
    abandon_requested: AtomicBool,
    abandon_tx: watch::Sender<bool>,
    abandon_rx: watch::Receiver<bool>,
    complete_tx: watch::Sender<bool>,
    complete_rx: watch::Receiver<bool>,
    hooks: Mutex<Hooks>,
}

impl Shared {
    fn request_abandon(&self) {
        if self.terminal.load(Ordering::SeqCst) {
            // Post-terminal abandon is a no-op.
            return;
        }
        if !self.abandon_requested.swap(true, Ordering::SeqCst) {
            debug!("Abandon requested for pending operation");
            let _ = self.abandon_tx.send(true);
        }
    }

    /// Runs completion hooks, then latches the completion signal.
    fn fire_completion(&self) {
        let hooks = {
            let mut guard = self.hooks.lock().unwrap();
            std::mem::replace(&mut *guard, Hooks::Fired)
        };
        if let Hooks::Pending(callbacks) = hooks {
            for callback in callbacks {
                self.dispatcher.dispatch(callback);
            }
        }
        let _ = self.complete_tx.send(true);
    }
}

/// A one-shot, non-reusable asynchronous operation handle.
///
/// Protocol: PENDING, then exactly one of success or failure, then
/// completion, exactly once, always. Cancellation via [`abandon`]
/// (or an [`AbandonHandle`]) is honored pre-terminal by failing with
/// [`SyncError::Cancelled`]; post-terminal it is a no-op. A worker that
/// drops its [`Completer`] without finishing still produces a failure plus
/// completion, so no caller is left waiting forever.
///
/// [`abandon`]: PendingResult::abandon
pub struct PendingResult<T> {
    shared: Arc<Shared>,
    rx: oneshot::Receiver<SyncResult<T>>,
}

impl<T: Send + 'static> PendingResult<T> {
    /// Creates a connected handle/completer pair.
    pub fn channel(dispatcher: Arc<dyn Dispatcher>) -> (Self, Completer<T>) {
        let (tx, rx) = oneshot::channel();
        let (abandon_tx, abandon_rx) = watch::channel(false);
        let (complete_tx, complete_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            dispatcher,
            terminal: AtomicBool::new(false),
            abandon_requested: AtomicBool::new(false),
            abandon_tx,
            abandon_rx,
            complete_tx,
            complete_rx,
            hooks: Mutex::new(Hooks::Pending(Vec::new())),
        });
        let pending = Self {
            shared: Arc::clone(&shared),
            rx,
        };
        let completer = Completer {
            shared,
            tx: Some(tx),
        };
        (pending, completer)
    }

    /// Waits for the terminal outcome, consuming the handle.
    pub async fn outcome(self) -> SyncResult<T> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // The completer guarantees a send before it is gone; treat a
            // closed channel as cancellation rather than panicking.
            Err(_) => Err(SyncError::Cancelled),
        }
    }

    /// Requests cancellation. No-op once the operation is terminal.
    pub fn abandon(&self) {
        self.shared.request_abandon();
    }

    /// A cloneable cancellation handle usable from any task
    pub fn abandon_handle(&self) -> AbandonHandle {
        AbandonHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// A signal that resolves once completion has fired.
    ///
    /// Grab this before consuming the handle with [`outcome`]; completion
    /// always fires after the terminal outcome.
    ///
    /// [`outcome`]: PendingResult::outcome
    pub fn completion(&self) -> CompletionSignal {
        CompletionSignal {
            rx: self.shared.complete_rx.clone(),
        }
    }

    /// Registers a completion callback.
    ///
    /// Runs via the dispatcher after the terminal outcome is delivered;
    /// registering after completion dispatches immediately.
    pub fn on_complete(&self, callback: impl FnOnce() + Send + 'static) {
        let mut guard = self.shared.hooks.lock().unwrap();
        match &mut *guard {
            Hooks::Pending(callbacks) => callbacks.push(Box::new(callback)),
            Hooks::Fired => {
                drop(guard);
                self.shared.dispatcher.dispatch(Box::new(callback));
            }
        }
    }

    /// Whether a terminal outcome has been produced
    pub fn is_terminal(&self) -> bool {
        self.shared.terminal.load(Ordering::SeqCst)
    }
}

/// Cloneable cancellation handle for a pending result
#[derive(Clone)]
pub struct AbandonHandle {
    shared: Arc<Shared>,
}

impl AbandonHandle {
    /// Requests cancellation. No-op once the operation is terminal.
    pub fn abandon(&self) {
        self.shared.request_abandon();
    }
}

/// Awaitable completion signal of a pending result
#[derive(Clone)]
pub struct CompletionSignal {
    rx: watch::Receiver<bool>,
}

impl CompletionSignal {
    /// Resolves once completion has fired (immediately if it already has)
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|complete| *complete).await;
    }

    pub fn is_complete(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Producer side of a pending result, held by the operation's worker.
///
/// Exactly one of [`succeed`]/[`fail`] takes effect; whichever fires first
/// wins and the loser is ignored. Dropping the completer without finishing
/// fails the operation with `Cancelled` so the contract holds even when a
/// worker dies.
///
/// [`succeed`]: Completer::succeed
/// [`fail`]: Completer::fail
pub struct Completer<T> {
    shared: Arc<Shared>,
    tx: Option<oneshot::Sender<SyncResult<T>>>,
}

impl<T> Completer<T> {
    /// Delivers the success outcome, then fires completion
    pub fn succeed(mut self, value: T) {
        self.finish(Ok(value));
    }

    /// Delivers the failure outcome, then fires completion
    pub fn fail(mut self, error: SyncError) {
        self.finish(Err(error));
    }

    /// Whether cancellation has been requested
    pub fn abandon_requested(&self) -> bool {
        self.shared.abandon_requested.load(Ordering::SeqCst)
    }

    /// Watch channel that flips to true when cancellation is requested.
    ///
    /// Workers select over `rx.wait_for(|v| *v)` against their actual work.
    pub fn abandon_watch(&self) -> watch::Receiver<bool> {
        self.shared.abandon_rx.clone()
    }

    fn finish(&mut self, outcome: SyncResult<T>) {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => return,
        };
        if self.shared.terminal.swap(true, Ordering::SeqCst) {
            return;
        }
        // Terminal outcome first, completion after.
        let _ = tx.send(outcome);
        self.shared.fire_completion();
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.finish(Err(SyncError::Cancelled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn dispatcher() -> Arc<dyn Dispatcher> {
        Arc::new(CallerDispatcher)
    }

    #[tokio::test]
    async fn test_success_then_complete_exactly_once() {
        let (pending, completer) = PendingResult::channel(dispatcher());
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completions);
        pending.on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut completion = pending.completion();

        completer.succeed(42);

        assert!(pending.is_terminal());
        assert_eq!(pending.outcome().await, Ok(42));
        completion.wait().await;
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandon_fails_with_cancelled_then_completes() {
        let (pending, completer) = PendingResult::channel(dispatcher());
        let mut completion = pending.completion();
        let mut abandon_rx = completer.abandon_watch();

        let worker = tokio::spawn(async move {
            tokio::select! {
                _ = abandon_rx.wait_for(|v| *v) => completer.fail(SyncError::Cancelled),
                _ = tokio::time::sleep(std::time::Duration::from_secs(30)) => {
                    completer.succeed(0)
                }
            }
        });

        pending.abandon();
        assert_eq!(pending.outcome().await, Err(SyncError::Cancelled));
        completion.wait().await;
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_abandon_after_terminal_is_noop() {
        let (pending, completer) = PendingResult::channel(dispatcher());
        let handle = pending.abandon_handle();
        completer.succeed("done");
        handle.abandon();
        handle.abandon();
        assert_eq!(pending.outcome().await, Ok("done"));
    }

    #[tokio::test]
    async fn test_dropped_completer_still_completes() {
        let (pending, completer) = PendingResult::<u32>::channel(dispatcher());
        let mut completion = pending.completion();
        drop(completer);
        assert_eq!(pending.outcome().await, Err(SyncError::Cancelled));
        completion.wait().await;
        assert!(completion.is_complete());
    }

    #[tokio::test]
    async fn test_on_complete_after_completion_fires_immediately() {
        let (pending, completer) = PendingResult::channel(dispatcher());
        completer.succeed(1);
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        pending.on_complete(move || flag.store(true, Ordering::SeqCst));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_second_outcome_is_ignored() {
        let (pending, completer) = PendingResult::channel(dispatcher());
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completions);
        pending.on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        completer.succeed(7);
        // The loser of the race is ignored: abandoning after success does
        // not produce a second terminal outcome or completion.
        pending.abandon();

        assert_eq!(pending.outcome().await, Ok(7));
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }
}
