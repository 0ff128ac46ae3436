//! Asynchronous result handles.
//!
//! A request's outcome is delivered through a [`Resolver`] / [`ResponseHandle`]
//! pair sharing one slot. The slot moves from `Pending` to either `Resolved`
//! or `Rejected` exactly once: resolver methods consume the resolver, and a
//! resolver dropped without completing rejects the slot with
//! [`ClientError::ConnectionClosed`] so no caller waits forever.
//!
//! Handles are cheap to clone and every clone observes the same outcome.
//! Waiting with a timeout only abandons that wait; the slot stays pending
//! until its resolver completes it.

use crate::error::ClientError;
use parking_lot::{Condvar, Mutex};
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

enum State<T> {
    Pending,
    Resolved(T),
    Rejected(ClientError),
}

struct Slot<T> {
    state: Mutex<State<T>>,
    /// Wakes threads blocked in `blocking_wait*`.
    ready: Condvar,
    /// Wakes tasks suspended in `wait`.
    notify: Notify,
}

impl<T> Slot<T> {
    fn new(state: State<T>) -> Self {
        Self {
            state: Mutex::new(state),
            ready: Condvar::new(),
            notify: Notify::new(),
        }
    }

    fn complete(&self, outcome: Result<T, ClientError>) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, State::Pending) {
            return false;
        }
        *state = match outcome {
            Ok(value) => State::Resolved(value),
            Err(err) => State::Rejected(err),
        };
        drop(state);

        self.ready.notify_all();
        self.notify.notify_waiters();
        true
    }
}

/// Creates a pending handle and the resolver that completes it.
pub fn pending<T>() -> (Resolver<T>, ResponseHandle<T>) {
    let slot = Arc::new(Slot::new(State::Pending));
    (
        Resolver {
            slot: Some(slot.clone()),
        },
        ResponseHandle { slot },
    )
}

/// Creates a handle that is already resolved.
pub fn resolved<T>(value: T) -> ResponseHandle<T> {
    ResponseHandle {
        slot: Arc::new(Slot::new(State::Resolved(value))),
    }
}

/// Creates a handle that is already rejected.
pub fn rejected<T>(err: ClientError) -> ResponseHandle<T> {
    ResponseHandle {
        slot: Arc::new(Slot::new(State::Rejected(err))),
    }
}

/// Completes exactly one [`ResponseHandle`].
pub struct Resolver<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) -> bool {
        self.complete(Ok(value))
    }

    pub fn reject(self, err: ClientError) -> bool {
        self.complete(Err(err))
    }

    /// Completes the handle. Returns `false` if it was already completed.
    pub fn complete(mut self, outcome: Result<T, ClientError>) -> bool {
        match self.slot.take() {
            Some(slot) => slot.complete(outcome),
            None => false,
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.complete(Err(ClientError::ConnectionClosed));
        }
    }
}

/// Caller-facing handle to a result that may not be available yet.
pub struct ResponseHandle<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for ResponseHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ResponseHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.slot.state.lock() {
            State::Pending => "pending",
            State::Resolved(_) => "resolved",
            State::Rejected(_) => "rejected",
        };
        f.debug_struct("ResponseHandle")
            .field("state", &state)
            .finish()
    }
}

impl<T> ResponseHandle<T> {
    /// Returns whether the handle reached a terminal state.
    pub fn is_done(&self) -> bool {
        !matches!(*self.slot.state.lock(), State::Pending)
    }
}

impl<T: Clone> ResponseHandle<T> {
    /// Returns the outcome if the handle is already completed.
    pub fn try_result(&self) -> Option<Result<T, ClientError>> {
        outcome(&self.slot.state.lock())
    }

    /// Waits for the outcome.
    pub async fn wait(&self) -> Result<T, ClientError> {
        loop {
            let notified = self.slot.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a completion in between is not missed.
            notified.as_mut().enable();

            if let Some(outcome) = self.try_result() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Waits for the outcome, giving up with `OperationTimeout` after `timeout`.
    ///
    /// Only this wait is cancelled; the underlying request stays in flight.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<T, ClientError> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::OperationTimeout),
        }
    }

    /// Blocks the current thread until the outcome is available.
    ///
    /// Must not be called from inside an async task.
    pub fn blocking_wait(&self) -> Result<T, ClientError> {
        let mut state = self.slot.state.lock();
        loop {
            if let Some(outcome) = outcome(&state) {
                return outcome;
            }
            self.slot.ready.wait(&mut state);
        }
    }

    /// Blocks the current thread for at most `timeout`.
    ///
    /// A timeout too large to express as a deadline waits without limit.
    /// Must not be called from inside an async task.
    pub fn blocking_wait_timeout(&self, timeout: Duration) -> Result<T, ClientError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.blocking_wait();
        };
        let mut state = self.slot.state.lock();
        loop {
            if let Some(outcome) = outcome(&state) {
                return outcome;
            }
            if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
                return outcome(&state).unwrap_or(Err(ClientError::OperationTimeout));
            }
        }
    }
}

impl<T: Clone + Send + 'static> IntoFuture for ResponseHandle<T> {
    type Output = Result<T, ClientError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}

fn outcome<T: Clone>(state: &State<T>) -> Option<Result<T, ClientError>> {
    match state {
        State::Pending => None,
        State::Resolved(value) => Some(Ok(value.clone())),
        State::Rejected(err) => Some(Err(err.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plclink_protocol::ResultCode;

    #[tokio::test]
    async fn test_resolve_and_await() {
        let (resolver, handle) = pending::<u32>();
        assert!(!handle.is_done());
        assert!(handle.try_result().is_none());

        assert!(resolver.resolve(7));
        assert!(handle.is_done());
        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_reject() {
        let (resolver, handle) = pending::<u32>();
        resolver.reject(ClientError::DeviceRejected {
            code: ResultCode(1),
        });
        let err = handle.wait().await.unwrap_err();
        assert!(matches!(err, ClientError::DeviceRejected { code } if code == ResultCode(1)));
    }

    #[tokio::test]
    async fn test_dropped_resolver_rejects() {
        let (resolver, handle) = pending::<u32>();
        drop(resolver);
        assert!(matches!(
            handle.wait().await,
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_clones_observe_same_outcome() {
        let (resolver, handle) = pending::<String>();
        let a = handle.clone();
        let b = handle.clone();

        let waiter = tokio::spawn(async move { a.wait().await });
        resolver.resolve("done".to_string());

        assert_eq!(waiter.await.unwrap().unwrap(), "done");
        assert_eq!(b.wait().await.unwrap(), "done");
        assert_eq!(handle.try_result().unwrap().unwrap(), "done");
    }

    #[tokio::test]
    async fn test_wait_timeout_leaves_request_pending() {
        let (resolver, handle) = pending::<u32>();

        let result = handle.wait_timeout(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ClientError::OperationTimeout)));
        assert!(!handle.is_done());

        resolver.resolve(3);
        assert_eq!(
            handle.wait_timeout(Duration::from_secs(1)).await.unwrap(),
            3
        );
    }

    #[test]
    fn test_blocking_wait_timeout_then_success_on_same_thread() {
        let (resolver, handle) = pending::<u32>();

        let result = handle.blocking_wait_timeout(Duration::from_millis(20));
        assert!(matches!(result, Err(ClientError::OperationTimeout)));

        let resolver_thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            resolver.resolve(11);
        });

        // Same thread waits again; the previous timeout left nothing behind.
        assert_eq!(
            handle.blocking_wait_timeout(Duration::from_secs(5)).unwrap(),
            11
        );
        resolver_thread.join().unwrap();
        assert_eq!(handle.blocking_wait().unwrap(), 11);
    }

    #[test]
    fn test_blocking_wait_unbounded_timeout() {
        let (resolver, handle) = pending::<u32>();

        let resolver_thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            resolver.resolve(8);
        });

        assert_eq!(handle.blocking_wait_timeout(Duration::MAX).unwrap(), 8);
        resolver_thread.join().unwrap();
    }

    #[test]
    fn test_ready_handles() {
        let ok = resolved(5u8);
        assert!(ok.is_done());
        assert_eq!(ok.blocking_wait_timeout(Duration::ZERO).unwrap(), 5);

        let err = rejected::<u8>(ClientError::ConnectionClosed);
        assert!(matches!(
            err.blocking_wait(),
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_async_wait_from_plain_thread() {
        let (resolver, handle) = pending::<u32>();
        let waiter = std::thread::spawn(move || tokio_test::block_on(handle.wait()));
        std::thread::sleep(Duration::from_millis(10));
        resolver.resolve(42);
        assert_eq!(waiter.join().unwrap().unwrap(), 42);
    }

    #[test]
    fn test_debug_state() {
        let (resolver, handle) = pending::<u32>();
        assert!(format!("{:?}", handle).contains("pending"));
        resolver.resolve(1);
        assert!(format!("{:?}", handle).contains("resolved"));
    }
}
