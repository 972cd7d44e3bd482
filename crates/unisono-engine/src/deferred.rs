//! One-shot deferred results.
//!
//! A [`Deferred`] is the engine's promise: it settles exactly once, with a
//! value or an [`AudioError`]. It can be awaited (it implements [`Future`]),
//! chained with [`map`](Deferred::map), or consumed with a callback via
//! [`on_settle`](Deferred::on_settle). Everything is single-threaded.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use unisono_core::{AudioError, Result};

type Continuation<T> = Box<dyn FnOnce(Result<T>)>;

enum State<T> {
    Pending,
    Ready(Result<T>),
    Taken,
}

struct Shared<T> {
    state: State<T>,
    waker: Option<Waker>,
    continuation: Option<Continuation<T>>,
}

/// A value that becomes available later.
pub struct Deferred<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

/// The settling half of a pending [`Deferred`].
///
/// Dropping a resolver without settling rejects the deferred with
/// [`AudioError::InvalidState`].
pub struct Resolver<T> {
    shared: Option<Rc<RefCell<Shared<T>>>>,
}

impl<T: 'static> Deferred<T> {
    /// Creates a pending deferred and its resolver.
    pub fn pending() -> (Self, Resolver<T>) {
        let shared = Rc::new(RefCell::new(Shared {
            state: State::Pending,
            waker: None,
            continuation: None,
        }));
        (
            Self {
                shared: Rc::clone(&shared),
            },
            Resolver {
                shared: Some(shared),
            },
        )
    }

    /// Creates an already resolved deferred.
    pub fn resolved(value: T) -> Self {
        let (deferred, resolver) = Self::pending();
        resolver.resolve(value);
        deferred
    }

    /// Creates an already rejected deferred.
    pub fn rejected(error: AudioError) -> Self {
        let (deferred, resolver) = Self::pending();
        resolver.reject(error);
        deferred
    }

    /// Returns `true` once the deferred has settled.
    pub fn is_settled(&self) -> bool {
        !matches!(self.shared.borrow().state, State::Pending)
    }

    /// Takes the result if the deferred has settled.
    pub fn try_take(&self) -> Option<Result<T>> {
        let mut shared = self.shared.borrow_mut();
        match std::mem::replace(&mut shared.state, State::Taken) {
            State::Ready(result) => Some(result),
            other => {
                shared.state = other;
                None
            }
        }
    }

    /// Runs `f` with the result once the deferred settles.
    ///
    /// Runs immediately if it has already settled.
    pub fn on_settle(self, f: impl FnOnce(Result<T>) + 'static) {
        if let Some(result) = self.try_take() {
            f(result);
            return;
        }
        self.shared.borrow_mut().continuation = Some(Box::new(f));
    }

    /// Transforms the value, passing errors through.
    pub fn map<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> Deferred<U> {
        let (mapped, resolver) = Deferred::pending();
        self.on_settle(move |result| match result {
            Ok(value) => resolver.resolve(f(value)),
            Err(error) => resolver.reject(error),
        });
        mapped
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.borrow_mut();
        match std::mem::replace(&mut shared.state, State::Taken) {
            State::Ready(result) => Poll::Ready(result),
            State::Taken => Poll::Ready(Err(AudioError::invalid_state(
                "deferred result was already taken",
            ))),
            State::Pending => {
                shared.state = State::Pending;
                shared.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.shared.borrow().state {
            State::Pending => "pending",
            State::Ready(Ok(_)) => "resolved",
            State::Ready(Err(_)) => "rejected",
            State::Taken => "taken",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

impl<T> Resolver<T> {
    /// Settles the deferred with a value.
    pub fn resolve(mut self, value: T) {
        self.settle(Ok(value));
    }

    /// Settles the deferred with an error.
    pub fn reject(mut self, error: AudioError) {
        self.settle(Err(error));
    }

    fn settle(&mut self, result: Result<T>) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        let continuation = shared.borrow_mut().continuation.take();
        if let Some(continuation) = continuation {
            shared.borrow_mut().state = State::Taken;
            continuation(result);
            return;
        }
        let waker = {
            let mut shared = shared.borrow_mut();
            shared.state = State::Ready(result);
            shared.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if self.shared.is_some() {
            self.settle(Err(AudioError::invalid_state(
                "deferred dropped without being settled",
            )));
        }
    }
}
