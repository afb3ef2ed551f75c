use crate::{observer, schedule};
use crate::{AsyncError, Cancelled, Completion, IntoSettle, Settle, Status};
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

type DataObserver<T> = Box<dyn FnOnce(&T)>;
type ErrorObserver<E> = Box<dyn FnOnce(&E)>;
type SignalObserver = Box<dyn FnOnce()>;

struct Observers<T, E> {
    data: Option<Vec<DataObserver<T>>>,
    error: Option<Vec<ErrorObserver<E>>>,
    cancel: Option<Vec<SignalObserver>>,
    end: Option<Vec<SignalObserver>>,
}

impl<T, E> Default for Observers<T, E> {
    fn default() -> Self {
        Observers {
            data: None,
            error: None,
            cancel: None,
            end: None,
        }
    }
}

// Observers only exist while pending; settling moves them out of the core.
enum State<T, E> {
    Pending(Observers<T, E>),
    Resolved(T),
    Rejected(E),
    Cancelled,
}

struct Core<T, E> {
    state: State<T, E>,
    cancelable: bool,
}

fn push<F>(list: &mut Option<Vec<F>>, callback: F) {
    list.get_or_insert_with(Vec::new).push(callback);
}

fn fire_signals(kind: &'static str, list: Option<Vec<SignalObserver>>) {
    for callback in list.into_iter().flatten() {
        observer::invoke(kind, callback);
    }
}

/// A cancelable single-value asynchronous primitive.
///
/// A `Future` starts pending and settles exactly once: resolved with a value,
/// rejected with an error, or cancelled. Consumers register observers or
/// derive new futures through combinators; producers settle it through the
/// [`FuturePort`] handed out by [`Future::port`].
///
/// Observers registered after settlement are replayed synchronously when
/// they match the outcome and dropped otherwise. A panicking observer is
/// isolated from its siblings and from the settling producer.
///
/// ```
/// use easeport::{AsyncError, Future};
///
/// let (port, future) = Future::<i32, AsyncError>::port(true);
/// let doubled = future.map(|value| Ok(value * 2));
/// port.resolve(21);
/// assert_eq!(doubled.completion().and_then(|c| c.value()), Some(42));
/// ```
pub struct Future<T, E = AsyncError> {
    core: Rc<RefCell<Core<T, E>>>,
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Future {
            core: self.core.clone(),
        }
    }
}

/// Producer side of a [`Future`].
///
/// Only the port can resolve or reject; consumers holding the `Future` can
/// observe, derive and cancel.
pub struct FuturePort<T, E = AsyncError> {
    future: Future<T, E>,
}

impl<T, E> Clone for FuturePort<T, E> {
    fn clone(&self) -> Self {
        FuturePort {
            future: self.future.clone(),
        }
    }
}

pub(crate) struct WeakFuture<T, E> {
    core: Weak<RefCell<Core<T, E>>>,
}

impl<T, E> WeakFuture<T, E> {
    pub(crate) fn upgrade(&self) -> Option<Future<T, E>> {
        self.core.upgrade().map(|core| Future { core })
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Creates a pending future together with the port that settles it.
    ///
    /// A non-cancelable future ignores [`Future::cancel`] and every
    /// cancellation observer.
    pub fn port(cancelable: bool) -> (FuturePort<T, E>, Future<T, E>) {
        let future = Future {
            core: Rc::new(RefCell::new(Core {
                state: State::Pending(Observers::default()),
                cancelable,
            })),
        };
        (
            FuturePort {
                future: future.clone(),
            },
            future,
        )
    }

    pub fn resolved(value: T) -> Self {
        let (port, future) = Self::port(false);
        port.resolve(value);
        future
    }

    pub fn rejected(error: E) -> Self {
        let (port, future) = Self::port(false);
        port.reject(error);
        future
    }

    pub fn cancelled() -> Self {
        let (_port, future) = Self::port(true);
        future.cancel();
        future
    }

    pub fn status(&self) -> Status {
        match &self.core.borrow().state {
            State::Pending(_) => Status::Pending,
            State::Resolved(_) => Status::Resolved,
            State::Rejected(_) => Status::Rejected,
            State::Cancelled => Status::Cancelled,
        }
    }

    pub fn is_cancelable(&self) -> bool {
        self.core.borrow().cancelable
    }

    /// Returns the terminal outcome, or `None` while pending.
    pub fn completion(&self) -> Option<Completion<T, E>> {
        match &self.core.borrow().state {
            State::Pending(_) => None,
            State::Resolved(value) => Some(Completion::Resolved(value.clone())),
            State::Rejected(error) => Some(Completion::Rejected(error.clone())),
            State::Cancelled => Some(Completion::Cancelled),
        }
    }

    /// Cancels a pending, cancelable future. No-op otherwise.
    pub fn cancel(&self) {
        if !self.is_cancelable() {
            return;
        }
        let Some(observers) = self.transition(State::Cancelled) else {
            return;
        };
        let Observers { cancel, end, .. } = observers;
        fire_signals("on_cancel", cancel);
        fire_signals("on_end", end);
    }

    pub fn on_data(&self, callback: impl FnOnce(&T) + 'static) -> &Self {
        let value = {
            let mut core = self.core.borrow_mut();
            match &mut core.state {
                State::Pending(observers) => {
                    push(&mut observers.data, Box::new(callback) as DataObserver<T>);
                    return self;
                }
                State::Resolved(value) => value.clone(),
                _ => return self,
            }
        };
        observer::invoke("on_data", || callback(&value));
        self
    }

    pub fn on_error(&self, callback: impl FnOnce(&E) + 'static) -> &Self {
        let error = {
            let mut core = self.core.borrow_mut();
            match &mut core.state {
                State::Pending(observers) => {
                    push(&mut observers.error, Box::new(callback) as ErrorObserver<E>);
                    return self;
                }
                State::Rejected(error) => error.clone(),
                _ => return self,
            }
        };
        observer::invoke("on_error", || callback(&error));
        self
    }

    /// Registers a cancellation observer. Ignored on non-cancelable futures.
    pub fn on_cancel(&self, callback: impl FnOnce() + 'static) -> &Self {
        {
            let mut core = self.core.borrow_mut();
            if !core.cancelable {
                return self;
            }
            match &mut core.state {
                State::Pending(observers) => {
                    push(&mut observers.cancel, Box::new(callback) as SignalObserver);
                    return self;
                }
                State::Cancelled => {}
                _ => return self,
            }
        }
        observer::invoke("on_cancel", callback);
        self
    }

    /// Registers an observer fired after any terminal outcome.
    pub fn on_end(&self, callback: impl FnOnce() + 'static) -> &Self {
        {
            let mut core = self.core.borrow_mut();
            if let State::Pending(observers) = &mut core.state {
                push(&mut observers.end, Box::new(callback) as SignalObserver);
                return self;
            }
        }
        observer::invoke("on_end", callback);
        self
    }

    /// Derives a future from this one's outcome.
    ///
    /// Exactly one handler runs, matching the outcome. Each returns the
    /// [`Settle`] for the derived future; a rejection returned by `on_data`
    /// or `on_cancel` is passed on to `on_error`. A panicking handler cancels the derived
    /// future. With `bind_cancel`, cancelling the derived future also
    /// cancels this one; cancellation of this one always reaches the
    /// derived future through `on_cancel`.
    pub fn map_with<U, D, R, C>(
        &self,
        on_data: D,
        on_error: R,
        on_cancel: C,
        bind_cancel: bool,
    ) -> Future<U, E>
    where
        U: Clone + 'static,
        D: FnOnce(T) -> Settle<U, E> + 'static,
        R: FnOnce(E) -> Settle<U, E> + 'static,
        C: FnOnce() -> Settle<U, E> + 'static,
    {
        let (port, derived) = Future::port(true);
        if bind_cancel {
            let upstream = self.downgrade();
            derived.on_cancel(move || {
                if let Some(source) = upstream.upgrade() {
                    source.cancel();
                }
            });
        }
        self.observe(move |completion| {
            schedule::run(move || {
                let next = observer::invoke("map", move || match completion {
                    Completion::Resolved(value) => match on_data(value) {
                        Settle::Reject(error) => on_error(error),
                        next => next,
                    },
                    Completion::Rejected(error) => on_error(error),
                    Completion::Cancelled => match on_cancel() {
                        Settle::Reject(error) => on_error(error),
                        next => next,
                    },
                });
                port.future.settle(next.unwrap_or(Settle::Cancel));
            })
        });
        derived
    }

    /// Transforms the resolved value; rejection and cancellation pass
    /// through unchanged and cancelling the result leaves this future alone.
    pub fn map<U, F, S>(&self, on_data: F) -> Future<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> S + 'static,
        S: IntoSettle<U, E>,
    {
        self.map_with(
            move |value| on_data(value).into_settle(),
            Settle::Reject,
            || Settle::Cancel,
            false,
        )
    }

    /// Promise-style chaining: cancellation of this future rejects the
    /// result with [`Cancelled`], and cancelling the result cancels this one.
    /// Handlers taking the error, as in [`Future::catch`], see that sentinel
    /// like any other rejection.
    pub fn then<U, F, S>(&self, on_data: F) -> Future<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> S + 'static,
        S: IntoSettle<U, E>,
        E: From<Cancelled>,
    {
        self.map_with(
            move |value| on_data(value).into_settle(),
            Settle::Reject,
            reject_cancelled,
            true,
        )
    }

    pub fn then_or_else<U, F, S, G, Q>(&self, on_data: F, on_error: G) -> Future<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> S + 'static,
        S: IntoSettle<U, E>,
        G: FnOnce(E) -> Q + 'static,
        Q: IntoSettle<U, E>,
        E: From<Cancelled>,
    {
        self.map_with(
            move |value| on_data(value).into_settle(),
            move |error| on_error(error).into_settle(),
            reject_cancelled,
            true,
        )
    }

    pub fn catch<G, Q>(&self, on_error: G) -> Future<T, E>
    where
        G: FnOnce(E) -> Q + 'static,
        Q: IntoSettle<T, E>,
        E: From<Cancelled>,
    {
        self.map_with(
            Settle::Resolve,
            move |error| on_error(error).into_settle(),
            reject_cancelled,
            true,
        )
    }

    /// Replaces only the cancellation handling of this future.
    pub fn catch_cancel<H, Q>(&self, on_cancel: H, bind_cancel: bool) -> Future<T, E>
    where
        H: FnOnce() -> Q + 'static,
        Q: IntoSettle<T, E>,
    {
        self.map_with(
            Settle::Resolve,
            Settle::Reject,
            move || on_cancel().into_settle(),
            bind_cancel,
        )
    }

    /// Calls `callback` once with the terminal outcome, whenever it happens.
    pub(crate) fn observe(&self, callback: impl FnOnce(Completion<T, E>) + 'static) {
        let slot = Rc::new(RefCell::new(Some(callback)));

        let on_data = slot.clone();
        self.on_data(move |value| {
            let callback = on_data.borrow_mut().take();
            if let Some(callback) = callback {
                callback(Completion::Resolved(value.clone()));
            }
        });
        let on_error = slot.clone();
        self.on_error(move |error| {
            let callback = on_error.borrow_mut().take();
            if let Some(callback) = callback {
                callback(Completion::Rejected(error.clone()));
            }
        });
        self.on_cancel(move || {
            let callback = slot.borrow_mut().take();
            if let Some(callback) = callback {
                callback(Completion::Cancelled);
            }
        });
    }

    pub(crate) fn downgrade(&self) -> WeakFuture<T, E> {
        WeakFuture {
            core: Rc::downgrade(&self.core),
        }
    }

    pub(crate) fn settle(&self, next: Settle<T, E>) {
        let mut next = next;
        loop {
            if self.status().is_terminal() {
                return;
            }
            match next {
                Settle::Resolve(value) => return self.resolve_value(value),
                Settle::Reject(error) => return self.reject_error(error),
                Settle::Cancel => return self.cancel(),
                Settle::Adopt(inner) => {
                    if Rc::ptr_eq(&inner.core, &self.core) {
                        tracing::warn!("a future cannot adopt itself, ignoring");
                        return;
                    }
                    match inner.completion() {
                        Some(completion) => next = completion.into(),
                        None => {
                            let target = self.clone();
                            inner.observe(move |completion| {
                                schedule::run(move || target.settle(completion.into()))
                            });
                            return;
                        }
                    }
                }
            }
        }
    }

    fn resolve_value(&self, value: T) {
        let Some(observers) = self.transition(State::Resolved(value.clone())) else {
            return;
        };
        let Observers { data, end, .. } = observers;
        for callback in data.into_iter().flatten() {
            observer::invoke("on_data", || callback(&value));
        }
        fire_signals("on_end", end);
    }

    fn reject_error(&self, error: E) {
        let Some(observers) = self.transition(State::Rejected(error.clone())) else {
            return;
        };
        let Observers { error: errors, end, .. } = observers;
        for callback in errors.into_iter().flatten() {
            observer::invoke("on_error", || callback(&error));
        }
        fire_signals("on_end", end);
    }

    fn transition(&self, terminal: State<T, E>) -> Option<Observers<T, E>> {
        let mut core = self.core.borrow_mut();
        if !matches!(core.state, State::Pending(_)) {
            return None;
        }
        match mem::replace(&mut core.state, terminal) {
            State::Pending(observers) => Some(observers),
            _ => None,
        }
    }
}

fn reject_cancelled<U, E: From<Cancelled>>() -> Settle<U, E> {
    Settle::Reject(Cancelled.into())
}

impl<T, E> fmt::Debug for Future<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("status", &self.status())
            .field("cancelable", &self.is_cancelable())
            .finish()
    }
}

impl<T, E> FuturePort<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub fn resolve(&self, value: T) {
        self.future.settle(Settle::Resolve(value));
    }

    /// Makes the future follow `other` until it settles.
    pub fn resolve_with(&self, other: Future<T, E>) {
        self.future.settle(Settle::Adopt(other));
    }

    pub fn reject(&self, error: E) {
        self.future.settle(Settle::Reject(error));
    }

    pub fn settle(&self, next: impl IntoSettle<T, E>) {
        self.future.settle(next.into_settle());
    }

    /// Registers a hook run when a consumer cancels the future.
    pub fn oncancel(&self, callback: impl FnOnce() + 'static) {
        self.future.on_cancel(callback);
    }

    pub fn status(&self) -> Status {
        self.future.status()
    }

    pub fn is_cancelled(&self) -> bool {
        self.future.status().is_cancelled()
    }
}
