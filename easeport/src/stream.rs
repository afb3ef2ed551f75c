use crate::{observer, schedule};
use crate::{AsyncError, Future, Settle, Status, StreamError};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

type NextObserver<T> = Box<dyn FnMut(&T, usize)>;
type ErrorObserver<E> = Box<dyn FnOnce(&E)>;
type SignalObserver = Box<dyn FnOnce()>;

struct Observers<T, E> {
    next: Option<Vec<NextObserver<T>>>,
    error: Option<Vec<ErrorObserver<E>>>,
    cancel: Option<Vec<SignalObserver>>,
    completed: Option<Vec<SignalObserver>>,
    end: Option<Vec<SignalObserver>>,
}

impl<T, E> Default for Observers<T, E> {
    fn default() -> Self {
        Observers {
            next: None,
            error: None,
            cancel: None,
            completed: None,
            end: None,
        }
    }
}

enum State<T, E> {
    Open {
        emitting: bool,
        observers: Observers<T, E>,
    },
    Completed,
    Rejected(E),
    Cancelled,
}

struct Core<T, E> {
    state: State<T, E>,
    // `Some` until the first `listen`, never recreated afterwards.
    buffer: Option<Vec<T>>,
    listened: bool,
    // Items accepted but not yet handed to the `on_next` observers.
    queue: VecDeque<T>,
    delivering: bool,
    delivered: usize,
    // Terminal state requested while `drain` was running.
    ending: Option<State<T, E>>,
}

fn push<F>(list: &mut Option<Vec<F>>, callback: F) {
    list.get_or_insert_with(Vec::new).push(callback);
}

fn fire_signals(kind: &'static str, list: Option<Vec<SignalObserver>>) {
    for callback in list.into_iter().flatten() {
        observer::invoke(kind, callback);
    }
}

/// A cancelable multi-value asynchronous primitive.
///
/// Items emitted before anyone calls [`Stream::listen`] are buffered in
/// arrival order and flushed to the listener; afterwards every emitted item
/// goes straight to the registered `on_next` observers. The stream ends by
/// completing, failing, or being cancelled, and drops its observers and any
/// unflushed buffer at that point.
///
/// ```
/// use easeport::{AsyncError, Stream};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let (port, stream) = Stream::<i32, AsyncError>::port();
/// port.emit(1);
/// port.emit(2);
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
/// stream.listen(move |item, index| sink.borrow_mut().push((*item, index))).unwrap();
/// port.emit(3);
///
/// assert_eq!(*seen.borrow(), vec![(1, 0), (2, 1), (3, 2)]);
/// ```
pub struct Stream<T, E = AsyncError> {
    core: Rc<RefCell<Core<T, E>>>,
}

impl<T, E> Clone for Stream<T, E> {
    fn clone(&self) -> Self {
        Stream {
            core: self.core.clone(),
        }
    }
}

/// Producer side of a [`Stream`].
pub struct StreamPort<T, E = AsyncError> {
    stream: Stream<T, E>,
}

impl<T, E> Clone for StreamPort<T, E> {
    fn clone(&self) -> Self {
        StreamPort {
            stream: self.stream.clone(),
        }
    }
}

impl<T, E> Stream<T, E>
where
    T: 'static,
    E: Clone + 'static,
{
    /// Creates an open stream together with the port that drives it.
    pub fn port() -> (StreamPort<T, E>, Stream<T, E>) {
        let stream = Stream {
            core: Rc::new(RefCell::new(Core {
                state: State::Open {
                    emitting: false,
                    observers: Observers::default(),
                },
                buffer: Some(Vec::new()),
                listened: false,
                queue: VecDeque::new(),
                delivering: false,
                delivered: 0,
                ending: None,
            })),
        };
        (
            StreamPort {
                stream: stream.clone(),
            },
            stream,
        )
    }

    pub fn status(&self) -> Status {
        match &self.core.borrow().state {
            State::Open { emitting: false, .. } => Status::Pending,
            State::Open { emitting: true, .. } => Status::Emitting,
            State::Completed => Status::Resolved,
            State::Rejected(_) => Status::Rejected,
            State::Cancelled => Status::Cancelled,
        }
    }

    pub fn is_listened(&self) -> bool {
        self.core.borrow().listened
    }

    /// Attaches the stream's consumer and flushes the buffered items to it.
    ///
    /// A stream can be listened to once; further `on_next` observers may be
    /// added afterwards and receive the items emitted from then on.
    pub fn listen(&self, callback: impl FnMut(&T, usize) + 'static) -> Result<(), StreamError> {
        {
            let mut core = self.core.borrow_mut();
            let core = &mut *core;
            if core.listened {
                tracing::debug!("listen called twice on the same stream");
                return Err(StreamError::AlreadyListened);
            }
            core.listened = true;
            if let State::Open { observers, .. } = &mut core.state {
                push(&mut observers.next, Box::new(callback) as NextObserver<T>);
            }
            if let Some(buffer) = core.buffer.take() {
                core.queue.extend(buffer);
            }
            if core.delivering || core.queue.is_empty() {
                return Ok(());
            }
            core.delivering = true;
        }
        self.drain();
        Ok(())
    }

    /// Adds an item observer without flushing the buffer.
    pub fn on_next(&self, callback: impl FnMut(&T, usize) + 'static) -> &Self {
        let mut core = self.core.borrow_mut();
        if let State::Open { observers, .. } = &mut core.state {
            push(&mut observers.next, Box::new(callback) as NextObserver<T>);
        }
        self
    }

    pub fn on_error(&self, callback: impl FnOnce(&E) + 'static) -> &Self {
        let error = {
            let mut core = self.core.borrow_mut();
            match &mut core.state {
                State::Open { observers, .. } => {
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

    pub fn on_cancel(&self, callback: impl FnOnce() + 'static) -> &Self {
        self.on_signal(callback, |observers| &mut observers.cancel, |state| {
            matches!(state, State::Cancelled)
        })
    }

    pub fn on_completed(&self, callback: impl FnOnce() + 'static) -> &Self {
        self.on_signal(callback, |observers| &mut observers.completed, |state| {
            matches!(state, State::Completed)
        })
    }

    pub fn on_end(&self, callback: impl FnOnce() + 'static) -> &Self {
        self.on_signal(callback, |observers| &mut observers.end, |_| true)
    }

    /// Cancels an open stream. Items already accepted are delivered first
    /// when the cancel comes from inside an `on_next` observer.
    pub fn cancel(&self) {
        self.finish(State::Cancelled);
    }

    /// Derives a stream of transformed items.
    ///
    /// `transform` receives each item with its position among the items this
    /// derivation has seen. A transform error is handed to `on_error` and
    /// only that item is dropped. Completion, failure and cancellation flow
    /// downstream; with `bind_cancel`, cancelling the derived stream also
    /// cancels this one.
    ///
    /// Takes the stream's `listen` when nobody has listened yet, otherwise
    /// attaches as an extra `on_next` observer.
    pub fn map_with<U, F, H>(&self, transform: F, on_error: H, bind_cancel: bool) -> Stream<U, E>
    where
        U: 'static,
        F: FnMut(&T, usize) -> Result<U, E> + 'static,
        H: FnMut(E) + 'static,
    {
        let (port, derived) = Stream::port();
        if bind_cancel {
            let upstream = self.downgrade();
            derived.on_cancel(move || {
                if let Some(core) = upstream.upgrade() {
                    Stream { core }.cancel();
                }
            });
        }

        let mut transform = transform;
        let mut on_error = on_error;
        let mut position = 0;
        let sink = port.clone();
        let next = move |item: &T, _: usize| {
            let index = position;
            position += 1;
            match transform(item, index) {
                Ok(mapped) => sink.emit(mapped),
                Err(error) => on_error(error),
            }
        };
        if self.is_listened() {
            self.on_next(next);
        } else if let Err(error) = self.listen(next) {
            tracing::warn!("map could not listen to its source: {}", error);
        }

        let completed = port.clone();
        self.on_completed(move || schedule::run(move || completed.complete()));
        let failed = port.clone();
        self.on_error(move |error| {
            let error = error.clone();
            schedule::run(move || failed.throw(error));
        });
        self.on_cancel(move || schedule::run(move || port.stream.cancel()));
        derived
    }

    /// Derives a stream of transformed items, dropping items whose transform
    /// fails. Cancelling the derived stream cancels this one.
    pub fn map<U, F>(&self, transform: F) -> Stream<U, E>
    where
        U: 'static,
        F: FnMut(&T, usize) -> Result<U, E> + 'static,
    {
        self.map_with(
            transform,
            |_| tracing::debug!("dropping item after failed transform"),
            true,
        )
    }

    fn downgrade(&self) -> Weak<RefCell<Core<T, E>>> {
        Rc::downgrade(&self.core)
    }

    fn on_signal(
        &self,
        callback: impl FnOnce() + 'static,
        list: impl FnOnce(&mut Observers<T, E>) -> &mut Option<Vec<SignalObserver>>,
        replay: impl FnOnce(&State<T, E>) -> bool,
    ) -> &Self {
        {
            let mut core = self.core.borrow_mut();
            match &mut core.state {
                State::Open { observers, .. } => {
                    push(list(observers), Box::new(callback) as SignalObserver);
                    return self;
                }
                state => {
                    if !replay(state) {
                        return self;
                    }
                }
            }
        }
        observer::invoke("on_signal", callback);
        self
    }

    fn emit(&self, item: T) {
        {
            let mut core = self.core.borrow_mut();
            let core = &mut *core;
            if core.ending.is_some() {
                return;
            }
            match &mut core.state {
                State::Open { emitting, .. } => *emitting = true,
                _ => return,
            }
            if let Some(buffer) = core.buffer.as_mut() {
                buffer.push(item);
                return;
            }
            core.queue.push_back(item);
            if core.delivering {
                return;
            }
            core.delivering = true;
        }
        self.drain();
    }

    // Items emitted from inside an `on_next` observer are queued and picked
    // up by the loop already running, so delivery order matches emit order.
    // A terminal event raised meanwhile is applied once the queue is empty.
    fn drain(&self) {
        let ending = loop {
            let (item, index, mut callbacks) = {
                let mut core = self.core.borrow_mut();
                let core = &mut *core;
                let State::Open { observers, .. } = &mut core.state else {
                    core.queue.clear();
                    core.delivering = false;
                    break None;
                };
                let Some(item) = core.queue.pop_front() else {
                    core.delivering = false;
                    break core.ending.take();
                };
                let index = core.delivered;
                core.delivered += 1;
                (item, index, observers.next.take().unwrap_or_default())
            };

            for callback in callbacks.iter_mut() {
                observer::invoke("on_next", || callback(&item, index));
            }

            let mut core = self.core.borrow_mut();
            if let State::Open { observers, .. } = &mut core.state {
                callbacks.extend(observers.next.take().into_iter().flatten());
                observers.next = Some(callbacks);
            }
        };
        if let Some(terminal) = ending {
            self.settle(terminal);
        }
    }

    fn complete(&self) {
        self.finish(State::Completed);
    }

    fn throw(&self, error: E) {
        self.finish(State::Rejected(error));
    }

    // The first terminal request wins; while items are being delivered it
    // waits for `drain` to empty the queue.
    fn finish(&self, terminal: State<T, E>) {
        {
            let mut core = self.core.borrow_mut();
            if !matches!(core.state, State::Open { .. }) || core.ending.is_some() {
                return;
            }
            if core.delivering {
                core.ending = Some(terminal);
                return;
            }
        }
        self.settle(terminal);
    }

    fn settle(&self, terminal: State<T, E>) {
        match terminal {
            State::Completed => {
                let Some(observers) = self.transition(State::Completed) else {
                    return;
                };
                let Observers { completed, end, .. } = observers;
                fire_signals("on_completed", completed);
                fire_signals("on_end", end);
            }
            State::Rejected(error) => {
                let Some(observers) = self.transition(State::Rejected(error.clone())) else {
                    return;
                };
                let Observers {
                    error: errors, end, ..
                } = observers;
                for callback in errors.into_iter().flatten() {
                    observer::invoke("on_error", || callback(&error));
                }
                fire_signals("on_end", end);
            }
            State::Cancelled => {
                let Some(observers) = self.transition(State::Cancelled) else {
                    return;
                };
                let Observers { cancel, end, .. } = observers;
                fire_signals("on_cancel", cancel);
                fire_signals("on_end", end);
            }
            State::Open { .. } => {}
        }
    }

    fn transition(&self, terminal: State<T, E>) -> Option<Observers<T, E>> {
        let mut core = self.core.borrow_mut();
        if !matches!(core.state, State::Open { .. }) {
            return None;
        }
        core.buffer = None;
        match mem::replace(&mut core.state, terminal) {
            State::Open { observers, .. } => Some(observers),
            _ => None,
        }
    }
}

impl<T, E> Stream<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Listens to the stream and gathers every delivered item into a future
    /// that resolves when the stream completes.
    ///
    /// The future follows the stream's failure and cancellation; cancelling
    /// the future cancels the stream.
    pub fn collect(&self) -> Result<Future<Vec<T>, E>, StreamError> {
        let items = Rc::new(RefCell::new(Vec::new()));
        let sink = items.clone();
        self.listen(move |item, _| sink.borrow_mut().push(item.clone()))?;

        let (port, future) = Future::port(true);
        let upstream = self.downgrade();
        future.on_cancel(move || {
            if let Some(core) = upstream.upgrade() {
                Stream { core }.cancel();
            }
        });

        let completed = port.clone();
        self.on_completed(move || completed.resolve(items.take()));
        let failed = port.clone();
        self.on_error(move |error| failed.reject(error.clone()));
        self.on_cancel(move || port.settle(Settle::Cancel));
        Ok(future)
    }
}

impl<T, E> fmt::Debug for Stream<T, E>
where
    T: 'static,
    E: Clone + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("status", &self.status())
            .field("listened", &self.is_listened())
            .finish()
    }
}

impl<T, E> StreamPort<T, E>
where
    T: 'static,
    E: Clone + 'static,
{
    /// Hands an item to the stream. Ignored once the stream has ended or
    /// an end has been requested.
    pub fn emit(&self, item: T) {
        self.stream.emit(item);
    }

    /// Ends the stream successfully.
    pub fn complete(&self) {
        self.stream.complete();
    }

    /// Ends the stream with an error.
    pub fn throw(&self, error: E) {
        self.stream.throw(error);
    }

    pub fn oncancel(&self, callback: impl FnOnce() + 'static) {
        self.stream.on_cancel(callback);
    }

    pub fn status(&self) -> Status {
        self.stream.status()
    }

    pub fn is_cancelled(&self) -> bool {
        self.stream.status().is_cancelled()
    }
}
