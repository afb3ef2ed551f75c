//! Interop with the tokio runtime and the `futures` ecosystem.
//!
//! Everything that spawns must run inside a [`tokio::task::LocalSet`], since
//! futures and streams are single-threaded handles.

use crate::{Cancelled, Completion, Future, FuturePort, Stream, StreamError, StreamPort};
use pin_project::pin_project;
use std::future::IntoFuture;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

impl<T, E> Future<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Wraps a Rust future in a fresh non-cancelable `Future`.
    ///
    /// The wrapped future is driven with [`tokio::task::spawn_local`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a [`tokio::task::LocalSet`].
    pub fn from_future<F>(future: F) -> Self
    where
        F: std::future::Future<Output = Result<T, E>> + 'static,
    {
        let (port, wrapped) = Future::port(false);
        tokio::task::spawn_local(async move {
            port.settle(future.await);
        });
        wrapped
    }

    /// Bridges back to a Rust future resolving with this future's outcome.
    ///
    /// Cancellation surfaces as `Err(Cancelled.into())`.
    pub fn promisified(&self) -> Promised<T, E> {
        let (sender, receiver) = oneshot::channel();
        self.observe(move |completion| {
            let result = match completion {
                Completion::Resolved(value) => Ok(value),
                Completion::Rejected(error) => Err(error),
                Completion::Cancelled => return,
            };
            let _ = sender.send(result);
        });
        Promised { receiver }
    }

    /// Cancels the future once `duration` has elapsed, unless it settled
    /// first.
    ///
    /// # Panics
    ///
    /// Panics when called outside a [`tokio::task::LocalSet`].
    pub fn cancel_after(&self, duration: Duration) -> &Self {
        let target = self.downgrade();
        let timer = tokio::task::spawn_local(async move {
            tokio::time::sleep(duration).await;
            if let Some(future) = target.upgrade() {
                future.cancel();
            }
        });
        self.on_end(move || timer.abort());
        self
    }
}

impl<T, E> IntoFuture for Future<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Cancelled> + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = Promised<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        self.promisified()
    }
}

/// Rust future returned by [`Future::promisified`].
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Promised<T, E> {
    #[pin]
    receiver: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> std::future::Future for Promised<T, E>
where
    E: From<Cancelled>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match std::future::Future::poll(self.project().receiver, cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The sender is dropped without a value on cancellation.
            Poll::Ready(Err(_)) => Poll::Ready(Err(Cancelled.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> Stream<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Listens to the stream and exposes its items as a
    /// [`futures_core::Stream`].
    ///
    /// A failure is yielded as one `Err` item; completion and cancellation
    /// end the item stream.
    pub fn into_items(self) -> Result<Items<T, E>, StreamError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let next = sender.clone();
        self.listen(move |item, _| {
            let _ = next.send(Ok(item.clone()));
        })?;
        // Terminal settlement drops the observers and with them every sender,
        // which closes the channel.
        self.on_error(move |error| {
            let _ = sender.send(Err(error.clone()));
        });
        Ok(Items {
            receiver,
            stream: self,
        })
    }
}

/// Item stream returned by [`Stream::into_items`].
#[pin_project]
#[must_use = "streams do nothing unless polled"]
pub struct Items<T, E> {
    #[pin]
    receiver: mpsc::UnboundedReceiver<Result<T, E>>,
    stream: Stream<T, E>,
}

impl<T, E> Items<T, E>
where
    T: 'static,
    E: Clone + 'static,
{
    /// Cancels the underlying stream.
    pub fn cancel(&self) {
        self.stream.cancel();
    }
}

impl<T, E> futures_core::Stream for Items<T, E> {
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().receiver.get_mut().poll_recv(cx)
    }
}

impl<T, E> FuturePort<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Returns a token cancelled together with the future, for producers
    /// running tokio tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let trigger = token.clone();
        self.oncancel(move || trigger.cancel());
        token
    }
}

impl<T, E> StreamPort<T, E>
where
    T: 'static,
    E: Clone + 'static,
{
    /// Returns a token cancelled together with the stream.
    pub fn cancellation_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let trigger = token.clone();
        self.oncancel(move || trigger.cancel());
        token
    }
}
