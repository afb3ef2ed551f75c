use crate::future::WeakFuture;
use crate::{Completion, Future, Settle};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn cancel_all<T, E>(futures: &[WeakFuture<T, E>])
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    for future in futures.iter().filter_map(WeakFuture::upgrade) {
        future.cancel();
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Waits for every future and resolves with their values in input order.
    ///
    /// The first rejection rejects the aggregate with that same error and
    /// cancels all the other futures. A cancelled input cancels the
    /// aggregate. With `bind_cancel`, cancelling the aggregate cancels every
    /// input.
    pub fn all<I>(futures: I, bind_cancel: bool) -> Future<Vec<T>, E>
    where
        I: IntoIterator<Item = Future<T, E>>,
    {
        let futures: Vec<Future<T, E>> = futures.into_iter().collect();
        let (port, aggregate) = Future::port(true);
        if futures.is_empty() {
            port.resolve(Vec::new());
            return aggregate;
        }

        let siblings: Rc<[WeakFuture<T, E>]> = futures.iter().map(Future::downgrade).collect();
        if bind_cancel {
            let siblings = siblings.clone();
            aggregate.on_cancel(move || cancel_all(&siblings));
        }

        let values = Rc::new(RefCell::new(vec![None; futures.len()]));
        let remaining = Rc::new(Cell::new(futures.len()));
        for (index, future) in futures.iter().enumerate() {
            let port = port.clone();
            let values = values.clone();
            let remaining = remaining.clone();
            let siblings = siblings.clone();
            future.observe(move |completion| match completion {
                Completion::Resolved(value) => {
                    values.borrow_mut()[index] = Some(value);
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        let collected: Vec<T> = values.borrow_mut().drain(..).flatten().collect();
                        port.resolve(collected);
                    }
                }
                Completion::Rejected(error) => {
                    port.reject(error);
                    cancel_all(&siblings);
                }
                Completion::Cancelled => port.settle(Settle::Cancel),
            });
        }
        aggregate
    }

    /// Waits for every future to settle, whatever the outcome, and resolves
    /// with the outcomes in input order. Never rejects.
    ///
    /// With `bind_cancel`, cancelling the aggregate cancels every input.
    pub fn all_completed<I>(futures: I, bind_cancel: bool) -> Future<Vec<Completion<T, E>>, E>
    where
        I: IntoIterator<Item = Future<T, E>>,
    {
        let futures: Vec<Future<T, E>> = futures.into_iter().collect();
        let (port, aggregate) = Future::port(true);
        if futures.is_empty() {
            port.resolve(Vec::new());
            return aggregate;
        }

        if bind_cancel {
            let siblings: Vec<WeakFuture<T, E>> = futures.iter().map(Future::downgrade).collect();
            aggregate.on_cancel(move || cancel_all(&siblings));
        }

        let outcomes = Rc::new(RefCell::new(vec![None; futures.len()]));
        let remaining = Rc::new(Cell::new(futures.len()));
        for (index, future) in futures.iter().enumerate() {
            let port = port.clone();
            let outcomes = outcomes.clone();
            let remaining = remaining.clone();
            future.observe(move |completion| {
                outcomes.borrow_mut()[index] = Some(completion);
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    let collected: Vec<Completion<T, E>> =
                        outcomes.borrow_mut().drain(..).flatten().collect();
                    port.resolve(collected);
                }
            });
        }
        aggregate
    }
}
