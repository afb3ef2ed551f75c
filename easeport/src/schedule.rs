//! Trampoline for combinator glue.
//!
//! Settling a derived future from inside the settlement of its source would
//! nest one stack frame per link of a chain. Glue jobs are instead queued
//! while another job is running and drained in a loop by the outermost one,
//! so every chain settles before the outermost call returns and the stack
//! depth stays constant.

use crate::observer;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type Job = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Job>> = RefCell::new(VecDeque::new());
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|draining| draining.set(false));
    }
}

pub(crate) fn run(job: impl FnOnce() + 'static) {
    if DRAINING.with(|draining| draining.get()) {
        QUEUE.with(|queue| queue.borrow_mut().push_back(Box::new(job)));
        return;
    }

    DRAINING.with(|draining| draining.set(true));
    let _guard = DrainGuard;

    observer::invoke("glue", job);
    while let Some(next) = QUEUE.with(|queue| queue.borrow_mut().pop_front()) {
        observer::invoke("glue", next);
    }
}
