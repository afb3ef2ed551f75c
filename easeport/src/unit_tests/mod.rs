use std::cell::RefCell;
use std::rc::Rc;

mod stream_test;

/// Shared log of everything the observers under test saw.
pub struct Recorder<V> {
    events: Rc<RefCell<Vec<V>>>,
}

impl<V> Clone for Recorder<V> {
    fn clone(&self) -> Self {
        Recorder {
            events: self.events.clone(),
        }
    }
}

impl<V: Clone> Recorder<V> {
    pub fn new() -> Self {
        Recorder {
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn push(&self, event: V) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<V> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }
}
