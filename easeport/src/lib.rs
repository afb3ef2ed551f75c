mod aggregate;
mod async_error;
mod bridge;
mod future;
mod observer;
mod schedule;
mod settle;
mod status;
mod stream;

pub use async_error::*;
pub use bridge::{Items, Promised};
pub use future::{Future, FuturePort};
pub use observer::{is_debug, set_debug};
pub use settle::*;
pub use status::*;
pub use stream::{Stream, StreamPort};

#[cfg(test)]
mod unit_tests;
