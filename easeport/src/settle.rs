use crate::{Completion, Future};

/// What a producer or a combinator handler settles a future with.
///
/// `Adopt` makes the target follow another future's eventual outcome.
pub enum Settle<T, E> {
    Resolve(T),
    Reject(E),
    Cancel,
    Adopt(Future<T, E>),
}

impl<T, E> From<Completion<T, E>> for Settle<T, E> {
    fn from(value: Completion<T, E>) -> Self {
        match value {
            Completion::Resolved(value) => Settle::Resolve(value),
            Completion::Rejected(error) => Settle::Reject(error),
            Completion::Cancelled => Settle::Cancel,
        }
    }
}

/// Conversion into a [`Settle`], implemented for everything a handler may
/// hand back: a plain `Result`, a future to adopt, or an explicit `Settle`.
pub trait IntoSettle<T, E> {
    fn into_settle(self) -> Settle<T, E>;
}

impl<T, E> IntoSettle<T, E> for Settle<T, E> {
    fn into_settle(self) -> Settle<T, E> {
        self
    }
}

impl<T, E> IntoSettle<T, E> for Result<T, E> {
    fn into_settle(self) -> Settle<T, E> {
        match self {
            Ok(value) => Settle::Resolve(value),
            Err(error) => Settle::Reject(error),
        }
    }
}

impl<T, E> IntoSettle<T, E> for Future<T, E> {
    fn into_settle(self) -> Settle<T, E> {
        Settle::Adopt(self)
    }
}

impl<T, E> IntoSettle<T, E> for Completion<T, E> {
    fn into_settle(self) -> Settle<T, E> {
        self.into()
    }
}

impl<T, E> std::fmt::Debug for Settle<T, E>
where
    T: std::fmt::Debug,
    E: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Settle::Resolve(value) => f.debug_tuple("Resolve").field(value).finish(),
            Settle::Reject(error) => f.debug_tuple("Reject").field(error).finish(),
            Settle::Cancel => f.write_str("Cancel"),
            Settle::Adopt(_) => f.write_str("Adopt(..)"),
        }
    }
}
