/// Observable state of a future or stream.
///
/// `Emitting` is only ever reported by streams that have accepted at least
/// one item and have not yet reached a terminal state.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Status {
    Pending,
    Emitting,
    Resolved,
    Rejected,
    Cancelled,
}

impl Status {
    /// Returns true once no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Resolved | Status::Rejected | Status::Cancelled)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Status::Pending | Status::Emitting)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Status::Resolved)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Status::Rejected)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Status::Cancelled)
    }
}

/// Terminal outcome of a future.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Completion<T, E> {
    Resolved(T),
    Rejected(E),
    Cancelled,
}

impl<T, E> Completion<T, E> {
    pub fn status(&self) -> Status {
        match self {
            Completion::Resolved(_) => Status::Resolved,
            Completion::Rejected(_) => Status::Rejected,
            Completion::Cancelled => Status::Cancelled,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Completion::Resolved(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Completion::Rejected(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled)
    }

    pub fn value_ref(&self) -> Option<&T> {
        match self {
            Completion::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Completion::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(self) -> Option<E> {
        match self {
            Completion::Rejected(error) => Some(error),
            _ => None,
        }
    }
}

impl<T, E> From<Result<T, E>> for Completion<T, E> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(value) => Completion::Resolved(value),
            Err(error) => Completion::Rejected(error),
        }
    }
}
