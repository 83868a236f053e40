//! Error types for the binding layer.
//!
//! Every failure produced here crosses the owner-thread marshal boundary
//! unchanged: the caller on the requesting thread sees the same variant the
//! owner thread produced.

use thiserror::Error;

use crate::backend::WindowKind;

/// Failure reported by a [`NativeBackend`](crate::backend::NativeBackend)
/// when it refuses to create a window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("native window limit of {limit} reached")]
    ResourceExhausted { limit: usize },

    #[error("parent window {raw} does not exist")]
    UnknownParent { raw: usize },

    #[error("backend refused the request: {0}")]
    Refused(String),
}

#[derive(Error, Debug)]
pub enum BindingError {
    /// The backend refused to create the handle. Not retried.
    #[error("failed to create {kind:?} window: {source}")]
    BackendCreationFailure {
        kind: WindowKind,
        #[source]
        source: BackendError,
    },

    /// The owner thread's dispatch loop is gone (shutdown in progress).
    #[error("owner thread dispatcher is unavailable")]
    DispatcherUnavailable,

    #[error("widget already has a {kind:?} window")]
    AlreadyMaterialized { kind: WindowKind },

    #[error("expected a {expected:?} parent window, got {found:?}")]
    InvalidParent {
        expected: WindowKind,
        found: WindowKind,
    },

    #[error("operation must run on the owner thread")]
    NotOwnerThread,

    /// Owner-thread state was already released by `dispose`.
    #[error("owner-thread state has been disposed")]
    Disposed,

    /// Owner-thread state is borrowed further up the owner's call stack.
    #[error("owner-thread state is in use")]
    InUse,

    #[error("no window factory has been installed")]
    NotInstalled,

    #[error("a window factory is already installed")]
    AlreadyInstalled,

    #[error("failed to start the owner thread: {0}")]
    OwnerThreadSpawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BindingError>;
