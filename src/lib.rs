//! Native Window Binding for Qliphoth
//!
//! This crate binds widgets to native windows owned by a single thread. Widget
//! code may ask for a window from any thread; every native call is marshaled
//! to the owner thread and its result, or its failure, is handed back.
//!
//! # Architecture
//!
//! ```text
//! any thread                owner thread
//! ──────────                ────────────
//! WindowFactory ──► Dispatcher ──► NativeBackend ──► native window
//!      │                                                 │
//!      └── WeakEventSink ◄── callbacks (mouse, keys, ..) ┘
//! ```
//!
//! Native windows only ever hold a [`WeakEventSink`], so a window never keeps
//! its widget alive.
//!
//! # Owner threads
//!
//! A backend with its own event loop creates the [`WindowFactory`] on the loop
//! thread and supplies an [`InvokeWaker`]; queued calls are drained when the
//! loop delivers `invoke_pending` to the factory's anchor window. Backends
//! without a loop run on an [`OwnerThread`]:
//!
//! ```no_run
//! use qliphoth_native_bind::{BindingConfig, HeadlessBackend, OwnerThread};
//!
//! let config = BindingConfig::from_env();
//! let owner = OwnerThread::spawn(&config, |config| Box::new(HeadlessBackend::new(config)))?;
//! assert!(owner.factory().invoke_required());
//! owner.shutdown()?;
//! # Ok::<(), qliphoth_native_bind::BindingError>(())
//! ```

// =============================================================================
// Modules
// =============================================================================

pub mod affinity;
pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod factory;
pub mod geometry;
pub mod headless;
pub mod owner;
pub mod sink;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use affinity::OwnerBound;
pub use backend::{DialogOptions, InvokeWaker, NativeBackend, WindowHandle, WindowKind};
pub use config::BindingConfig;
pub use dispatcher::{Dispatcher, PendingResult};
pub use error::{BackendError, BindingError, Result};
pub use event::{Keys, MouseButtons, MouseEvent, NativeEvent, WindowState};
pub use factory::{NativeSlot, Widget, WindowFactory};
pub use geometry::{Point, Rect, Size};
pub use headless::{Delivery, HeadlessBackend};
pub use owner::OwnerThread;
pub use sink::{CallbackError, EventSink, SharedSink, SinkResult, WeakEventSink};
