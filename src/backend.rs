//! Contract of the thread-affine native windowing backend.
//!
//! A backend is only ever called on the thread that created it. It is stored
//! behind [`OwnerBound`](crate::affinity::OwnerBound) by the window factory, so
//! implementations do not need to be `Send` or `Sync`. All methods take
//! `&self` because a creation call may re-enter the factory through a sink
//! callback; backends keep their mutable state behind interior mutability.

use std::sync::Arc;

use crate::error::BackendError;
use crate::geometry::{Rect, Size};
use crate::sink::SharedSink;

/// Wakes the owner thread's event loop so it delivers
/// [`EventSink::invoke_pending`](crate::sink::EventSink::invoke_pending) to the
/// anchor window. Must be callable from any thread.
pub type InvokeWaker = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// Zero-sized window that keeps the backend context alive on the owner thread
    Anchor,
    Child,
    TopLevel,
    Dialog,
    Popup,
    MdiClient,
    MdiChild,
}

/// Opaque native window, tagged with the kind it was created as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle {
    pub raw: usize,
    pub kind: WindowKind,
}

impl WindowHandle {
    pub const fn new(raw: usize, kind: WindowKind) -> Self {
        Self { raw, kind }
    }

    pub fn is_top_level(&self) -> bool {
        matches!(self.kind, WindowKind::TopLevel | WindowKind::Dialog)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DialogOptions {
    pub modal: bool,
    pub resizable: bool,
    /// Top-level window the dialog stays above
    pub transient_for: Option<WindowHandle>,
}

pub trait NativeBackend {
    /// Create the factory's anchor window. Defaults to a zero-sized,
    /// unparented child window.
    fn create_anchor_window(&self, sink: SharedSink) -> Result<usize, BackendError> {
        self.create_child_window(None, Rect::ZERO, sink)
    }

    /// `parent == None` creates the child under a placeholder until it is
    /// reparented.
    fn create_child_window(
        &self,
        parent: Option<usize>,
        bounds: Rect,
        sink: SharedSink,
    ) -> Result<usize, BackendError>;

    fn create_top_level_window(&self, size: Size, sink: SharedSink) -> Result<usize, BackendError>;

    /// Backends without dialog shells fall back to a plain top-level window.
    fn create_top_level_dialog(
        &self,
        size: Size,
        _options: &DialogOptions,
        sink: SharedSink,
    ) -> Result<usize, BackendError> {
        self.create_top_level_window(size, sink)
    }

    /// Borderless window that grabs input while mapped (menus, drop-downs).
    fn create_popup_window(&self, bounds: Rect, sink: SharedSink) -> Result<usize, BackendError>;

    fn create_mdi_client(
        &self,
        parent: Option<usize>,
        bounds: Rect,
        sink: SharedSink,
    ) -> Result<usize, BackendError>;

    fn create_mdi_child_window(
        &self,
        mdi_client: usize,
        bounds: Rect,
        sink: SharedSink,
    ) -> Result<usize, BackendError>;

    /// Destroy a window together with its descendants and release their
    /// sinks. Returns every raw handle that was removed, `raw` included, so
    /// the widgets bound to them can be unbound. Unknown handles remove
    /// nothing.
    fn destroy_window(&self, raw: usize) -> Vec<usize>;

    /// Waker used to pull queued cross-thread calls into the native loop.
    /// `None` means the owner thread drains the dispatcher itself.
    fn invoke_waker(&self, _anchor: usize) -> Option<InvokeWaker> {
        None
    }
}
