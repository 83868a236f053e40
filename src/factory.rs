//! Window Factory
//!
//! Materializes native windows for widgets. Any thread may ask for a window;
//! the backend call itself always runs on the owner thread, and the caller
//! gets back either the handle or the exact error the backend produced.
//!
//! # Binding a widget
//!
//! ```text
//! caller thread                              owner thread
//! ─────────────                              ────────────
//! proxy = WeakEventSink::new(widget)
//! create_*_window(widget, ..) ──marshal──►  slot: Vacant → Materializing
//!                                           backend.create_*(.., proxy)
//!                                           slot: → Bound(handle) | Vacant
//! Ok(handle) / Err(e)  ◄──────────────────────┘
//! ```
//!
//! The backend retains only the proxy, so a window never keeps its widget
//! alive. The factory itself keeps a weak reference per window so that
//! destroying a parent can unbind the widgets of its descendants.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::affinity::OwnerBound;
use crate::backend::{DialogOptions, NativeBackend, WindowHandle, WindowKind};
use crate::dispatcher::{Dispatcher, PendingResult, WeakDispatcher};
use crate::error::{BackendError, BindingError, Result};
use crate::geometry::{Rect, Size};
use crate::sink::{EventSink, SharedSink, SinkResult, WeakEventSink};

// =============================================================================
// Widgets
// =============================================================================

/// Something that can be bound to a native window.
pub trait Widget: EventSink + 'static {
    fn native_slot(&self) -> &NativeSlot;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SlotState {
    #[default]
    Vacant,
    Materializing(WindowKind),
    Bound(WindowHandle),
}

/// Records which native window, if any, a widget is bound to.
#[derive(Debug, Default)]
pub struct NativeSlot {
    state: Mutex<SlotState>,
}

impl NativeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<WindowHandle> {
        match *self.state.lock() {
            SlotState::Bound(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_materialized(&self) -> bool {
        self.handle().is_some()
    }

    /// Reserve the slot for one materialization. The reservation is undone
    /// when the claim is dropped unbound, including during a panic.
    fn claim(&self, kind: WindowKind) -> Result<SlotClaim<'_>> {
        let mut state = self.state.lock();
        match *state {
            SlotState::Vacant => {
                *state = SlotState::Materializing(kind);
                Ok(SlotClaim { slot: self, bound: false })
            }
            SlotState::Materializing(kind) => Err(BindingError::AlreadyMaterialized { kind }),
            SlotState::Bound(handle) => Err(BindingError::AlreadyMaterialized { kind: handle.kind }),
        }
    }

    fn bind(&self, handle: WindowHandle) {
        *self.state.lock() = SlotState::Bound(handle);
    }

    fn release(&self) {
        *self.state.lock() = SlotState::Vacant;
    }

    /// Unbind only if still bound to `raw`.
    fn release_handle(&self, raw: usize) -> bool {
        let mut state = self.state.lock();
        match *state {
            SlotState::Bound(handle) if handle.raw == raw => {
                *state = SlotState::Vacant;
                true
            }
            _ => false,
        }
    }

    fn take(&self) -> Option<WindowHandle> {
        let mut state = self.state.lock();
        match *state {
            SlotState::Bound(handle) => {
                *state = SlotState::Vacant;
                Some(handle)
            }
            _ => None,
        }
    }
}

struct SlotClaim<'a> {
    slot: &'a NativeSlot,
    bound: bool,
}

impl SlotClaim<'_> {
    fn bind(mut self, handle: WindowHandle) {
        self.slot.bind(handle);
        self.bound = true;
    }
}

impl Drop for SlotClaim<'_> {
    fn drop(&mut self) {
        if !self.bound {
            self.slot.release();
        }
    }
}

// =============================================================================
// Owner-side state
// =============================================================================

/// Backend plus the widgets bound to its windows, keyed by raw handle.
struct OwnerState {
    backend: OwnerBound<Box<dyn NativeBackend>>,
    widgets: Mutex<HashMap<usize, Weak<dyn Widget>>>,
}

impl OwnerState {
    fn track(&self, raw: usize, widget: Weak<dyn Widget>) {
        self.widgets.lock().insert(raw, widget);
    }

    /// Destroy `raw` and its descendants, then unbind every widget that was
    /// bound to one of them. Returns how many windows went away.
    fn destroy(&self, raw: usize) -> Result<usize> {
        let removed = self.backend.get()?.destroy_window(raw);
        let unbound: Vec<_> = {
            let mut widgets = self.widgets.lock();
            removed
                .iter()
                .filter_map(|raw| widgets.remove(raw).map(|widget| (*raw, widget)))
                .collect()
        };
        // Upgraded widgets may drop here, so the map is already unlocked.
        release_slots(unbound);
        Ok(removed.len())
    }
}

fn release_slots(unbound: Vec<(usize, Weak<dyn Widget>)>) {
    for (raw, widget) in unbound {
        if let Some(widget) = widget.upgrade() {
            widget.native_slot().release_handle(raw);
        }
    }
}

// =============================================================================
// Anchor
// =============================================================================

/// Sink of the factory's own anchor window. Drains cross-thread calls when
/// the native loop reports them.
struct AnchorSink {
    dispatcher: WeakDispatcher,
}

impl EventSink for AnchorSink {
    fn invoke_pending(&self) -> SinkResult {
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.dispatch_pending()?;
        }
        Ok(())
    }
}

// =============================================================================
// Factory
// =============================================================================

static GLOBAL: OnceCell<Arc<WindowFactory>> = OnceCell::new();

pub struct WindowFactory {
    dispatcher: Dispatcher,
    state: Arc<OwnerState>,
    anchor: WindowHandle,
}

impl WindowFactory {
    /// Bind `backend` to the calling thread, which becomes the owner thread.
    ///
    /// Creates the anchor window and hooks the backend's waker, if it has
    /// one, into the dispatcher.
    pub fn new(backend: Box<dyn NativeBackend>) -> Result<Arc<Self>> {
        let dispatcher = Dispatcher::for_current_thread();
        let anchor_sink: SharedSink = Arc::new(AnchorSink {
            dispatcher: dispatcher.downgrade(),
        });

        let raw = backend
            .create_anchor_window(anchor_sink)
            .map_err(|source| BindingError::BackendCreationFailure {
                kind: WindowKind::Anchor,
                source,
            })?;
        dispatcher.set_waker(backend.invoke_waker(raw));
        log::debug!("Window factory bound to {:?} (anchor {})", dispatcher.owner(), raw);

        Ok(Arc::new(Self {
            dispatcher,
            state: Arc::new(OwnerState {
                backend: OwnerBound::new(backend),
                widgets: Mutex::new(HashMap::new()),
            }),
            anchor: WindowHandle::new(raw, WindowKind::Anchor),
        }))
    }

    /// Make `factory` the process-wide instance. Only the first call wins.
    pub fn install_global(factory: &Arc<Self>) -> Result<()> {
        GLOBAL
            .set(Arc::clone(factory))
            .map_err(|_| BindingError::AlreadyInstalled)
    }

    pub fn global() -> Result<Arc<Self>> {
        GLOBAL.get().cloned().ok_or(BindingError::NotInstalled)
    }

    pub fn anchor(&self) -> WindowHandle {
        self.anchor
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn invoke_required(&self) -> bool {
        self.dispatcher.invoke_required()
    }

    pub fn invoke<F, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.dispatcher.invoke(op)
    }

    pub fn begin_invoke<F, T>(&self, op: F) -> Result<PendingResult<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.dispatcher.begin_invoke(op)
    }

    /// Drain queued calls. For owner threads driving their own native loop.
    pub fn dispatch_pending(&self) -> Result<usize> {
        self.dispatcher.dispatch_pending()
    }

    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
    }

    /// Shut down and release the backend on the owner thread.
    ///
    /// Destroys every window the factory still knows about, the anchor
    /// included, unbinds their widgets and drops the backend. Later calls
    /// are no-ops. Fails off the owner thread, or while the backend is
    /// borrowed further up the owner's stack.
    pub fn dispose(&self) -> Result<()> {
        let Some(backend) = self.state.backend.take()? else {
            return Ok(());
        };
        self.dispatcher.shutdown();

        let unbound: Vec<_> = self.state.widgets.lock().drain().collect();
        for (raw, _) in &unbound {
            backend.destroy_window(*raw);
        }
        backend.destroy_window(self.anchor.raw);
        release_slots(unbound);
        drop(backend);

        log::debug!("Window factory on {:?} disposed", self.dispatcher.owner());
        Ok(())
    }

    /// Run `op` against the backend on the owner thread.
    pub fn with_backend<F, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&dyn NativeBackend) -> T + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(&self.state);
        self.dispatcher
            .invoke(move || state.backend.get().map(|backend| op(&**backend)))?
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// `parent == None` leaves the window unparented until it is reparented.
    pub fn create_child_window<W: Widget>(
        &self,
        widget: &Arc<W>,
        parent: Option<WindowHandle>,
        bounds: Rect,
    ) -> Result<WindowHandle> {
        let parent = parent.map(|p| p.raw);
        self.materialize(
            widget,
            WindowKind::Child,
            move |backend, sink| backend.create_child_window(parent, bounds, sink),
        )
    }

    pub fn create_top_level_window<W: Widget>(
        &self,
        widget: &Arc<W>,
        size: Size,
    ) -> Result<WindowHandle> {
        self.materialize(
            widget,
            WindowKind::TopLevel,
            move |backend, sink| backend.create_top_level_window(size, sink),
        )
    }

    /// `options.transient_for`, when set, must be a top-level window or dialog.
    pub fn create_top_level_dialog<W: Widget>(
        &self,
        widget: &Arc<W>,
        size: Size,
        options: DialogOptions,
    ) -> Result<WindowHandle> {
        if let Some(owner) = options.transient_for {
            if !owner.is_top_level() {
                return Err(BindingError::InvalidParent {
                    expected: WindowKind::TopLevel,
                    found: owner.kind,
                });
            }
        }
        self.materialize(
            widget,
            WindowKind::Dialog,
            move |backend, sink| backend.create_top_level_dialog(size, &options, sink),
        )
    }

    pub fn create_popup_window<W: Widget>(
        &self,
        widget: &Arc<W>,
        bounds: Rect,
    ) -> Result<WindowHandle> {
        self.materialize(
            widget,
            WindowKind::Popup,
            move |backend, sink| backend.create_popup_window(bounds, sink),
        )
    }

    pub fn create_mdi_client<W: Widget>(
        &self,
        widget: &Arc<W>,
        parent: Option<WindowHandle>,
        bounds: Rect,
    ) -> Result<WindowHandle> {
        let parent = parent.map(|p| p.raw);
        self.materialize(
            widget,
            WindowKind::MdiClient,
            move |backend, sink| backend.create_mdi_client(parent, bounds, sink),
        )
    }

    pub fn create_mdi_child_window<W: Widget>(
        &self,
        widget: &Arc<W>,
        mdi_client: WindowHandle,
        bounds: Rect,
    ) -> Result<WindowHandle> {
        if mdi_client.kind != WindowKind::MdiClient {
            return Err(BindingError::InvalidParent {
                expected: WindowKind::MdiClient,
                found: mdi_client.kind,
            });
        }
        let client = mdi_client.raw;
        self.materialize(
            widget,
            WindowKind::MdiChild,
            move |backend, sink| backend.create_mdi_child_window(client, bounds, sink),
        )
    }

    fn materialize<W, F>(&self, widget: &Arc<W>, kind: WindowKind, create: F) -> Result<WindowHandle>
    where
        W: Widget,
        F: FnOnce(&dyn NativeBackend, SharedSink) -> std::result::Result<usize, BackendError>
            + Send
            + 'static,
    {
        let marshaled = self.dispatcher.invoke_required();
        let proxy: SharedSink = Arc::new(WeakEventSink::new(widget));
        let target = Arc::clone(widget);
        let state = Arc::clone(&self.state);

        let handle = self.dispatcher.invoke(move || -> Result<WindowHandle> {
            let backend = state.backend.get()?;
            let claim = target.native_slot().claim(kind)?;

            let raw = create(&**backend, proxy)
                .map_err(|source| BindingError::BackendCreationFailure { kind, source })?;
            drop(backend);

            let handle = WindowHandle::new(raw, kind);
            claim.bind(handle);
            let weak: Weak<dyn Widget> = Arc::downgrade(&target) as Weak<dyn Widget>;
            state.track(raw, weak);
            Ok(handle)
        })??;

        log::debug!(
            "Materialized {:?} window {} ({})",
            kind,
            handle.raw,
            if marshaled { "marshaled" } else { "direct" }
        );
        Ok(handle)
    }

    // -------------------------------------------------------------------------
    // Destruction
    // -------------------------------------------------------------------------

    /// Destroy the widget's native window, if it has one.
    ///
    /// Native children go with it, and widgets bound to them become vacant.
    /// Returns `false` when the widget was not bound. Takes a plain reference
    /// so it can be called from a widget's `Drop`.
    pub fn destroy_window<W: Widget + ?Sized>(&self, widget: &W) -> Result<bool> {
        let slot = widget.native_slot();
        let Some(handle) = slot.take() else {
            return Ok(false);
        };

        let state = Arc::clone(&self.state);
        let destroyed = self.dispatcher.invoke(move || state.destroy(handle.raw));
        match destroyed {
            Ok(Ok(removed)) => {
                log::debug!(
                    "Destroyed {:?} window {} ({} windows removed)",
                    handle.kind,
                    handle.raw,
                    removed
                );
                Ok(true)
            }
            Ok(Err(e)) | Err(e) => {
                slot.bind(handle);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for WindowFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowFactory")
            .field("owner", &self.dispatcher.owner())
            .field("anchor", &self.anchor)
            .finish()
    }
}
