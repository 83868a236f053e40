//! Headless Native Backend
//!
//! A windowless [`NativeBackend`] for tests and servers. It keeps the same
//! bookkeeping a real backend would (handles, parent links, retained sinks)
//! and lets callers feed simulated native events to a window.
//!
//! # Geometry
//!
//! Positions are clamped to `-limit..=limit` and sizes to `1..=limit`, the
//! range an X server accepts, with `limit` taken from
//! [`BindingConfig::coordinate_limit`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{DialogOptions, NativeBackend, WindowHandle, WindowKind};
use crate::config::BindingConfig;
use crate::error::BackendError;
use crate::event::NativeEvent;
use crate::geometry::{Rect, Size};
use crate::sink::{SharedSink, SinkResult};

// =============================================================================
// Core Types
// =============================================================================

struct HeadlessWindow {
    kind: WindowKind,
    bounds: Rect,
    parent: Option<usize>,
    children: Vec<usize>,
    dialog: Option<DialogOptions>,
    sink: SharedSink,
}

struct HeadlessState {
    windows: HashMap<usize, HeadlessWindow>,
    next_handle: usize,
}

/// Outcome of [`HeadlessBackend::deliver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Keyboard events report whether the sink consumed the key
    Handled(bool),
    NoSuchWindow,
}

/// Shared handle to a headless window table. Clones see the same windows.
#[derive(Clone)]
pub struct HeadlessBackend {
    state: Arc<Mutex<HeadlessState>>,
    window_limit: Option<usize>,
    coordinate_limit: i32,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn allocate_handle(state: &mut HeadlessState) -> usize {
    let h = state.next_handle;
    state.next_handle += 1;
    h
}

impl HeadlessState {
    /// Recursively unlink a window and its children, collecting what was removed
    fn destroy_window_tree(&mut self, raw: usize, removed: &mut Vec<(usize, HeadlessWindow)>) {
        let Some(mut window) = self.windows.remove(&raw) else {
            return;
        };

        if let Some(parent) = window.parent.and_then(|p| self.windows.get_mut(&p)) {
            parent.children.retain(|&child| child != raw);
        }

        for child in std::mem::take(&mut window.children) {
            self.destroy_window_tree(child, removed);
        }
        removed.push((raw, window));
    }
}

impl HeadlessBackend {
    pub fn new(config: &BindingConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(HeadlessState {
                windows: HashMap::new(),
                next_handle: 1,
            })),
            window_limit: config.window_limit,
            coordinate_limit: config.coordinate_limit.max(1),
        }
    }

    fn insert(
        &self,
        kind: WindowKind,
        parent: Option<usize>,
        bounds: Rect,
        dialog: Option<DialogOptions>,
        sink: SharedSink,
    ) -> Result<usize, BackendError> {
        let mut state = self.state.lock();

        if let Some(limit) = self.window_limit {
            if state.windows.len() >= limit {
                return Err(BackendError::ResourceExhausted { limit });
            }
        }
        if let Some(p) = parent {
            if !state.windows.contains_key(&p) {
                return Err(BackendError::UnknownParent { raw: p });
            }
        }

        let handle = allocate_handle(&mut state);
        state.windows.insert(
            handle,
            HeadlessWindow {
                kind,
                bounds,
                parent,
                children: Vec::new(),
                dialog,
                sink,
            },
        );
        if let Some(parent) = parent.and_then(|p| state.windows.get_mut(&p)) {
            parent.children.push(handle);
        }

        log::debug!("headless: created {:?} window {} at {:?}", kind, handle, bounds);
        Ok(handle)
    }

    /// Route a simulated native event to a window's retained sink.
    ///
    /// Must run on the owner thread, like any other native event delivery.
    /// The table lock is released before the sink runs, so handlers may
    /// create or destroy windows.
    pub fn deliver(&self, raw: usize, event: &NativeEvent) -> SinkResult<Delivery> {
        let sink = match self.state.lock().windows.get(&raw) {
            Some(window) => Arc::clone(&window.sink),
            None => {
                log::debug!("headless: dropping {:?} for unknown window {}", event, raw);
                return Ok(Delivery::NoSuchWindow);
            }
        };

        Ok(match event.dispatch_to(sink.as_ref())? {
            Some(handled) => Delivery::Handled(handled),
            None => Delivery::Delivered,
        })
    }

    pub fn window_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    pub fn contains(&self, raw: usize) -> bool {
        self.state.lock().windows.contains_key(&raw)
    }

    pub fn bounds(&self, raw: usize) -> Option<Rect> {
        self.state.lock().windows.get(&raw).map(|w| w.bounds)
    }

    pub fn handle(&self, raw: usize) -> Option<WindowHandle> {
        self.state
            .lock()
            .windows
            .get(&raw)
            .map(|w| WindowHandle::new(raw, w.kind))
    }

    pub fn parent(&self, raw: usize) -> Option<usize> {
        self.state.lock().windows.get(&raw).and_then(|w| w.parent)
    }

    pub fn children(&self, raw: usize) -> Vec<usize> {
        self.state
            .lock()
            .windows
            .get(&raw)
            .map(|w| w.children.clone())
            .unwrap_or_default()
    }

    pub fn dialog_options(&self, raw: usize) -> Option<DialogOptions> {
        self.state.lock().windows.get(&raw).and_then(|w| w.dialog)
    }
}

// =============================================================================
// NativeBackend
// =============================================================================

impl NativeBackend for HeadlessBackend {
    fn create_anchor_window(&self, sink: SharedSink) -> Result<usize, BackendError> {
        self.insert(WindowKind::Anchor, None, Rect::ZERO, None, sink)
    }

    fn create_child_window(
        &self,
        parent: Option<usize>,
        bounds: Rect,
        sink: SharedSink,
    ) -> Result<usize, BackendError> {
        let bounds = bounds.clamped(self.coordinate_limit);
        self.insert(WindowKind::Child, parent, bounds, None, sink)
    }

    fn create_top_level_window(&self, size: Size, sink: SharedSink) -> Result<usize, BackendError> {
        let size = size.clamped(self.coordinate_limit);
        let bounds = Rect::new(0, 0, size.width, size.height);
        self.insert(WindowKind::TopLevel, None, bounds, None, sink)
    }

    fn create_top_level_dialog(
        &self,
        size: Size,
        options: &DialogOptions,
        sink: SharedSink,
    ) -> Result<usize, BackendError> {
        let size = size.clamped(self.coordinate_limit);
        let bounds = Rect::new(0, 0, size.width, size.height);
        let owner = options.transient_for.map(|h| h.raw);
        self.insert(WindowKind::Dialog, owner, bounds, Some(*options), sink)
    }

    fn create_popup_window(&self, bounds: Rect, sink: SharedSink) -> Result<usize, BackendError> {
        let bounds = bounds.clamped(self.coordinate_limit);
        self.insert(WindowKind::Popup, None, bounds, None, sink)
    }

    fn create_mdi_client(
        &self,
        parent: Option<usize>,
        bounds: Rect,
        sink: SharedSink,
    ) -> Result<usize, BackendError> {
        let bounds = bounds.clamped(self.coordinate_limit);
        self.insert(WindowKind::MdiClient, parent, bounds, None, sink)
    }

    fn create_mdi_child_window(
        &self,
        mdi_client: usize,
        bounds: Rect,
        sink: SharedSink,
    ) -> Result<usize, BackendError> {
        let bounds = bounds.clamped(self.coordinate_limit);
        self.insert(WindowKind::MdiChild, Some(mdi_client), bounds, None, sink)
    }

    fn destroy_window(&self, raw: usize) -> Vec<usize> {
        let removed = {
            let mut state = self.state.lock();
            let mut removed = Vec::new();
            state.destroy_window_tree(raw, &mut removed);
            log::debug!(
                "headless: destroyed {} window(s) under {} ({} left)",
                removed.len(),
                raw,
                state.windows.len()
            );
            removed
        };
        // Sinks are released after the lock so their drops cannot re-enter it.
        removed.into_iter().map(|(raw, _window)| raw).collect()
    }
}
