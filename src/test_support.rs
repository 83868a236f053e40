//! Recording backend and widget shared by the factory and owner-thread tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::backend::{DialogOptions, InvokeWaker, NativeBackend, WindowKind};
use crate::config::BindingConfig;
use crate::error::BackendError;
use crate::event::MouseEvent;
use crate::factory::{NativeSlot, Widget};
use crate::geometry::{Rect, Size};
use crate::headless::HeadlessBackend;
use crate::sink::{EventSink, SharedSink, SinkResult};

/// One creation request as the backend saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BackendCall {
    pub kind: WindowKind,
    pub thread: ThreadId,
    pub raw: Option<usize>,
}

/// Headless backend that records which thread issued each creation and can
/// be told to refuse them.
///
/// Copies handed out by [`boxed`](Self::boxed) also record the thread that
/// drops them.
#[derive(Clone)]
pub(crate) struct RecordingBackend {
    pub headless: HeadlessBackend,
    calls: Arc<Mutex<Vec<BackendCall>>>,
    refusal: Arc<Mutex<Option<String>>>,
    panic_next: Arc<AtomicBool>,
    wakes: Arc<AtomicUsize>,
    dropped_on: Arc<Mutex<Vec<ThreadId>>>,
    owned: bool,
}

impl RecordingBackend {
    pub fn new(config: &BindingConfig) -> Self {
        Self {
            headless: HeadlessBackend::new(config),
            calls: Arc::new(Mutex::new(Vec::new())),
            refusal: Arc::new(Mutex::new(None)),
            panic_next: Arc::new(AtomicBool::new(false)),
            wakes: Arc::new(AtomicUsize::new(0)),
            dropped_on: Arc::new(Mutex::new(Vec::new())),
            owned: false,
        }
    }

    pub fn boxed(&self) -> Box<dyn NativeBackend> {
        let mut backend = self.clone();
        backend.owned = true;
        Box::new(backend)
    }

    /// Threads that dropped a boxed copy.
    pub fn dropped_on(&self) -> Vec<ThreadId> {
        self.dropped_on.lock().clone()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Times the dispatcher has nudged the owner's loop.
    pub fn wakes(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }

    pub fn refuse_creations(&self, reason: &str) {
        *self.refusal.lock() = Some(reason.to_string());
    }

    /// Make the next creation panic instead of returning.
    pub fn panic_on_next_creation(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    fn record(
        &self,
        kind: WindowKind,
        create: impl FnOnce(&HeadlessBackend) -> Result<usize, BackendError>,
    ) -> Result<usize, BackendError> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("backend fault creating {kind:?}");
        }
        let refusal = self.refusal.lock().clone();
        let result = match refusal {
            Some(reason) => Err(BackendError::Refused(reason)),
            None => create(&self.headless),
        };
        self.calls.lock().push(BackendCall {
            kind,
            thread: thread::current().id(),
            raw: result.as_ref().ok().copied(),
        });
        result
    }
}

impl Drop for RecordingBackend {
    fn drop(&mut self) {
        if self.owned {
            self.dropped_on.lock().push(thread::current().id());
        }
    }
}

impl NativeBackend for RecordingBackend {
    fn create_anchor_window(&self, sink: SharedSink) -> Result<usize, BackendError> {
        self.record(WindowKind::Anchor, |h| h.create_anchor_window(sink))
    }

    fn create_child_window(
        &self,
        parent: Option<usize>,
        bounds: Rect,
        sink: SharedSink,
    ) -> Result<usize, BackendError> {
        self.record(WindowKind::Child, |h| h.create_child_window(parent, bounds, sink))
    }

    fn create_top_level_window(&self, size: Size, sink: SharedSink) -> Result<usize, BackendError> {
        self.record(WindowKind::TopLevel, |h| h.create_top_level_window(size, sink))
    }

    fn create_top_level_dialog(
        &self,
        size: Size,
        options: &DialogOptions,
        sink: SharedSink,
    ) -> Result<usize, BackendError> {
        self.record(WindowKind::Dialog, |h| h.create_top_level_dialog(size, options, sink))
    }

    fn create_popup_window(&self, bounds: Rect, sink: SharedSink) -> Result<usize, BackendError> {
        self.record(WindowKind::Popup, |h| h.create_popup_window(bounds, sink))
    }

    fn create_mdi_client(
        &self,
        parent: Option<usize>,
        bounds: Rect,
        sink: SharedSink,
    ) -> Result<usize, BackendError> {
        self.record(WindowKind::MdiClient, |h| h.create_mdi_client(parent, bounds, sink))
    }

    fn create_mdi_child_window(
        &self,
        mdi_client: usize,
        bounds: Rect,
        sink: SharedSink,
    ) -> Result<usize, BackendError> {
        self.record(WindowKind::MdiChild, |h| {
            h.create_mdi_child_window(mdi_client, bounds, sink)
        })
    }

    fn destroy_window(&self, raw: usize) -> Vec<usize> {
        self.headless.destroy_window(raw)
    }

    fn invoke_waker(&self, _anchor: usize) -> Option<InvokeWaker> {
        let wakes = Arc::clone(&self.wakes);
        Some(Arc::new(move || {
            wakes.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

type MouseHook = Box<dyn Fn(&MouseEvent) -> SinkResult + Send + Sync>;

/// Widget that logs the callbacks it receives.
#[derive(Default)]
pub(crate) struct TestWidget {
    slot: NativeSlot,
    events: Mutex<Vec<String>>,
    on_mouse_down: Mutex<Option<MouseHook>>,
    drops: Option<Arc<AtomicUsize>>,
}

impl TestWidget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn counting_drops(drops: &Arc<AtomicUsize>) -> Arc<Self> {
        let mut widget = Self::default();
        widget.drops = Some(Arc::clone(drops));
        Arc::new(widget)
    }

    pub fn on_mouse_down(&self, hook: impl Fn(&MouseEvent) -> SinkResult + Send + Sync + 'static) {
        *self.on_mouse_down.lock() = Some(Box::new(hook));
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl Drop for TestWidget {
    fn drop(&mut self) {
        if let Some(drops) = &self.drops {
            drops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl EventSink for TestWidget {
    fn mouse_down(&self, event: &MouseEvent) -> SinkResult {
        self.events.lock().push(format!("mouse_down({},{})", event.x, event.y));
        match self.on_mouse_down.lock().as_ref() {
            Some(hook) => hook(event),
            None => Ok(()),
        }
    }

    fn close(&self) -> SinkResult {
        self.events.lock().push("close".to_string());
        Ok(())
    }
}

impl Widget for TestWidget {
    fn native_slot(&self) -> &NativeSlot {
        &self.slot
    }
}
