//! Event-sink capability and the weak proxy handed to native backends.
//!
//! The backend retains a sink for as long as the native handle exists, which
//! may be longer than the widget stays reachable. Backends therefore never see
//! the widget itself, only a [`WeakEventSink`] that resolves the widget on each
//! callback and turns into a no-op once it is gone.

use std::error::Error;
use std::sync::{Arc, Weak};

use crate::backend::WindowHandle;
use crate::event::{Keys, MouseEvent, WindowState};
use crate::geometry::{Point, Rect, Size};

/// Error raised by a widget while handling a native event. Propagated as-is.
pub type CallbackError = Box<dyn Error + Send + Sync>;

pub type SinkResult<T = ()> = Result<T, CallbackError>;

/// Sink as retained by a backend
pub type SharedSink = Arc<dyn EventSink>;

/// Callback operations a native window invokes on its owner.
///
/// Every operation defaults to the neutral result: nothing happens and keys
/// are reported as not handled.
pub trait EventSink: Send + Sync {
    fn expose(&self, _area: Rect) -> SinkResult {
        Ok(())
    }

    /// A cross-thread call was posted to this window and should be drained.
    fn invoke_pending(&self) -> SinkResult {
        Ok(())
    }

    fn mouse_enter(&self) -> SinkResult {
        Ok(())
    }

    fn mouse_leave(&self) -> SinkResult {
        Ok(())
    }

    fn focus_enter(&self) -> SinkResult {
        Ok(())
    }

    fn focus_leave(&self) -> SinkResult {
        Ok(())
    }

    /// Top-level windows only.
    fn primary_focus_enter(&self) -> SinkResult {
        Ok(())
    }

    /// Top-level windows only.
    fn primary_focus_leave(&self) -> SinkResult {
        Ok(())
    }

    fn key_down(&self, _keys: Keys) -> SinkResult<bool> {
        Ok(false)
    }

    fn key_up(&self, _keys: Keys) -> SinkResult<bool> {
        Ok(false)
    }

    fn key_char(&self, _ch: char) -> SinkResult<bool> {
        Ok(false)
    }

    fn mouse_down(&self, _event: &MouseEvent) -> SinkResult {
        Ok(())
    }

    fn mouse_up(&self, _event: &MouseEvent) -> SinkResult {
        Ok(())
    }

    fn mouse_hover(&self, _event: &MouseEvent) -> SinkResult {
        Ok(())
    }

    fn mouse_move(&self, _event: &MouseEvent) -> SinkResult {
        Ok(())
    }

    fn mouse_wheel(&self, _event: &MouseEvent) -> SinkResult {
        Ok(())
    }

    /// The window was moved by something other than the application.
    fn external_move(&self, _origin: Point) -> SinkResult {
        Ok(())
    }

    /// The window was resized by something other than the application.
    fn external_resize(&self, _size: Size) -> SinkResult {
        Ok(())
    }

    fn close(&self) -> SinkResult {
        Ok(())
    }

    fn help(&self) -> SinkResult {
        Ok(())
    }

    fn state_changed(&self, _state: WindowState) -> SinkResult {
        Ok(())
    }

    /// `child` is the MDI child that became active, if any.
    fn mdi_activate(&self, _child: Option<WindowHandle>) -> SinkResult {
        Ok(())
    }
}

// =============================================================================
// Weak Proxy
// =============================================================================

/// Non-owning sink that forwards to a widget while it is still alive.
pub struct WeakEventSink<W: ?Sized> {
    target: Weak<W>,
}

impl<W: EventSink + ?Sized> WeakEventSink<W> {
    pub fn new(target: &Arc<W>) -> Self {
        Self {
            target: Arc::downgrade(target),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// Resolve once and use that resolution for the whole callback.
    fn forward<R>(&self, neutral: R, call: impl FnOnce(&W) -> SinkResult<R>) -> SinkResult<R> {
        match self.target.upgrade() {
            Some(widget) => call(&*widget),
            None => Ok(neutral),
        }
    }
}

impl<W: ?Sized> std::fmt::Debug for WeakEventSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakEventSink")
            .field("alive", &(self.target.strong_count() > 0))
            .finish()
    }
}

impl<W: EventSink + ?Sized> EventSink for WeakEventSink<W> {
    fn expose(&self, area: Rect) -> SinkResult {
        self.forward((), |w| w.expose(area))
    }

    fn invoke_pending(&self) -> SinkResult {
        self.forward((), |w| w.invoke_pending())
    }

    fn mouse_enter(&self) -> SinkResult {
        self.forward((), |w| w.mouse_enter())
    }

    fn mouse_leave(&self) -> SinkResult {
        self.forward((), |w| w.mouse_leave())
    }

    fn focus_enter(&self) -> SinkResult {
        self.forward((), |w| w.focus_enter())
    }

    fn focus_leave(&self) -> SinkResult {
        self.forward((), |w| w.focus_leave())
    }

    fn primary_focus_enter(&self) -> SinkResult {
        self.forward((), |w| w.primary_focus_enter())
    }

    fn primary_focus_leave(&self) -> SinkResult {
        self.forward((), |w| w.primary_focus_leave())
    }

    fn key_down(&self, keys: Keys) -> SinkResult<bool> {
        self.forward(false, |w| w.key_down(keys))
    }

    fn key_up(&self, keys: Keys) -> SinkResult<bool> {
        self.forward(false, |w| w.key_up(keys))
    }

    fn key_char(&self, ch: char) -> SinkResult<bool> {
        self.forward(false, |w| w.key_char(ch))
    }

    fn mouse_down(&self, event: &MouseEvent) -> SinkResult {
        self.forward((), |w| w.mouse_down(event))
    }

    fn mouse_up(&self, event: &MouseEvent) -> SinkResult {
        self.forward((), |w| w.mouse_up(event))
    }

    fn mouse_hover(&self, event: &MouseEvent) -> SinkResult {
        self.forward((), |w| w.mouse_hover(event))
    }

    fn mouse_move(&self, event: &MouseEvent) -> SinkResult {
        self.forward((), |w| w.mouse_move(event))
    }

    fn mouse_wheel(&self, event: &MouseEvent) -> SinkResult {
        self.forward((), |w| w.mouse_wheel(event))
    }

    fn external_move(&self, origin: Point) -> SinkResult {
        self.forward((), |w| w.external_move(origin))
    }

    fn external_resize(&self, size: Size) -> SinkResult {
        self.forward((), |w| w.external_resize(size))
    }

    fn close(&self) -> SinkResult {
        self.forward((), |w| w.close())
    }

    fn help(&self) -> SinkResult {
        self.forward((), |w| w.help())
    }

    fn state_changed(&self, state: WindowState) -> SinkResult {
        self.forward((), |w| w.state_changed(state))
    }

    fn mdi_activate(&self, child: Option<WindowHandle>) -> SinkResult {
        self.forward((), |w| w.mdi_activate(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{MouseButtons, NativeEvent};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_close: bool,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl EventSink for Recorder {
        fn mouse_down(&self, event: &MouseEvent) -> SinkResult {
            self.calls.lock().push(format!("mouse_down({},{})", event.x, event.y));
            Ok(())
        }

        fn mouse_hover(&self, event: &MouseEvent) -> SinkResult {
            self.calls.lock().push(format!("mouse_hover({},{})", event.x, event.y));
            Ok(())
        }

        fn key_down(&self, keys: Keys) -> SinkResult<bool> {
            self.calls.lock().push(format!("key_down({})", keys.key_code()));
            Ok(true)
        }

        fn external_resize(&self, size: Size) -> SinkResult {
            self.calls.lock().push(format!("resize({}x{})", size.width, size.height));
            Ok(())
        }

        fn close(&self) -> SinkResult {
            if self.fail_close {
                return Err("close vetoed".into());
            }
            self.calls.lock().push("close".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_forwards_to_live_widget_with_same_arguments() {
        let widget = Arc::new(Recorder::default());
        let proxy = WeakEventSink::new(&widget);

        proxy.mouse_down(&MouseEvent::press(MouseButtons::LEFT, 3, 3)).unwrap();
        proxy.mouse_hover(&MouseEvent::at(5, 6)).unwrap();
        assert!(proxy.key_down(Keys::code(13)).unwrap());
        proxy.external_resize(Size::new(640, 480)).unwrap();

        assert_eq!(
            widget.calls(),
            vec!["mouse_down(3,3)", "mouse_hover(5,6)", "key_down(13)", "resize(640x480)"]
        );
    }

    #[test]
    fn test_dropped_widget_turns_callbacks_into_noops() {
        let widget = Arc::new(Recorder::default());
        let proxy: SharedSink = Arc::new(WeakEventSink::new(&widget));
        drop(widget);

        assert!(proxy.mouse_down(&MouseEvent::press(MouseButtons::LEFT, 1, 1)).is_ok());
        assert!(!proxy.key_down(Keys::code(13)).unwrap());
        assert!(!proxy.key_char('x').unwrap());
        assert!(proxy.close().is_ok());
        assert!(proxy.mdi_activate(None).is_ok());
    }

    #[test]
    fn test_proxy_does_not_keep_widget_alive() {
        let widget = Arc::new(Recorder::default());
        let proxy = WeakEventSink::new(&widget);
        assert_eq!(Arc::strong_count(&widget), 1);
        assert!(proxy.is_alive());

        drop(widget);
        assert!(!proxy.is_alive());
    }

    #[test]
    fn test_callback_error_propagates_unmodified() {
        let widget = Arc::new(Recorder {
            fail_close: true,
            ..Default::default()
        });
        let proxy = WeakEventSink::new(&widget);

        let err = proxy.close().unwrap_err();
        assert_eq!(err.to_string(), "close vetoed");
    }

    #[test]
    fn test_native_event_dispatch_reaches_matching_operation() {
        let widget = Arc::new(Recorder::default());
        let proxy = WeakEventSink::new(&widget);

        let handled = NativeEvent::KeyDown { keys: Keys::code(27) }
            .dispatch_to(&proxy)
            .unwrap();
        assert_eq!(handled, Some(true));

        let none = NativeEvent::MouseDown(MouseEvent::press(MouseButtons::LEFT, 7, 8))
            .dispatch_to(&proxy)
            .unwrap();
        assert_eq!(none, None);

        assert_eq!(widget.calls(), vec!["key_down(27)", "mouse_down(7,8)"]);
    }
}
