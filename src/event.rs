//! Input and lifecycle event payloads delivered by a native backend.

use crate::backend::WindowHandle;
use crate::geometry::{Point, Rect, Size};
use crate::sink::{EventSink, SinkResult};

// =============================================================================
// Keyboard
// =============================================================================

/// Key code in the low 16 bits, modifier flags above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Keys(pub u32);

impl Keys {
    pub const NONE: Keys = Keys(0);
    pub const KEY_CODE_MASK: u32 = 0x0000_FFFF;
    pub const SHIFT: Keys = Keys(0x0001_0000);
    pub const CONTROL: Keys = Keys(0x0002_0000);
    pub const ALT: Keys = Keys(0x0004_0000);

    pub const fn code(code: u16) -> Keys {
        Keys(code as u32)
    }

    pub const fn with(self, other: Keys) -> Keys {
        Keys(self.0 | other.0)
    }

    pub const fn key_code(self) -> u16 {
        (self.0 & Self::KEY_CODE_MASK) as u16
    }

    pub const fn modifiers(self) -> Keys {
        Keys(self.0 & !Self::KEY_CODE_MASK)
    }

    pub const fn contains(self, other: Keys) -> bool {
        self.0 & other.0 == other.0
    }
}

// =============================================================================
// Mouse
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MouseButtons(pub u32);

impl MouseButtons {
    pub const NONE: MouseButtons = MouseButtons(0);
    pub const LEFT: MouseButtons = MouseButtons(1);
    pub const RIGHT: MouseButtons = MouseButtons(2);
    pub const MIDDLE: MouseButtons = MouseButtons(4);
    pub const X1: MouseButtons = MouseButtons(8);
    pub const X2: MouseButtons = MouseButtons(16);
}

/// Pointer event in window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseEvent {
    pub buttons: MouseButtons,
    pub modifiers: Keys,
    pub clicks: i32,
    pub x: i32,
    pub y: i32,
    /// Wheel detents, zero for non-wheel events
    pub delta: i32,
}

impl MouseEvent {
    pub fn press(buttons: MouseButtons, x: i32, y: i32) -> Self {
        Self {
            buttons,
            clicks: 1,
            x,
            y,
            ..Default::default()
        }
    }

    pub fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

// =============================================================================
// Window State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

// =============================================================================
// Native Events
// =============================================================================

/// One raw notification from the backend, addressed to a single window.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    Expose { area: Rect },
    InvokePending,
    MouseEnter,
    MouseLeave,
    FocusEnter,
    FocusLeave,
    PrimaryFocusEnter,
    PrimaryFocusLeave,
    KeyDown { keys: Keys },
    KeyUp { keys: Keys },
    KeyChar { ch: char },
    MouseDown(MouseEvent),
    MouseUp(MouseEvent),
    MouseHover(MouseEvent),
    MouseMove(MouseEvent),
    MouseWheel(MouseEvent),
    ExternalMove { x: i32, y: i32 },
    ExternalResize { width: i32, height: i32 },
    Close,
    Help,
    StateChanged(WindowState),
    MdiActivate { child: Option<WindowHandle> },
}

impl NativeEvent {
    /// Invoke the matching sink operation.
    ///
    /// Returns `Some(handled)` for keyboard events and `None` for events that
    /// carry no result.
    pub fn dispatch_to(&self, sink: &dyn EventSink) -> SinkResult<Option<bool>> {
        match self {
            NativeEvent::KeyDown { keys } => return sink.key_down(*keys).map(Some),
            NativeEvent::KeyUp { keys } => return sink.key_up(*keys).map(Some),
            NativeEvent::KeyChar { ch } => return sink.key_char(*ch).map(Some),
            NativeEvent::Expose { area } => sink.expose(*area)?,
            NativeEvent::InvokePending => sink.invoke_pending()?,
            NativeEvent::MouseEnter => sink.mouse_enter()?,
            NativeEvent::MouseLeave => sink.mouse_leave()?,
            NativeEvent::FocusEnter => sink.focus_enter()?,
            NativeEvent::FocusLeave => sink.focus_leave()?,
            NativeEvent::PrimaryFocusEnter => sink.primary_focus_enter()?,
            NativeEvent::PrimaryFocusLeave => sink.primary_focus_leave()?,
            NativeEvent::MouseDown(ev) => sink.mouse_down(ev)?,
            NativeEvent::MouseUp(ev) => sink.mouse_up(ev)?,
            NativeEvent::MouseHover(ev) => sink.mouse_hover(ev)?,
            NativeEvent::MouseMove(ev) => sink.mouse_move(ev)?,
            NativeEvent::MouseWheel(ev) => sink.mouse_wheel(ev)?,
            NativeEvent::ExternalMove { x, y } => sink.external_move(Point::new(*x, *y))?,
            NativeEvent::ExternalResize { width, height } => {
                sink.external_resize(Size::new(*width, *height))?
            }
            NativeEvent::Close => sink.close()?,
            NativeEvent::Help => sink.help()?,
            NativeEvent::StateChanged(state) => sink.state_changed(*state)?,
            NativeEvent::MdiActivate { child } => sink.mdi_activate(*child)?,
        }
        Ok(None)
    }
}
