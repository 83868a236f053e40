//! Window geometry passed to the backend.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Clamp to `1..=limit` on both axes. Zero-sized windows are not
    /// representable by most native backends. A `limit` below 1 acts as 1.
    pub fn clamped(self, limit: i32) -> Self {
        let limit = limit.max(1);
        Self {
            width: self.width.clamp(1, limit),
            height: self.height.clamp(1, limit),
        }
    }
}

/// Position and size in parent (or screen) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const ZERO: Rect = Rect::new(0, 0, 0, 0);

    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Clamp position to `-limit..=limit` and size to `1..=limit`.
    pub fn clamped(self, limit: i32) -> Self {
        let limit = limit.max(1);
        let size = self.size().clamped(limit);
        Self {
            x: self.x.clamp(-limit, limit),
            y: self.y.clamp(-limit, limit),
            width: size.width,
            height: size.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_clamps_to_at_least_one_pixel() {
        assert_eq!(Size::new(0, -3).clamped(32767), Size::new(1, 1));
        assert_eq!(Size::new(40000, 20).clamped(32767), Size::new(32767, 20));
    }

    #[test]
    fn test_rect_clamps_position_symmetrically() {
        let r = Rect::new(-50000, 50000, 10, 10).clamped(32767);
        assert_eq!(r, Rect::new(-32767, 32767, 10, 10));
    }

    #[test]
    fn test_degenerate_limit_behaves_as_one() {
        assert_eq!(Size::new(40, 40).clamped(0), Size::new(1, 1));
        assert_eq!(Size::new(40, 40).clamped(-5), Size::new(1, 1));
        assert_eq!(Rect::new(-9, 9, 40, 40).clamped(0), Rect::new(-1, 1, 1, 1));
    }
}
