use std::fmt;

/// Pointer position on the display surface. May lie outside the rendered page,
/// including at negative offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerPos {
    pub x: i32,
    pub y: i32,
}

impl PointerPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A point in document pixel space (fixed render scale, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelPoint {
    pub x: u32,
    pub y: u32,
}

impl PixelPoint {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in document pixel space. Always normalized so that
/// `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl Rect {
    /// Builds the rectangle spanned by two arbitrary corners.
    pub fn from_corners(a: PixelPoint, b: PixelPoint) -> Self {
        Self {
            x1: a.x.min(b.x),
            y1: a.y.min(b.y),
            x2: a.x.max(b.x),
            y2: a.y.max(b.y),
        }
    }

    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self::from_corners(PixelPoint::new(x1, y1), PixelPoint::new(x2, y2))
    }

    pub fn x1(&self) -> u32 {
        self.x1
    }

    pub fn y1(&self) -> u32 {
        self.y1
    }

    pub fn x2(&self) -> u32 {
        self.x2
    }

    pub fn y2(&self) -> u32 {
        self.y2
    }

    pub fn coords(&self) -> (u32, u32, u32, u32) {
        (self.x1, self.y1, self.x2, self.y2)
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}) - ({},{})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Maps pointer positions on a display surface onto the pixels of a rendered
/// page that is centered inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateMapper {
    display: Size,
    image: Size,
}

impl CoordinateMapper {
    pub fn new(display: Size, image: Size) -> Self {
        Self { display, image }
    }

    /// Centering offset of the image inside the display surface. Zero on any
    /// axis where the image is at least as large as the surface.
    pub fn offset(&self) -> (i64, i64) {
        let dx = (i64::from(self.display.width) - i64::from(self.image.width)) / 2;
        let dy = (i64::from(self.display.height) - i64::from(self.image.height)) / 2;
        (dx.max(0), dy.max(0))
    }

    /// The result always lies within `[0, width] x [0, height]` of the image.
    pub fn to_document_space(&self, pointer: PointerPos) -> PixelPoint {
        let (dx, dy) = self.offset();
        let x = (i64::from(pointer.x) - dx).clamp(0, i64::from(self.image.width));
        let y = (i64::from(pointer.y) - dy).clamp(0, i64::from(self.image.height));
        PixelPoint::new(x as u32, y as u32)
    }
}
