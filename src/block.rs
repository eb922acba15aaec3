//! Canvas geometry and borrowed block views.
//!
//! A block view is a window onto host-owned pixel memory. The first byte of
//! the backing slice is the top-left pixel of the view's `rect`; `row_bytes`
//! counts bytes between row starts and `pixel_bytes` counts bytes between
//! neighbouring pixels. Samples are addressed in canvas coordinates plus a
//! channel offset inside the pixel, and every access is bounds-checked.
//!
//! A view with both strides zero is a constant view: every coordinate inside
//! its rect reads the same byte. The run loop uses one as the implicit
//! full-weight selection when the host has no selection offscreen.

use crate::util::{FilterError, FilterResult};

static FULL_WEIGHT: [u8; 1] = [0xFF];

/// A point in canvas coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle with exclusive `right` and `bottom` edges.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle of `width` x `height` anchored at the origin.
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Top-left corner.
    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Returns true when `point` lies inside the rectangle.
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.left && point.x < self.right && point.y >= self.top && point.y < self.bottom
    }

    /// Returns true when `other` lies entirely inside this rectangle.
    ///
    /// An empty rectangle is contained by any rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.left >= self.left
                && other.top >= self.top
                && other.right <= self.right
                && other.bottom <= self.bottom)
    }

    /// Intersection of two rectangles, or `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let rect = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!rect.is_empty()).then_some(rect)
    }
}

/// Read-only strided view of a block of 8-bit samples.
#[derive(Copy, Clone, Debug)]
pub struct BlockView<'a> {
    data: &'a [u8],
    rect: Rect,
    row_bytes: usize,
    pixel_bytes: usize,
}

impl<'a> BlockView<'a> {
    /// Creates a view after checking that `data` covers `rect`.
    pub fn new(
        data: &'a [u8],
        rect: Rect,
        row_bytes: usize,
        pixel_bytes: usize,
    ) -> FilterResult<Self> {
        check_len(data.len(), rect, row_bytes, pixel_bytes)?;
        Ok(Self {
            data,
            rect,
            row_bytes,
            pixel_bytes,
        })
    }

    /// Constant full-weight view covering `rect`.
    pub fn full_weight(rect: Rect) -> BlockView<'static> {
        BlockView {
            data: &FULL_WEIGHT,
            rect,
            row_bytes: 0,
            pixel_bytes: 0,
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn pixel_bytes(&self) -> usize {
        self.pixel_bytes
    }

    /// Returns the sample at canvas position `(x, y)`, channel `channel`.
    pub fn sample(&self, x: i32, y: i32, channel: usize) -> Option<u8> {
        let idx = offset(self.rect, self.row_bytes, self.pixel_bytes, x, y, channel)?;
        self.data.get(idx).copied()
    }
}

/// Mutable strided view of a block of 8-bit samples.
#[derive(Debug)]
pub struct BlockViewMut<'a> {
    data: &'a mut [u8],
    rect: Rect,
    row_bytes: usize,
    pixel_bytes: usize,
}

impl<'a> BlockViewMut<'a> {
    /// Creates a mutable view. Constant (zero-stride) layouts are rejected so
    /// that no two coordinates alias the same byte.
    pub fn new(
        data: &'a mut [u8],
        rect: Rect,
        row_bytes: usize,
        pixel_bytes: usize,
    ) -> FilterResult<Self> {
        if pixel_bytes == 0 {
            return Err(FilterError::InvalidStride {
                width: rect.width().max(0) as usize,
                row_bytes,
                pixel_bytes,
            });
        }
        check_len(data.len(), rect, row_bytes, pixel_bytes)?;
        Ok(Self {
            data,
            rect,
            row_bytes,
            pixel_bytes,
        })
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn pixel_bytes(&self) -> usize {
        self.pixel_bytes
    }

    pub fn sample(&self, x: i32, y: i32, channel: usize) -> Option<u8> {
        let idx = offset(self.rect, self.row_bytes, self.pixel_bytes, x, y, channel)?;
        self.data.get(idx).copied()
    }

    /// Returns a mutable reference to the sample at `(x, y)`, `channel`.
    pub fn sample_mut(&mut self, x: i32, y: i32, channel: usize) -> Option<&mut u8> {
        let idx = offset(self.rect, self.row_bytes, self.pixel_bytes, x, y, channel)?;
        self.data.get_mut(idx)
    }
}

fn offset(
    rect: Rect,
    row_bytes: usize,
    pixel_bytes: usize,
    x: i32,
    y: i32,
    channel: usize,
) -> Option<usize> {
    if !rect.contains_point(Point::new(x, y)) || channel >= pixel_bytes.max(1) {
        return None;
    }
    let dx = usize::try_from(x - rect.left).ok()?;
    let dy = usize::try_from(y - rect.top).ok()?;
    dy.checked_mul(row_bytes)?
        .checked_add(dx.checked_mul(pixel_bytes)?)?
        .checked_add(channel)
}

fn check_len(len: usize, rect: Rect, row_bytes: usize, pixel_bytes: usize) -> FilterResult<()> {
    if rect.is_empty() {
        return Err(FilterError::InvalidDimensions {
            width: rect.width(),
            height: rect.height(),
        });
    }
    let width = rect.width() as usize;
    let height = rect.height() as usize;
    let constant = row_bytes == 0 && pixel_bytes == 0;
    if !constant {
        let row_len = width
            .checked_mul(pixel_bytes)
            .ok_or(FilterError::InvalidDimensions {
                width: rect.width(),
                height: rect.height(),
            })?;
        if pixel_bytes == 0 || (height > 1 && row_bytes < row_len) {
            return Err(FilterError::InvalidStride {
                width,
                row_bytes,
                pixel_bytes,
            });
        }
    }
    let needed = (height - 1)
        .checked_mul(row_bytes)
        .and_then(|v| v.checked_add((width - 1).checked_mul(pixel_bytes)?))
        .and_then(|v| v.checked_add(pixel_bytes.max(1)))
        .ok_or(FilterError::InvalidDimensions {
            width: rect.width(),
            height: rect.height(),
        })?;
    if len < needed {
        return Err(FilterError::BufferTooSmall { needed, got: len });
    }
    Ok(())
}
