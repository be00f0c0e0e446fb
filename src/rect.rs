use crate::{Object, Result};

/// Axis-aligned rectangle in default user space units.
///
/// Corners are normalized on construction so `left <= right` and `bottom <= top`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Rect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Rect {
        Rect {
            left: x1.min(x2),
            bottom: y1.min(y2),
            right: x1.max(x2),
            top: y1.max(y2),
        }
    }

    pub fn empty() -> Rect {
        Rect::default()
    }

    /// Build a rectangle from a four-number array. Elements must already be resolved.
    pub fn from_array(array: &[Object<'_>]) -> Result<Rect> {
        match array {
            [x1, y1, x2, y2] => Ok(Rect::new(x1.as_number()?, y1.as_number()?, x2.as_number()?, y2.as_number()?)),
            _ => Err(crate::Error::ObjectType {
                expected: "Array of 4 numbers",
                found: "Array",
            }),
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let rect = Rect {
            left: self.left.max(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.min(other.right),
            top: self.top.min(other.top),
        };
        if rect.left > rect.right || rect.bottom > rect.top { Rect::empty() } else { rect }
    }
}
