//! Positions and extents measured in bytes and rows/columns.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use text_size::{TextRange, TextSize};

/// A row/column position. Columns count bytes of the input encoding.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub const ZERO: Self = Self { row: 0, column: 0 };
    pub const MAX: Self = Self { row: u32::MAX, column: u32::MAX };

    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Advancing by an extent: a multi-row extent resets the column.
impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if rhs.row > 0 {
            Self { row: self.row + rhs.row, column: rhs.column }
        } else {
            Self { row: self.row, column: self.column + rhs.column }
        }
    }
}

/// The extent that leads from `rhs` to `self`.
impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        if self.row > rhs.row {
            Self { row: self.row - rhs.row, column: self.column }
        } else {
            Self { row: 0, column: self.column.saturating_sub(rhs.column) }
        }
    }
}

/// A byte count paired with the row/column extent it spans.
///
/// Used both for absolute positions (measured from the start of the
/// document) and for the sizes of subtrees.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Length {
    pub bytes: TextSize,
    pub extent: Point,
}

impl Length {
    pub const ZERO: Self = Self { bytes: TextSize::new(0), extent: Point::ZERO };

    pub const fn new(bytes: u32, extent: Point) -> Self {
        Self { bytes: TextSize::new(bytes), extent }
    }

    /// Like `self - rhs` but clamps at zero when `rhs` is past `self`.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if self.bytes > rhs.bytes { self - rhs } else { Self::ZERO }
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", u32::from(self.bytes), self.extent)
    }
}

impl Add for Length {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { bytes: self.bytes + rhs.bytes, extent: self.extent + rhs.extent }
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Length {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            bytes: self.bytes.checked_sub(rhs.bytes).unwrap_or_default(),
            extent: self.extent - rhs.extent,
        }
    }
}

/// A span of the document in both coordinate systems.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start_byte: u32,
    pub end_byte: u32,
    pub start_point: Point,
    pub end_point: Point,
}

impl Range {
    /// Covers every document: the default for included ranges.
    pub const EVERYTHING: Self =
        Self { start_byte: 0, end_byte: u32::MAX, start_point: Point::ZERO, end_point: Point::MAX };

    pub fn new(start: Length, end: Length) -> Self {
        Self {
            start_byte: start.bytes.into(),
            end_byte: end.bytes.into(),
            start_point: start.extent,
            end_point: end.extent,
        }
    }

    pub fn start(&self) -> Length {
        Length::new(self.start_byte, self.start_point)
    }

    pub fn end(&self) -> Length {
        Length::new(self.end_byte, self.end_point)
    }

    pub fn byte_range(&self) -> TextRange {
        TextRange::new(self.start_byte.into(), self.end_byte.into())
    }

    pub fn is_empty(&self) -> bool {
        self.end_byte <= self.start_byte
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}..{}) {:?}-{:?}",
            self.start_byte, self.end_byte, self.start_point, self.end_point
        )
    }
}
