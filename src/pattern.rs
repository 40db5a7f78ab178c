//! Precomputed switch patterns, one row committed per write sweep.

use crate::error::LinkError;

/// Fixed set of pattern rows selected sequentially by an active-row index
/// that wraps modulo the row count. Every row is as wide as the write
/// phase's address space; shapes are checked at construction, not at use.
#[derive(Debug, Clone)]
pub struct WritePatternTable {
    rows: Vec<Vec<bool>>,
    active: usize,
    width: usize,
}

impl WritePatternTable {
    pub fn new(rows: Vec<Vec<bool>>, width: usize) -> Result<Self, LinkError> {
        if rows.is_empty() {
            return Err(LinkError::EmptyPattern);
        }
        for (row, values) in rows.iter().enumerate() {
            if values.len() != width {
                return Err(LinkError::PatternShape {
                    row,
                    len: values.len(),
                    expected: width,
                });
            }
        }
        Ok(Self {
            rows,
            active: 0,
            width,
        })
    }

    /// The reference rows widened to `width`: a block shape with a dark
    /// center band, its inverse, alternating bits, all-ones, all-zeros.
    pub fn default_rows(width: usize) -> Vec<Vec<bool>> {
        vec![
            (0..width).map(|i| !(10..25).contains(&i)).collect(),
            (0..width).map(|i| (10..25).contains(&i)).collect(),
            (0..width).map(|i| i % 2 == 0).collect(),
            vec![true; width],
            vec![false; width],
        ]
    }

    /// The row applied by the current write sweep.
    pub fn current(&self) -> &[bool] {
        &self.rows[self.active]
    }

    /// Select the next row, wrapping after the last one.
    pub fn advance(&mut self) {
        self.active = (self.active + 1) % self.rows.len();
    }

    pub fn active_row(&self) -> usize {
        self.active
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }
}
