//! Row-major cell storage used for floor rasters.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Errors raised by checked grid writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Cell {cell:?} lies outside a grid of size {size:?}")]
    CellOutOfRange {
        cell: (usize, usize),
        size: (usize, usize),
    },
}

/// A `width` x `height` block of cells addressed as `(column, row)`, row 0
/// at the top.
///
/// Cells live in one flat vector, row by row. Out-of-range reads through
/// [`Grid::get`] return `None`; indexing with `grid[(column, row)]` panics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    tiles: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a grid with every cell set to a clone of `value`.
    ///
    /// # Arguments
    ///
    /// * `width`: Number of columns.
    /// * `height`: Number of rows.
    /// * `value`: The initial content of every cell.
    pub fn filled(width: usize, height: usize, value: T) -> Self
    where
        T: Clone,
    {
        Grid {
            width,
            height,
            tiles: vec![value; width * height],
        }
    }

    /// Creates a grid whose cells are produced by a function of their
    /// coordinates, called row by row.
    ///
    /// # Arguments
    ///
    /// * `width`: Number of columns.
    /// * `height`: Number of rows.
    /// * `cell`: Called as `cell(column, row)` once per cell.
    pub fn from_fn(width: usize, height: usize, mut cell: impl FnMut(usize, usize) -> T) -> Self {
        let tiles = (0..height)
            .flat_map(|row| (0..width).map(move |column| (column, row)))
            .map(|(column, row)| cell(column, row))
            .collect();
        Grid {
            width,
            height,
            tiles,
        }
    }

    /// Returns the number of columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the number of rows.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Checks whether `(column, row)` lies inside the grid.
    #[inline]
    pub fn contains(&self, column: usize, row: usize) -> bool {
        column < self.width && row < self.height
    }

    #[inline]
    fn offset(&self, column: usize, row: usize) -> Option<usize> {
        self.contains(column, row).then_some(row * self.width + column)
    }

    /// Gets a reference to the cell at `(column, row)`.
    ///
    /// Returns `None` if the coordinates are out of range.
    #[inline]
    pub fn get(&self, column: usize, row: usize) -> Option<&T> {
        self.tiles.get(self.offset(column, row)?)
    }

    /// Gets a mutable reference to the cell at `(column, row)`.
    ///
    /// Returns `None` if the coordinates are out of range.
    #[inline]
    pub fn get_mut(&mut self, column: usize, row: usize) -> Option<&mut T> {
        let offset = self.offset(column, row)?;
        self.tiles.get_mut(offset)
    }

    /// Overwrites the cell at `(column, row)`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::CellOutOfRange`] if the coordinates are out of
    /// range; the grid is left unchanged.
    pub fn set(&mut self, column: usize, row: usize, value: T) -> Result<(), GridError> {
        let size = (self.width, self.height);
        let tile = self
            .get_mut(column, row)
            .ok_or(GridError::CellOutOfRange {
                cell: (column, row),
                size,
            })?;
        *tile = value;
        Ok(())
    }

    /// Iterates over the rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks panics on zero
        self.tiles.chunks(self.width.max(1))
    }

    /// Iterates over every cell together with its `(column, row)`.
    pub fn cells(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        let width = self.width.max(1);
        self.tiles
            .iter()
            .enumerate()
            .map(move |(offset, tile)| ((offset % width, offset / width), tile))
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    /// Returns the cell at `(column, row)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of range.
    #[inline]
    fn index(&self, (column, row): (usize, usize)) -> &T {
        let (width, height) = (self.width, self.height);
        self.get(column, row).unwrap_or_else(|| {
            panic!("cell ({column}, {row}) outside a {width}x{height} grid")
        })
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    /// Returns the cell at `(column, row)` for writing.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of range.
    #[inline]
    fn index_mut(&mut self, (column, row): (usize, usize)) -> &mut T {
        let (width, height) = (self.width, self.height);
        self.get_mut(column, row).unwrap_or_else(|| {
            panic!("cell ({column}, {row}) outside a {width}x{height} grid")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_are_stored_row_by_row() {
        let grid = Grid::from_fn(3, 2, |column, row| column + 10 * row);
        assert_eq!(grid[(2, 1)], 12);
        let rows: Vec<&[usize]> = grid.rows().collect();
        assert_eq!(rows, vec![&[0, 1, 2][..], &[10, 11, 12][..]]);
        assert_eq!(grid.cells().nth(4), Some(((1, 1), &11)));
    }

    #[test]
    fn writes_outside_the_grid_fail() {
        let mut grid = Grid::filled(2, 2, 'a');
        grid.set(1, 1, 'b').unwrap();
        assert_eq!(grid.get(1, 1), Some(&'b'));
        let err = grid.set(2, 0, 'c').unwrap_err();
        assert_eq!(
            err,
            GridError::CellOutOfRange {
                cell: (2, 0),
                size: (2, 2)
            }
        );
        assert_eq!(err.to_string(), "Cell (2, 0) lies outside a grid of size (2, 2)");
        assert!(grid.get(0, 2).is_none());
        assert!(!grid.contains(0, 2));
    }

    #[test]
    fn index_mut_writes_in_place() {
        let mut grid = Grid::filled(3, 1, 0u8);
        grid[(1, 0)] = 5;
        *grid.get_mut(2, 0).unwrap() += 1;
        assert_eq!(grid.rows().next(), Some(&[0, 5, 1][..]));
    }

    #[test]
    #[should_panic(expected = "outside a 2x2 grid")]
    fn indexing_outside_panics() {
        let grid = Grid::filled(2, 2, 0u8);
        let _value = grid[(2, 2)];
    }
}
