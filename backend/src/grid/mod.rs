//! Raw cell grids.
//!
//! A [`Grid`] is the rectangular table a rule document is evaluated against.
//! Cells are addressed by zero-based `(row, col)` and hold a raw scalar.
//! Loading from delimited files lives in [`load`].

pub mod load;

use std::fmt;

use crate::rules::Coord;

pub use load::{decode_content, detect_delimiter, detect_encoding, load_bytes, load_path, parse_str};

/// One raw cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Blank,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Build a cell from text; whitespace-only text is blank.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Cell::Blank
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Cell::Blank)
    }

    /// Textual content, `None` for blank cells.
    pub fn text(&self) -> Option<String> {
        match self {
            Cell::Blank => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(n.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Blank => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::from_text(text)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// A rectangular table of cells. Short rows are padded with blanks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl Grid {
    pub fn new(mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, Cell::Blank);
        }
        Self { rows, width }
    }

    /// Build a grid from rows of text.
    ///
    /// ```ignore
    /// let grid = Grid::from_rows(vec![vec!["", "Jan-21"], vec!["Views", "4"]]);
    /// assert_eq!(grid.width(), 2);
    /// ```
    pub fn from_rows<I, R, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(|s| Cell::from_text(s.as_ref())).collect())
                .collect(),
        )
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.width == 0
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.row < self.height() && coord.col < self.width
    }

    /// The cell at `coord`, `None` outside the grid.
    pub fn get(&self, coord: Coord) -> Option<&Cell> {
        self.rows.get(coord.row).and_then(|row| row.get(coord.col))
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Drop trailing rows that hold nothing but blanks.
    pub fn trim_trailing_blank_rows(mut self) -> Self {
        while self
            .rows
            .last()
            .is_some_and(|row| row.iter().all(Cell::is_blank))
        {
            self.rows.pop();
        }
        self
    }

    /// Render the first `max_rows` rows with their zero-based row index, one
    /// line per row and `|` between cells, so coordinates can be read off.
    pub fn preview(&self, max_rows: usize) -> String {
        let mut out = String::new();
        let header: Vec<String> = (0..self.width).map(|c| c.to_string()).collect();
        out.push_str(&format!("row\\col | {}\n", header.join(" | ")));
        for (i, row) in self.rows.iter().take(max_rows).enumerate() {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            out.push_str(&format!("{} | {}\n", i, cells.join(" | ")));
        }
        if self.height() > max_rows {
            out.push_str(&format!("... ({} more rows)\n", self.height() - max_rows));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_padded() {
        let grid = Grid::from_rows(vec![vec!["a", "b", "c"], vec!["d"]]);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.get(Coord::new(1, 2)), Some(&Cell::Blank));
        assert_eq!(grid.get(Coord::new(2, 0)), None);
    }

    #[test]
    fn test_whitespace_is_blank() {
        assert_eq!(Cell::from_text("   "), Cell::Blank);
        assert_eq!(Cell::from_text(" 12 "), Cell::Text("12".into()));
        assert_eq!(Cell::Number(3.0).text(), Some("3".into()));
    }

    #[test]
    fn test_trim_trailing_blank_rows() {
        let grid = Grid::from_rows(vec![vec!["a"], vec![""], vec!["  "]]).trim_trailing_blank_rows();
        assert_eq!(grid.height(), 1);
    }

    #[test]
    fn test_preview_shows_indices() {
        let grid = Grid::from_rows(vec![vec!["", "Jan-21"], vec!["Views", "4"], vec!["Hits", "2"]]);
        let preview = grid.preview(2);
        assert!(preview.contains("0 |  | Jan-21"));
        assert!(preview.contains("1 | Views | 4"));
        assert!(preview.contains("1 more rows"));
    }
}
