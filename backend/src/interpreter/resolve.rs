//! Source resolution against a grid.

use crate::grid::Grid;
use crate::rules::{Coord, CoordRange, Direction, Source};

/// How a resolved source lines up with the records of an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// One value shared by every record.
    Broadcast,
    /// One value per lane (header cell).
    Lane,
    /// One value per observation along the data direction.
    Observation,
}

/// A raw value before extraction. `text: None` is a blank cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RawValue {
    pub location: Option<Coord>,
    pub text: Option<String>,
}

impl RawValue {
    pub fn location_label(&self) -> String {
        match self.location {
            Some(coord) => coord.to_string(),
            None => "literal".to_string(),
        }
    }
}

/// Cells covered by a range. Stops at `max_count` or at the grid boundary,
/// never on content. A start outside the grid covers nothing.
pub fn walk(range: &CoordRange, grid: &Grid) -> Vec<Coord> {
    walk_from(range.coord, range.direction, range.max_count, grid)
}

pub fn walk_from(start: Coord, direction: Direction, max_count: Option<usize>, grid: &Grid) -> Vec<Coord> {
    let mut cells = Vec::new();
    let mut current = Some(start);
    while let Some(coord) = current {
        if !grid.contains(coord) || max_count.is_some_and(|max| cells.len() >= max) {
            break;
        }
        cells.push(coord);
        current = coord.step(direction);
    }
    cells
}

pub fn axis_of(source: &Source, data_direction: Direction) -> Axis {
    match source {
        Source::Coord(_) | Source::Value(_) => Axis::Broadcast,
        Source::Range(range) if range.direction.is_perpendicular(data_direction) => Axis::Lane,
        Source::Range(_) => Axis::Observation,
    }
}

fn raw_at(grid: &Grid, coord: Coord) -> RawValue {
    RawValue {
        location: Some(coord),
        text: grid.get(coord).and_then(|cell| cell.text()),
    }
}

/// Resolve a source to its raw values in walking order. Single cells and
/// literals yield exactly one value; a cell outside the grid reads as blank.
pub fn resolve(source: &Source, grid: &Grid) -> Vec<RawValue> {
    match source {
        Source::Coord(coord) => vec![raw_at(grid, *coord)],
        Source::Range(range) => walk(range, grid).into_iter().map(|c| raw_at(grid, c)).collect(),
        Source::Value(literal) => vec![RawValue {
            location: None,
            text: Some(literal.value.to_string()),
        }],
    }
}

/// Number of values a ranged source supplies on its axis, `None` for
/// broadcast sources.
pub fn ranged_len(source: &Source, grid: &Grid, data_direction: Direction) -> Option<(Axis, usize)> {
    match source {
        Source::Range(range) => Some((axis_of(source, data_direction), walk(range, grid).len())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::from_rows(vec![
            vec!["", "Jan-21", "Feb-21"],
            vec!["Views", "4", "5"],
            vec!["Clicks", "1", ""],
        ])
    }

    #[test]
    fn test_walk_stops_at_boundary_not_content() {
        let grid = grid();
        let range = CoordRange::new(Coord::new(0, 0), Direction::Right);
        assert_eq!(walk(&range, &grid).len(), 3);

        let range = CoordRange::new(Coord::new(0, 2), Direction::Down).with_max_count(10);
        assert_eq!(
            walk(&range, &grid),
            vec![Coord::new(0, 2), Coord::new(1, 2), Coord::new(2, 2)]
        );
    }

    #[test]
    fn test_walk_respects_max_count() {
        let grid = grid();
        let range = CoordRange::new(Coord::new(0, 1), Direction::Right).with_max_count(1);
        assert_eq!(walk(&range, &grid), vec![Coord::new(0, 1)]);
        let range = CoordRange::new(Coord::new(0, 1), Direction::Right).with_max_count(0);
        assert!(walk(&range, &grid).is_empty());
    }

    #[test]
    fn test_walk_left_and_up_stop_at_zero() {
        let grid = grid();
        let range = CoordRange::new(Coord::new(2, 2), Direction::Left);
        assert_eq!(walk(&range, &grid).len(), 3);
        let range = CoordRange::new(Coord::new(2, 0), Direction::Up);
        assert_eq!(walk(&range, &grid).len(), 3);
    }

    #[test]
    fn test_start_outside_grid_is_empty() {
        let grid = grid();
        let range = CoordRange::new(Coord::new(7, 0), Direction::Up);
        assert!(walk(&range, &grid).is_empty());
        let range = CoordRange::new(Coord::new(0, 3), Direction::Left);
        assert!(walk(&range, &grid).is_empty());
    }

    #[test]
    fn test_resolve_shapes() {
        let grid = grid();
        let values = resolve(&Source::Coord(Coord::new(2, 2)), &grid);
        assert_eq!(values[0].text, None);
        let values = resolve(&Source::Coord(Coord::new(9, 9)), &grid);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].text, None);
        let values = resolve(&Source::literal("Books"), &grid);
        assert_eq!(values[0].text.as_deref(), Some("Books"));
        assert_eq!(values[0].location_label(), "literal");
    }

    #[test]
    fn test_axis() {
        let down = Source::Range(CoordRange::new(Coord::new(1, 0), Direction::Down));
        let up = Source::Range(CoordRange::new(Coord::new(2, 0), Direction::Up));
        let right = Source::Range(CoordRange::new(Coord::new(0, 1), Direction::Right));
        assert_eq!(axis_of(&down, Direction::Down), Axis::Observation);
        assert_eq!(axis_of(&up, Direction::Down), Axis::Observation);
        assert_eq!(axis_of(&right, Direction::Down), Axis::Lane);
        assert_eq!(axis_of(&Source::literal("x"), Direction::Down), Axis::Broadcast);
    }
}
