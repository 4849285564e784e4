use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A player position as reported by the environment
///
/// `x` grows as the player advances through the level, `y` is the vertical offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Index of a grid cell, in `[0, Grid::state_count())`
pub type StateIndex = usize;

/// Fixed discretization of the level into `x_sections` × `y_sections` cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Grid {
    pub x_sections: usize,
    pub y_sections: usize,
    pub x_section_size: f64,
    pub y_section_size: f64,
}

impl Default for Grid {
    /// 120 × 10 cells of 25 × 28 units: a ~3000 unit long level, twice the jump height tall
    fn default() -> Self {
        Self {
            x_sections: 120,
            y_sections: 10,
            x_section_size: 25.0,
            y_section_size: 28.0,
        }
    }
}

impl Grid {
    pub fn state_count(&self) -> usize {
        self.x_sections * self.y_sections
    }

    /// Map a position to its cell
    ///
    /// Total over all inputs: coordinates below zero land in the first bucket of their axis,
    /// coordinates past the configured range land in the last one, and NaN maps to zero.
    pub fn discretize(&self, pos: Position) -> StateIndex {
        let x_idx = bucket(pos.x, self.x_section_size, self.x_sections);
        let y_idx = bucket(pos.y, self.y_section_size, self.y_sections);
        x_idx * self.y_sections + y_idx
    }

    pub fn validate(&self) -> Result<()> {
        if self.x_sections == 0 || self.y_sections == 0 {
            return Err(Error::InvalidConfig(
                "grid must have at least one section per axis".into(),
            ));
        }
        if !(self.x_section_size > 0.0 && self.y_section_size > 0.0) {
            return Err(Error::InvalidConfig(
                "grid section sizes must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn bucket(value: f64, size: f64, sections: usize) -> usize {
    // float -> usize casts saturate, so negatives and NaN become 0
    ((value / size).floor() as usize).min(sections - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discretize_functional() {
        let grid = Grid::default();
        assert_eq!(grid.state_count(), 1200);
        assert_eq!(grid.discretize(Position::new(0.0, 0.0)), 0);
        assert_eq!(grid.discretize(Position::new(24.9, 27.9)), 0);
        assert_eq!(grid.discretize(Position::new(25.0, 0.0)), 10);
        assert_eq!(grid.discretize(Position::new(25.0, 28.0)), 11);
        assert_eq!(grid.discretize(Position::new(1000.0, 79.0)), 40 * 10 + 2);
    }

    #[test]
    fn discretize_clamps() {
        let grid = Grid::default();
        let last = grid.state_count() - 1;
        assert_eq!(grid.discretize(Position::new(1e9, 1e9)), last);
        assert_eq!(grid.discretize(Position::new(-50.0, -3.0)), 0);
        assert_eq!(grid.discretize(Position::new(f64::NAN, 30.0)), 1);
        assert_eq!(grid.discretize(Position::new(f64::INFINITY, 0.0)), 119 * 10);
    }

    #[test]
    fn discretize_is_total_and_in_range() {
        let grid = Grid {
            x_sections: 80,
            y_sections: 10,
            x_section_size: 15.0,
            y_section_size: 20.0,
        };
        for xi in 0..200 {
            for yi in 0..40 {
                let pos = Position::new(xi as f64 * 7.3, yi as f64 * 9.1);
                let ix = grid.discretize(pos);
                assert!(ix < grid.state_count(), "{pos:?} mapped to {ix}");
                assert_eq!(ix, grid.discretize(pos), "deterministic");
            }
        }
    }

    #[test]
    fn cells_are_row_major_by_x() {
        let grid = Grid::default();
        assert_eq!(grid.discretize(Position::new(510.0, 60.0)), 20 * 10 + 2);
        assert_eq!(grid.discretize(Position::new(535.0, 60.0)), 21 * 10 + 2);
    }

    #[test]
    fn validate_rejects_empty_grid() {
        let grid = Grid {
            y_sections: 0,
            ..Default::default()
        };
        assert!(grid.validate().is_err());
        assert!(Grid::default().validate().is_ok());
    }
}
