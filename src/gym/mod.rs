pub mod side_scroller;

pub use side_scroller::{LevelConfig, LevelError, Obstacle, SSAction, SideScroller};
