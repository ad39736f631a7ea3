//! Depicting molecules as raster images.

pub mod canvas;
pub mod coords;
pub mod drawer;
pub mod grid;
pub mod highlight;
pub mod options;

pub use coords::compute_coords;
pub use drawer::{draw_molecule_grid, DrawError, GridDrawer};
pub use grid::{GridError, GridLayout};
pub use highlight::Highlight;
pub use options::DrawOptions;
