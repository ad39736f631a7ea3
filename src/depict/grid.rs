//! Arithmetic for arranging panels in a fixed-width grid.

/// Number of panels per row.
pub const COLUMNS: u32 = 3;
pub const PANEL_WIDTH: u32 = 300;
pub const PANEL_HEIGHT: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// A grid needs at least one panel.
    Empty,
    /// More molecules were drawn than the grid has panels for.
    Full { capacity: usize },
}

impl std::fmt::Display for GridError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridError::Empty => write!(f, "no molecules to draw"),
            GridError::Full { capacity } => {
                write!(f, "the grid is full, it only has room for {capacity} molecules")
            }
        }
    }
}

impl std::error::Error for GridError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    count: usize,
    columns: u32,
    rows: u32,
    panel_width: u32,
    panel_height: u32,
}

impl GridLayout {
    /// Lay out `count` panels, three to a row.
    pub fn new(count: usize) -> Result<Self, GridError> {
        if count == 0 {
            return Err(GridError::Empty);
        }
        let rows = count.div_ceil(COLUMNS as usize) as u32;
        Ok(Self {
            count,
            columns: COLUMNS,
            rows,
            panel_width: PANEL_WIDTH,
            panel_height: PANEL_HEIGHT,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn panel_size(&self) -> (u32, u32) {
        (self.panel_width, self.panel_height)
    }

    /// The size of the whole image as `(width, height)`.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.panel_width * self.columns, self.panel_height * self.rows)
    }

    /// The top-left pixel of panel `index`, filled left to right and top to bottom.
    pub fn panel_origin(&self, index: usize) -> (u32, u32) {
        let col = index as u32 % self.columns;
        let row = index as u32 / self.columns;
        (col * self.panel_width, row * self.panel_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_size() {
        let sizes: Vec<_> = [1, 2, 3, 4, 6, 7, 18]
            .into_iter()
            .map(|n| GridLayout::new(n).unwrap().canvas_size())
            .collect();
        assert_eq!(
            sizes,
            vec![
                (900, 300),
                (900, 300),
                (900, 300),
                (900, 600),
                (900, 600),
                (900, 900),
                (900, 1800)
            ]
        );
    }

    #[test]
    fn panel_origins() {
        let layout = GridLayout::new(5).unwrap();
        assert_eq!(layout.rows(), 2);
        assert_eq!(layout.panel_origin(0), (0, 0));
        assert_eq!(layout.panel_origin(2), (600, 0));
        assert_eq!(layout.panel_origin(3), (0, 300));
        assert_eq!(layout.panel_origin(4), (300, 300));
    }

    #[test]
    fn empty() {
        assert_eq!(GridLayout::new(0), Err(GridError::Empty));
        assert_eq!(GridError::Empty.to_string(), "no molecules to draw");
    }
}
