use serde::Deserialize;

/// Styling for grid drawings.
///
/// Lengths marked as relative are multiples of the drawn bond length. Any field may be left out
/// of a JSON options file, in which case the default is used.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrawOptions {
    /// Bond line width in pixels.
    pub bond_width: f32,
    /// Upper limit on the drawn bond length in pixels, so small molecules are not blown up.
    pub max_bond_length: f32,
    /// Empty margin around the drawing in each panel, in pixels.
    pub padding: f32,
    /// Distance between the lines of a multiple bond (relative).
    pub multiple_bond_offset: f32,
    pub highlight_color: [u8; 3],
    /// Radius of the disc behind highlighted atoms (relative).
    pub highlight_radius: f32,
    /// Width of the band behind highlighted bonds (relative).
    pub highlight_bond_width: f32,
    /// Integer scale of the 8x8 glyphs used for atom labels.
    pub label_scale: u32,
    /// Integer scale of the 8x8 glyphs used for legends.
    pub legend_scale: u32,
    /// Draw the index of every atom next to it.
    pub atom_indices: bool,
    pub background: [u8; 3],
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            bond_width: 2.0,
            max_bond_length: 40.0,
            padding: 12.0,
            multiple_bond_offset: 0.16,
            highlight_color: [255, 128, 128],
            highlight_radius: 0.3,
            highlight_bond_width: 0.3,
            label_scale: 2,
            legend_scale: 2,
            atom_indices: false,
            background: [255, 255, 255],
        }
    }
}

impl DrawOptions {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
