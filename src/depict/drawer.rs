//! Drawing molecules into the panels of a grid image.

use std::io::Cursor;

use glam::Vec2;
use image::{ImageFormat, Rgba, RgbaImage};

use crate::chem::element::Element;
use crate::chem::mol::{BondOrder, Molecule};
use crate::chem::rings::RingInfo;
use crate::depict::canvas::{self, rgba, GLYPH_SIZE};
use crate::depict::coords::compute_coords;
use crate::depict::grid::{GridError, GridLayout};
use crate::depict::highlight::Highlight;
use crate::depict::options::DrawOptions;

const LEGEND_COLOR: [u8; 3] = [0, 0, 0];
const INDEX_COLOR: [u8; 3] = [90, 90, 90];

#[derive(Debug)]
pub enum DrawError {
    Grid(GridError),
    Encode(image::ImageError),
}

impl std::fmt::Display for DrawError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawError::Grid(err) => write!(f, "{err}"),
            DrawError::Encode(err) => write!(f, "could not encode image: {err}"),
        }
    }
}

impl std::error::Error for DrawError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DrawError::Grid(err) => Some(err),
            DrawError::Encode(err) => Some(err),
        }
    }
}

impl From<GridError> for DrawError {
    fn from(err: GridError) -> Self {
        Self::Grid(err)
    }
}

impl From<image::ImageError> for DrawError {
    fn from(err: image::ImageError) -> Self {
        Self::Encode(err)
    }
}

/// Draw molecules into a grid, with their names as legends, and encode it as a PNG.
pub fn draw_molecule_grid(
    molecules: &[Molecule],
    highlights: Option<&[Highlight]>,
    options: &DrawOptions,
) -> Result<Vec<u8>, DrawError> {
    let layout = GridLayout::new(molecules.len())?;
    let mut drawer = GridDrawer::new(layout, options.clone());
    for (idx, mol) in molecules.iter().enumerate() {
        let highlight = highlights.and_then(|h| h.get(idx));
        drawer.draw(mol, &mol.name, highlight)?;
    }
    Ok(drawer.finish()?)
}

/// Fills the panels of a [`GridLayout`] one molecule at a time.
pub struct GridDrawer {
    layout: GridLayout,
    options: DrawOptions,
    image: RgbaImage,
    drawn: usize,
}

impl GridDrawer {
    pub fn new(layout: GridLayout, options: DrawOptions) -> Self {
        let (width, height) = layout.canvas_size();
        let image = RgbaImage::from_pixel(width, height, rgba(options.background));
        Self {
            layout,
            options,
            image,
            drawn: 0,
        }
    }

    /// Draw a molecule into the next free panel.
    pub fn draw(
        &mut self,
        mol: &Molecule,
        legend: &str,
        highlight: Option<&Highlight>,
    ) -> Result<(), GridError> {
        if self.drawn >= self.layout.count() {
            return Err(GridError::Full {
                capacity: self.layout.count(),
            });
        }
        let (x, y) = self.layout.panel_origin(self.drawn);
        let (w, h) = self.layout.panel_size();
        let panel = Panel {
            origin: Vec2::new(x as f32, y as f32),
            size: Vec2::new(w as f32, h as f32),
            options: &self.options,
        };
        panel.draw(&mut self.image, mol, legend, highlight);
        self.drawn += 1;
        Ok(())
    }

    /// Encode the grid as a PNG.
    pub fn finish(self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        self.image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// The text drawn in place of an atom, if any. Carbons are left implicit unless they stand
/// alone or carry a charge or isotope.
fn atom_label(mol: &Molecule, atom: usize) -> Option<String> {
    let a = &mol.atoms[atom];
    let plain_carbon = a.element == Element::C && a.charge == 0 && a.isotope.is_none();
    if plain_carbon && mol.degree(atom) > 0 {
        return None;
    }
    let mut label = String::new();
    if let Some(isotope) = a.isotope {
        label.push_str(&isotope.to_string());
    }
    label.push_str(a.element.symbol());
    match a.h_count() {
        0 => {}
        1 => label.push('H'),
        n => label.push_str(&format!("H{n}")),
    }
    match a.charge {
        0 => {}
        1 => label.push('+'),
        -1 => label.push('-'),
        c if c > 0 => label.push_str(&format!("{c}+")),
        c => label.push_str(&format!("{}-", -c)),
    }
    Some(label)
}

struct Panel<'o> {
    origin: Vec2,
    size: Vec2,
    options: &'o DrawOptions,
}

/// Maps molecule coordinates to pixels.
struct Transform {
    center: Vec2,
    mid: Vec2,
    scale: f32,
}

impl Transform {
    fn apply(&self, p: Vec2) -> Vec2 {
        let d = p - self.mid;
        self.center + Vec2::new(d.x, -d.y) * self.scale
    }
}

impl Panel<'_> {
    fn legend_height(&self, legend: &str) -> f32 {
        if legend.is_empty() {
            0.0
        } else {
            (GLYPH_SIZE * self.options.legend_scale) as f32 + 4.0
        }
    }

    fn transform(&self, coords: &[Vec2], legend: &str) -> Transform {
        let opts = self.options;
        let area = Vec2::new(
            self.size.x - 2.0 * opts.padding,
            self.size.y - 2.0 * opts.padding - self.legend_height(legend),
        )
        .max(Vec2::ONE);
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for &p in coords {
            min = min.min(p);
            max = max.max(p);
        }
        if coords.is_empty() {
            (min, max) = (Vec2::ZERO, Vec2::ZERO);
        }
        // One extra bond length leaves room for the labels of the outermost atoms.
        let extent = max - min + Vec2::ONE;
        let scale = (area.x / extent.x).min(area.y / extent.y).min(opts.max_bond_length);
        Transform {
            center: self.origin + Vec2::new(0.5 * self.size.x, opts.padding + 0.5 * area.y),
            mid: 0.5 * (min + max),
            scale,
        }
    }

    fn draw(
        &self,
        image: &mut RgbaImage,
        mol: &Molecule,
        legend: &str,
        highlight: Option<&Highlight>,
    ) {
        let opts = self.options;
        let coords = compute_coords(mol);
        let transform = self.transform(&coords, legend);
        let scale = transform.scale;
        let px: Vec<Vec2> = coords.iter().map(|&p| transform.apply(p)).collect();
        let labels: Vec<Option<String>> =
            (0..mol.atom_count()).map(|a| atom_label(mol, a)).collect();

        if let Some(highlight) = highlight {
            let color = rgba(opts.highlight_color);
            let width = opts.highlight_bond_width * scale;
            for &bond in &highlight.bonds {
                let bond = &mol.bonds[bond];
                let (a, b) = (px[bond.begin], px[bond.end]);
                canvas::draw_line(image, a, b, width, color);
                canvas::fill_disc(image, a, 0.5 * width, color);
                canvas::fill_disc(image, b, 0.5 * width, color);
            }
            for &atom in &highlight.atoms {
                canvas::fill_disc(image, px[atom], opts.highlight_radius * scale, color);
            }
        }

        let ring_centers = ring_centers(mol, &coords);
        let clearance = 0.6 * (GLYPH_SIZE * opts.label_scale) as f32;
        for (idx, bond) in mol.bonds.iter().enumerate() {
            let mut a = px[bond.begin];
            let mut b = px[bond.end];
            let Some(dir) = (b - a).try_normalize() else {
                continue;
            };
            if labels[bond.begin].is_some() {
                a += dir * clearance;
            }
            if labels[bond.end].is_some() {
                b -= dir * clearance;
            }
            if (b - a).dot(dir) <= 1.0 {
                continue;
            }
            let colors = (
                mol.atoms[bond.begin].element.color(),
                mol.atoms[bond.end].element.color(),
            );
            let offset = opts.multiple_bond_offset * scale;
            let normal = dir.perp();
            match bond.kekule {
                BondOrder::Single | BondOrder::Aromatic => self.bond_line(image, a, b, colors),
                BondOrder::Double => match ring_centers[idx] {
                    Some(center) => {
                        let center = transform.apply(center);
                        let inward = if (center - a).dot(normal) < 0.0 { -normal } else { normal };
                        let inset = 0.15 * (b - a);
                        self.bond_line(image, a, b, colors);
                        self.bond_line(
                            image,
                            a + inward * offset + inset,
                            b + inward * offset - inset,
                            colors,
                        );
                    }
                    None => {
                        let half = 0.5 * offset * normal;
                        self.bond_line(image, a + half, b + half, colors);
                        self.bond_line(image, a - half, b - half, colors);
                    }
                },
                BondOrder::Triple | BondOrder::Quadruple => {
                    self.bond_line(image, a, b, colors);
                    self.bond_line(image, a + offset * normal, b + offset * normal, colors);
                    self.bond_line(image, a - offset * normal, b - offset * normal, colors);
                }
            }
        }

        for (atom, label) in labels.iter().enumerate() {
            let Some(label) = label else {
                continue;
            };
            let s = opts.label_scale;
            let (w, h) = (canvas::text_width(label, s), GLYPH_SIZE * s);
            let x = (px[atom].x - 0.5 * w as f32).round() as i64;
            let y = (px[atom].y - 0.5 * h as f32).round() as i64;
            let background = match highlight {
                Some(hl) if hl.contains_atom(atom) => opts.highlight_color,
                _ => opts.background,
            };
            canvas::fill_rect(image, x - 1, y - 1, w + 2, h + 2, rgba(background));
            let color = rgba(mol.atoms[atom].element.color());
            canvas::draw_text(image, x, y, label, s, color);
        }

        if opts.atom_indices {
            for (atom, &p) in px.iter().enumerate() {
                let (x, y) = (p.x.round() as i64 + 4, p.y.round() as i64 + 4);
                canvas::draw_text(image, x, y, &atom.to_string(), 1, rgba(INDEX_COLOR));
            }
        }

        self.draw_legend(image, legend);
    }

    /// Draw a bond line, each half in the colour of the atom at that end.
    fn bond_line(&self, image: &mut RgbaImage, a: Vec2, b: Vec2, (ca, cb): ([u8; 3], [u8; 3])) {
        let width = self.options.bond_width;
        if ca == cb {
            canvas::draw_line(image, a, b, width, rgba(ca));
        } else {
            let mid = 0.5 * (a + b);
            canvas::draw_line(image, a, mid, width, rgba(ca));
            canvas::draw_line(image, mid, b, width, rgba(cb));
        }
    }

    fn draw_legend(&self, image: &mut RgbaImage, legend: &str) {
        if legend.is_empty() {
            return;
        }
        let scale = self.options.legend_scale.max(1);
        let max_chars = (self.size.x as u32 / (GLYPH_SIZE * scale)) as usize;
        let text: String = legend.chars().take(max_chars).collect();
        let width = canvas::text_width(&text, scale) as f32;
        let x = self.origin.x + 0.5 * (self.size.x - width);
        let bottom = self.origin.y + self.size.y - 0.5 * self.options.padding;
        let y = bottom - self.legend_height(legend);
        let color: Rgba<u8> = rgba(LEGEND_COLOR);
        canvas::draw_text(image, x.round() as i64, y.round() as i64, &text, scale, color);
    }
}

/// For each ring bond, the center of the smallest ring it is part of.
fn ring_centers(mol: &Molecule, coords: &[Vec2]) -> Vec<Option<Vec2>> {
    let rings = RingInfo::new(mol);
    let mut centers = vec![None; mol.bond_count()];
    for ring in &rings.rings {
        let center = ring.iter().map(|&a| coords[a]).sum::<Vec2>() / ring.len() as f32;
        for bond in RingInfo::ring_bonds(mol, ring) {
            if centers[bond].is_none() {
                centers[bond] = Some(center);
            }
        }
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::{parse_smiles, Pattern};

    fn molecules(smiles: &[(&str, &str)]) -> Vec<Molecule> {
        smiles
            .iter()
            .map(|&(smiles, name)| {
                let mut mol = parse_smiles(smiles).unwrap();
                mol.name = name.to_string();
                mol
            })
            .collect()
    }

    #[test]
    fn labels() {
        let label = |smiles: &str, atom| atom_label(&parse_smiles(smiles).unwrap(), atom);
        assert_eq!(label("CCO", 0), None);
        assert_eq!(label("CCO", 2), Some("OH".to_string()));
        assert_eq!(label("C", 0), Some("CH4".to_string()));
        assert_eq!(label("C[NH3+]", 1), Some("NH3+".to_string()));
        assert_eq!(label("[13CH4]", 0), Some("13CH4".to_string()));
        assert_eq!(label("[O-2]", 0), Some("O2-".to_string()));
    }

    #[test]
    fn png_dimensions() {
        let mols = molecules(&[("CCO", "ethanol"), ("CC(=O)O", "acetic_acid")]);
        let png = draw_molecule_grid(&mols, None, &DrawOptions::default()).unwrap();
        let image = image::load_from_memory(&png).unwrap();
        assert_eq!((image.width(), image.height()), (900, 300));

        let mols = molecules(&[("C", "a"), ("N", "b"), ("O", "c"), ("S", "d")]);
        let png = draw_molecule_grid(&mols, None, &DrawOptions::default()).unwrap();
        let image = image::load_from_memory(&png).unwrap();
        assert_eq!((image.width(), image.height()), (900, 600));
    }

    #[test]
    fn empty_panels_stay_blank() {
        let mols = molecules(&[("c1ccccc1", "benzene")]);
        let mut drawer = GridDrawer::new(GridLayout::new(1).unwrap(), DrawOptions::default());
        drawer.draw(&mols[0], "benzene", None).unwrap();
        let image = image::load_from_memory(&drawer.finish().unwrap()).unwrap().to_rgba8();
        let white = rgba([255, 255, 255]);
        let (first, rest): (Vec<_>, Vec<_>) =
            image.enumerate_pixels().partition(|(x, _, _)| *x < 300);
        assert!(first.iter().any(|(_, _, p)| **p != white));
        assert!(rest.iter().all(|(_, _, p)| **p == white));
    }

    #[test]
    fn highlights_are_drawn() {
        let mols = molecules(&[("CC(=O)O", "acetic_acid")]);
        let pattern = Pattern::compile("C=O").unwrap();
        let highlights = vec![Highlight::from_match(&mols[0], pattern.first_match(&mols[0]))];
        let options = DrawOptions::default();
        let png = draw_molecule_grid(&mols, Some(&highlights), &options).unwrap();
        let image = image::load_from_memory(&png).unwrap().to_rgba8();
        let color = rgba(options.highlight_color);
        assert!(image.pixels().any(|&p| p == color));

        let png = draw_molecule_grid(&mols, None, &options).unwrap();
        let image = image::load_from_memory(&png).unwrap().to_rgba8();
        assert!(!image.pixels().any(|&p| p == color));
    }

    #[test]
    fn deterministic() {
        let mols = molecules(&[("CN1C=NC2=C1C(=O)N(C(=O)N2C)C", "caffeine"), ("C#N", "hcn")]);
        let a = draw_molecule_grid(&mols, None, &DrawOptions::default()).unwrap();
        let b = draw_molecule_grid(&mols, None, &DrawOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn grid_errors() {
        assert!(matches!(
            draw_molecule_grid(&[], None, &DrawOptions::default()),
            Err(DrawError::Grid(GridError::Empty))
        ));
        let mols = molecules(&[("C", "a"), ("N", "b")]);
        let mut drawer = GridDrawer::new(GridLayout::new(1).unwrap(), DrawOptions::default());
        drawer.draw(&mols[0], "a", None).unwrap();
        assert_eq!(drawer.draw(&mols[1], "b", None), Err(GridError::Full { capacity: 1 }));
    }
}
