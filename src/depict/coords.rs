//! Two-dimensional coordinate generation.
//!
//! Ring systems are built first as fused regular polygons in their own frame. Each connected
//! fragment is then grown outward from a seed (its largest ring system, or a terminal atom) in
//! breadth-first order. Chains zigzag, and ring systems are attached as rigid bodies. All bonds
//! have unit length, apart from bonds in bridged systems which are approximated.

use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};

use glam::Vec2;

use crate::chem::mol::{BondOrder, Molecule};
use crate::chem::rings::RingInfo;

/// Horizontal space between disconnected fragments, in bond lengths.
const FRAGMENT_GAP: f32 = 1.5;

/// Compute 2D coordinates for every atom, centered on the origin.
pub fn compute_coords(mol: &Molecule) -> Vec<Vec2> {
    let rings = RingInfo::new(mol);
    let mut layout = Layout::new(mol, &rings);

    let mut offset = 0.0;
    for component in mol.components() {
        layout.place_component(&component);
        orient(&mut layout.pos, &component);
        let (min, max) = bounds(&layout.pos, &component);
        let shift = Vec2::new(offset - min.x, -0.5 * (min.y + max.y));
        for &atom in &component {
            layout.pos[atom] += shift;
        }
        offset += max.x - min.x + FRAGMENT_GAP;
    }

    let mut coords = layout.pos;
    let all: Vec<usize> = (0..coords.len()).collect();
    if !all.is_empty() {
        let (min, max) = bounds(&coords, &all);
        let center = 0.5 * (min + max);
        for pos in &mut coords {
            *pos -= center;
        }
    }
    coords
}

/// Rings that share at least one atom, directly or through other rings.
#[derive(Debug, Clone)]
struct RingSystem {
    rings: Vec<usize>,
    atoms: Vec<usize>,
}

fn ring_systems(rings: &RingInfo) -> Vec<RingSystem> {
    let mut systems: Vec<RingSystem> = Vec::new();
    for (idx, ring) in rings.rings.iter().enumerate() {
        let mut merged = RingSystem {
            rings: vec![idx],
            atoms: ring.clone(),
        };
        let (touching, rest): (Vec<_>, Vec<_>) = systems
            .into_iter()
            .partition(|system| system.atoms.iter().any(|a| ring.contains(a)));
        for system in touching {
            merged.rings.extend(system.rings);
            merged.atoms.extend(system.atoms);
        }
        merged.rings.sort_unstable();
        merged.atoms.sort_unstable();
        merged.atoms.dedup();
        systems = rest;
        systems.push(merged);
    }
    systems.sort_by_key(|system| system.atoms[0]);
    systems
}

fn angle(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

/// Lay out one ring system in its own frame.
fn layout_ring_system(rings: &RingInfo, system: &RingSystem, n_atoms: usize) -> Vec<Option<Vec2>> {
    let mut pos = vec![None; n_atoms];
    let mut pending: Vec<&[usize]> =
        system.rings.iter().map(|&r| rings.rings[r].as_slice()).collect();

    // Start from the ring with the most atoms shared with other rings.
    let shared = |ring: &[usize]| ring.iter().filter(|&&a| rings.num_atom_rings(a) > 1).count();
    let mut first = 0;
    for (i, &ring) in pending.iter().enumerate() {
        if shared(ring) > shared(pending[first]) {
            first = i;
        }
    }
    place_polygon(&mut pos, pending.remove(first));

    while !pending.is_empty() {
        let placed = |ring: &[usize]| ring.iter().filter(|&&a| pos[a].is_some()).count();
        let mut next = 0;
        for (i, &ring) in pending.iter().enumerate() {
            if placed(ring) > placed(pending[next]) {
                next = i;
            }
        }
        let ring = pending.remove(next);
        place_fused(&mut pos, ring);
    }
    pos
}

fn place_polygon(pos: &mut [Option<Vec2>], ring: &[usize]) {
    let n = ring.len() as f32;
    let radius = 0.5 / (PI / n).sin();
    let start = -0.5 * PI - PI / n;
    for (k, &atom) in ring.iter().enumerate() {
        pos[atom] = Some(radius * Vec2::from_angle(start + k as f32 * TAU / n));
    }
}

/// Place the unplaced atoms of a ring that shares atoms with already placed rings.
fn place_fused(pos: &mut [Option<Vec2>], ring: &[usize]) {
    let n = ring.len();
    let placed: Vec<bool> = ring.iter().map(|&a| pos[a].is_some()).collect();
    if placed.iter().all(|&p| !p) {
        place_polygon(pos, ring);
        return;
    }

    let known: Vec<Vec2> = pos.iter().flatten().copied().collect();
    let reference = known.iter().copied().sum::<Vec2>() / known.len() as f32;

    for k in 0..n {
        if !placed[k] || placed[(k + 1) % n] {
            continue;
        }
        let mut run = Vec::new();
        let mut j = (k + 1) % n;
        while !placed[j] {
            run.push(ring[j]);
            j = (j + 1) % n;
        }
        place_run(pos, ring[k], ring[j], &run, n, reference);
    }
}

/// Place a run of atoms between the placed atoms `p` and `q` on a circular arc that bulges away
/// from `reference`.
fn place_run(
    pos: &mut [Option<Vec2>],
    p: usize,
    q: usize,
    run: &[usize],
    ring_size: usize,
    reference: Vec2,
) {
    let (Some(pp), Some(pq)) = (pos[p], pos[q]) else {
        return;
    };

    // Spiro junction: only one atom of the ring is known.
    if p == q {
        let n = ring_size as f32;
        let radius = 0.5 / (PI / n).sin();
        let out = (pp - reference).try_normalize().unwrap_or(Vec2::X);
        let center = pp + radius * out;
        let start = angle(pp - center);
        for (j, &atom) in run.iter().enumerate() {
            let a = start + (j + 1) as f32 * TAU / n;
            pos[atom] = Some(center + radius * Vec2::from_angle(a));
        }
        return;
    }

    let segments = (run.len() + 1) as f32;
    let chord = pq - pp;
    let length = chord.length();
    if length >= segments - 1e-3 || length < 1e-3 {
        for (j, &atom) in run.iter().enumerate() {
            pos[atom] = Some(pp + chord * (j + 1) as f32 / segments);
        }
        return;
    }

    let mid = 0.5 * (pp + pq);
    let mut out = chord.perp().normalize();
    if (mid - reference).dot(out) < 0.0 {
        out = -out;
    }

    // Find the angle subtended by each unit segment such that the arc spans the chord.
    let span = |alpha: f32| (0.5 * segments * alpha).sin() / (0.5 * alpha).sin();
    let (mut lo, mut hi) = (1e-4, TAU / segments - 1e-4);
    for _ in 0..60 {
        let alpha = 0.5 * (lo + hi);
        if span(alpha) > length {
            lo = alpha;
        } else {
            hi = alpha;
        }
    }
    let alpha = 0.5 * (lo + hi);
    let radius = 0.5 / (0.5 * alpha).sin();
    let theta = segments * alpha;
    let center = mid - out * radius * (0.5 * theta).cos();
    let start = angle(pp - center);
    let apex = center + radius * Vec2::from_angle(start + 0.5 * theta);
    let sign = if (apex - mid).dot(out) >= 0.0 { 1.0 } else { -1.0 };
    for (j, &atom) in run.iter().enumerate() {
        let a = start + sign * (j + 1) as f32 * alpha;
        pos[atom] = Some(center + radius * Vec2::from_angle(a));
    }
}

struct Layout<'m> {
    mol: &'m Molecule,
    rings: &'m RingInfo,
    systems: Vec<RingSystem>,
    system_of: Vec<Option<usize>>,
    placed: Vec<bool>,
    pos: Vec<Vec2>,
    /// Which way a chain turns at each atom, so that consecutive turns alternate.
    side: Vec<f32>,
}

impl<'m> Layout<'m> {
    fn new(mol: &'m Molecule, rings: &'m RingInfo) -> Self {
        let n = mol.atom_count();
        let systems = ring_systems(rings);
        let mut system_of = vec![None; n];
        for (idx, system) in systems.iter().enumerate() {
            for &atom in &system.atoms {
                system_of[atom] = Some(idx);
            }
        }
        Self {
            mol,
            rings,
            systems,
            system_of,
            placed: vec![false; n],
            pos: vec![Vec2::ZERO; n],
            side: vec![1.0; n],
        }
    }

    fn place_component(&mut self, component: &[usize]) {
        let mut queue = VecDeque::new();

        let largest = component
            .iter()
            .filter_map(|&a| self.system_of[a])
            .fold(None, |best: Option<usize>, s| match best {
                Some(b) if self.systems[b].atoms.len() >= self.systems[s].atoms.len() => Some(b),
                _ => Some(s),
            });
        match largest {
            Some(system) => {
                let local = layout_ring_system(self.rings, &self.systems[system], self.pos.len());
                for &atom in &self.systems[system].atoms {
                    self.pos[atom] = local[atom].unwrap_or_default();
                    self.placed[atom] = true;
                    queue.push_back(atom);
                }
            }
            None => {
                let seed = component
                    .iter()
                    .copied()
                    .find(|&a| self.mol.degree(a) <= 1)
                    .unwrap_or(component[0]);
                self.placed[seed] = true;
                queue.push_back(seed);
            }
        }

        while let Some(atom) = queue.pop_front() {
            self.expand(atom, &mut queue);
        }
    }

    /// Whether the bonds around an atom should be drawn in a straight line.
    fn is_linear(&self, atom: usize) -> bool {
        let mut doubles = 0;
        for &(_, bond) in self.mol.adjacent(atom) {
            match self.mol.bonds[bond].kekule {
                BondOrder::Double => doubles += 1,
                BondOrder::Triple | BondOrder::Quadruple => return true,
                _ => {}
            }
        }
        doubles >= 2
    }

    fn expand(&mut self, atom: usize, queue: &mut VecDeque<usize>) {
        let origin = self.pos[atom];
        let mut directions = Vec::new();
        let mut todo = Vec::new();
        for nb in self.mol.neighbors(atom) {
            if self.placed[nb] {
                directions.push(angle(self.pos[nb] - origin));
            } else {
                todo.push(nb);
            }
        }
        if todo.is_empty() {
            return;
        }

        let m = todo.len();
        let angles: Vec<f32> = match directions.len() {
            0 => (0..m).map(|i| i as f32 * TAU / m as f32).collect(),
            1 if m == 1 => {
                let back = directions[0];
                if self.is_linear(atom) {
                    vec![back + PI]
                } else {
                    vec![back + self.side[atom] * TAU / 3.0]
                }
            }
            1 => {
                let back = directions[0];
                (0..m).map(|i| back + (i + 1) as f32 * TAU / (m + 1) as f32).collect()
            }
            _ => {
                let (start, width) = largest_gap(&mut directions);
                (0..m).map(|i| start + width * (i + 1) as f32 / (m + 1) as f32).collect()
            }
        };

        for (nb, a) in todo.into_iter().zip(angles) {
            if !self.placed[nb] {
                self.attach(atom, nb, a, queue);
            }
        }
    }

    fn attach(&mut self, from: usize, atom: usize, direction: f32, queue: &mut VecDeque<usize>) {
        let heading = Vec2::from_angle(direction);
        let target = self.pos[from] + heading;

        let Some(system) = self.system_of[atom] else {
            self.pos[atom] = target;
            self.placed[atom] = true;
            self.side[atom] = -self.side[from];
            queue.push_back(atom);
            return;
        };

        // Rigidly move the ring system so that the bond leaves it radially.
        let local = layout_ring_system(self.rings, &self.systems[system], self.pos.len());
        let anchor = local[atom].unwrap_or_default();
        let inner: Vec<Vec2> = self
            .mol
            .neighbors(atom)
            .filter(|&nb| self.system_of[nb] == Some(system))
            .filter_map(|nb| local[nb])
            .collect();
        let inner_center = if inner.is_empty() {
            Vec2::ZERO
        } else {
            inner.iter().copied().sum::<Vec2>() / inner.len() as f32
        };
        let outward = (anchor - inner_center).try_normalize().unwrap_or(Vec2::X);
        let rotation = (-heading).rotate(Vec2::new(outward.x, -outward.y));
        for &member in &self.systems[system].atoms {
            let p = local[member].unwrap_or_default();
            self.pos[member] = target + rotation.rotate(p - anchor);
            self.placed[member] = true;
            queue.push_back(member);
        }
    }
}

/// Sorts `directions` and returns the start angle and width of the widest angular gap.
fn largest_gap(directions: &mut [f32]) -> (f32, f32) {
    for d in directions.iter_mut() {
        *d = d.rem_euclid(TAU);
    }
    directions.sort_by(f32::total_cmp);
    let n = directions.len();
    let mut best = (directions[n - 1], directions[0] + TAU - directions[n - 1]);
    for w in directions.windows(2) {
        let width = w[1] - w[0];
        if width > best.1 {
            best = (w[0], width);
        }
    }
    best
}

/// Rotate a set of atoms so that their principal axis lies along x.
fn orient(pos: &mut [Vec2], atoms: &[usize]) {
    if atoms.len() < 2 {
        return;
    }
    let center = atoms.iter().map(|&a| pos[a]).sum::<Vec2>() / atoms.len() as f32;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for &a in atoms {
        let d = pos[a] - center;
        sxx += d.x * d.x;
        syy += d.y * d.y;
        sxy += d.x * d.y;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let rotation = Vec2::from_angle(-theta);
    for &a in atoms {
        pos[a] = rotation.rotate(pos[a] - center);
    }
}

fn bounds(pos: &[Vec2], atoms: &[usize]) -> (Vec2, Vec2) {
    let mut min = Vec2::splat(f32::INFINITY);
    let mut max = Vec2::splat(f32::NEG_INFINITY);
    for &a in atoms {
        min = min.min(pos[a]);
        max = max.max(pos[a]);
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::smiles::parse_smiles;

    fn coords(smiles: &str) -> (Molecule, Vec<Vec2>) {
        let mol = parse_smiles(smiles).unwrap();
        let coords = compute_coords(&mol);
        (mol, coords)
    }

    fn bond_lengths(mol: &Molecule, coords: &[Vec2]) -> Vec<f32> {
        mol.bonds.iter().map(|b| coords[b.begin].distance(coords[b.end])).collect()
    }

    fn min_separation(coords: &[Vec2]) -> f32 {
        let mut min = f32::INFINITY;
        for (i, a) in coords.iter().enumerate() {
            for b in &coords[i + 1..] {
                min = min.min(a.distance(*b));
            }
        }
        min
    }

    #[test]
    fn unit_bonds() {
        let cases = [
            "CCO",
            "c1ccccc1",
            "c1ccc2ccccc2c1",
            "CC(=O)Oc1ccccc1C(=O)O",
            "C1CCC2(C1)CCCC2",
        ];
        for smiles in cases {
            let (mol, coords) = coords(smiles);
            for length in bond_lengths(&mol, &coords) {
                assert!((length - 1.0).abs() < 1e-3, "{smiles}: bond of length {length}");
            }
        }
    }

    #[test]
    fn atoms_do_not_overlap() {
        let cases = [
            "CC(=O)Oc1ccccc1C(=O)O",
            "CC(C)(C)C",
            "c1ccc2c(c1)ccc1ccccc12",
            "C1CC2CCC1C2",
        ];
        for smiles in cases {
            let (_, coords) = coords(smiles);
            assert!(min_separation(&coords) > 0.5, "{smiles}");
        }
    }

    #[test]
    fn triple_bonds_are_linear() {
        let (_, coords) = coords("CC#CC");
        for pos in coords {
            assert!(pos.y.abs() < 1e-3);
        }
    }

    #[test]
    fn chains_lie_along_x() {
        let (_, coords) = coords("CCCCCCCC");
        let all: Vec<usize> = (0..coords.len()).collect();
        let (min, max) = bounds(&coords, &all);
        assert!(max.x - min.x > 3.0 * (max.y - min.y));
        // Centered on the origin.
        assert!((min + max).length() < 1e-3);
    }

    #[test]
    fn fragments_side_by_side() {
        let (_, coords) = coords("[Na+].[Cl-]");
        assert!((coords[0] - Vec2::new(-0.75, 0.0)).length() < 1e-4);
        assert!((coords[1] - Vec2::new(0.75, 0.0)).length() < 1e-4);
    }

    #[test]
    fn single_atom() {
        let (_, coords) = coords("C");
        assert_eq!(coords, vec![Vec2::ZERO]);
    }

    #[test]
    fn deterministic() {
        let (_, a) = coords("CN1C=NC2=C1C(=O)N(C(=O)N2C)C");
        let (_, b) = coords("CN1C=NC2=C1C(=O)N(C(=O)N2C)C");
        assert_eq!(a, b);
        assert!(a.iter().all(|p| p.is_finite()));
    }
}
