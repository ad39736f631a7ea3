//! Ring perception.
//!
//! The smallest set of smallest rings (SSSR) is found by generating candidate cycles from
//! breadth-first trees rooted at every ring atom, and then greedily selecting the shortest
//! candidates that are linearly independent over GF(2) in terms of their bonds.

use std::collections::VecDeque;

use crate::chem::mol::Molecule;

/// Ring information of a molecule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingInfo {
    /// The SSSR, each ring as a cycle of atom indices in path order. Sorted by size.
    pub rings: Vec<Vec<usize>>,
    /// Whether each atom is part of any cycle.
    pub atom_in_ring: Vec<bool>,
    /// Whether each bond is part of any cycle.
    pub bond_in_ring: Vec<bool>,
}

impl RingInfo {
    pub fn new(mol: &Molecule) -> Self {
        let bond_in_ring: Vec<bool> =
            (0..mol.bond_count()).map(|b| bond_in_cycle(mol, b)).collect();
        let mut atom_in_ring = vec![false; mol.atom_count()];
        for (bond, &in_ring) in mol.bonds.iter().zip(&bond_in_ring) {
            if in_ring {
                atom_in_ring[bond.begin] = true;
                atom_in_ring[bond.end] = true;
            }
        }
        let rings = sssr(mol, &atom_in_ring, &bond_in_ring);
        Self {
            rings,
            atom_in_ring,
            bond_in_ring,
        }
    }

    /// The number of SSSR rings this atom is a member of.
    pub fn num_atom_rings(&self, atom: usize) -> usize {
        self.rings.iter().filter(|ring| ring.contains(&atom)).count()
    }

    /// Whether this atom is in an SSSR ring of exactly `size` atoms.
    pub fn atom_in_ring_of_size(&self, atom: usize, size: usize) -> bool {
        self.rings.iter().any(|ring| ring.len() == size && ring.contains(&atom))
    }

    /// The bond indices along a ring, in path order.
    pub fn ring_bonds(mol: &Molecule, ring: &[usize]) -> Vec<usize> {
        (0..ring.len())
            .filter_map(|i| mol.bond_between(ring[i], ring[(i + 1) % ring.len()]))
            .collect()
    }
}

/// A bond is in a cycle if its atoms stay connected once it is removed.
fn bond_in_cycle(mol: &Molecule, bond: usize) -> bool {
    let (start, goal) = (mol.bonds[bond].begin, mol.bonds[bond].end);
    let mut seen = vec![false; mol.atom_count()];
    seen[start] = true;
    let mut queue = VecDeque::from([start]);
    while let Some(atom) = queue.pop_front() {
        for &(n, b) in mol.adjacent(atom) {
            if b == bond || seen[n] {
                continue;
            }
            if n == goal {
                return true;
            }
            seen[n] = true;
            queue.push_back(n);
        }
    }
    false
}

/// Bond incidence vector of a cycle, packed into words.
type BondSet = Vec<u64>;

fn bond_set(mol: &Molecule, cycle: &[usize]) -> BondSet {
    let mut set = vec![0u64; mol.bond_count().div_ceil(64)];
    for bond in RingInfo::ring_bonds(mol, cycle) {
        set[bond / 64] |= 1 << (bond % 64);
    }
    set
}

fn sssr(mol: &Molecule, atom_in_ring: &[bool], bond_in_ring: &[bool]) -> Vec<Vec<usize>> {
    let ring_bonds = bond_in_ring.iter().filter(|&&r| r).count();
    let ring_atoms = atom_in_ring.iter().filter(|&&r| r).count();
    if ring_bonds == 0 {
        return Vec::new();
    }
    // Every ring system is a connected component of the ring subgraph.
    let n_systems = ring_systems(mol, atom_in_ring, bond_in_ring);
    let target = ring_bonds + n_systems - ring_atoms;

    let mut candidates = candidate_cycles(mol, atom_in_ring, bond_in_ring);
    // Stable, so that equally sized candidates keep their generation order.
    candidates.sort_by_key(|cycle| cycle.len());

    let mut basis: Vec<(usize, BondSet)> = Vec::new();
    let mut rings = Vec::new();
    for cycle in candidates {
        if rings.len() == target {
            break;
        }
        let mut v = bond_set(mol, &cycle);
        for (pivot, row) in &basis {
            if v[pivot / 64] & (1 << (pivot % 64)) != 0 {
                for (a, b) in v.iter_mut().zip(row) {
                    *a ^= b;
                }
            }
        }
        let Some(pivot) = lowest_bit(&v) else {
            continue;
        };
        basis.push((pivot, v));
        rings.push(cycle);
    }
    rings
}

fn lowest_bit(set: &[u64]) -> Option<usize> {
    set.iter()
        .enumerate()
        .find(|(_, &word)| word != 0)
        .map(|(i, word)| i * 64 + word.trailing_zeros() as usize)
}

fn ring_systems(mol: &Molecule, atom_in_ring: &[bool], bond_in_ring: &[bool]) -> usize {
    let mut seen = vec![false; mol.atom_count()];
    let mut count = 0;
    for start in (0..mol.atom_count()).filter(|&a| atom_in_ring[a]) {
        if seen[start] {
            continue;
        }
        count += 1;
        seen[start] = true;
        let mut stack = vec![start];
        while let Some(atom) = stack.pop() {
            for &(n, b) in mol.adjacent(atom) {
                if bond_in_ring[b] && !seen[n] {
                    seen[n] = true;
                    stack.push(n);
                }
            }
        }
    }
    count
}

/// Horton-style candidates: for each root and each ring bond `(x, y)`, the cycle formed by the
/// tree paths root→x and root→y plus the bond, if the two paths only share the root.
fn candidate_cycles(
    mol: &Molecule,
    atom_in_ring: &[bool],
    bond_in_ring: &[bool],
) -> Vec<Vec<usize>> {
    let mut candidates: Vec<Vec<usize>> = Vec::new();
    let mut seen_sets: Vec<BondSet> = Vec::new();
    for root in (0..mol.atom_count()).filter(|&a| atom_in_ring[a]) {
        let parent = bfs_tree(mol, root, bond_in_ring);
        for (b, bond) in mol.bonds.iter().enumerate() {
            if !bond_in_ring[b] {
                continue;
            }
            let (Some(px), Some(py)) = (
                path_to_root(&parent, bond.begin),
                path_to_root(&parent, bond.end),
            ) else {
                continue;
            };
            // Both paths end at the root; they may share nothing else.
            let shared = px.iter().filter(|a| py.contains(a)).count();
            if shared != 1 || px.len() + py.len() < 4 {
                continue;
            }
            let mut cycle: Vec<usize> = px.iter().rev().copied().collect();
            cycle.extend(py.iter().take(py.len() - 1));
            let set = bond_set(mol, &cycle);
            if RingInfo::ring_bonds(mol, &cycle).len() != cycle.len() || seen_sets.contains(&set) {
                continue;
            }
            seen_sets.push(set);
            candidates.push(cycle);
        }
    }
    candidates
}

fn bfs_tree(mol: &Molecule, root: usize, bond_in_ring: &[bool]) -> Vec<Option<usize>> {
    let mut parent = vec![None; mol.atom_count()];
    let mut seen = vec![false; mol.atom_count()];
    seen[root] = true;
    let mut queue = VecDeque::from([root]);
    while let Some(atom) = queue.pop_front() {
        for &(n, b) in mol.adjacent(atom) {
            if bond_in_ring[b] && !seen[n] {
                seen[n] = true;
                parent[n] = Some(atom);
                queue.push_back(n);
            }
        }
    }
    parent[root] = Some(root);
    parent
}

/// The path from `atom` up to the root of the tree, `atom` first and root last.
fn path_to_root(parent: &[Option<usize>], atom: usize) -> Option<Vec<usize>> {
    let mut path = vec![atom];
    let mut current = atom;
    loop {
        let p = parent[current]?;
        if p == current {
            return Some(path);
        }
        path.push(p);
        current = p;
    }
}
