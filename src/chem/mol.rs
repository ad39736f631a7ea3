use crate::chem::element::Element;

/// The order of a bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// The contribution of this bond to the valence of each of its atoms.
    ///
    /// Aromatic bonds count as single here. Their extra π electron is accounted for by the
    /// kekulé assignment.
    pub fn valence(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub element: Element,
    pub charge: i8,
    pub isotope: Option<u16>,
    pub aromatic: bool,
    /// Hydrogens written inside a bracket atom, e.g. the 3 in `[NH3+]`.
    pub explicit_h: u8,
    /// Hydrogens implied by the valence model for organic subset atoms.
    pub implicit_h: u8,
    /// Atoms written in brackets never receive implicit hydrogens.
    pub bracket: bool,
    pub map: Option<u16>,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            charge: 0,
            isotope: None,
            aromatic: false,
            explicit_h: 0,
            implicit_h: 0,
            bracket: false,
            map: None,
        }
    }

    pub fn h_count(&self) -> u32 {
        u32::from(self.explicit_h) + u32::from(self.implicit_h)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub begin: usize,
    pub end: usize,
    pub order: BondOrder,
    pub aromatic: bool,
    /// The single/double assignment of this bond in the kekulé structure.
    ///
    /// Equal to `order` for bonds that were never aromatic.
    pub kekule: BondOrder,
}

impl Bond {
    /// Given one end of this bond, returns the other.
    pub fn other(&self, atom: usize) -> usize {
        if self.begin == atom {
            self.end
        } else {
            self.begin
        }
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.begin == atom || self.end == atom
    }
}

/// A molecule as parsed from a SMILES string.
///
/// Atoms and bonds are indexed in the order they appear in the input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    pub name: String,
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    /// For each atom, its `(neighbor, bond index)` pairs in bond creation order.
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Add a bond between `begin` and `end` and return its index.
    ///
    /// Callers are responsible for not adding a second bond between the same pair of atoms.
    pub fn add_bond(&mut self, begin: usize, end: usize, order: BondOrder) -> usize {
        let idx = self.bonds.len();
        self.bonds.push(Bond {
            begin,
            end,
            order,
            aromatic: order == BondOrder::Aromatic,
            kekule: order,
        });
        self.adjacency[begin].push((end, idx));
        self.adjacency[end].push((begin, idx));
        idx
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// The `(neighbor, bond index)` pairs of an atom.
    pub fn adjacent(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    pub fn neighbors(&self, atom: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[atom].iter().map(|&(n, _)| n)
    }

    /// The number of explicit (graph) neighbours of an atom.
    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<usize> {
        self.adjacency[a].iter().find(|&&(n, _)| n == b).map(|&(_, bond)| bond)
    }

    /// Total hydrogen count of an atom: bracket, implicit, and explicit hydrogen neighbours.
    pub fn total_h_count(&self, atom: usize) -> u32 {
        let h_neighbors = self
            .neighbors(atom)
            .filter(|&n| self.atoms[n].element == Element::H)
            .count() as u32;
        self.atoms[atom].h_count() + h_neighbors
    }

    /// Sum of the kekulé bond orders around an atom, without hydrogens.
    pub fn explicit_valence(&self, atom: usize) -> u32 {
        self.adjacency[atom]
            .iter()
            .map(|&(_, bond)| u32::from(self.bonds[bond].kekule.valence()))
            .sum()
    }

    /// Sum of bond orders including all attached hydrogens.
    pub fn total_valence(&self, atom: usize) -> u32 {
        self.explicit_valence(atom) + self.atoms[atom].h_count()
    }

    /// Connected components as lists of atom indices, each in ascending order.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.atom_count()];
        let mut components = Vec::new();
        for start in 0..self.atom_count() {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut stack = vec![start];
            let mut component = Vec::new();
            while let Some(atom) = stack.pop() {
                component.push(atom);
                for n in self.neighbors(atom) {
                    if !seen[n] {
                        seen[n] = true;
                        stack.push(n);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ethanol() -> Molecule {
        let mut mol = Molecule::new();
        let c1 = mol.add_atom(Atom::new(Element::C));
        let c2 = mol.add_atom(Atom::new(Element::C));
        let o = mol.add_atom(Atom::new(Element::O));
        mol.add_bond(c1, c2, BondOrder::Single);
        mol.add_bond(c2, o, BondOrder::Single);
        mol
    }

    #[test]
    fn adjacency() {
        let mol = ethanol();
        assert_eq!(mol.degree(1), 2);
        assert_eq!(mol.neighbors(1).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(mol.bond_between(2, 1), Some(1));
        assert_eq!(mol.bond_between(0, 2), None);
        assert_eq!(mol.bonds[1].other(2), 1);
    }

    #[test]
    fn components() {
        let mut mol = ethanol();
        mol.add_atom(Atom::new(Element::N));
        assert_eq!(mol.components(), vec![vec![0, 1, 2], vec![3]]);
    }
}
