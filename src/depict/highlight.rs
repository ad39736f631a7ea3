use crate::chem::mol::Molecule;

/// The atoms and bonds to highlight in one molecule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlight {
    /// Matched atoms in pattern order.
    pub atoms: Vec<usize>,
    /// Bonds with both ends among `atoms`, in bond order.
    pub bonds: Vec<usize>,
}

impl Highlight {
    /// Build a highlight from a substructure match. No match gives an empty highlight.
    pub fn from_match(mol: &Molecule, matched: Option<Vec<usize>>) -> Self {
        let Some(atoms) = matched else {
            return Self::default();
        };
        let bonds = mol
            .bonds
            .iter()
            .enumerate()
            .filter(|(_, bond)| atoms.contains(&bond.begin) && atoms.contains(&bond.end))
            .map(|(idx, _)| idx)
            .collect();
        Self { atoms, bonds }
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains_atom(&self, atom: usize) -> bool {
        self.atoms.contains(&atom)
    }

    pub fn contains_bond(&self, bond: usize) -> bool {
        self.bonds.contains(&bond)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::{parse_smiles, Pattern};

    #[test]
    fn carbonyl_of_acetic_acid() {
        let mol = parse_smiles("CC(=O)O").unwrap();
        let pattern = Pattern::compile("C=O").unwrap();
        let highlight = Highlight::from_match(&mol, pattern.first_match(&mol));
        assert_eq!(highlight.atoms, vec![1, 2]);
        assert_eq!(highlight.bonds, vec![1]);
    }

    #[test]
    fn no_match_is_empty() {
        let mol = parse_smiles("CCO").unwrap();
        let pattern = Pattern::compile("C=O").unwrap();
        let highlight = Highlight::from_match(&mol, pattern.first_match(&mol));
        assert!(highlight.is_empty());
        assert!(highlight.bonds.is_empty());
    }

    #[test]
    fn ring_closure_bond_is_included() {
        let mol = parse_smiles("c1ccccc1O").unwrap();
        let pattern = Pattern::compile("c1ccccc1").unwrap();
        let highlight = Highlight::from_match(&mol, pattern.first_match(&mol));
        assert_eq!(highlight.atoms.len(), 6);
        assert_eq!(highlight.bonds.len(), 6);
        assert!(!highlight.contains_atom(6));
        assert!(!highlight.contains_bond(6));
    }
}
