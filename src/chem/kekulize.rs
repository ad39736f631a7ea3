//! Assign a kekulé structure to aromatic bonds.

use crate::chem::mol::{BondOrder, Molecule};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KekulizeError {
    /// The aromatic atoms that could not be given a double bond.
    pub atoms: Vec<usize>,
}

impl std::fmt::Display for KekulizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "can't kekulize mol, unkekulized atoms: {:?}", self.atoms)
    }
}

impl std::error::Error for KekulizeError {}

/// Whether an aromatic atom must take part in a double bond.
///
/// That is the case when the lowest allowed valence leaves room for one more bond after the
/// σ bonds (aromatic bonds counted as single) and hydrogens are accounted for. A pyridine `n`
/// does, a pyrrole `[nH]` and a furan `o` do not.
fn needs_pi_bond(mol: &Molecule, atom: usize, implicit_h: bool) -> bool {
    let a = &mol.atoms[atom];
    let sigma = mol.explicit_valence(atom) + u32::from(a.explicit_h);
    let valences = a.element.valences_with_charge(a.charge);
    let Some(valence) = valences.into_iter().map(u32::from).find(|&v| v >= sigma) else {
        return false;
    };
    // Organic subset atoms fill up with hydrogens, so they only need a double bond if there is
    // room for at least one.
    if implicit_h {
        valence > sigma
    } else {
        valence == sigma + 1
    }
}

/// Replace the kekulé orders of aromatic bonds with alternating single and double bonds.
///
/// Bond `order` and the `aromatic` flags are left alone; only `kekule` is assigned.
pub fn kekulize(mol: &mut Molecule) -> Result<(), KekulizeError> {
    let n = mol.atom_count();
    // While deciding, all aromatic bonds count as single.
    for bond in &mut mol.bonds {
        if bond.order == BondOrder::Aromatic {
            bond.kekule = BondOrder::Single;
        }
    }
    let need: Vec<bool> = (0..n)
        .map(|a| mol.atoms[a].aromatic && needs_pi_bond(mol, a, !mol.atoms[a].bracket))
        .collect();
    if !need.iter().any(|&x| x) {
        return Ok(());
    }
    // Candidate double bonds for each atom that needs one.
    let candidates: Vec<Vec<(usize, usize)>> = (0..n)
        .map(|a| {
            if !need[a] {
                return Vec::new();
            }
            mol.adjacent(a)
                .iter()
                .filter(|&&(nb, b)| need[nb] && mol.bonds[b].order == BondOrder::Aromatic)
                .copied()
                .collect()
        })
        .collect();

    let mut matched: Vec<Option<usize>> = vec![None; n];
    for group in pi_systems(&need, &candidates) {
        // A perfect matching needs an even number of atoms.
        if group.len() % 2 == 1 || !assign(&group, &candidates, &mut matched) {
            let atoms = group.into_iter().filter(|&a| matched[a].is_none()).collect();
            return Err(KekulizeError { atoms });
        }
    }
    for a in 0..n {
        if let Some(b) = matched[a] {
            mol.bonds[b].kekule = BondOrder::Double;
        }
    }
    Ok(())
}

/// Groups of atoms needing a double bond that are connected through candidate bonds.
///
/// Each group is matched on its own, so a failure in one never revisits choices made in another.
fn pi_systems(need: &[bool], candidates: &[Vec<(usize, usize)>]) -> Vec<Vec<usize>> {
    let mut seen = vec![false; need.len()];
    let mut groups = Vec::new();
    for start in 0..need.len() {
        if !need[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        let mut group = vec![start];
        let mut stack = vec![start];
        while let Some(atom) = stack.pop() {
            for &(nb, _) in &candidates[atom] {
                if !seen[nb] {
                    seen[nb] = true;
                    group.push(nb);
                    stack.push(nb);
                }
            }
        }
        group.sort_unstable();
        groups.push(group);
    }
    groups
}

/// Backtracking perfect matching over one group of atoms that need a double bond.
///
/// The most constrained atom is always handled first, which keeps the search linear for the
/// ring systems found in practice.
fn assign(
    group: &[usize],
    candidates: &[Vec<(usize, usize)>],
    matched: &mut [Option<usize>],
) -> bool {
    let open = |a: usize, matched: &[Option<usize>]| {
        candidates[a]
            .iter()
            .filter(|&&(nb, _)| matched[nb].is_none())
            .count()
    };
    let Some(atom) = group
        .iter()
        .copied()
        .filter(|&a| matched[a].is_none())
        .min_by_key(|&a| open(a, matched))
    else {
        return true;
    };
    for &(nb, bond) in &candidates[atom] {
        if matched[nb].is_some() {
            continue;
        }
        matched[atom] = Some(bond);
        matched[nb] = Some(bond);
        if assign(group, candidates, matched) {
            return true;
        }
        matched[atom] = None;
        matched[nb] = None;
    }
    // Partial results are kept for the error report.
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::smiles::{parse_smiles, SmilesError};

    fn double_bonds(smiles: &str) -> usize {
        let mol = parse_smiles(smiles).unwrap();
        mol.bonds.iter().filter(|b| b.kekule == BondOrder::Double).count()
    }

    #[test]
    fn benzene() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(double_bonds("c1ccccc1"), 3);
        for atom in 0..6 {
            let doubles = mol
                .adjacent(atom)
                .iter()
                .filter(|&&(_, b)| mol.bonds[b].kekule == BondOrder::Double)
                .count();
            assert_eq!(doubles, 1);
        }
    }

    #[test]
    fn heteroaromatics() {
        assert_eq!(double_bonds("c1ccncc1"), 3);
        assert_eq!(double_bonds("c1cc[nH]c1"), 2);
        assert_eq!(double_bonds("c1ccoc1"), 2);
        assert_eq!(double_bonds("Cn1cccc1"), 2);
        assert_eq!(double_bonds("c1ccc2ccccc2c1"), 5);
    }

    #[test]
    fn impossible() {
        assert!(parse_smiles("c1cccc1").is_err());
        assert!(parse_smiles("c1ccccc1c").is_err());
    }

    #[test]
    fn failure_after_many_rings() {
        let smiles = format!("{}c1cccc1", "c1ccccc1.".repeat(40));
        let start = std::time::Instant::now();
        assert!(matches!(parse_smiles(&smiles), Err(SmilesError::Kekulize(_))));
        assert!(start.elapsed().as_secs() < 5);

        let smiles = format!("c1cccc1.{}", "c1ccccc1.".repeat(40));
        assert!(matches!(parse_smiles(&smiles), Err(SmilesError::Kekulize(_))));
    }

    #[test]
    fn unmatched_atoms_are_reported() {
        let mut mol = parse_smiles("c1ccccc1").unwrap();
        assert!(kekulize(&mut mol).is_ok());
        let err = parse_smiles("c1ccccc1.c1cccc1").unwrap_err();
        let SmilesError::Kekulize(err) = err else {
            panic!("expected a kekulization error, got {err:?}");
        };
        assert!(!err.atoms.is_empty());
        assert!(err.atoms.iter().all(|&a| a >= 6));
    }
}
