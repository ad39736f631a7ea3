use crate::chem::mol::Molecule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValenceError {
    pub atom: usize,
    pub symbol: &'static str,
    pub valence: u32,
}

impl std::fmt::Display for ValenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            atom,
            symbol,
            valence,
        } = self;
        write!(
            f,
            "explicit valence for atom #{atom} {symbol}, {valence}, is greater than permitted"
        )
    }
}

impl std::error::Error for ValenceError {}

/// Fill in implicit hydrogens and check every atom against its allowed valences.
///
/// Organic subset atoms are topped up to the lowest allowed valence that fits their bonds.
/// Bracket atoms keep the hydrogens they were written with. Elements without a valence model
/// (most metals) are accepted as written.
pub fn assign_implicit_hydrogens(mol: &mut Molecule) -> Result<(), ValenceError> {
    for atom in 0..mol.atom_count() {
        let a = &mol.atoms[atom];
        let valence = mol.explicit_valence(atom) + u32::from(a.explicit_h);
        let allowed: Vec<u32> = a
            .element
            .valences_with_charge(a.charge)
            .into_iter()
            .map(u32::from)
            .collect();
        if allowed.is_empty() {
            continue;
        }
        let error = ValenceError {
            atom,
            symbol: a.element.symbol(),
            valence,
        };
        if a.bracket {
            if allowed.iter().all(|&v| valence > v) {
                return Err(error);
            }
        } else {
            let fit = allowed.iter().find(|&&v| v >= valence).ok_or(error)?;
            // Allowed valences come from a `u8` table, so the difference fits.
            mol.atoms[atom].implicit_h = (fit - valence) as u8;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::chem::smiles::{parse_smiles, SmilesError};

    fn h_counts(smiles: &str) -> Vec<u32> {
        parse_smiles(smiles).unwrap().atoms.iter().map(|a| a.h_count()).collect()
    }

    #[test]
    fn organic_subset() {
        assert_eq!(h_counts("CCO"), vec![3, 2, 1]);
        assert_eq!(h_counts("CC(=O)O"), vec![3, 0, 0, 1]);
        assert_eq!(h_counts("C#N"), vec![1, 0]);
        assert_eq!(h_counts("c1ccncc1"), vec![1, 1, 1, 0, 1, 1]);
        assert_eq!(h_counts("CS(=O)(=O)C"), vec![3, 0, 0, 0, 3]);
        assert_eq!(h_counts("ClC(Cl)Cl"), vec![0, 1, 0, 0]);
    }

    #[test]
    fn bracket_atoms() {
        assert_eq!(h_counts("[NH4+]"), vec![4]);
        assert_eq!(h_counts("C[N+](C)(C)C"), vec![3, 0, 3, 3, 3]);
        assert_eq!(h_counts("[O-]C=O"), vec![0, 1, 0]);
        assert_eq!(h_counts("[Na+].[Cl-]"), vec![0, 0]);
    }

    #[test]
    fn hypervalent() {
        assert!(matches!(parse_smiles("C(C)(C)(C)(C)C"), Err(SmilesError::Valence(_))));
        assert!(matches!(parse_smiles("[CH5]"), Err(SmilesError::Valence(_))));
        assert!(matches!(parse_smiles("O=O=O"), Err(SmilesError::Valence(_))));
    }

    #[test]
    fn huge_hydrogen_counts() {
        assert!(matches!(parse_smiles("[CH255]C"), Err(SmilesError::Valence(_))));
        assert!(matches!(parse_smiles("C=[NH999999]"), Err(SmilesError::Valence(_))));
        assert!(matches!(parse_smiles("[CH255]"), Err(SmilesError::Valence(_))));
    }
}
