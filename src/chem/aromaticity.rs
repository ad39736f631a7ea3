//! Hückel aromaticity perception on a kekulé structure.

use crate::chem::element::Element;
use crate::chem::mol::{BondOrder, Molecule};
use crate::chem::rings::RingInfo;

/// The number of π electrons an atom donates to a ring, or `None` if it cannot be part of an
/// aromatic ring at all.
fn pi_electrons(mol: &Molecule, rings: &RingInfo, atom: usize) -> Option<u8> {
    let a = &mol.atoms[atom];
    let connections = mol.degree(atom) + a.h_count() as usize;
    if connections > 3 {
        return None;
    }
    let mut exocyclic_double = None;
    for &(nb, b) in mol.adjacent(atom) {
        match mol.bonds[b].kekule {
            BondOrder::Double if rings.bond_in_ring[b] => return Some(1),
            BondOrder::Double => exocyclic_double = Some(nb),
            BondOrder::Triple | BondOrder::Quadruple => return None,
            _ => {}
        }
    }
    if let Some(partner) = exocyclic_double {
        // A carbonyl-like exocyclic bond pulls the electrons out of the ring.
        return match mol.atoms[partner].element {
            Element::N | Element::O | Element::S => Some(0),
            _ => None,
        };
    }
    let valence = mol.total_valence(atom);
    match (a.element.valence_electrons(), a.charge) {
        // Pyrrole N, furan O, thiophene S.
        (Some(5), 0) if valence == 3 => Some(2),
        (Some(6), 0) if valence == 2 => Some(2),
        // Cyclopentadienyl anion.
        (Some(4), -1) if valence == 3 => Some(2),
        (Some(5), -1) if valence == 2 => Some(2),
        // Tropylium cation, borole.
        (Some(4), 1) if valence == 3 => Some(0),
        (Some(3), 0) if valence == 3 => Some(0),
        (Some(6), 1) if valence == 3 => Some(2),
        _ => None,
    }
}

fn is_huckel(electrons: u32) -> bool {
    electrons >= 2 && electrons % 4 == 2
}

fn ring_electrons(mol: &Molecule, rings: &RingInfo, atoms: &[usize]) -> Option<u32> {
    atoms.iter().map(|&a| pi_electrons(mol, rings, a).map(u32::from)).sum()
}

/// Perceive aromaticity from scratch.
///
/// Each SSSR ring, and each pair of rings fused on a single bond, is tested against the 4n+2
/// rule. Atoms and ring bonds of aromatic rings are flagged; afterwards every bond's `order` is
/// either `Aromatic` or its kekulé order.
pub fn perceive_aromaticity(mol: &mut Molecule, rings: &RingInfo) {
    for atom in &mut mol.atoms {
        atom.aromatic = false;
    }
    for bond in &mut mol.bonds {
        bond.aromatic = false;
    }

    let mut aromatic_rings: Vec<Vec<usize>> = Vec::new();
    for ring in &rings.rings {
        if ring_electrons(mol, rings, ring).is_some_and(is_huckel) {
            aromatic_rings.push(ring.clone());
        }
    }
    // Fused envelopes such as azulene, where neither ring is aromatic on its own.
    for (i, a) in rings.rings.iter().enumerate() {
        for b in &rings.rings[i + 1..] {
            let shared: Vec<usize> = a.iter().copied().filter(|x| b.contains(x)).collect();
            if shared.len() != 2 || mol.bond_between(shared[0], shared[1]).is_none() {
                continue;
            }
            if aromatic_rings.contains(a) && aromatic_rings.contains(b) {
                continue;
            }
            let mut union = a.clone();
            union.extend(b.iter().filter(|x| !a.contains(x)));
            if ring_electrons(mol, rings, &union).is_some_and(is_huckel) {
                aromatic_rings.push(a.clone());
                aromatic_rings.push(b.clone());
            }
        }
    }

    for ring in &aromatic_rings {
        for &atom in ring {
            mol.atoms[atom].aromatic = true;
        }
        for bond in RingInfo::ring_bonds(mol, ring) {
            mol.bonds[bond].aromatic = true;
        }
    }
    for bond in &mut mol.bonds {
        bond.order = if bond.aromatic { BondOrder::Aromatic } else { bond.kekule };
    }
}

#[cfg(test)]
mod tests {
    use crate::chem::smiles::parse_smiles;

    fn aromatic_atoms(smiles: &str) -> Vec<bool> {
        parse_smiles(smiles).unwrap().atoms.iter().map(|a| a.aromatic).collect()
    }

    #[test]
    fn kekule_benzene_is_aromatic() {
        assert_eq!(aromatic_atoms("C1=CC=CC=C1"), vec![true; 6]);
        assert_eq!(aromatic_atoms("c1ccccc1"), vec![true; 6]);
    }

    #[test]
    fn heteroaromatics() {
        assert_eq!(aromatic_atoms("c1ccoc1"), vec![true; 5]);
        assert_eq!(aromatic_atoms("C1=CNC=C1"), vec![true; 5]);
        assert_eq!(
            aromatic_atoms("O=c1cc[nH]cc1"),
            vec![false, true, true, true, true, true, true]
        );
    }

    #[test]
    fn non_aromatic_rings() {
        assert_eq!(aromatic_atoms("C1=CCC=C1"), vec![false; 5]);
        assert_eq!(aromatic_atoms("C1=CC=CC=CC=C1"), vec![false; 8]);
        assert_eq!(aromatic_atoms("C1CCCCC1"), vec![false; 6]);
    }

    #[test]
    fn substituted() {
        let aromatic = aromatic_atoms("CC(=O)Oc1ccccc1C(=O)O");
        assert_eq!(aromatic.iter().filter(|&&a| a).count(), 6);
        assert!(!aromatic[0]);
    }

    #[test]
    fn azulene() {
        assert_eq!(aromatic_atoms("c1cc2cccccc2c1"), vec![true; 10]);
    }
}
