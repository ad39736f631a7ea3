//! SMILES parsing.
//!
//! Parsing happens in two stages. First the string is read into a molecular graph, with
//! aromatic atoms and bonds as written. Then the graph is sanitized: aromatic bonds get a kekulé
//! assignment, organic subset atoms get implicit hydrogens, and aromaticity is perceived anew
//! so that `C1=CC=CC=C1` and `c1ccccc1` end up as the same molecule.

use std::collections::BTreeMap;

use crate::chem::aromaticity::perceive_aromaticity;
use crate::chem::element::Element;
use crate::chem::kekulize::{kekulize, KekulizeError};
use crate::chem::mol::{Atom, BondOrder, Molecule};
use crate::chem::rings::RingInfo;
use crate::chem::valence::{assign_implicit_hydrogens, ValenceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    Empty,
    UnexpectedCharacter { pos: usize, ch: char },
    UnexpectedEnd,
    UnknownElement { pos: usize, symbol: String },
    NotAromatic { pos: usize, symbol: String },
    UnmatchedClose { pos: usize },
    UnclosedBranch,
    UnclosedRing(u16),
    ConflictingRingBond(u16),
    DuplicateBond { pos: usize },
    DanglingBond { pos: usize },
    NonRingAromatic { atom: usize },
    Valence(ValenceError),
    Kekulize(KekulizeError),
}

impl std::fmt::Display for SmilesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty SMILES string"),
            Self::UnexpectedCharacter { pos, ch } => {
                write!(f, "unexpected character {ch:?} at position {pos}")
            }
            Self::UnexpectedEnd => write!(f, "unexpected end of input"),
            Self::UnknownElement { pos, symbol } => {
                write!(f, "unknown element {symbol:?} at position {pos}")
            }
            Self::NotAromatic { pos, symbol } => {
                write!(f, "{symbol:?} at position {pos} cannot be aromatic")
            }
            Self::UnmatchedClose { pos } => write!(f, "unmatched ')' at position {pos}"),
            Self::UnclosedBranch => write!(f, "unclosed branch"),
            Self::UnclosedRing(n) => write!(f, "unclosed ring {n}"),
            Self::ConflictingRingBond(n) => {
                write!(f, "conflicting bond orders for ring closure {n}")
            }
            Self::DuplicateBond { pos } => write!(f, "duplicate bond at position {pos}"),
            Self::DanglingBond { pos } => {
                write!(f, "bond at position {pos} has no atom to bind to")
            }
            Self::NonRingAromatic { atom } => write!(f, "non-ring atom #{atom} marked aromatic"),
            Self::Valence(err) => write!(f, "{err}"),
            Self::Kekulize(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SmilesError {}

impl From<ValenceError> for SmilesError {
    fn from(err: ValenceError) -> Self {
        Self::Valence(err)
    }
}

impl From<KekulizeError> for SmilesError {
    fn from(err: KekulizeError) -> Self {
        Self::Kekulize(err)
    }
}

type Result<T> = std::result::Result<T, SmilesError>;

/// Parse and sanitize a SMILES string.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    let mut mol = read_graph(smiles)?;
    sanitize(&mut mol)?;
    Ok(mol)
}

/// Read a SMILES string into a graph without any chemical perception.
pub fn read_graph(smiles: &str) -> Result<Molecule> {
    if smiles.trim().is_empty() {
        return Err(SmilesError::Empty);
    }
    let mut parser = Parser::new(smiles);
    parser.parse()?;
    Ok(parser.mol)
}

fn sanitize(mol: &mut Molecule) -> Result<()> {
    kekulize(mol)?;
    assign_implicit_hydrogens(mol)?;
    let rings = RingInfo::new(mol);
    let stray = (0..mol.atom_count()).find(|&a| mol.atoms[a].aromatic && !rings.atom_in_ring[a]);
    if let Some(atom) = stray {
        return Err(SmilesError::NonRingAromatic { atom });
    }
    perceive_aromaticity(mol, &rings);
    Ok(())
}

struct RingOpening {
    atom: usize,
    order: Option<BondOrder>,
    pos: usize,
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    mol: Molecule,
    prev: Option<usize>,
    branches: Vec<usize>,
    pending: Option<(BondOrder, usize)>,
    rings: BTreeMap<u16, RingOpening>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.trim().as_bytes(),
            pos: 0,
            mol: Molecule::new(),
            prev: None,
            branches: Vec::new(),
            pending: None,
            rings: BTreeMap::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn unexpected(&self) -> SmilesError {
        match self.peek() {
            Some(ch) => SmilesError::UnexpectedCharacter {
                pos: self.pos,
                ch: ch as char,
            },
            None => SmilesError::UnexpectedEnd,
        }
    }

    fn parse(&mut self) -> Result<()> {
        while let Some(ch) = self.peek() {
            match ch {
                b'-' | b'=' | b'#' | b'$' | b':' | b'/' | b'\\' => {
                    if self.prev.is_none() || self.pending.is_some() {
                        return Err(self.unexpected());
                    }
                    let order = match ch {
                        b'=' => BondOrder::Double,
                        b'#' => BondOrder::Triple,
                        b'$' => BondOrder::Quadruple,
                        b':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    };
                    self.pending = Some((order, self.pos));
                    self.pos += 1;
                }
                b'(' => {
                    let Some(prev) = self.prev else {
                        return Err(self.unexpected());
                    };
                    if self.pending.is_some() {
                        return Err(self.unexpected());
                    }
                    self.branches.push(prev);
                    self.pos += 1;
                }
                b')' => {
                    if let Some((_, pos)) = self.pending {
                        return Err(SmilesError::DanglingBond { pos });
                    }
                    let Some(top) = self.branches.pop() else {
                        return Err(SmilesError::UnmatchedClose { pos: self.pos });
                    };
                    self.prev = Some(top);
                    self.pos += 1;
                }
                b'.' => {
                    if let Some((_, pos)) = self.pending {
                        return Err(SmilesError::DanglingBond { pos });
                    }
                    if self.prev.is_none() {
                        return Err(self.unexpected());
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                b'0'..=b'9' | b'%' => {
                    let pos = self.pos;
                    let number = self.ring_number()?;
                    self.ring_closure(number, pos)?;
                }
                b'[' => {
                    let atom = self.bracket_atom()?;
                    self.push_atom(atom)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.push_atom(atom)?;
                }
            }
        }
        if let Some((_, pos)) = self.pending {
            return Err(SmilesError::DanglingBond { pos });
        }
        if !self.branches.is_empty() {
            return Err(SmilesError::UnclosedBranch);
        }
        if let Some((&number, _)) = self.rings.iter().next() {
            return Err(SmilesError::UnclosedRing(number));
        }
        Ok(())
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.mol.atoms[a].aromatic && self.mol.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn push_atom(&mut self, atom: Atom) -> Result<()> {
        let idx = self.mol.add_atom(atom);
        if let Some(prev) = self.prev {
            let order = match self.pending.take() {
                Some((order, _)) => order,
                None => self.default_order(prev, idx),
            };
            self.mol.add_bond(prev, idx, order);
        } else if let Some((_, pos)) = self.pending {
            return Err(SmilesError::DanglingBond { pos });
        }
        self.prev = Some(idx);
        Ok(())
    }

    fn ring_number(&mut self) -> Result<u16> {
        match self.peek() {
            Some(b'%') => {
                self.pos += 1;
                let mut number = 0u16;
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'9') => {
                            number = number * 10 + (d - b'0') as u16;
                            self.pos += 1;
                        }
                        _ => return Err(self.unexpected()),
                    }
                }
                Ok(number)
            }
            Some(d @ b'0'..=b'9') => {
                self.pos += 1;
                Ok((d - b'0') as u16)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn ring_closure(&mut self, number: u16, pos: usize) -> Result<()> {
        let Some(atom) = self.prev else {
            return Err(SmilesError::UnexpectedCharacter {
                pos,
                ch: self.input[pos] as char,
            });
        };
        let order = self.pending.take().map(|(order, _)| order);
        let Some(opening) = self.rings.remove(&number) else {
            self.rings.insert(number, RingOpening { atom, order, pos });
            return Ok(());
        };
        let order = match (opening.order, order) {
            (Some(a), Some(b)) if a != b => return Err(SmilesError::ConflictingRingBond(number)),
            (Some(a), _) | (None, Some(a)) => a,
            (None, None) => self.default_order(opening.atom, atom),
        };
        if opening.atom == atom || self.mol.bond_between(opening.atom, atom).is_some() {
            return Err(SmilesError::DuplicateBond { pos: opening.pos.max(pos) });
        }
        self.mol.add_bond(opening.atom, atom, order);
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom> {
        let start = self.pos;
        let ch = self.peek().ok_or(SmilesError::UnexpectedEnd)?;
        let two = self.input.get(start..start + 2);
        let (symbol, aromatic, len) = match (ch, two) {
            (_, Some(b"Cl")) => ("Cl", false, 2),
            (_, Some(b"Br")) => ("Br", false, 2),
            (b'B', _) => ("B", false, 1),
            (b'C', _) => ("C", false, 1),
            (b'N', _) => ("N", false, 1),
            (b'O', _) => ("O", false, 1),
            (b'P', _) => ("P", false, 1),
            (b'S', _) => ("S", false, 1),
            (b'F', _) => ("F", false, 1),
            (b'I', _) => ("I", false, 1),
            (b'*', _) => ("*", false, 1),
            (b'b', _) => ("B", true, 1),
            (b'c', _) => ("C", true, 1),
            (b'n', _) => ("N", true, 1),
            (b'o', _) => ("O", true, 1),
            (b'p', _) => ("P", true, 1),
            (b's', _) => ("S", true, 1),
            _ => return Err(self.unexpected()),
        };
        self.pos += len;
        let element = Element::from_symbol(symbol).ok_or_else(|| SmilesError::UnknownElement {
            pos: start,
            symbol: symbol.to_string(),
        })?;
        let mut atom = Atom::new(element);
        atom.aromatic = aromatic;
        Ok(atom)
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut n: u32 = 0;
        while let Some(d @ b'0'..=b'9') = self.peek() {
            n = n.saturating_mul(10).saturating_add((d - b'0') as u32);
            self.pos += 1;
        }
        (self.pos > start).then_some(n)
    }

    fn bracket_symbol(&mut self) -> Result<(Element, bool)> {
        let start = self.pos;
        let rest = &self.input[start..];
        if rest.first() == Some(&b'*') {
            self.pos += 1;
            return Ok((Element::DUMMY, false));
        }
        // Two-letter aromatic symbols first, then the two-letter element, then one letter.
        for (text, symbol) in [("se", "Se"), ("as", "As"), ("te", "Te")] {
            if rest.starts_with(text.as_bytes()) {
                self.pos += 2;
                let element = Element::from_symbol(symbol).ok_or(SmilesError::UnexpectedEnd)?;
                return Ok((element, true));
            }
        }
        let Some(&first) = rest.first() else {
            return Err(SmilesError::UnexpectedEnd);
        };
        if first.is_ascii_lowercase() {
            self.pos += 1;
            let symbol = (first as char).to_ascii_uppercase().to_string();
            let element = Element::from_symbol(&symbol).ok_or_else(|| SmilesError::UnknownElement {
                pos: start,
                symbol: symbol.clone(),
            })?;
            if !element.can_be_aromatic() {
                return Err(SmilesError::NotAromatic {
                    pos: start,
                    symbol: (first as char).to_string(),
                });
            }
            return Ok((element, true));
        }
        if !first.is_ascii_uppercase() {
            return Err(self.unexpected());
        }
        if let Some(&second) = rest.get(1) {
            if second.is_ascii_lowercase() {
                let symbol = std::str::from_utf8(&rest[..2]).unwrap_or_default();
                if let Some(element) = Element::from_symbol(symbol) {
                    self.pos += 2;
                    return Ok((element, false));
                }
            }
        }
        let symbol = (first as char).to_string();
        let element = Element::from_symbol(&symbol)
            .ok_or(SmilesError::UnknownElement { pos: start, symbol })?;
        self.pos += 1;
        Ok((element, false))
    }

    fn bracket_atom(&mut self) -> Result<Atom> {
        self.pos += 1; // [
        let isotope = self.number();
        let (element, aromatic) = self.bracket_symbol()?;
        let mut atom = Atom::new(element);
        atom.aromatic = aromatic;
        atom.bracket = true;
        atom.isotope = isotope.map(|i| i.min(u16::MAX as u32) as u16);

        // Chirality is accepted but not represented.
        if self.peek() == Some(b'@') {
            self.pos += 1;
            if self.peek() == Some(b'@') {
                self.pos += 1;
            } else {
                while let Some(b'A'..=b'Z') = self.peek() {
                    self.pos += 1;
                }
                self.number();
            }
        }

        if self.peek() == Some(b'H') {
            self.pos += 1;
            atom.explicit_h = self.number().unwrap_or(1).min(u8::MAX as u32) as u8;
        }

        if let Some(sign @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let sign: i32 = if sign == b'+' { 1 } else { -1 };
            let magnitude = match self.number() {
                Some(n) => n as i32,
                None => {
                    let mut n = 1;
                    while self.peek() == Some(if sign > 0 { b'+' } else { b'-' }) {
                        self.pos += 1;
                        n += 1;
                    }
                    n
                }
            };
            atom.charge = (sign * magnitude).clamp(i8::MIN as i32, i8::MAX as i32) as i8;
        }

        if self.peek() == Some(b':') {
            self.pos += 1;
            let map = self.number().ok_or_else(|| self.unexpected())?;
            atom.map = Some(map.min(u16::MAX as u32) as u16);
        }

        if self.peek() != Some(b']') {
            return Err(self.unexpected());
        }
        self.pos += 1;
        Ok(atom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_chain() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 2);
        assert_eq!(mol.atoms[2].element, Element::O);
    }

    #[test]
    fn branches_and_bonds() {
        let mol = parse_smiles("CC(=O)O").unwrap();
        assert_eq!(mol.bond_count(), 3);
        assert_eq!(mol.bonds[1].order, BondOrder::Double);
        assert_eq!((mol.bonds[1].begin, mol.bonds[1].end), (1, 2));
        assert_eq!((mol.bonds[2].begin, mol.bonds[2].end), (1, 3));
    }

    #[test]
    fn ring_closures() {
        let mol = parse_smiles("C1CC%12CC1C%12").unwrap();
        assert_eq!(mol.bond_count(), 7);
        assert!(mol.bond_between(0, 4).is_some());
        assert!(mol.bond_between(2, 5).is_some());

        let mol = parse_smiles("C=1CCCCC1").unwrap();
        assert_eq!(mol.bonds[mol.bond_between(0, 5).unwrap()].order, BondOrder::Double);
    }

    #[test]
    fn bracket_atoms() {
        let mol = parse_smiles("[13CH3][C@@H](N)[O-]").unwrap();
        assert_eq!(mol.atoms[0].isotope, Some(13));
        assert_eq!(mol.atoms[0].explicit_h, 3);
        assert_eq!(mol.atoms[1].explicit_h, 1);
        assert_eq!(mol.atoms[3].charge, -1);

        let mol = parse_smiles("[Fe++]").unwrap();
        assert_eq!(mol.atoms[0].charge, 2);
        let mol = parse_smiles("[NH4+:7]").unwrap();
        assert_eq!(mol.atoms[0].map, Some(7));
        let mol = parse_smiles("c1cc[se]c1").unwrap();
        assert_eq!(mol.atoms[3].element.symbol(), "Se");
        assert!(mol.atoms[3].aromatic);
    }

    #[test]
    fn disconnected() {
        let mol = parse_smiles("[Na+].[Cl-]").unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 0);
    }

    #[test]
    fn two_letter_organics() {
        let mol = parse_smiles("ClCBr").unwrap();
        let symbols: Vec<_> = mol.atoms.iter().map(|a| a.element.symbol()).collect();
        assert_eq!(symbols, vec!["Cl", "C", "Br"]);
        // Outside brackets, `Sc` is sulfur followed by an aromatic carbon.
        assert!(read_graph("Sc1ccccc1").is_ok());
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(parse_smiles(""), Err(SmilesError::Empty));
        assert_eq!(parse_smiles("C1CC"), Err(SmilesError::UnclosedRing(1)));
        assert_eq!(parse_smiles("CC(C"), Err(SmilesError::UnclosedBranch));
        assert_eq!(parse_smiles("CC)C"), Err(SmilesError::UnmatchedClose { pos: 2 }));
        assert_eq!(parse_smiles("CC="), Err(SmilesError::DanglingBond { pos: 2 }));
        assert!(matches!(parse_smiles("C[Xx]"), Err(SmilesError::UnknownElement { .. })));
        assert!(matches!(parse_smiles("CQ"), Err(SmilesError::UnexpectedCharacter { pos: 1, .. })));
        assert!(matches!(parse_smiles("[C"), Err(SmilesError::UnexpectedEnd)));
        assert!(matches!(parse_smiles("C=1CCCCC#1"), Err(SmilesError::ConflictingRingBond(1))));
        assert!(matches!(parse_smiles("C11"), Err(SmilesError::DuplicateBond { .. })));
        assert!(matches!(parse_smiles("C12CCCC12"), Err(SmilesError::DuplicateBond { .. })));
        assert!(matches!(parse_smiles("cc"), Err(SmilesError::NonRingAromatic { .. })));
        assert!(matches!(parse_smiles("[f]"), Err(SmilesError::NotAromatic { .. })));
    }
}
