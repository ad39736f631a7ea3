//! SMARTS patterns and substructure matching.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::chem::element::Element;
use crate::chem::mol::{BondOrder, Molecule};
use crate::chem::rings::RingInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmartsError {
    Empty,
    UnexpectedCharacter { pos: usize, ch: char },
    UnexpectedEnd,
    UnknownElement { pos: usize, symbol: String },
    UnmatchedClose { pos: usize },
    UnclosedBranch,
    UnclosedRing(u16),
    DanglingBond { pos: usize },
}

impl std::fmt::Display for SmartsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty SMARTS pattern"),
            Self::UnexpectedCharacter { pos, ch } => {
                write!(f, "unexpected character {ch:?} at position {pos}")
            }
            Self::UnexpectedEnd => write!(f, "unexpected end of pattern"),
            Self::UnknownElement { pos, symbol } => {
                write!(f, "unknown element {symbol:?} at position {pos}")
            }
            Self::UnmatchedClose { pos } => write!(f, "unmatched ')' at position {pos}"),
            Self::UnclosedBranch => write!(f, "unclosed branch"),
            Self::UnclosedRing(n) => write!(f, "unclosed ring {n}"),
            Self::DanglingBond { pos } => {
                write!(f, "bond at position {pos} has no atom to bind to")
            }
        }
    }
}

impl std::error::Error for SmartsError {}

type Result<T> = std::result::Result<T, SmartsError>;

/// A single atom test.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomPrimitive {
    /// `*`
    Any,
    /// `#6`, or the element part of a symbol like `C` or `n`.
    AtomicNum(u8),
    /// `a`
    Aromatic,
    /// `A`
    Aliphatic,
    /// `D<n>`: explicit connections.
    Degree(u8),
    /// `H<n>`: total hydrogen count.
    TotalH(u8),
    /// `h<n>`: implicit hydrogen count; `h` alone means at least one.
    ImplicitH(Option<u8>),
    /// `X<n>`: total connections including hydrogens.
    Connectivity(u8),
    /// `v<n>`: total bond order including hydrogens.
    Valence(u8),
    /// `R<n>`: number of SSSR rings; `R` alone means in any ring.
    RingCount(Option<u8>),
    /// `r<n>`: in a ring of this size; `r` alone means in any ring.
    RingSize(Option<u8>),
    /// `x<n>`: number of ring bonds; `x` alone means at least one.
    RingConnectivity(Option<u8>),
    Charge(i8),
    Isotope(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomExpr {
    Prim(AtomPrimitive),
    Not(Box<AtomExpr>),
    And(Vec<AtomExpr>),
    Or(Vec<AtomExpr>),
    /// `$(...)`: the atom is the first atom of a match of this pattern.
    Recursive(Box<Pattern>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BondExpr {
    /// No bond symbol was written: single or aromatic.
    Implicit,
    Single,
    Double,
    Triple,
    Aromatic,
    Ring,
    Any,
    Not(Box<BondExpr>),
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternBond {
    pub begin: usize,
    pub end: usize,
    pub expr: BondExpr,
}

/// A compiled SMARTS query.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    source: String,
    pub atoms: Vec<AtomExpr>,
    pub bonds: Vec<PatternBond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl Pattern {
    /// Compile a SMARTS string.
    pub fn compile(smarts: &str) -> Result<Self> {
        if smarts.trim().is_empty() {
            return Err(SmartsError::Empty);
        }
        let mut parser = Parser::new(smarts.trim().as_bytes());
        parser.parse()?;
        // Parsing only stops early at a `)` without a matching `(`.
        if parser.pos != parser.input.len() {
            return Err(SmartsError::UnmatchedClose { pos: parser.pos });
        }
        Ok(Self::new(smarts.trim().to_string(), parser.atoms, parser.bonds))
    }

    fn new(source: String, atoms: Vec<AtomExpr>, bonds: Vec<PatternBond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (idx, bond) in bonds.iter().enumerate() {
            adjacency[bond.begin].push((bond.end, idx));
            adjacency[bond.end].push((bond.begin, idx));
        }
        Self {
            source,
            atoms,
            bonds,
            adjacency,
        }
    }

    /// The SMARTS string this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// The first match in search order, as target atom indices in pattern atom order.
    pub fn first_match(&self, mol: &Molecule) -> Option<Vec<usize>> {
        let rings = RingInfo::new(mol);
        let target = Target { mol, rings: &rings };
        let mut search = Search::new(self, &target, None);
        search.run(true);
        search.matches.into_iter().next()
    }

    /// All matches, including those that only differ in atom order.
    pub fn matches(&self, mol: &Molecule) -> Vec<Vec<usize>> {
        let rings = RingInfo::new(mol);
        let target = Target { mol, rings: &rings };
        let mut search = Search::new(self, &target, None);
        search.run(false);
        search.matches
    }
}

impl FromStr for Pattern {
    type Err = SmartsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::compile(s)
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<AtomExpr>,
    bonds: Vec<PatternBond>,
    prev: Option<usize>,
    branches: Vec<usize>,
    pending: Option<(BondExpr, usize)>,
    rings: BTreeMap<u16, (usize, Option<BondExpr>)>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            prev: None,
            branches: Vec::new(),
            pending: None,
            rings: BTreeMap::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn unexpected(&self) -> SmartsError {
        match self.peek() {
            Some(ch) => SmartsError::UnexpectedCharacter {
                pos: self.pos,
                ch: ch as char,
            },
            None => SmartsError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, ch: u8) -> Result<()> {
        if self.peek() != Some(ch) {
            return Err(self.unexpected());
        }
        self.pos += 1;
        Ok(())
    }

    /// Parse a chain of atoms until the end of input, or until the `)` closing a recursive
    /// SMARTS, which is left for the caller.
    fn parse(&mut self) -> Result<()> {
        while let Some(ch) = self.peek() {
            match ch {
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
                        return Err(SmartsError::DanglingBond { pos });
                    }
                    let Some(top) = self.branches.pop() else {
                        // Closes a recursive SMARTS, or is unmatched.
                        break;
                    };
                    self.prev = Some(top);
                    self.pos += 1;
                }
                b'.' => {
                    if self.prev.is_none() || self.pending.is_some() {
                        return Err(self.unexpected());
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                b'0'..=b'9' | b'%' => self.ring_closure()?,
                b'[' => {
                    self.pos += 1;
                    let expr = self.atom_expr()?;
                    self.expect(b']')?;
                    self.push_atom(expr)?;
                }
                b'-' | b'=' | b'#' | b':' | b'~' | b'@' | b'/' | b'\\' | b'!' => {
                    if self.prev.is_none() || self.pending.is_some() {
                        return Err(self.unexpected());
                    }
                    let pos = self.pos;
                    let expr = self.bond_expr()?;
                    self.pending = Some((expr, pos));
                }
                _ => {
                    let expr = self.organic_atom()?;
                    self.push_atom(expr)?;
                }
            }
        }
        if let Some((_, pos)) = self.pending {
            return Err(SmartsError::DanglingBond { pos });
        }
        if !self.branches.is_empty() {
            return Err(SmartsError::UnclosedBranch);
        }
        if let Some((&number, _)) = self.rings.iter().next() {
            return Err(SmartsError::UnclosedRing(number));
        }
        if self.atoms.is_empty() {
            return Err(self.unexpected());
        }
        Ok(())
    }

    fn push_atom(&mut self, expr: AtomExpr) -> Result<()> {
        self.atoms.push(expr);
        let idx = self.atoms.len() - 1;
        if let Some(prev) = self.prev {
            let expr = self.pending.take().map(|(e, _)| e).unwrap_or(BondExpr::Implicit);
            self.bonds.push(PatternBond {
                begin: prev,
                end: idx,
                expr,
            });
        } else if let Some((_, pos)) = self.pending {
            return Err(SmartsError::DanglingBond { pos });
        }
        self.prev = Some(idx);
        Ok(())
    }

    fn ring_closure(&mut self) -> Result<()> {
        let Some(atom) = self.prev else {
            return Err(self.unexpected());
        };
        let number = if self.peek() == Some(b'%') {
            self.pos += 1;
            let (Some(a @ b'0'..=b'9'), Some(b @ b'0'..=b'9')) = (self.peek(), self.peek_at(1))
            else {
                return Err(self.unexpected());
            };
            self.pos += 2;
            ((a - b'0') * 10 + (b - b'0')) as u16
        } else {
            let d = self.peek().ok_or(SmartsError::UnexpectedEnd)?;
            self.pos += 1;
            (d - b'0') as u16
        };
        let expr = self.pending.take().map(|(e, _)| e);
        match self.rings.remove(&number) {
            None => {
                self.rings.insert(number, (atom, expr));
            }
            Some((open, open_expr)) => {
                let expr = expr.or(open_expr).unwrap_or(BondExpr::Implicit);
                self.bonds.push(PatternBond {
                    begin: open,
                    end: atom,
                    expr,
                });
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<AtomExpr> {
        let start = self.pos;
        let ch = self.peek().ok_or(SmartsError::UnexpectedEnd)?;
        let two = self.input.get(start..start + 2);
        let (symbol, aromatic, len) = match (ch, two) {
            (_, Some(b"Cl")) => ("Cl", false, 2),
            (_, Some(b"Br")) => ("Br", false, 2),
            (b'*', _) => {
                self.pos += 1;
                return Ok(AtomExpr::Prim(AtomPrimitive::Any));
            }
            (b'a', _) => {
                self.pos += 1;
                return Ok(AtomExpr::Prim(AtomPrimitive::Aromatic));
            }
            (b'A', _) => {
                self.pos += 1;
                return Ok(AtomExpr::Prim(AtomPrimitive::Aliphatic));
            }
            (b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I', _) => {
                (std::str::from_utf8(&self.input[start..start + 1]).unwrap_or_default(), false, 1)
            }
            (b'b' | b'c' | b'n' | b'o' | b'p' | b's', _) => {
                (std::str::from_utf8(&self.input[start..start + 1]).unwrap_or_default(), true, 1)
            }
            _ => return Err(self.unexpected()),
        };
        self.pos += len;
        element_expr(symbol, aromatic, start)
    }

    /// Lowest precedence: `;`.
    fn atom_expr(&mut self) -> Result<AtomExpr> {
        let mut terms = vec![self.atom_or()?];
        while self.peek() == Some(b';') {
            self.pos += 1;
            terms.push(self.atom_or()?);
        }
        Ok(collapse(terms, AtomExpr::And))
    }

    fn atom_or(&mut self) -> Result<AtomExpr> {
        let mut terms = vec![self.atom_and()?];
        while self.peek() == Some(b',') {
            self.pos += 1;
            terms.push(self.atom_and()?);
        }
        Ok(collapse(terms, AtomExpr::Or))
    }

    /// High precedence `&`, or plain juxtaposition.
    fn atom_and(&mut self) -> Result<AtomExpr> {
        let mut terms = vec![self.atom_not(true)?];
        loop {
            match self.peek() {
                Some(b'&') => {
                    self.pos += 1;
                    terms.push(self.atom_not(false)?);
                }
                Some(b']' | b',' | b';' | b')') | None => break,
                // An atom map number ends the expression.
                Some(b':') => {
                    self.pos += 1;
                    if self.number().is_none() {
                        return Err(self.unexpected());
                    }
                }
                Some(_) => terms.push(self.atom_not(false)?),
            }
        }
        Ok(collapse(terms, AtomExpr::And))
    }

    fn atom_not(&mut self, first: bool) -> Result<AtomExpr> {
        if self.peek() == Some(b'!') {
            self.pos += 1;
            return Ok(AtomExpr::Not(Box::new(self.atom_not(false)?)));
        }
        self.atom_primitive(first)
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

    fn small_number(&mut self) -> Option<u8> {
        self.number().map(|n| n.min(u8::MAX as u32) as u8)
    }

    fn atom_primitive(&mut self, first: bool) -> Result<AtomExpr> {
        use AtomPrimitive as P;
        let start = self.pos;
        let ch = self.peek().ok_or(SmartsError::UnexpectedEnd)?;
        if let Some(symbol) = self.two_letter_element() {
            self.pos += 2;
            return element_expr(&symbol, false, start);
        }
        let prim = match ch {
            b'0'..=b'9' => {
                let isotope = self.number().unwrap_or_default();
                let isotope = AtomExpr::Prim(P::Isotope(isotope.min(u16::MAX as u32) as u16));
                // An isotope is directly followed by its symbol, e.g. `[2H]` or `[13C]`.
                return match self.peek() {
                    Some(b']' | b',' | b';' | b'&') | None => Ok(isotope),
                    _ => Ok(AtomExpr::And(vec![isotope, self.atom_not(first)?])),
                };
            }
            b'*' => {
                self.pos += 1;
                P::Any
            }
            b'#' => {
                self.pos += 1;
                let n = self.small_number().ok_or_else(|| self.unexpected())?;
                P::AtomicNum(n)
            }
            b'$' => {
                self.pos += 1;
                self.expect(b'(')?;
                let mut inner = Parser::new(self.input);
                inner.pos = self.pos;
                inner.parse()?;
                self.pos = inner.pos;
                self.expect(b')')?;
                let source =
                    String::from_utf8_lossy(&self.input[start + 2..self.pos - 1]).into_owned();
                let pattern = Pattern::new(source, inner.atoms, inner.bonds);
                return Ok(AtomExpr::Recursive(Box::new(pattern)));
            }
            b'@' => {
                // Chirality is not used for matching.
                self.pos += 1;
                while let Some(b'@' | b'?') = self.peek() {
                    self.pos += 1;
                }
                P::Any
            }
            b'+' | b'-' => {
                self.pos += 1;
                let sign: i32 = if ch == b'+' { 1 } else { -1 };
                let magnitude = match self.number() {
                    Some(n) => n as i32,
                    None => {
                        let mut n = 1;
                        while self.peek() == Some(ch) {
                            self.pos += 1;
                            n += 1;
                        }
                        n
                    }
                };
                P::Charge((sign * magnitude).clamp(i8::MIN as i32, i8::MAX as i32) as i8)
            }
            b'H' if first && matches!(self.peek_at(1), Some(b']' | b'+' | b'-')) => {
                self.pos += 1;
                P::AtomicNum(1)
            }
            b'H' => {
                self.pos += 1;
                P::TotalH(self.small_number().unwrap_or(1))
            }
            b'D' => {
                self.pos += 1;
                P::Degree(self.small_number().unwrap_or(1))
            }
            b'X' => {
                self.pos += 1;
                P::Connectivity(self.small_number().unwrap_or(1))
            }
            b'v' => {
                self.pos += 1;
                P::Valence(self.small_number().unwrap_or(1))
            }
            b'h' => {
                self.pos += 1;
                P::ImplicitH(self.small_number())
            }
            b'x' => {
                self.pos += 1;
                P::RingConnectivity(self.small_number())
            }
            b'R' => {
                self.pos += 1;
                P::RingCount(self.small_number())
            }
            b'r' => {
                self.pos += 1;
                P::RingSize(self.small_number())
            }
            b'a' if self.peek_at(1) != Some(b's') => {
                self.pos += 1;
                P::Aromatic
            }
            b'A' => {
                self.pos += 1;
                P::Aliphatic
            }
            _ => return self.bracket_element(),
        };
        Ok(AtomExpr::Prim(prim))
    }

    fn bracket_element(&mut self) -> Result<AtomExpr> {
        let start = self.pos;
        let rest = &self.input[start..];
        for (text, symbol) in [("se", "Se"), ("as", "As"), ("te", "Te")] {
            if rest.starts_with(text.as_bytes()) {
                self.pos += 2;
                return element_expr(symbol, true, start);
            }
        }
        let Some(&first) = rest.first() else {
            return Err(SmartsError::UnexpectedEnd);
        };
        if matches!(first, b'b' | b'c' | b'n' | b'o' | b'p' | b's') {
            self.pos += 1;
            let symbol = (first as char).to_string();
            return element_expr(&symbol, true, start);
        }
        if !first.is_ascii_uppercase() {
            return Err(self.unexpected());
        }
        let symbol = (first as char).to_string();
        self.pos += 1;
        element_expr(&symbol, false, start)
    }

    /// A two-letter element symbol at the current position, such as `Cl` or `Na`.
    ///
    /// Two-letter symbols win over primitives (`[Ar]` is argon), except that a trailing `h`
    /// after a one-letter element is an implicit hydrogen count (`[Nh]` is nitrogen).
    fn two_letter_element(&self) -> Option<String> {
        let (first, second) = (self.peek()?, self.peek_at(1)?);
        if !first.is_ascii_uppercase() || !second.is_ascii_lowercase() {
            return None;
        }
        let single = (first as char).to_string();
        if second == b'h' && Element::from_symbol(&single).is_some() {
            return None;
        }
        let symbol = format!("{}{}", first as char, second as char);
        Element::from_symbol(&symbol).map(|_| symbol)
    }

    fn bond_expr(&mut self) -> Result<BondExpr> {
        let mut terms = vec![self.bond_or()?];
        while self.peek() == Some(b';') {
            self.pos += 1;
            terms.push(self.bond_or()?);
        }
        Ok(collapse(terms, BondExpr::And))
    }

    fn bond_or(&mut self) -> Result<BondExpr> {
        let mut terms = vec![self.bond_and()?];
        while self.peek() == Some(b',') {
            self.pos += 1;
            terms.push(self.bond_and()?);
        }
        Ok(collapse(terms, BondExpr::Or))
    }

    fn bond_and(&mut self) -> Result<BondExpr> {
        let mut terms = vec![self.bond_not()?];
        loop {
            match self.peek() {
                Some(b'&') => {
                    self.pos += 1;
                    terms.push(self.bond_not()?);
                }
                Some(b'-' | b'=' | b'#' | b':' | b'~' | b'@' | b'/' | b'\\' | b'!') => {
                    terms.push(self.bond_not()?)
                }
                _ => break,
            }
        }
        Ok(collapse(terms, BondExpr::And))
    }

    fn bond_not(&mut self) -> Result<BondExpr> {
        let expr = match self.peek() {
            Some(b'!') => {
                self.pos += 1;
                return Ok(BondExpr::Not(Box::new(self.bond_not()?)));
            }
            Some(b'-' | b'/' | b'\\') => BondExpr::Single,
            Some(b'=') => BondExpr::Double,
            Some(b'#') => BondExpr::Triple,
            Some(b':') => BondExpr::Aromatic,
            Some(b'~') => BondExpr::Any,
            Some(b'@') => BondExpr::Ring,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        Ok(expr)
    }
}

fn element_expr(symbol: &str, aromatic: bool, pos: usize) -> Result<AtomExpr> {
    let upper = {
        let mut chars = symbol.chars();
        let first = chars.next().map(|c| c.to_ascii_uppercase());
        first.into_iter().chain(chars).collect::<String>()
    };
    let element = Element::from_symbol(&upper).ok_or_else(|| SmartsError::UnknownElement {
        pos,
        symbol: symbol.to_string(),
    })?;
    let flavor = if aromatic {
        AtomPrimitive::Aromatic
    } else {
        AtomPrimitive::Aliphatic
    };
    Ok(AtomExpr::And(vec![
        AtomExpr::Prim(AtomPrimitive::AtomicNum(element.atomic_number())),
        AtomExpr::Prim(flavor),
    ]))
}

fn collapse<T>(mut terms: Vec<T>, combine: fn(Vec<T>) -> T) -> T {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        combine(terms)
    }
}

/// A molecule together with the perceived properties that queries test against.
struct Target<'m> {
    mol: &'m Molecule,
    rings: &'m RingInfo,
}

impl Target<'_> {
    fn atom_matches(&self, expr: &AtomExpr, atom: usize) -> bool {
        match expr {
            AtomExpr::Prim(prim) => self.primitive_matches(prim, atom),
            AtomExpr::Not(inner) => !self.atom_matches(inner, atom),
            AtomExpr::And(terms) => terms.iter().all(|t| self.atom_matches(t, atom)),
            AtomExpr::Or(terms) => terms.iter().any(|t| self.atom_matches(t, atom)),
            AtomExpr::Recursive(pattern) => {
                let mut search = Search::new(pattern, self, Some(atom));
                search.run(true);
                !search.matches.is_empty()
            }
        }
    }

    fn primitive_matches(&self, prim: &AtomPrimitive, atom: usize) -> bool {
        let mol = self.mol;
        let a = &mol.atoms[atom];
        let ring_bonds = || {
            mol.adjacent(atom)
                .iter()
                .filter(|&&(_, b)| self.rings.bond_in_ring[b])
                .count()
        };
        match *prim {
            AtomPrimitive::Any => true,
            AtomPrimitive::AtomicNum(n) => a.element.atomic_number() == n,
            AtomPrimitive::Aromatic => a.aromatic,
            AtomPrimitive::Aliphatic => !a.aromatic,
            AtomPrimitive::Degree(d) => mol.degree(atom) == d as usize,
            AtomPrimitive::TotalH(h) => mol.total_h_count(atom) == u32::from(h),
            AtomPrimitive::ImplicitH(None) => a.implicit_h > 0,
            AtomPrimitive::ImplicitH(Some(h)) => a.implicit_h == h,
            AtomPrimitive::Connectivity(x) => mol.degree(atom) + a.h_count() as usize == x as usize,
            AtomPrimitive::Valence(v) => mol.total_valence(atom) == u32::from(v),
            AtomPrimitive::RingCount(None) => self.rings.atom_in_ring[atom],
            AtomPrimitive::RingCount(Some(n)) => self.rings.num_atom_rings(atom) == n as usize,
            AtomPrimitive::RingSize(None) => self.rings.atom_in_ring[atom],
            AtomPrimitive::RingSize(Some(n)) => self.rings.atom_in_ring_of_size(atom, n as usize),
            AtomPrimitive::RingConnectivity(None) => ring_bonds() > 0,
            AtomPrimitive::RingConnectivity(Some(n)) => ring_bonds() == n as usize,
            AtomPrimitive::Charge(c) => a.charge == c,
            AtomPrimitive::Isotope(i) => a.isotope == Some(i),
        }
    }

    fn bond_matches(&self, expr: &BondExpr, bond: usize) -> bool {
        let b = &self.mol.bonds[bond];
        match expr {
            BondExpr::Implicit => b.aromatic || b.order == BondOrder::Single,
            BondExpr::Single => !b.aromatic && b.order == BondOrder::Single,
            BondExpr::Double => !b.aromatic && b.order == BondOrder::Double,
            BondExpr::Triple => b.order == BondOrder::Triple,
            BondExpr::Aromatic => b.aromatic,
            BondExpr::Ring => self.rings.bond_in_ring[bond],
            BondExpr::Any => true,
            BondExpr::Not(inner) => !self.bond_matches(inner, bond),
            BondExpr::And(terms) => terms.iter().all(|t| self.bond_matches(t, bond)),
            BondExpr::Or(terms) => terms.iter().any(|t| self.bond_matches(t, bond)),
        }
    }
}

/// Backtracking subgraph search, mapping pattern atoms in index order.
struct Search<'p, 't, 'm> {
    pattern: &'p Pattern,
    target: &'t Target<'m>,
    /// Pin the first pattern atom to this target atom.
    anchor: Option<usize>,
    core_pattern: Vec<Option<usize>>,
    core_target: Vec<bool>,
    matches: Vec<Vec<usize>>,
}

impl<'p, 't, 'm> Search<'p, 't, 'm> {
    fn new(pattern: &'p Pattern, target: &'t Target<'m>, anchor: Option<usize>) -> Self {
        Self {
            pattern,
            target,
            anchor,
            core_pattern: vec![None; pattern.atom_count()],
            core_target: vec![false; target.mol.atom_count()],
            matches: Vec::new(),
        }
    }

    fn run(&mut self, first_only: bool) {
        if self.pattern.atoms.is_empty()
            || self.pattern.atom_count() > self.target.mol.atom_count()
        {
            return;
        }
        self.extend(0, first_only);
    }

    fn extend(&mut self, depth: usize, first_only: bool) {
        if depth == self.pattern.atom_count() {
            self.matches.push(self.core_pattern.iter().flatten().copied().collect());
            return;
        }
        for candidate in self.candidates(depth) {
            if !self.feasible(depth, candidate) {
                continue;
            }
            self.core_pattern[depth] = Some(candidate);
            self.core_target[candidate] = true;
            self.extend(depth + 1, first_only);
            self.core_pattern[depth] = None;
            self.core_target[candidate] = false;
            if first_only && !self.matches.is_empty() {
                return;
            }
        }
    }

    /// Unmapped target atoms that could take the place of a pattern atom.
    ///
    /// If the pattern atom is bonded to an atom that is already mapped, only the neighbours of
    /// that atom's image are considered.
    fn candidates(&self, pattern_atom: usize) -> Vec<usize> {
        let mol = self.target.mol;
        if pattern_atom == 0 {
            if let Some(anchor) = self.anchor {
                return vec![anchor];
            }
        }
        let mapped_neighbor = self.pattern.adjacency[pattern_atom]
            .iter()
            .find_map(|&(n, _)| self.core_pattern[n]);
        match mapped_neighbor {
            Some(image) => mol.neighbors(image).filter(|&n| !self.core_target[n]).collect(),
            None => (0..mol.atom_count()).filter(|&n| !self.core_target[n]).collect(),
        }
    }

    fn feasible(&self, pattern_atom: usize, target_atom: usize) -> bool {
        if !self.target.atom_matches(&self.pattern.atoms[pattern_atom], target_atom) {
            return false;
        }
        self.pattern.adjacency[pattern_atom].iter().all(|&(n, pattern_bond)| {
            let Some(image) = self.core_pattern[n] else {
                return true;
            };
            match self.target.mol.bond_between(target_atom, image) {
                Some(bond) => {
                    self.target.bond_matches(&self.pattern.bonds[pattern_bond].expr, bond)
                }
                None => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::smiles::parse_smiles;

    fn first(smarts: &str, smiles: &str) -> Option<Vec<usize>> {
        let pattern = Pattern::compile(smarts).unwrap();
        pattern.first_match(&parse_smiles(smiles).unwrap())
    }

    fn count(smarts: &str, smiles: &str) -> usize {
        let pattern = Pattern::compile(smarts).unwrap();
        pattern.matches(&parse_smiles(smiles).unwrap()).len()
    }

    #[test]
    fn carbonyl() {
        assert_eq!(first("C=O", "CC(=O)O"), Some(vec![1, 2]));
        assert_eq!(first("C=O", "CCO"), None);
    }

    #[test]
    fn aromatic_and_aliphatic() {
        assert_eq!(first("c", "CCO"), None);
        assert_eq!(first("c1ccccc1", "Cc1ccccc1").map(|m| m.len()), Some(6));
        assert_eq!(first("C", "c1ccccc1"), None);
        assert!(first("a", "c1ccoc1").is_some());
        assert_eq!(count("[#6]", "c1ccoc1"), 4);
        assert_eq!(count("A", "CC(=O)O"), 4);
    }

    #[test]
    fn implicit_bond_matches_single_and_aromatic() {
        assert_eq!(count("cc", "c1ccccc1"), 12);
        assert_eq!(count("CC", "CC=C"), 2);
        assert_eq!(count("C~C", "CC=C"), 4);
        assert_eq!(count("C=,#C", "C=CC#C"), 4);
    }

    #[test]
    fn bracket_primitives() {
        assert_eq!(first("[OX2H]", "CC(=O)O"), Some(vec![3]));
        assert_eq!(first("[CH3]", "CC(=O)O"), Some(vec![0]));
        assert_eq!(first("[NH2]", "CCN"), Some(vec![2]));
        assert_eq!(first("[N+]", "C[N+](C)(C)C"), Some(vec![1]));
        assert_eq!(first("[O-]", "CC(=O)[O-]"), Some(vec![3]));
        assert_eq!(first("[D3]", "CC(C)C"), Some(vec![1]));
        assert_eq!(first("[v4;X4]", "CO"), Some(vec![0]));
        assert_eq!(first("[Cl]", "CCCl"), Some(vec![2]));
        assert_eq!(first("[13C]", "C[13CH3]"), Some(vec![1]));
        assert_eq!(first("[!#6]", "CCO"), Some(vec![2]));
        assert_eq!(first("[#7,#8]", "CCOCN"), Some(vec![2]));
        assert_eq!(first("[c;H0]", "Cc1ccccc1"), Some(vec![1]));
        assert_eq!(first("[#6&!a]", "c1ccccc1C"), Some(vec![6]));
    }

    #[test]
    fn ring_primitives() {
        assert_eq!(count("[R]", "CC1CC1"), 3);
        assert_eq!(count("[r5]", "C1CCCC1CC1CC1"), 5);
        assert_eq!(count("[R2]", "c1ccc2ccccc2c1"), 2);
        assert_eq!(count("[x3]", "c1ccc2ccccc2c1"), 2);
        assert_eq!(count("C@C", "CC1CC1"), 6);
        assert_eq!(count("C!@C", "CC1CC1"), 2);
    }

    #[test]
    fn recursive() {
        // Carbon attached to a hydroxyl.
        assert_eq!(first("[$(CO)]", "CCO"), Some(vec![1]));
        assert_eq!(first("[C;!$(C=O)]O", "OCC(=O)O"), Some(vec![1, 0]));
    }

    #[test]
    fn ring_closure_and_branches() {
        assert_eq!(count("C1CC1", "C1CC1"), 6);
        assert_eq!(first("C(=O)O", "CC(=O)O"), Some(vec![1, 2, 3]));
        assert_eq!(first("[#6]-[#8].[#7]", "CO.N"), Some(vec![0, 1, 2]));
    }

    #[test]
    fn errors() {
        assert_eq!(Pattern::compile(""), Err(SmartsError::Empty));
        assert_eq!(
            Pattern::compile("[["),
            Err(SmartsError::UnexpectedCharacter { pos: 1, ch: '[' })
        );
        assert_eq!(Pattern::compile("[C"), Err(SmartsError::UnexpectedEnd));
        assert_eq!(Pattern::compile("C(C"), Err(SmartsError::UnclosedBranch));
        assert_eq!(Pattern::compile("C1CC"), Err(SmartsError::UnclosedRing(1)));
        assert_eq!(Pattern::compile("C="), Err(SmartsError::DanglingBond { pos: 1 }));
        assert_eq!(Pattern::compile("CC)"), Err(SmartsError::UnmatchedClose { pos: 2 }));
        assert!(Pattern::compile("[Xx]").is_err());
        assert!(Pattern::compile("[#]").is_err());
        assert!(Pattern::compile("Q").is_err());
    }

    #[test]
    fn from_str_keeps_source() {
        let pattern: Pattern = " C=O ".parse().unwrap();
        assert_eq!(pattern.as_str(), "C=O");
        assert_eq!(pattern.to_string(), "C=O");
        assert_eq!(pattern.atom_count(), 2);
    }
}
