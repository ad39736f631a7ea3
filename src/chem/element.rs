//! Periodic table data used for parsing, valence checks, and depiction.

/// Element symbols indexed by atomic number. Index 0 is the wildcard/dummy atom.
const SYMBOLS: [&str; 119] = [
    "*", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd",
    "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
    "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// A chemical element, identified by its atomic number.
///
/// Atomic number 0 is used for the `*` wildcard atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

impl Element {
    pub const DUMMY: Element = Element(0);
    pub const H: Element = Element(1);
    pub const B: Element = Element(5);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const P: Element = Element(15);
    pub const S: Element = Element(16);

    /// Returns the element with this atomic number, if it exists.
    pub fn from_atomic_number(n: u8) -> Option<Self> {
        ((n as usize) < SYMBOLS.len()).then_some(Self(n))
    }

    /// Look up an element by its (case-sensitive) symbol.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        SYMBOLS.iter().position(|&s| s == symbol).map(|n| Self(n as u8))
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        SYMBOLS[self.0 as usize]
    }

    /// Number of valence electrons for main group elements.
    ///
    /// Returns `None` for transition metals and the dummy atom.
    pub fn valence_electrons(self) -> Option<u8> {
        match self.0 {
            1 => Some(1),
            2 => Some(2),
            3..=10 => Some(self.0 - 2),
            11..=18 => Some(self.0 - 10),
            19 | 20 => Some(self.0 - 18),
            31..=36 => Some(self.0 - 28),
            37 | 38 => Some(self.0 - 36),
            49..=54 => Some(self.0 - 46),
            55 | 56 => Some(self.0 - 54),
            81..=86 => Some(self.0 - 78),
            _ => None,
        }
    }

    /// The allowed valences of the neutral element, lowest first.
    ///
    /// An empty slice means that valence is not checked and no implicit hydrogens are added.
    pub fn default_valences(self) -> &'static [u8] {
        match self.0 {
            1 => &[1],
            3 | 11 | 19 | 37 | 55 => &[1],
            4 | 12 | 20 | 38 | 56 => &[2],
            5 | 13 => &[3],
            6 | 14 | 32 => &[4],
            7 => &[3],
            8 => &[2],
            9 | 17 | 35 => &[1],
            15 | 33 => &[3, 5],
            16 | 34 | 52 => &[2, 4, 6],
            50 => &[2, 4],
            51 => &[3, 5],
            53 => &[1, 3, 5],
            _ => &[],
        }
    }

    /// The allowed valences once the formal charge is taken into account.
    ///
    /// Charged atoms behave like their isoelectronic neighbour in the periodic table: a positive
    /// charge on a group 15-17 element raises its valence (`[NH4+]`), on carbon it lowers it
    /// (`[CH3+]`), and a negative charge on boron raises it (`[BH4-]`).
    pub fn valences_with_charge(self, charge: i8) -> Vec<u8> {
        let shift = match self.valence_electrons() {
            _ if charge == 0 => 0,
            Some(e) if e >= 5 => charge as i32,
            Some(4) => -(charge.unsigned_abs() as i32),
            Some(_) => -(charge as i32),
            None => 0,
        };
        self.default_valences()
            .iter()
            .filter_map(|&v| {
                let v = v as i32 + shift;
                (v >= 0).then_some(v as u8)
            })
            .collect()
    }

    /// Whether a lower-case aromatic symbol is legal for this element in SMILES.
    pub fn can_be_aromatic(self) -> bool {
        matches!(self.0, 5 | 6 | 7 | 8 | 15 | 16 | 33 | 34 | 52)
    }

    /// Depiction colour as 8-bit RGB.
    pub fn color(self) -> [u8; 3] {
        match self.0 {
            7 => [0, 0, 255],
            8 => [255, 0, 0],
            9 => [51, 204, 204],
            15 => [255, 128, 0],
            16 => [204, 204, 0],
            17 => [0, 204, 0],
            35 => [128, 77, 26],
            53 => [161, 31, 240],
            1 => [140, 140, 140],
            3 | 11 | 19 | 37 | 55 => [171, 92, 242],
            5 => [255, 181, 181],
            _ => [0, 0, 0],
        }
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_round_trip() {
        for n in 0..SYMBOLS.len() as u8 {
            let element = Element::from_atomic_number(n).unwrap();
            assert_eq!(Element::from_symbol(element.symbol()), Some(element));
        }
        assert_eq!(Element::from_symbol("Xx"), None);
        assert_eq!(Element::from_symbol("cl"), None);
        assert_eq!(Element::from_atomic_number(119), None);
    }

    #[test]
    fn charged_valences() {
        assert_eq!(Element::N.valences_with_charge(1), vec![4]);
        assert_eq!(Element::O.valences_with_charge(-1), vec![1]);
        assert_eq!(Element::C.valences_with_charge(1), vec![3]);
        assert_eq!(Element::C.valences_with_charge(-1), vec![3]);
        assert_eq!(Element::B.valences_with_charge(-1), vec![4]);
        assert_eq!(Element::S.valences_with_charge(0), vec![2, 4, 6]);
    }
}
