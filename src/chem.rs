//! A small chemistry toolkit: molecule graphs, SMILES and SMARTS.

pub mod aromaticity;
pub mod element;
pub mod kekulize;
pub mod mol;
pub mod rings;
pub mod smarts;
pub mod smiles;
pub mod supplier;
pub mod valence;

pub use element::Element;
pub use mol::{Atom, Bond, BondOrder, Molecule};
pub use rings::RingInfo;
pub use smarts::{Pattern, SmartsError};
pub use smiles::{parse_smiles, SmilesError};
pub use supplier::{Record, RecordError, SmilesSupplier};
