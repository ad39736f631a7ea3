pub mod chem;
pub mod core;
pub mod depict;
