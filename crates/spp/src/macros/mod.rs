//! Macro definitions, storage and expansion

mod expand;
mod table;

pub use expand::Expander;
pub use table::{MacroDef, MacroTable};
