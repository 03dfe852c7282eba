// src/options/mod.rs

//! Object options: declarations, typed values and validation

pub mod registry;
pub mod validate;
mod value;

pub use registry::{OptionDecl, OptionKind};
pub use validate::{revalidate, validate, validate_value};
pub use value::{ConstValue, OptionValue, OptionValues};
