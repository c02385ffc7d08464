pub mod function;
pub mod path;
pub mod types;
