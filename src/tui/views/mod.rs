pub mod goals;
pub mod tree;
