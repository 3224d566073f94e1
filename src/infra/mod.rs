pub mod bart;
