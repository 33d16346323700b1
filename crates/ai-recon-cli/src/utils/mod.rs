pub mod cli;
pub mod spinner;
