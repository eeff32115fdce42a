pub mod check;
pub mod config;
pub mod normalize;
pub mod parse;
