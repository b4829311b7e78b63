pub mod geo;
pub mod maps;
pub mod models;
