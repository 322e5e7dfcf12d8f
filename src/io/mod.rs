// src/io/mod.rs

//! Population interchange: XML documents in and out, plus the companion
//! schema generated on demand.

pub mod xml_pop;
pub mod xml_schema;

pub use xml_pop::{read_population, write_population, PopRow, Population};
pub use xml_schema::generate_schema;
