#![doc = "uti-sli: Shipper's Letter of Instruction generator for air-freight bulk shipments."]

//! The pipeline aggregates the orders of a bulk by SKU, composes the SLI
//! document model from country-keyed shipping rules, renders the HTML
//! template to PDF and persists the file, recording it on the bulk.
//!
//! Collaborators (order query, file persistence, PDF conversion) are traits
//! in [`contract`]; [`local`] and [`pdf`] provide implementations the CLI uses.

pub mod aggregate;
pub mod cli;
pub mod compose;
pub mod config;
pub mod contract;
pub mod error;
pub mod local;
pub mod model;
pub mod pdf;
pub mod pipeline;
pub mod render;

pub use cli::{run, Cli, Commands};
pub use error::{SliError, SliResult};
pub use pipeline::{Exporter, SliPipeline, SliReport, SliState};
