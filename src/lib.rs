//! CORDEX data reference syntax (DRS) parsing and catalog construction.
//!
//! Paths are matched against per-project templates ([`registry`]), duplicated
//! directory/filename fields are cross-checked ([`consistency`]), CMIP5-era
//! names are mapped onto the CMIP6 vocabulary ([`translate`]) and accepted
//! files are assembled into a [`catalog::Catalog`].

pub mod app;
pub mod catalog;
pub mod config;
pub mod consistency;
pub mod domain;
pub mod error;
pub mod output;
pub mod registry;
pub mod store;
pub mod translate;
pub mod walker;
