//! Shared helpers for integration tests
//!
//! Fixture documents and scripted validators. Everything here is
//! network-free; live llm-orc checks sit behind the `real_llm` feature.

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod validators;

#[allow(unused_imports)]
pub use fixtures::{
    bare_sequential_pair, pipeline_pair, random_concepts, taxonomy_pair, virtualization_document,
    VirtualizationIds,
};
#[allow(unused_imports)]
pub use validators::{FlakyValidator, StallingValidator};
