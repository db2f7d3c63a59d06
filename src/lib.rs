#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod codec;
pub mod config;
pub mod container;
pub mod detect;
pub mod error;
pub mod extractor;
pub mod manifest;
pub mod models;
pub mod writer;

pub use config::ExtractorConfig;
pub use error::{ExtractError, ExtractResult};
pub use extractor::{AssetExtractor, extract};
pub use models::{ContainerFormat, ExtractionSummary};
