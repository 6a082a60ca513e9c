#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod filter;
pub mod pipeline;
pub mod writer;

pub use filter::{FileFilter, FilteredUploads, UploadedFile};
pub use pipeline::{IndexRefresh, IngestOutcome, IngestionPipeline};
pub use writer::{DocumentWriter, WrittenDocument};
