pub mod index;
pub mod ingest;
pub mod probes;
pub mod query;
