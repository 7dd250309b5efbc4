pub mod address;
pub mod catalog;
pub mod export;
pub mod financials;
pub mod grouping;
pub mod ingest;
pub mod plans;
pub mod realty;
