//! Chat ingestion: connection loop, donation extraction and raw logs.

pub mod client;
pub mod extractor;
pub mod handler;
pub mod rawlog;

pub use client::IngestClient;
pub use handler::DonationHandler;
