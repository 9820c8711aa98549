//! Delivery and verification for satchel
//!
//! [`DeliveryPipeline`] turns a payload into a deposited archive, recording
//! every transition in the status log. [`VerificationJob`] later scans the
//! log for deposits and closes them out against the remote ingest API.

pub mod ingest;
pub mod pipeline;
pub mod source;
pub mod verifier;

pub use ingest::{HttpIngestApi, IngestApi, IngestRecord};
pub use pipeline::{DeliveryConfig, DeliveryOutcome, DeliveryPipeline, DeliveryRequest, TagFile};
pub use source::{DataSource, LocalDirectorySource, RemoteSource};
pub use verifier::{
    classify_ingest, classify_result, IngestOutcome, IngestVerifier, VerificationJob,
    VerificationReport,
};
