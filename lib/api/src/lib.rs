//! # threadgraph API
//!
//! Client side of the external entailment service used to label scheme
//! nodes as support or attack.

pub mod grpc;

pub use grpc::{connect_classifier, GrpcEntailmentClassifier};
