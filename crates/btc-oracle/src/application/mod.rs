//! # Application Layer
//!
//! Services wiring the algorithms to the ports.

pub mod block_reader;
pub mod publisher;
pub mod reconciler;
pub mod responder;
pub mod tracker;

pub use block_reader::BlockReader;
pub use publisher::{PublishOutcome, PublishState, Publisher, FAILED_POSTING_SUBJECT};
pub use reconciler::{ReconcileReport, Reconciler};
pub use responder::{
    respond, ProofResponder, INVALID_ADDRESS_PREFIX, NOTHING_RECEIVED_REPLY, TRY_AGAIN_REPLY, USAGE_REPLY,
};
pub use tracker::{InFlightSet, PublicationTracker};
