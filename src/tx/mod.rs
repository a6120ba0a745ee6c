//! Transaction composition and submission

pub mod envelope;
pub mod pipeline;

pub use envelope::{compose, tx_hash, ComposeArgs, SignedTx, UnsignedTx};
pub use pipeline::TxPipeline;
