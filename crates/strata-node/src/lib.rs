//! Node wiring for Strata.
//!
//! A [`Node`] owns the two block domains (data and state), the DAG service
//! over the data domain, and the pin set. Ingestion and garbage collection
//! both operate on a shared `Arc<Node>`.

pub mod config;
pub mod error;
pub mod node;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use node::Node;
