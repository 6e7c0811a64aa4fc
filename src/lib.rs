pub mod abi;
pub mod chain;
pub mod config;
pub mod error;
pub mod explorer;
pub mod naming;
pub mod normalizer;
pub mod orchestrator;
pub mod query;
pub mod registry;
pub mod repository;
pub mod rpc;
pub mod token;
pub mod verifier;
