pub mod cleanup;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod oracle;
pub mod orchestrator;
pub mod output;
pub mod relocator;
pub mod remote;
pub mod store;
pub mod sync;
pub mod validator;
