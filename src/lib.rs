pub mod browser;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod entropy;
pub mod error;
pub mod fill;
pub mod notice;
pub mod observer;
pub mod reconcile;
pub mod remote;
pub mod resolver;
pub mod session;
pub mod storage_scan;
pub mod transport;

pub use credentials::{CredentialStore, Credentials};
pub use error::AutofillError;
