//! Session configuration
//!
//! Host, port, credentials and protocol selection for opening a transport.

mod settings;

pub use settings::{Credentials, Protocol, SessionConfig};
