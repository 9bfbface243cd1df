//! Control-plane policy query.
//!
//! The control plane is a local daemon listening on a Unix socket. It
//! speaks plain HTTP/1.1 and answers `GET /projects` with the set of
//! directories the key's user may currently reach.

mod client;
mod error;
mod protocol;

pub use client::ControlPlaneClient;
pub use error::FetchError;
pub use protocol::{PROJECTS_PATH, ProjectMap};
