//! cprsync: restricted rsync gateway for SSH forced-command keys
//!
//! Bound to one SSH key through an `authorized_keys` `command="…"` entry,
//! the gateway receives the client's requested command in
//! `SSH_ORIGINAL_COMMAND`, checks that it is an rsync server invocation
//! whose destination lies inside a directory the control plane currently
//! allows, records the decision, and replaces itself with the real rsync.
//!
//! # Security Model
//!
//! The security model is **fail-closed**: when in doubt, deny and log. A
//! missing, slow or malformed control plane denies the transfer; nothing is
//! retried, and the remote client only ever sees a fixed message.
//!
//! # Architecture
//!
//! - **Gateway**: parse, resolve, authorize and hand off one command
//! - **Control**: HTTP/1.1 query of the control plane over a Unix socket
//! - **Config**: Hierarchical TOML configuration merged with CLI flags
//! - **Telemetry**: Append-only audit log with optional syslog mirror

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod control;
pub mod gateway;
pub mod telemetry;
