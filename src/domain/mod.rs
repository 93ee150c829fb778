//! Domain layer: the hexagonal boundary this crate exposes.
//!
//! Application code depends only on the port traits in [`ports`]; which
//! backend satisfies each port is decided by configuration and the
//! registry, never by the caller.

pub mod ports;
