//! Domain Layer - Core price relay types.
//!
//! This layer contains the instrument set, the validated price event, and
//! the client control protocol. Nothing here performs I/O.

/// Instruments and price events.
pub mod streaming;

/// Client control frames and their validation.
pub mod subscription;
