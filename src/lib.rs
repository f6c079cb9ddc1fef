//! httprx - resumable HTTP/1.x response receiver
//!
//! This crate turns the raw byte reads of a client connection into a
//! structured HTTP response, no matter where the network splits them.

pub mod http;
