//! Tokio-backed socket layer.
//!
//! Accepts connections, cuts their input into read events according to the
//! framing the [`Handler`](crate::handler::Handler) asks for, flushes queued
//! writes and drives the periodic session sweep.

pub mod listener;
pub mod tcp;
