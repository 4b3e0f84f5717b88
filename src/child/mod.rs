//! Child-side engines.
//!
//! Two execution models over the same wire:
//! - [`blocking`] - serial, synchronous syscalls only, responses in
//!   request order;
//! - [`cooperative`] - reactor-driven, pipelined, responses in
//!   completion order with an explicit per-request done capability.

pub mod blocking;
pub mod cooperative;
