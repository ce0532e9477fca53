//! Functional simulator of a two-level set-associative cache hierarchy with a
//! victim cache between L1 and L2.

pub mod accumulator;
mod bin;
pub mod cache;
pub mod common;
pub mod config;
pub mod geometry;
pub mod hierarchy;
pub mod sim;
pub mod timing;
pub mod trace;
pub mod victim;

#[cfg(feature = "stat")]
pub mod stat;
