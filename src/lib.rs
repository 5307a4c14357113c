//! A Redis-compatible in-memory key-value server.
//!
//! This crate provides a server speaking the RESP wire protocol over TCP,
//! with support for:
//!
//! - String, list, hash, set and sorted-set values with the classic
//!   compact-to-general encoding transitions
//! - Multiple logical databases selected per connection (SELECT)
//! - Append-only-file persistence with boot-time replay
//! - A cluster mode that routes keys across peer nodes by consistent hashing
//!
//! Concurrent connections are handled through async/await with Tokio; the
//! data engine itself is synchronous and safe for parallel callers.

pub mod aof;
pub mod cluster;
pub mod config;
pub mod connection;
pub mod database;
pub mod datastruct;
pub mod dict;
pub mod hashring;
pub mod parser;
pub mod resp;
pub mod server;
pub mod wildcard;
