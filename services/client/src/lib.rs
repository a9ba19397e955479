//! Telehealth Terminal Client
//!
//! A line-oriented front end for one participant of a session. The library
//! holds configuration loading and the console helpers; the binary in
//! `bin/client.rs` wires them to a `SessionContext`.

pub mod config;
pub mod console;
