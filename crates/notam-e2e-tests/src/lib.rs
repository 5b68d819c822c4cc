//! End-to-end integration tests for the NOTAM advisory server.
//!
//! These tests drive a live server over TCP:
//! - Server startup and shutdown
//! - Admission control and duplicate client ids
//! - Packet framing errors reported to the client
//! - Two-packet submissions and their evaluation
//! - Rebroadcast of accepted plans to ATC stations

#![cfg(test)]
