//! Integration test suite for selfswap
//!
//! End-to-end checks that run whole update cycles against a temp directory, feed the
//! packager's output to the updater, exercise the HTTP fetcher against a local mock
//! server, and drive the `selfswap-pack` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **update_cycle**: full update cycles with in-memory fetching and fault injection
//! - **packager**: files written by the packager served back to the updater
//! - **http**: `HttpFetcher` against `wiremock`
//! - **cli**: the `selfswap-pack` binary

mod cli;
mod http;
mod packager;
mod update_cycle;
