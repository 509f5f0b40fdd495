//! Core types shared by every stage of an update.
//!
//! Currently this is the error system: [`SelfswapError`] for code, [`ErrorContext`]
//! and [`user_friendly_error`] for people.

pub mod error;

pub use error::{ErrorContext, Result, SelfswapError, user_friendly_error};
