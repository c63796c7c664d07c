//! # eggbird-core
//!
//! Core types, traits, configuration, and prompt construction for the
//! EggBird LINE bot.

pub mod config;
pub mod error;
pub mod prompt;
pub mod traits;
