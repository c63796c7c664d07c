//! # eggbird-line
//!
//! LINE Messaging API integration for EggBird: webhook signature
//! verification, event deserialization, and the reply/broadcast client.
//! Docs: <https://developers.line.biz/en/reference/messaging-api/>

pub mod client;
pub mod events;
pub mod signature;

pub use client::LineChannel;
