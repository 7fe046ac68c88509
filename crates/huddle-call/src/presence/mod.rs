//! Presence client for the call client.
//!
//! Keeps a WebSocket open to the presence gateway, re-identifies and
//! rejoins the configured room after every reconnect, and reports room
//! membership as [`PresenceEvent`]s. [`forward`] pipes those into a
//! running call orchestrator.

mod client;
mod translator;


pub use client::{PresenceClient, PresenceCommand};
pub use translator::{forward, into_orchestrator_input, translate, PresenceEvent};
