//! Encrypted direct messaging between pairs of users.
//!
//! [`services::ChatService`] is the entry point for every message operation;
//! [`services::PresenceTracker`] handles online status. Storage sits behind
//! the traits in [`repository`] and realtime fan-out behind
//! [`realtime::RealtimeBus`].

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod realtime;
pub mod repository;
pub mod services;
pub mod state;
