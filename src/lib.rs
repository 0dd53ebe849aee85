//! Seva portal: admin and devotee service for Sree Sabari Sastha Seva Samithi.
//!
//! SYSTEM CONTEXT
//! ==============
//! An Axum service in front of a Supabase backend. Bookings, donations,
//! contact messages and no-show blocks live in the backend and are reached
//! only through named procedures ([`backend`]). This crate adds the admin
//! listings and exports, the QR pass flow, and a streaming Gemini chat
//! proxy. [`transcript`] and [`voice`] hold the client-side chat state and
//! the live voice turn-taking, shared with the `seva-cli` terminal client.

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod services;
pub mod slots;
pub mod state;
pub mod transcript;
pub mod voice;
