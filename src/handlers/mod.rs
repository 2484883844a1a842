//! HTTP handlers

pub mod analysis;
pub mod echo;
pub mod health;
pub mod root;
