//! Verification rules and admin gating.

pub mod admin;
pub mod verify;
