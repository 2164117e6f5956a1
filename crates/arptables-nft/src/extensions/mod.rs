//! Extensions shipped with the crate.

pub mod classify;
pub mod quota;
