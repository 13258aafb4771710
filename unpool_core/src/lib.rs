//! Core types shared by the unpooling crates: errors, grid shapes and the `OpInstance` trait.

pub mod base_ops;
pub mod errors;
pub mod shape;
pub mod util;
