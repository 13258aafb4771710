//! Unpooling (FIXED, DIV, REP and GROUP) with exact adjoints, over ndarray (N, C, H, W) arrays.
//!
//! The work is split across member crates, re-exported here:
//!  * `core` holds the error types, `GridShape` and the `OpInstance` trait.
//!  * `ops` holds the `Unpool` builder, its instance and the `UnpoolingLayer`.

pub use unpool_core as core;
pub use unpool_ops as ops;
