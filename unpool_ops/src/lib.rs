//! Unpooling ops (`Unpool`, `UnpoolInstance`) and the layer that reconfigures them as input shapes change.

pub mod layer;
pub mod unpool;
