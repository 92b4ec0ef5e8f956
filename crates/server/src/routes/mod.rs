//! HTTP route implementations.

pub mod proxy;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;
