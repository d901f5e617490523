pub mod entity;
pub mod error;
pub mod port;

#[cfg(feature = "test-utils")]
pub mod mock;
