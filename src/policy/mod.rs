pub mod car;

#[cfg(feature = "concurrency")]
pub mod sharded;
