//! Device connection: transport ownership, frame writes and inbound routing

mod backoff;
mod demux;
mod device;
pub(crate) mod registry;

pub use backoff::ExponentialBackoff;
pub use device::Device;
