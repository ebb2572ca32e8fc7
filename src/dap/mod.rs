pub mod client;
pub mod codec;
pub mod correlator;
pub mod events;
pub mod transport;
pub mod transport_trait;
pub mod types;

pub use client::DapClient;
pub use codec::FrameCodec;
