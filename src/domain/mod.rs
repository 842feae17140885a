pub mod channel;
pub mod credentials;
pub mod depth;
pub mod message;

pub use channel::Channel;
pub use credentials::Credentials;
pub use depth::DepthPolicy;
pub use message::{Message, UNKNOWN_SENDER};
