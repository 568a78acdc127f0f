pub mod address;
pub mod channel;
pub mod mock;
pub mod session;
pub mod sse;

pub use address::Endpoint;
pub use channel::{ChannelOpener, EventChannel, HttpChannelOpener, OpenError};
pub use mock::{ScriptedChannel, ScriptedChannelOpener};
pub use session::{Session, SessionConfig, TurnReport, TurnStart};
