pub mod activity;
pub mod checkpoint;
pub mod errors;
pub mod events;
pub mod ids;
pub mod messages;
pub mod text;
pub mod timeline;
pub mod turn;

pub use activity::{ActivityPhase, ActivityState, Stage};
pub use checkpoint::{CheckpointStore, CheckpointToken};
pub use errors::{ChannelError, DecodeFailure, SetupFailure, SubmitRejected};
pub use events::StreamEvent;
pub use ids::{MessageId, SessionId};
pub use messages::{Author, Message};
pub use timeline::{Reduction, Timeline, TimelineSnapshot};
pub use turn::{TurnContext, TurnPhase};
