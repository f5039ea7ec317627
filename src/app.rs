//! Player orchestration
//!
//! - `controller`: the synchronous state machine
//! - `runtime`: the async driver and its handle
//! - `message`: inputs and the commands the driver performs

mod controller;
mod message;
mod runtime;
mod state;
mod subscription;

pub use controller::{DEFAULT_CHAPTER_COUNT, PlayerController};
pub use message::{Command, LoadOutcome, LoadRequest, Message};
pub use runtime::{Player, PlayerHandle, fetch_selection};
pub use state::{PlayerState, Selection};
pub use subscription::{SubscriptionId, Subscribers};
