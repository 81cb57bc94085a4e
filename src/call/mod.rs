pub mod controller;
pub mod event;
pub mod session;
pub mod widget;

pub use controller::{CallCommand, CallController};
pub use event::CallEvent;
pub use session::{format_elapsed, CallPhase, SessionHandle, SessionState};
pub use widget::{ConferenceWidget, EventBridgeWidget};
