//! Background -> presentation message relay and cooperative cancellation
//!
//! Background work never touches presentation state. It enqueues `UiEvent`s
//! through a `RelaySender`; the presentation loop drains its `RelayReceiver`
//! on a fixed cadence and applies them in order.

pub mod cancel;
pub mod channel;
pub mod messages;

pub use cancel::CancelFlag;
pub use channel::{relay, RelayReceiver, RelaySender};
pub use messages::{DeferredAction, SessionEmitter, SessionId, UiEvent};
