//! Per-channel game rooms and the arena that routes to them.
//!
//! - [`channel`] — the mutable table state a room owns
//! - [`event`] — the typed event stream channels broadcast
//! - [`command`] — ingress envelopes and the client wire format
//! - [`timer`] — single-armed, epoch-guarded timer slots
//! - [`room`] — one task per channel, consuming one input queue
//! - [`floor`] — the channel arena, auth gate, and rate limiting

pub mod channel;
pub mod command;
pub mod event;
pub mod floor;
pub mod room;
pub mod timer;

pub use channel::Binding;
pub use channel::ChannelState;
pub use channel::TableConfig;
pub use command::ClientMessage;
pub use command::Command;
pub use command::CommandKind;
pub use command::Directive;
pub use command::Identity;
pub use command::LevelSpec;
pub use event::Event;
pub use event::Outbound;
pub use event::PlayerDelta;
pub use event::PlayerPublic;
pub use floor::ChannelHandle;
pub use floor::Floor;
pub use room::Input;
pub use room::Room;
pub use timer::TimerKind;
pub use timer::TimerSlot;
