//! HTTP/websocket ingress and the collaborator interfaces the core
//! depends on: authorization (a trait, token parsing happens outside
//! this crate in production) and per-actor rate limiting.

pub mod gate;
pub mod limits;
pub mod server;

pub use gate::DevGate;
pub use gate::Gate;
pub use limits::Limiter;
pub use server::Server;
