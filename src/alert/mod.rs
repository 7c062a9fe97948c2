//! Emergency alert dispatch

pub mod dispatcher;
pub mod transport;

pub use dispatcher::{maps_link, AlertDispatcher};
pub use transport::{build_transport, LogTransport, MailTransport, ResendTransport};
