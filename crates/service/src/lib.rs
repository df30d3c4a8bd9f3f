//! Declarative services for the `service` stage.
//!
//! A service binds handlers to three kinds of triggers: every message, a
//! command such as `#weather Seattle`, or a regex over the message text.
//! Matching handlers run concurrently and their replies are forwarded as
//! messages addressed to the conversation they came from.

pub mod handler;
pub mod reply;
pub mod service;

pub use {
    handler::{Captures, Handler, HandlerContext, Trigger},
    reply::{Reply, process_replies},
    service::{Service, ServiceBuilder},
};
