//! Message pipeline for chat bots.
//!
//! A [`Bot`] moves each incoming [`Message`] through an ordered list of
//! stages. Chain stages feed every processor's output into the next
//! processor. Group stages hand the same input to every processor at once.
//! Processor failures are reported through the bot's [`Logger`] and only end
//! the path they happened on.

pub mod acceptor;
pub mod bot;
pub mod chain;
pub mod error;
pub mod failure;
pub mod group;
mod invoke;
pub mod logger;
pub mod outcome;
pub mod processor;
pub mod registry;
pub mod stage;

pub use {
    acceptor::Acceptor,
    bot::{Bot, BotBuilder, Bundle},
    chain::ProcessorChain,
    error::{Error, Result},
    failure::{FailureReport, panic_error},
    group::ProcessorGroup,
    logger::{Logger, MemoryLogger, TracingLogger},
    outcome::Outcome,
    processor::{Emitter, Processor, ProcessorHandle, ProcessorId, Task, processor_fn},
    registry::ProcessorRegistry,
    relaybot_common::{KeyValueAtom, Message},
    stage::{Stage, StageKind},
};
