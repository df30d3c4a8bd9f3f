use std::{fmt, future::Future, sync::Arc};

use {
    futures::future::{BoxFuture, FutureExt},
    relaybot_common::Message,
};

type AcceptFn = dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync;

/// Continuation that receives whatever a chain or group lets through.
///
/// The bot wires each stage's acceptor to the next stage. The returned future
/// completes when the accepted message has been fully handled downstream.
#[derive(Clone)]
pub struct Acceptor(Arc<AcceptFn>);

impl Acceptor {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(Arc::new(move |message| f(message).boxed()))
    }

    /// An acceptor that drops everything it is given.
    pub fn discard() -> Self {
        Self::new(|_| async {})
    }

    pub fn accept(&self, message: Message) -> BoxFuture<'static, ()> {
        (self.0)(message)
    }
}

impl fmt::Debug for Acceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Acceptor")
    }
}
