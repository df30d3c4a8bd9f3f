use std::sync::Arc;

use {
    futures::future::BoxFuture,
    relaybot_common::Message,
    tokio::task::JoinSet,
    tracing::{debug, trace, warn},
};

use crate::{
    bot::Bot,
    failure::panic_error,
    outcome::Outcome,
    processor::{Emitter, ProcessorHandle},
};

/// Run one processor on one message with failure isolation.
///
/// Every output, whether emitted while the processor runs or returned in
/// [`Outcome::Forward`], is handed to `forward` and driven on its own task.
/// Resolves once the processor has finished and every forwarded path has
/// completed. Errors and panics are reported through the bot's logger and
/// never escape.
pub(crate) async fn invoke<F>(bot: &Arc<Bot>, handle: &ProcessorHandle, message: Message, forward: F)
where
    F: Fn(Message) -> BoxFuture<'static, ()>,
{
    let (emit, mut outputs) = Emitter::channel();
    let call = {
        let processor = handle.processor();
        let bot = Arc::clone(bot);
        let message = message.clone();
        tokio::spawn(async move { processor.call(&bot, message, emit).await })
    };

    let mut paths = JoinSet::new();
    while let Some(output) = outputs.recv().await {
        paths.spawn(forward(output));
    }

    match call.await {
        Ok(Outcome::Forward(messages)) => {
            for output in messages {
                paths.spawn(forward(output));
            }
        },
        Ok(Outcome::Discard) => {
            trace!(processor = handle.name(), "message discarded");
        },
        Ok(Outcome::Stop) => {
            debug!(processor = handle.name(), "processing stopped");
        },
        Ok(Outcome::Failure(error)) => {
            bot.report_failure(handle.name(), &message, &error);
        },
        Err(join_error) if join_error.is_panic() => {
            let error = panic_error(join_error.into_panic());
            bot.report_failure(handle.name(), &message, &error);
        },
        Err(join_error) => {
            warn!(processor = handle.name(), error = %join_error, "processor task cancelled");
        },
    }

    while let Some(result) = paths.join_next().await {
        if let Err(e) = result {
            warn!(processor = handle.name(), error = %e, "downstream path aborted");
        }
    }
}
