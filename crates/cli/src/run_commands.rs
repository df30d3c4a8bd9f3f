use std::sync::Arc;

use {
    anyhow::Result,
    relaybot_common::Message,
    relaybot_config::Settings,
    relaybot_pipeline::Bot,
    tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    tracing::{info, warn},
};

use crate::{echo, sender::JsonLinesSender};

pub async fn handle_run(settings: Settings) -> Result<()> {
    let bot = Bot::builder().settings(settings).build()?;
    bot.use_bundle(&echo::service())?;
    bot.sender()?
        .register(Arc::new(JsonLinesSender::new(std::io::stdout())));

    let received = feed(&bot, BufReader::new(tokio::io::stdin())).await?;
    bot.flush_stores()?;
    info!(received, "input closed");
    Ok(())
}

/// Hand every JSON line from `input` to the bot and wait until all of them
/// have been processed. Returns how many messages were accepted.
async fn feed<R: AsyncBufRead + Unpin>(bot: &Arc<Bot>, input: R) -> Result<usize> {
    let mut lines = input.lines();
    let mut received = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let message = match line.parse::<Message>() {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "skipping line that is not a JSON object");
                continue;
            },
        };
        match bot.receive(message) {
            Ok(_) => received += 1,
            Err(e) => warn!(error = %e, "message rejected"),
        }
    }

    bot.wait_idle().await;
    Ok(received)
}
