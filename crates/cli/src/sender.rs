use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    relaybot_common::Message,
    relaybot_pipeline::{Bot, Emitter, Outcome, Processor},
};

/// Writes every outgoing message as one JSON line.
pub struct JsonLinesSender<W> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonLinesSender<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

#[async_trait]
impl<W: Write + Send + 'static> Processor for JsonLinesSender<W> {
    fn name(&self) -> &str {
        "json-lines"
    }

    async fn call(&self, _bot: &Arc<Bot>, message: Message, _emit: Emitter) -> Outcome {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let written = writeln!(out, "{message}").and_then(|()| out.flush());
        match written {
            Ok(()) => Outcome::Stop,
            Err(e) => Outcome::fail(e),
        }
    }
}
