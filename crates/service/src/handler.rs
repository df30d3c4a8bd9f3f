use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use {
    futures::future::{BoxFuture, FutureExt},
    regex::Regex,
    relaybot_common::Message,
    relaybot_pipeline::Bot,
};

use crate::reply::Reply;

type HandlerFn = dyn Fn(HandlerContext) -> BoxFuture<'static, anyhow::Result<Reply>> + Send + Sync;

/// A named async function that answers messages.
///
/// Clones share identity, so binding the same handler to several triggers
/// lets the service call it only once per message.
#[derive(Clone)]
pub struct Handler {
    name: Arc<str>,
    f: Arc<HandlerFn>,
}

impl Handler {
    pub fn new<F, Fut, R>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Into<Reply>,
    {
        Self {
            name: name.into().into(),
            f: Arc::new(move |ctx: HandlerContext| f(ctx).map(|result| result.map(Into::into)).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.f) as *const () as usize
    }

    pub(crate) fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, anyhow::Result<Reply>> {
        (self.f)(ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.name).finish()
    }
}

/// Why a handler was called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Message,
    Command {
        command: String,
        args: Option<String>,
    },
    Hear(Captures),
}

/// Owned copy of a regex match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    pattern: String,
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl Captures {
    pub(crate) fn new(regex: &Regex, captures: &regex::Captures<'_>) -> Self {
        let groups = captures
            .iter()
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        let named = regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Self {
            pattern: regex.as_str().to_string(),
            groups,
            named,
        }
    }

    /// Group `index`; 0 is the whole match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// The pattern that matched.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Everything a handler gets to see.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    bot: Arc<Bot>,
    message: Message,
    trigger: Trigger,
}

impl HandlerContext {
    pub fn new(bot: Arc<Bot>, message: Message, trigger: Trigger) -> Self {
        Self {
            bot,
            message,
            trigger,
        }
    }

    pub fn bot(&self) -> &Arc<Bot> {
        &self.bot
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Message text, or `""` when the message has none.
    pub fn text(&self) -> &str {
        self.message.text().unwrap_or_default()
    }

    pub fn command(&self) -> Option<&str> {
        match &self.trigger {
            Trigger::Command { command, .. } => Some(command),
            _ => None,
        }
    }

    pub fn args(&self) -> Option<&str> {
        match &self.trigger {
            Trigger::Command { args, .. } => args.as_deref(),
            _ => None,
        }
    }

    pub fn captures(&self) -> Option<&Captures> {
        match &self.trigger {
            Trigger::Hear(captures) => Some(captures),
            _ => None,
        }
    }

    /// A text reply addressed to where this message came from.
    pub fn reply(&self, text: impl Into<String>) -> Message {
        Message::reply_to(&self.message, text)
    }
}
