use std::{collections::HashSet, sync::Arc};

use {
    async_trait::async_trait,
    regex::Regex,
    relaybot_common::Message,
    relaybot_pipeline::{
        Bot, Bundle, Emitter, Outcome, Processor, ProcessorHandle, panic_error,
    },
    tracing::{debug, warn},
};

use crate::{
    handler::{Captures, Handler, HandlerContext, Trigger},
    reply::process_replies,
};

/// Declares which handlers answer which messages.
///
/// ```
/// use relaybot_service::{Handler, ServiceBuilder};
///
/// let service = ServiceBuilder::new("greeter")
///     .on_command("hello", Handler::new("hello", |ctx| async move {
///         anyhow::Ok(format!("hello, {}", ctx.args().unwrap_or("world")))
///     }))
///     .on_hear(r"(?i)\bgood morning\b", Handler::new("morning", |_ctx| async {
///         anyhow::Ok("morning!")
///     }))
///     .unwrap()
///     .build();
///
/// assert_eq!(service.name(), "greeter");
/// ```
#[derive(Debug)]
pub struct ServiceBuilder {
    name: String,
    sigil: Option<char>,
    message: Vec<Handler>,
    commands: Vec<(String, Handler)>,
    listeners: Vec<(Regex, Handler)>,
}

impl ServiceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sigil: None,
            message: Vec::new(),
            commands: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Command sigil for this service. Defaults to the bot's setting.
    pub fn sigil(mut self, sigil: char) -> Self {
        self.sigil = Some(sigil);
        self
    }

    /// Call `handler` for every message.
    pub fn on_message(mut self, handler: Handler) -> Self {
        if !self.message.iter().any(|h| h.id() == handler.id()) {
            self.message.push(handler);
        }
        self
    }

    /// Call `handler` when the text starts with the sigil and `command`,
    /// followed by whitespace or nothing. Whatever follows is passed on as
    /// arguments.
    pub fn on_command(mut self, command: impl Into<String>, handler: Handler) -> Self {
        let command = command.into();
        if !self
            .commands
            .iter()
            .any(|(c, h)| *c == command && h.id() == handler.id())
        {
            self.commands.push((command, handler));
        }
        self
    }

    /// Call `handler` when the text matches `pattern`. A handler bound to
    /// several patterns runs once, with the first pattern that matches.
    pub fn on_hear(self, pattern: &str, handler: Handler) -> Result<Self, regex::Error> {
        Ok(self.on_hear_regex(Regex::new(pattern)?, handler))
    }

    pub fn on_hear_regex(mut self, regex: Regex, handler: Handler) -> Self {
        self.listeners.push((regex, handler));
        self
    }

    /// Alias of [`ServiceBuilder::on_hear`].
    pub fn on_listen(self, pattern: &str, handler: Handler) -> Result<Self, regex::Error> {
        self.on_hear(pattern, handler)
    }

    pub fn build(self) -> Service {
        let dispatcher = Arc::new(Dispatcher {
            name: self.name,
            sigil: self.sigil,
            message: self.message,
            commands: self.commands,
            listeners: self.listeners,
        });
        Service {
            handle: ProcessorHandle::from(dispatcher),
        }
    }
}

/// A built service. Register it in the `service` stage with
/// [`Bot::use_bundle`] or through [`Service::handle`].
#[derive(Debug, Clone)]
pub struct Service {
    handle: ProcessorHandle,
}

impl Service {
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// The processor handle. Every call returns the same identity.
    pub fn handle(&self) -> ProcessorHandle {
        self.handle.clone()
    }
}

impl Bundle for Service {
    fn name(&self) -> &str {
        self.handle.name()
    }

    fn register_into(&self, bot: &Bot) -> relaybot_pipeline::Result<()> {
        bot.service()?.register(self.handle());
        Ok(())
    }
}

struct Dispatcher {
    name: String,
    sigil: Option<char>,
    message: Vec<Handler>,
    commands: Vec<(String, Handler)>,
    listeners: Vec<(Regex, Handler)>,
}

impl Dispatcher {
    fn matching(&self, sigil: char, message: &Message) -> Vec<(Handler, Trigger)> {
        let mut calls: Vec<(Handler, Trigger)> = self
            .message
            .iter()
            .map(|h| (h.clone(), Trigger::Message))
            .collect();

        let Some(text) = message.text() else {
            return calls;
        };

        for (command, handler) in &self.commands {
            if let Some(args) = match_command(text, sigil, command) {
                calls.push((handler.clone(), Trigger::Command {
                    command: command.clone(),
                    args,
                }));
            }
        }

        let mut heard = HashSet::new();
        for (regex, handler) in &self.listeners {
            if heard.contains(&handler.id()) {
                continue;
            }
            if let Some(captures) = regex.captures(text) {
                heard.insert(handler.id());
                calls.push((
                    handler.clone(),
                    Trigger::Hear(Captures::new(regex, &captures)),
                ));
            }
        }

        calls
    }
}

#[async_trait]
impl Processor for Dispatcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, bot: &Arc<Bot>, message: Message, _emit: Emitter) -> Outcome {
        let sigil = self.sigil.unwrap_or(bot.settings().command_sigil);
        let calls = self.matching(sigil, &message);
        if calls.is_empty() {
            return Outcome::Discard;
        }
        debug!(service = %self.name, count = calls.len(), "dispatching handlers");

        let running: Vec<_> = calls
            .into_iter()
            .map(|(handler, trigger)| {
                let ctx = HandlerContext::new(Arc::clone(bot), message.clone(), trigger);
                let task = tokio::spawn(handler.call(ctx));
                (handler, task)
            })
            .collect();

        let mut replies = Vec::with_capacity(running.len());
        for (handler, task) in running {
            let failure = match task.await {
                Ok(Ok(reply)) => {
                    replies.push(reply);
                    continue;
                },
                Ok(Err(error)) => error,
                Err(join_error) if join_error.is_panic() => panic_error(join_error.into_panic()),
                Err(join_error) => {
                    warn!(service = %self.name, handler = handler.name(), error = %join_error, "handler cancelled");
                    continue;
                },
            };
            let origin = format!("{}::{}", self.name, handler.name());
            bot.report_failure(&origin, &message, &failure);
        }

        Outcome::Forward(process_replies(replies, &message))
    }
}

/// Arguments of `command` in `text`, or `None` if the command does not match.
/// The inner value is `None` when the command has no arguments.
fn match_command(text: &str, sigil: char, command: &str) -> Option<Option<String>> {
    let rest = text.strip_prefix(sigil)?.strip_prefix(command)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let args = rest.split_whitespace().collect::<Vec<_>>().join(" ");
    Some((!args.is_empty()).then_some(args))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::reply::Reply,
        relaybot_pipeline::{MemoryLogger, processor_fn},
        std::sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    fn incoming(text: &str) -> Message {
        Message::new()
            .with("service", "test")
            .with("group", "1234")
            .with("text", text)
    }

    struct Harness {
        bot: Arc<Bot>,
        logger: Arc<MemoryLogger>,
        sent: Arc<Mutex<Vec<Message>>>,
    }

    impl Harness {
        fn new(service: &Service) -> Self {
            let logger = Arc::new(MemoryLogger::new());
            let bot = Bot::builder().logger(logger.clone()).build().unwrap();
            bot.use_bundle(service).unwrap();

            let sent = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&sent);
            bot.sender()
                .unwrap()
                .register(processor_fn("capture", move |_bot, message, _emit| {
                    sink.lock().unwrap().push(message);
                    async { Outcome::Stop }
                }));
            Self { bot, logger, sent }
        }

        async fn texts(&self, text: &str) -> Vec<String> {
            self.sent.lock().unwrap().clear();
            self.bot.process(incoming(text)).await;
            let mut texts: Vec<String> = self
                .sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|m| m.text().map(str::to_string))
                .collect();
            texts.sort();
            texts
        }
    }

    fn constant(name: &'static str, reply: &'static str) -> Handler {
        Handler::new(name, move |_ctx| async move { anyhow::Ok(reply) })
    }

    #[test]
    fn command_matching() {
        assert_eq!(match_command("#test", '#', "test"), Some(None));
        assert_eq!(
            match_command("#test  extra   args ", '#', "test"),
            Some(Some("extra args".to_string()))
        );
        assert_eq!(match_command("#testing", '#', "test"), None);
        assert_eq!(match_command("test", '#', "test"), None);
        assert_eq!(match_command("#my cmd", '#', "my.cmd"), None);
        assert_eq!(match_command("#my.cmd", '#', "my.cmd"), Some(None));
        assert_eq!(match_command("!test\tnow", '!', "test"), Some(Some("now".into())));
    }

    #[tokio::test]
    async fn message_handlers_reply_to_everything() {
        let service = ServiceBuilder::new("svc")
            .on_message(constant("always", "Success!"))
            .build();
        let harness = Harness::new(&service);

        assert_eq!(harness.texts("anything at all").await, ["Success!"]);
        let sent = harness.sent.lock().unwrap();
        assert_eq!(sent[0].group(), Some("1234"));
        assert_eq!(sent[0].service(), Some("test"));
    }

    #[tokio::test]
    async fn commands_need_a_word_boundary() {
        let service = ServiceBuilder::new("svc")
            .on_command("test", constant("test", "first test"))
            .on_command("testing", constant("testing", "second test"))
            .build();
        let harness = Harness::new(&service);

        assert_eq!(harness.texts("#testing").await, ["second test"]);
        assert_eq!(harness.texts("#testing now").await, ["second test"]);
        assert_eq!(harness.texts("#test").await, ["first test"]);
        assert!(harness.texts("no command here").await.is_empty());
    }

    #[tokio::test]
    async fn command_arguments_reach_the_handler() {
        let echo = Handler::new("echo", |ctx| async move {
            anyhow::Ok(format!(
                "{}:{}",
                ctx.command().unwrap_or_default(),
                ctx.args().unwrap_or("<none>")
            ))
        });
        let service = ServiceBuilder::new("svc")
            .on_command("test", echo.clone())
            .build();
        let harness = Harness::new(&service);

        assert_eq!(harness.texts("#test extra args").await, ["test:extra args"]);
        assert_eq!(harness.texts("#test").await, ["test:<none>"]);
    }

    #[tokio::test]
    async fn custom_sigil() {
        let service = ServiceBuilder::new("svc")
            .sigil('!')
            .on_command("ping", constant("ping", "pong"))
            .build();
        let harness = Harness::new(&service);

        assert_eq!(harness.texts("!ping").await, ["pong"]);
        assert!(harness.texts("#ping").await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_bindings_run_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let counted = Handler::new("counted", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { anyhow::Ok(Reply::None) }
        });
        let service = ServiceBuilder::new("svc")
            .on_message(counted.clone())
            .on_message(counted.clone())
            .on_command("go", counted.clone())
            .on_command("go", counted)
            .build();
        let harness = Harness::new(&service);

        harness.texts("hello").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        harness.texts("#go").await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn overlapping_patterns_use_the_first_match() {
        let which = Handler::new("which", |ctx| async move {
            let captures = ctx.captures().unwrap();
            anyhow::Ok(format!("{} {}", captures.pattern(), captures.get(1).unwrap_or("")))
        });
        let service = ServiceBuilder::new("svc")
            .on_hear(r"^(hello)", which.clone())
            .unwrap()
            .on_listen(r"(world)$", which)
            .unwrap()
            .build();
        let harness = Harness::new(&service);

        assert_eq!(harness.texts("hello world").await, ["^(hello) hello"]);
        assert_eq!(harness.texts("big world").await, ["(world)$ world"]);
        assert!(harness.texts("nothing").await.is_empty());
    }

    #[tokio::test]
    async fn distinct_handlers_on_overlapping_patterns_both_run() {
        let service = ServiceBuilder::new("svc")
            .on_hear("this", constant("one", "one"))
            .unwrap()
            .on_hear("th.s", constant("two", "two"))
            .unwrap()
            .build();
        let harness = Harness::new(&service);

        assert_eq!(harness.texts("#test this").await, ["one", "two"]);
    }

    #[tokio::test]
    async fn failing_handler_is_logged_once_and_others_reply() {
        let broken = Handler::new("broken", |_ctx| async {
            Err::<Reply, _>(anyhow::anyhow!("service unavailable"))
        });
        let service = ServiceBuilder::new("weather")
            .on_message(broken)
            .on_message(constant("fine", "still here"))
            .build();
        let harness = Harness::new(&service);

        assert_eq!(harness.texts("hi").await, ["still here"]);
        let entries = harness.logger.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("Error in weather::broken"));
        assert!(entries[0].contains("service unavailable"));
    }

    #[tokio::test]
    async fn panicking_handler_reports_the_panic_reason() {
        let panics = Handler::new("panics", |ctx| async move {
            if ctx.text() == "boom" {
                panic!("forecast missing");
            }
            anyhow::Ok(Reply::None)
        });
        let service = ServiceBuilder::new("weather")
            .on_message(panics)
            .on_message(constant("fine", "still here"))
            .build();
        let harness = Harness::new(&service);

        assert_eq!(harness.texts("boom").await, ["still here"]);
        let entries = harness.logger.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("Error in weather::panics"));
        assert!(entries[0].contains("processor panicked: forecast missing"));
    }

    #[tokio::test]
    async fn multiple_and_empty_replies() {
        let many = Handler::new("many", |ctx| async move {
            let custom = ctx.message().with("text", "custom");
            anyhow::Ok(vec![Reply::from("Success!"), Reply::None, Reply::from(custom)])
        });
        let service = ServiceBuilder::new("svc").on_message(many).build();
        let harness = Harness::new(&service);

        assert_eq!(harness.texts("hi").await, ["Success!", "custom"]);
    }

    #[tokio::test]
    async fn registering_twice_keeps_one_service() {
        let service = ServiceBuilder::new("svc")
            .on_message(constant("always", "once"))
            .build();
        let harness = Harness::new(&service);
        harness.bot.use_bundle(&service).unwrap();

        assert_eq!(harness.bot.service().unwrap().len(), 1);
        assert_eq!(harness.texts("hi").await, ["once"]);
    }
}
