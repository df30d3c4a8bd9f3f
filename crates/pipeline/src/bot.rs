//! The bot: stages wired in order, plus the shared state processors use.

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, RwLock},
};

use {
    dashmap::DashMap,
    futures::future::{BoxFuture, FutureExt},
    relaybot_common::{KeyValueAtom, Message, StoreProvider},
    relaybot_config::{Settings, load_conf_directory, load_config_value},
    relaybot_store::FileStore,
    serde_json::Value,
    tokio::task::JoinHandle,
    tokio_util::task::TaskTracker,
    tracing::{debug, info, trace},
};

use crate::{
    acceptor::Acceptor,
    error::{Error, Result},
    failure::FailureReport,
    logger::{Logger, TracingLogger},
    registry::ProcessorRegistry,
    stage::{self, Stage, StageKind, default_stages},
};

// ── Bundle ──────────────────────────────────────────────────────────────────

/// A set of processors that knows how to register itself.
///
/// Any `Fn(&Bot) -> Result<()>` is a bundle, which is the easy way to pass
/// setup arguments along:
///
/// ```
/// use relaybot_pipeline::{Bot, Outcome, Result, processor_fn};
///
/// let prefix = String::from("[bot] ");
/// let bot = Bot::builder().build().unwrap();
/// bot.use_bundle(&|bot: &Bot| -> Result<()> {
///     let prefix = prefix.clone();
///     bot.postprocessor()?.register(processor_fn("prefix", move |_bot, message, _emit| {
///         let text = format!("{prefix}{}", message.text().unwrap_or_default());
///         async move { Outcome::forward(message.with("text", text)) }
///     }));
///     Ok(())
/// })
/// .unwrap();
/// assert_eq!(bot.postprocessor().unwrap().len(), 1);
/// ```
pub trait Bundle {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn register_into(&self, bot: &Bot) -> Result<()>;
}

impl<F> Bundle for F
where
    F: Fn(&Bot) -> Result<()>,
{
    fn register_into(&self, bot: &Bot) -> Result<()> {
        self(bot)
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct BotBuilder {
    settings: Settings,
    logger: Option<Arc<dyn Logger>>,
    store: Option<Arc<dyn StoreProvider>>,
    stages: Vec<(String, StageKind)>,
    config: Option<Value>,
}

impl BotBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Where failure reports go. Defaults to [`TracingLogger`].
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Use this provider instead of a [`FileStore`] under the configured
    /// store directory.
    pub fn store_provider(mut self, store: Arc<dyn StoreProvider>) -> Self {
        self.store = Some(store);
        self
    }

    /// Append a stage. When no stage is added the bot gets
    /// preprocessor, service, postprocessor and sender.
    pub fn stage(mut self, name: impl Into<String>, kind: StageKind) -> Self {
        self.stages.push((name.into(), kind));
        self
    }

    /// Processor configuration to use instead of loading it from disk.
    pub fn config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Arc<Bot>> {
        let stage_list = if self.stages.is_empty() {
            default_stages()
        } else {
            self.stages
        };

        let mut seen = HashSet::new();
        let mut stages = Vec::with_capacity(stage_list.len());
        for (name, kind) in stage_list {
            if !seen.insert(name.clone()) {
                return Err(Error::DuplicateStage { name });
            }
            stages.push(Stage::new(name, kind));
        }

        let store: Option<Arc<dyn StoreProvider>> = match (self.store, &self.settings.store_directory) {
            (Some(store), _) => Some(store),
            (None, Some(dir)) => Some(Arc::new(FileStore::open(dir)?)),
            (None, None) => None,
        };

        debug!(
            stages = ?stages.iter().map(Stage::name).collect::<Vec<_>>(),
            "bot built"
        );

        Ok(Arc::new(Bot {
            settings: self.settings,
            stages,
            logger: self.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
            store,
            caches: DashMap::new(),
            config: RwLock::new(self.config.map(Arc::new)),
            tracker: TaskTracker::new(),
        }))
    }
}

// ── Bot ─────────────────────────────────────────────────────────────────────

pub struct Bot {
    settings: Settings,
    stages: Vec<Stage>,
    logger: Arc<dyn Logger>,
    store: Option<Arc<dyn StoreProvider>>,
    caches: DashMap<String, Arc<KeyValueAtom>>,
    config: RwLock<Option<Arc<Value>>>,
    tracker: TaskTracker,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Stages ──────────────────────────────────────────────────────────────

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Registry of the named stage.
    pub fn stage(&self, name: &str) -> Result<&ProcessorRegistry> {
        self.position(name).map(|i| self.stages[i].registry())
    }

    pub fn preprocessor(&self) -> Result<&ProcessorRegistry> {
        self.stage(stage::PREPROCESSOR)
    }

    pub fn service(&self) -> Result<&ProcessorRegistry> {
        self.stage(stage::SERVICE)
    }

    pub fn postprocessor(&self) -> Result<&ProcessorRegistry> {
        self.stage(stage::POSTPROCESSOR)
    }

    pub fn sender(&self) -> Result<&ProcessorRegistry> {
        self.stage(stage::SENDER)
    }

    pub fn use_bundle<B: Bundle + ?Sized>(&self, bundle: &B) -> Result<()> {
        bundle.register_into(self)?;
        info!(bundle = bundle.name(), "bundle registered");
        Ok(())
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.stages
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| Error::unknown_stage(name))
    }

    // ── Traversal ───────────────────────────────────────────────────────────

    /// Validate an incoming message and start it at the first stage.
    pub fn receive(self: &Arc<Self>, message: Message) -> Result<JoinHandle<()>> {
        message.validate_identity()?;
        Ok(self.accept(message))
    }

    /// Start `message` at the first stage without waiting for it.
    pub fn accept(self: &Arc<Self>, message: Message) -> JoinHandle<()> {
        self.tracker.spawn(self.run_stage(0, message))
    }

    /// Start `message` at the named stage without waiting for it.
    pub fn accept_at(self: &Arc<Self>, stage: &str, message: Message) -> Result<JoinHandle<()>> {
        let index = self.position(stage)?;
        Ok(self.tracker.spawn(self.run_stage(index, message)))
    }

    /// Run `message` through every stage and wait until every path it
    /// produced has finished.
    pub async fn process(self: &Arc<Self>, message: Message) {
        self.run_stage(0, message).await;
    }

    pub async fn process_at(self: &Arc<Self>, stage: &str, message: Message) -> Result<()> {
        let index = self.position(stage)?;
        self.run_stage(index, message).await;
        Ok(())
    }

    /// Wait for every traversal started with [`Bot::accept`] so far.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    fn run_stage(self: &Arc<Self>, index: usize, message: Message) -> BoxFuture<'static, ()> {
        let bot = Arc::clone(self);
        async move {
            let Some(stage) = bot.stages.get(index) else {
                trace!("message left the pipeline");
                return;
            };
            trace!(stage = stage.name(), "entering stage");
            let next = {
                let bot = Arc::clone(&bot);
                Acceptor::new(move |output| bot.run_stage(index + 1, output))
            };
            stage.call(&bot, message, next).await;
        }
        .boxed()
    }

    // ── Shared state ────────────────────────────────────────────────────────

    /// In-memory cell for `key`. The same cell is returned until it is
    /// cleared.
    pub fn cache(&self, key: &str) -> Arc<KeyValueAtom> {
        Arc::clone(self.caches.entry(key.to_string()).or_default().value())
    }

    /// Drop the cache cell for `key`. Returns whether one existed.
    pub fn clear_cache(&self, key: &str) -> bool {
        self.caches.remove(key).is_some()
    }

    /// Durable cell for `key`, loaded on first use.
    pub fn store(&self, key: &str) -> Result<Arc<KeyValueAtom>> {
        Ok(self.store_provider()?.store(key)?)
    }

    pub fn flush_store(&self, key: &str) -> Result<()> {
        Ok(self.store_provider()?.flush(key)?)
    }

    /// Persist every store cell. A bot without stores has nothing to flush.
    pub fn flush_stores(&self) -> Result<()> {
        match &self.store {
            Some(store) => Ok(store.flush_all()?),
            None => Ok(()),
        }
    }

    fn store_provider(&self) -> Result<&Arc<dyn StoreProvider>> {
        self.store
            .as_ref()
            .ok_or(Error::Common(relaybot_common::Error::NoStoreDirectory))
    }

    /// Processor configuration, loaded on first use from the conf directory
    /// or, failing that, the config file.
    pub fn config(&self) -> Result<Arc<Value>> {
        if let Some(config) = self.config.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
            return Ok(Arc::clone(config));
        }

        let loaded = Arc::new(self.load_config()?);
        let mut slot = self.config.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(slot.get_or_insert(loaded)))
    }

    /// Replace the processor configuration.
    pub fn configure(&self, config: Value) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(config));
    }

    fn load_config(&self) -> Result<Value> {
        if let Some(dir) = &self.settings.conf_directory {
            debug!(path = %dir.display(), "loading conf directory");
            return Ok(load_conf_directory(dir)?);
        }
        if let Some(file) = &self.settings.config_file {
            debug!(path = %file.display(), "loading config file");
            return Ok(load_config_value(file)?);
        }
        Err(Error::NoConfiguration)
    }

    // ── Logging ─────────────────────────────────────────────────────────────

    pub fn log(&self, message: &str) {
        self.logger.log(message);
    }

    /// Write the failure report for `processor` failing on `message`.
    pub fn report_failure(&self, processor: &str, message: &Message, error: &anyhow::Error) {
        self.logger
            .log(&FailureReport::new(processor, message, error).to_string());
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("stages", &self.stages)
            .field("caches", &self.caches.len())
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{logger::MemoryLogger, outcome::Outcome, processor::processor_fn},
        relaybot_store::MemoryStore,
        serde_json::json,
        std::sync::Mutex,
    };

    fn tag(stage: &'static str) -> crate::processor::ProcessorHandle {
        processor_fn(stage, move |_bot, message: Message, _emit| async move {
            let seen = message.get_str("path").unwrap_or_default().to_string();
            Outcome::forward(message.with("path", format!("{seen}{stage};")))
        })
    }

    fn recorder(bot: &Bot) -> Arc<Mutex<Vec<Message>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bot.sender()
            .unwrap()
            .register(processor_fn("record", move |_bot, message, _emit| {
                sink.lock().unwrap().push(message);
                async { Outcome::Stop }
            }));
        seen
    }

    #[test]
    fn default_stages_in_order() {
        let bot = Bot::builder().build().unwrap();
        let names: Vec<&str> = bot.stages().iter().map(Stage::name).collect();
        assert_eq!(names, ["preprocessor", "service", "postprocessor", "sender"]);
        assert_eq!(bot.stages()[1].kind(), StageKind::Group);
    }

    #[test]
    fn stage_errors() {
        let bot = Bot::builder().build().unwrap();
        assert!(matches!(bot.stage("nope"), Err(Error::UnknownStage { .. })));

        let duplicate = Bot::builder()
            .stage("a", StageKind::Chain)
            .stage("a", StageKind::Group)
            .build();
        assert!(matches!(duplicate, Err(Error::DuplicateStage { .. })));
    }

    #[tokio::test]
    async fn messages_pass_every_stage_in_order() {
        let bot = Bot::builder().build().unwrap();
        bot.preprocessor().unwrap().register(tag("pre"));
        bot.service().unwrap().register(tag("svc"));
        bot.postprocessor().unwrap().register(tag("post"));
        let seen = recorder(&bot);

        bot.process(Message::new()).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get_str("path"), Some("pre;svc;post;"));
    }

    #[tokio::test]
    async fn empty_group_stage_ends_the_traversal() {
        let bot = Bot::builder().build().unwrap();
        let seen = recorder(&bot);

        bot.process(Message::new()).await;

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn process_at_skips_earlier_stages() {
        let bot = Bot::builder().build().unwrap();
        bot.preprocessor().unwrap().register(tag("pre"));
        bot.postprocessor().unwrap().register(tag("post"));
        let seen = recorder(&bot);

        bot.process_at("postprocessor", Message::new()).await.unwrap();
        assert!(bot.process_at("missing", Message::new()).await.is_err());

        assert_eq!(seen.lock().unwrap()[0].get_str("path"), Some("post;"));
    }

    #[tokio::test]
    async fn accepted_messages_are_tracked() {
        let bot = Bot::builder().build().unwrap();
        let seen = recorder(&bot);

        bot.accept_at("sender", Message::new().with("n", 1)).unwrap();
        bot.accept_at("sender", Message::new().with("n", 2)).unwrap();
        bot.wait_idle().await;

        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn receive_validates_identity() {
        let bot = Bot::builder().build().unwrap();
        let err = bot.receive(Message::new().with("text", "hi")).unwrap_err();
        assert!(matches!(err, Error::Common(_)));

        let message = Message::new()
            .with("service", "irc")
            .with("group", "#chan")
            .with("text", "hi");
        bot.receive(message).unwrap().await.unwrap();
    }

    #[test]
    fn cache_cells_are_stable_until_cleared() {
        let bot = Bot::builder().build().unwrap();
        let first = bot.cache("counter");
        first.set("n", 1);

        assert!(Arc::ptr_eq(&first, &bot.cache("counter")));
        assert_eq!(bot.cache("counter").get("n"), Some(json!(1)));

        assert!(bot.clear_cache("counter"));
        assert!(!Arc::ptr_eq(&first, &bot.cache("counter")));
        assert_eq!(bot.cache("counter").get("n"), None);
    }

    #[test]
    fn store_requires_a_directory() {
        let bot = Bot::builder().build().unwrap();
        assert!(matches!(
            bot.store("karma"),
            Err(Error::Common(relaybot_common::Error::NoStoreDirectory))
        ));
        bot.flush_stores().unwrap();
    }

    #[test]
    fn stores_persist_across_bots() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::builder().store_directory(dir.path()).build();

        let bot = Bot::builder().settings(settings.clone()).build().unwrap();
        bot.store("karma").unwrap().set("alice", 3);
        bot.flush_store("karma").unwrap();

        let reopened = Bot::builder().settings(settings).build().unwrap();
        assert_eq!(reopened.store("karma").unwrap().get("alice"), Some(json!(3)));
    }

    #[test]
    fn custom_store_provider() {
        let store = Arc::new(MemoryStore::new());
        let bot = Bot::builder().store_provider(store.clone()).build().unwrap();
        bot.store("k").unwrap().set("v", true);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn config_loads_lazily_from_conf_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("weather.yml"), "api_key: abc\n").unwrap();
        let settings = Settings::builder().conf_directory(dir.path()).build();
        let bot = Bot::builder().settings(settings).build().unwrap();

        let config = bot.config().unwrap();
        assert_eq!(config["weather"]["api_key"], "abc");

        std::fs::write(dir.path().join("late.yml"), "x: 1\n").unwrap();
        assert!(bot.config().unwrap().get("late").is_none());
    }

    #[test]
    fn config_sources() {
        let bot = Bot::builder().build().unwrap();
        assert!(matches!(bot.config(), Err(Error::NoConfiguration)));

        bot.configure(json!({"karma": {"limit": 5}}));
        assert_eq!(bot.config().unwrap()["karma"]["limit"], 5);

        let preset = Bot::builder().config(json!({"a": 1})).build().unwrap();
        assert_eq!(preset.config().unwrap()["a"], 1);
    }

    #[test]
    fn failures_and_log_lines_reach_the_logger() {
        let logger = Arc::new(MemoryLogger::new());
        let bot = Bot::builder().logger(logger.clone()).build().unwrap();

        bot.log("hello");
        bot.report_failure("weather", &Message::new(), &anyhow::anyhow!("timeout"));

        let entries = logger.entries();
        assert_eq!(entries[0], "hello");
        assert!(entries[1].contains("Error in weather"));
    }

    #[test]
    fn closures_are_bundles() {
        let bot = Bot::builder().build().unwrap();
        let svc = tag("svc");
        let bundle = |bot: &Bot| -> Result<()> {
            bot.service()?.register(svc.clone());
            Ok(())
        };
        bot.use_bundle(&bundle).unwrap();
        bot.use_bundle(&bundle).unwrap();
        assert_eq!(bot.service().unwrap().list(), vec![svc.clone()]);

        let failing = |bot: &Bot| -> Result<()> {
            bot.stage("missing")?;
            Ok(())
        };
        assert!(bot.use_bundle(&failing).is_err());
    }
}
