//! The processor contract.
//!
//! A processor takes one message and produces zero or more. It can hand
//! outputs over as soon as it has them through its [`Emitter`], or return
//! them all at once in its [`Outcome`]. Both reach the next step.
//!
//! Processors come in two forms: a function form built with
//! [`processor_fn`], and a class form implementing [`Task`], where a fresh
//! task value is constructed for every invocation.

use std::{
    any::TypeId,
    borrow::Cow,
    fmt,
    future::Future,
    marker::PhantomData,
    sync::Arc,
};

use {
    async_trait::async_trait,
    relaybot_common::Message,
    tokio::sync::mpsc,
};

use crate::{bot::Bot, outcome::Outcome};

// ── Emitter ─────────────────────────────────────────────────────────────────

/// Hands output messages to the next step while a processor is still running.
///
/// Messages emitted before a processor returns [`Outcome::Stop`] or
/// [`Outcome::Failure`] have already moved on and are not recalled.
#[derive(Clone)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<Message>,
}

impl Emitter {
    /// An emitter and the receiving end of its outputs.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Pass `message` on. Returns `false` when nobody is listening anymore.
    pub fn emit(&self, message: Message) -> bool {
        self.tx.send(message).is_ok()
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

// ── Processor ───────────────────────────────────────────────────────────────

#[async_trait]
pub trait Processor: Send + Sync + 'static {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    async fn call(&self, bot: &Arc<Bot>, message: Message, emit: Emitter) -> Outcome;
}

/// Function-form processor. See [`processor_fn`].
pub struct FnProcessor<F> {
    name: Cow<'static, str>,
    f: F,
}

#[async_trait]
impl<F, Fut> Processor for FnProcessor<F>
where
    F: Fn(Arc<Bot>, Message, Emitter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, bot: &Arc<Bot>, message: Message, emit: Emitter) -> Outcome {
        (self.f)(Arc::clone(bot), message, emit).await
    }
}

/// Build a processor from an async closure.
///
/// Every call to `processor_fn` yields a distinct processor: registering
/// the same returned handle twice is deduplicated, registering two handles
/// built from identical closures is not.
pub fn processor_fn<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> ProcessorHandle
where
    F: Fn(Arc<Bot>, Message, Emitter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    ProcessorHandle::new(Arc::new(FnProcessor {
        name: name.into(),
        f,
    }))
}

// ── Task ────────────────────────────────────────────────────────────────────

/// Class-form processor: a new value is built for every message.
///
/// Registering the same task type twice is deduplicated by type.
///
/// ```
/// use {
///     relaybot_pipeline::{Bot, Message, Outcome, ProcessorHandle, Task},
///     std::sync::Arc,
/// };
///
/// struct Shout;
///
/// #[async_trait::async_trait]
/// impl Task for Shout {
///     fn new(_bot: Arc<Bot>) -> Self {
///         Shout
///     }
///
///     async fn process(&self, message: Message) -> Outcome {
///         let text = message.text().unwrap_or_default().to_uppercase();
///         message.with("text", text).into()
///     }
/// }
///
/// assert_eq!(ProcessorHandle::task::<Shout>(), ProcessorHandle::task::<Shout>());
/// ```
#[async_trait]
pub trait Task: Sized + Send + Sync + 'static {
    fn new(bot: Arc<Bot>) -> Self;

    async fn process(&self, message: Message) -> Outcome;
}

struct TaskProcessor<T> {
    name: &'static str,
    _task: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T: Task> Processor for TaskProcessor<T> {
    fn name(&self) -> &str {
        self.name
    }

    async fn call(&self, bot: &Arc<Bot>, message: Message, _emit: Emitter) -> Outcome {
        T::new(Arc::clone(bot)).process(message).await
    }
}

// ── Handles ─────────────────────────────────────────────────────────────────

/// Identity used to deduplicate registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorId {
    /// A [`Task`] type.
    Type(TypeId),
    /// A specific processor instance, by address.
    Instance(usize),
}

/// A registered processor together with its identity.
#[derive(Clone)]
pub struct ProcessorHandle {
    id: ProcessorId,
    processor: Arc<dyn Processor>,
}

impl ProcessorHandle {
    /// Wrap a processor instance. Clones of the returned handle share its
    /// identity.
    pub fn new(processor: Arc<dyn Processor>) -> Self {
        let id = ProcessorId::Instance(Arc::as_ptr(&processor) as *const () as usize);
        Self { id, processor }
    }

    pub fn task<T: Task>() -> Self {
        Self {
            id: ProcessorId::Type(TypeId::of::<T>()),
            processor: Arc::new(TaskProcessor::<T> {
                name: std::any::type_name::<T>(),
                _task: PhantomData,
            }),
        }
    }

    pub fn id(&self) -> ProcessorId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.processor.name()
    }

    pub fn processor(&self) -> Arc<dyn Processor> {
        Arc::clone(&self.processor)
    }
}

impl<P: Processor> From<Arc<P>> for ProcessorHandle {
    fn from(processor: Arc<P>) -> Self {
        Self::new(processor)
    }
}

impl PartialEq for ProcessorHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ProcessorHandle {}

impl fmt::Debug for ProcessorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorHandle")
            .field("name", &self.name())
            .field("id", &self.id)
            .finish()
    }
}
