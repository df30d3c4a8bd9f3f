use relaybot_common::Message;

/// What a processor decided about the message it was given.
#[derive(Debug)]
pub enum Outcome {
    /// Pass these messages on. An empty list behaves like [`Outcome::Discard`].
    Forward(Vec<Message>),
    /// Nothing to pass on.
    Discard,
    /// Deliberately end this path. Not logged.
    Stop,
    /// The processor failed. The failure is reported through the bot's
    /// logger and this path ends.
    Failure(anyhow::Error),
}

impl Outcome {
    #[must_use]
    pub fn forward(message: Message) -> Self {
        Self::Forward(vec![message])
    }

    #[must_use]
    pub fn fail(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

impl From<Message> for Outcome {
    fn from(message: Message) -> Self {
        Self::forward(message)
    }
}

impl From<Vec<Message>> for Outcome {
    fn from(messages: Vec<Message>) -> Self {
        Self::Forward(messages)
    }
}

impl From<Option<Message>> for Outcome {
    fn from(message: Option<Message>) -> Self {
        match message {
            Some(message) => Self::forward(message),
            None => Self::Discard,
        }
    }
}

impl<T: Into<Outcome>> From<anyhow::Result<T>> for Outcome {
    fn from(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(error) => Self::Failure(error),
        }
    }
}
