use relaybot_common::Message;

/// What a handler answers with.
///
/// Bare text becomes a reply addressed to the service and group the
/// original message came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Reply {
    #[default]
    None,
    Text(String),
    Message(Message),
    Many(Vec<Reply>),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    fn collect_into(self, original: &Message, out: &mut Vec<Message>) {
        match self {
            Self::None => {},
            Self::Text(text) => out.push(Message::reply_to(original, text)),
            Self::Message(message) => out.push(message),
            Self::Many(replies) => {
                for reply in replies {
                    reply.collect_into(original, out);
                }
            },
        }
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::None
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Message> for Reply {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(reply: Option<T>) -> Self {
        reply.map_or(Self::None, Into::into)
    }
}

impl<T: Into<Reply>> From<Vec<T>> for Reply {
    fn from(replies: Vec<T>) -> Self {
        Self::Many(replies.into_iter().map(Into::into).collect())
    }
}

/// Flatten handler replies into outgoing messages, dropping empty ones.
pub fn process_replies(replies: impl IntoIterator<Item = Reply>, original: &Message) -> Vec<Message> {
    let mut out = Vec::new();
    for reply in replies {
        reply.collect_into(original, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_and_addresses_text() {
        let original = Message::new()
            .with("service", "irc")
            .with("group", "#rust")
            .with("text", "#hi");
        let custom = Message::new().with("another", "reply");

        let replies = vec![
            Reply::from("hello"),
            Reply::None,
            Reply::from(vec![Reply::from(Some("nested")), Reply::from(None::<String>)]),
            Reply::from(custom.clone()),
        ];
        let out = process_replies(replies, &original);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].text(), Some("hello"));
        assert_eq!(out[0].service(), Some("irc"));
        assert_eq!(out[0].group(), Some("#rust"));
        assert_eq!(out[1].text(), Some("nested"));
        assert_eq!(out[2], custom);
    }
}
