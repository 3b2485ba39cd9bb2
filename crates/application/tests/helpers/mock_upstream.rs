use async_trait::async_trait;
use conduit_dns_application::ports::{QueryProcessor, UpstreamResolver};
use conduit_dns_application::use_cases::{RespondOptions, Transaction};
use conduit_dns_domain::DomainError;
use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::{Name, RecordType};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn query_message(name: &str, record_type: RecordType, recursion_desired: bool) -> Message {
    let mut message = Message::new();
    message.set_id(0x1234);
    message.set_message_type(MessageType::Query);
    message.set_recursion_desired(recursion_desired);
    message.add_query(Query::query(Name::from_str(name).unwrap(), record_type));
    message
}

enum Reply {
    Message(Message),
    Nothing,
    Error,
}

pub struct MockUpstream {
    reply: Reply,
    calls: AtomicUsize,
    asked: Mutex<Vec<(Name, RecordType)>>,
}

impl MockUpstream {
    pub fn answering(message: Message) -> Self {
        Self::new(Reply::Message(message))
    }

    pub fn silent() -> Self {
        Self::new(Reply::Nothing)
    }

    pub fn failing() -> Self {
        Self::new(Reply::Error)
    }

    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn asked(&self) -> Vec<(Name, RecordType)> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamResolver for MockUpstream {
    async fn query(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<Option<Message>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.asked.lock().unwrap().push((name.clone(), record_type));
        match &self.reply {
            Reply::Message(message) => Ok(Some(message.clone())),
            Reply::Nothing => Ok(None),
            Reply::Error => Err(DomainError::TransportTimeout {
                server: "mock".to_string(),
            }),
        }
    }
}

/// Answers from a fixed table of `(relative name, type) -> text`; CNAME
/// entries are followed with `append`.
#[derive(Default)]
pub struct TableProcessor {
    entries: HashMap<(String, RecordType), String>,
}

impl TableProcessor {
    pub fn with(mut self, name: &str, record_type: RecordType, text: &str) -> Self {
        self.entries
            .insert((name.to_string(), record_type), text.to_string());
        self
    }
}

#[async_trait]
impl QueryProcessor for TableProcessor {
    async fn process(
        &self,
        name: &Name,
        record_type: RecordType,
        transaction: &mut Transaction<'_>,
    ) -> Result<(), DomainError> {
        let key = name.to_string();

        if let Some(text) = self.entries.get(&(key.clone(), record_type)) {
            return transaction.respond_text(text, RespondOptions::default());
        }

        if let Some(target) = self.entries.get(&(key, RecordType::CNAME)) {
            transaction.respond_text(
                &format!("{}.", target),
                RespondOptions {
                    record_type: Some(RecordType::CNAME),
                    ..Default::default()
                },
            )?;
            let target = Name::from_str(target)
                .map_err(|e| DomainError::InvalidName(e.to_string()))?;
            return transaction.append(target, record_type).await;
        }

        transaction.fail_with("NXDomain")
    }
}
