use async_trait::async_trait;
use conduit_dns_application::ports::{QueryProcessor, UpstreamResolver};
use conduit_dns_application::use_cases::{PassthroughOptions, RespondOptions, Transaction};
use conduit_dns_domain::DomainError;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, RecordType};
use std::collections::HashMap;
use std::sync::Arc;

/// Answers origin-relative names from a table, delegating the rest when an
/// upstream is configured. The name `broken` always errors and `panic`
/// panics.
#[derive(Default)]
pub struct ZoneProcessor {
    table: HashMap<(String, RecordType), Vec<String>>,
    upstream: Option<Arc<dyn UpstreamResolver>>,
}

impl ZoneProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, record_type: RecordType, text: &str) -> Self {
        self.table
            .entry((name.to_ascii_lowercase(), record_type))
            .or_default()
            .push(text.to_string());
        self
    }

    pub fn with_upstream(mut self, upstream: Arc<dyn UpstreamResolver>) -> Self {
        self.upstream = Some(upstream);
        self
    }
}

#[async_trait]
impl QueryProcessor for ZoneProcessor {
    async fn process(
        &self,
        name: &Name,
        record_type: RecordType,
        transaction: &mut Transaction<'_>,
    ) -> Result<(), DomainError> {
        let key = name.to_string().trim_end_matches('.').to_ascii_lowercase();

        if key == "panic" {
            panic!("processor panicked on purpose");
        }

        if key == "broken" {
            return Err(DomainError::ResolutionFailure("broken on purpose".into()));
        }

        if let Some(texts) = self.table.get(&(key, record_type)) {
            for text in texts {
                transaction.respond_text(text, RespondOptions::default())?;
            }
            return Ok(());
        }

        match &self.upstream {
            Some(upstream) => {
                transaction
                    .passthrough(upstream.as_ref(), PassthroughOptions::default())
                    .await
            }
            None => transaction.fail(ResponseCode::NXDomain),
        }
        Ok(())
    }
}
