use async_trait::async_trait;
use conduit_dns_application::ports::{QueryProcessor, UpstreamResolver};
use conduit_dns_application::use_cases::{PassthroughOptions, Transaction};
use conduit_dns_domain::DomainError;
use conduit_dns_infrastructure::system::Hosts;
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{Name, RData, RecordType};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// Answers address questions from a hosts table and forwards the rest.
pub struct ForwardingProcessor {
    hosts: Hosts,
    upstream: Arc<dyn UpstreamResolver>,
}

impl ForwardingProcessor {
    pub fn new(hosts: Hosts, upstream: Arc<dyn UpstreamResolver>) -> Self {
        Self { hosts, upstream }
    }

    fn local_answers(&self, question: &Name, record_type: RecordType) -> Vec<RData> {
        let addresses = self.hosts.addresses(&question.to_string());
        addresses
            .iter()
            .filter_map(|address| match (record_type, address) {
                (RecordType::A, IpAddr::V4(v4)) => Some(RData::A(A(*v4))),
                (RecordType::AAAA, IpAddr::V6(v6)) => Some(RData::AAAA(AAAA(*v6))),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl QueryProcessor for ForwardingProcessor {
    async fn process(
        &self,
        _name: &Name,
        record_type: RecordType,
        transaction: &mut Transaction<'_>,
    ) -> Result<(), DomainError> {
        let answers = self.local_answers(transaction.question(), record_type);

        if answers.is_empty() {
            transaction
                .passthrough(self.upstream.as_ref(), PassthroughOptions::default())
                .await;
            return Ok(());
        }

        debug!(question = %transaction.question(), count = answers.len(), "Answering from hosts");
        for rdata in answers {
            transaction.respond(rdata);
        }
        Ok(())
    }
}
