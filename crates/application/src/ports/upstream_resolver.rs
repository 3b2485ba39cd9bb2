use async_trait::async_trait;
use conduit_dns_domain::DomainError;
use hickory_proto::op::Message;
use hickory_proto::rr::{Name, RecordType};

/// Something a transaction can delegate a question to.
#[async_trait]
pub trait UpstreamResolver: Send + Sync {
    /// `Ok(None)` means every candidate declined without failing.
    async fn query(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<Option<Message>, DomainError>;
}
