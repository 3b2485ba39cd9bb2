use async_trait::async_trait;
use conduit_dns_domain::DomainError;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, RecordType};

use crate::use_cases::Transaction;

/// User-supplied resolution policy, invoked once per question.
///
/// `name` is relative to the server origin. Returning an error turns the
/// whole response into ServFail.
#[async_trait]
pub trait QueryProcessor: Send + Sync {
    async fn process(
        &self,
        _name: &Name,
        _record_type: RecordType,
        transaction: &mut Transaction<'_>,
    ) -> Result<(), DomainError> {
        transaction.fail(ResponseCode::NXDomain);
        Ok(())
    }
}
