use conduit_dns_domain::{
    chunked, merge_message, parse_rcode, DomainError, NameOriginExt, DEFAULT_TTL,
    MAX_CHARACTER_STRING,
};
use hickory_proto::op::{Message, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, PTR, TXT};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::ports::{QueryProcessor, UpstreamResolver};

const MAX_APPEND_DEPTH: usize = 16;

/// Response section a constructed record is added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    Answer,
    Authority,
    Additional,
}

#[derive(Debug, Clone, Default)]
pub struct RespondOptions {
    /// Defaults to `DEFAULT_TTL`.
    pub ttl: Option<u32>,
    /// Owner name; defaults to the fully qualified question name.
    pub name: Option<Name>,
    pub section: Section,
    /// Record type used by `respond_text`; defaults to the question type.
    pub record_type: Option<RecordType>,
}

#[derive(Debug, Clone, Default)]
pub struct PassthroughOptions {
    /// Delegate even when the client did not ask for recursion.
    pub force: bool,
    pub name: Option<Name>,
    pub record_type: Option<RecordType>,
}

/// One question of an incoming query, and the response it contributes to.
pub struct Transaction<'a> {
    processor: &'a dyn QueryProcessor,
    query: &'a Message,
    response: &'a mut Message,
    name: Name,
    question: Name,
    record_type: RecordType,
    origin: Name,
    depth: usize,
    question_appended: bool,
}

impl<'a> Transaction<'a> {
    /// `name` is relative to `origin`; the question is `name` qualified by it.
    pub fn new(
        processor: &'a dyn QueryProcessor,
        query: &'a Message,
        response: &'a mut Message,
        name: Name,
        record_type: RecordType,
        origin: &Name,
    ) -> Result<Self, DomainError> {
        let question = name.with_origin(origin)?;
        Ok(Self {
            processor,
            query,
            response,
            name,
            question,
            record_type,
            origin: origin.clone(),
            depth: 0,
            question_appended: false,
        })
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn question(&self) -> &Name {
        &self.question
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn query(&self) -> &Message {
        self.query
    }

    pub fn response(&self) -> &Message {
        self.response
    }

    pub fn origin(&self) -> &Name {
        &self.origin
    }

    /// Hands this transaction to the processor.
    pub async fn run(&mut self) -> Result<(), DomainError> {
        let processor = self.processor;
        let name = self.name.clone();
        let record_type = self.record_type;
        processor.process(&name, record_type, self).await
    }

    /// Copies the question into the response, at most once.
    pub fn append_question(&mut self) {
        if self.question_appended {
            return;
        }
        self.question_appended = true;

        let present = self
            .response
            .queries()
            .iter()
            .any(|q| q.name() == &self.question && q.query_type() == self.record_type);
        if !present {
            self.response
                .add_query(Query::query(self.question.clone(), self.record_type));
        }
    }

    pub fn respond(&mut self, rdata: RData) {
        self.respond_with(rdata, RespondOptions::default());
    }

    pub fn respond_with(&mut self, rdata: RData, options: RespondOptions) {
        self.append_question();

        let name = options.name.unwrap_or_else(|| self.question.clone());
        let ttl = options.ttl.unwrap_or(DEFAULT_TTL);
        self.push(Record::from_rdata(name, ttl, rdata), options.section);
    }

    /// Builds a record of the question type (or `options.record_type`) from text.
    pub fn respond_text(&mut self, text: &str, options: RespondOptions) -> Result<(), DomainError> {
        let record_type = options.record_type.unwrap_or(self.record_type);
        let rdata = rdata_from_text(record_type, text)?;
        self.respond_with(rdata, options);
        Ok(())
    }

    /// Adds prebuilt records as-is.
    pub fn add<I>(&mut self, records: I, section: Section)
    where
        I: IntoIterator<Item = Record>,
    {
        self.append_question();
        for record in records {
            self.push(record, section);
        }
    }

    pub fn fail(&mut self, rcode: ResponseCode) {
        self.append_question();
        self.response.set_response_code(rcode);
    }

    /// Like `fail`, with a symbolic or numeric RCODE.
    pub fn fail_with(&mut self, rcode: &str) -> Result<(), DomainError> {
        let rcode = parse_rcode(rcode)?;
        self.fail(rcode);
        Ok(())
    }

    /// Whether delegation is allowed without the client asking for recursion.
    fn may_delegate(&self, options: &PassthroughOptions) -> bool {
        self.query.recursion_desired() || options.force || options.name.is_some()
    }

    /// Sends the (possibly overridden) question upstream and returns the raw reply.
    pub async fn query_upstream(
        &self,
        upstream: &dyn UpstreamResolver,
        options: &PassthroughOptions,
    ) -> Result<Option<Message>, DomainError> {
        let name = options.name.clone().unwrap_or_else(|| self.question.clone());
        let record_type = options.record_type.unwrap_or(self.record_type);
        upstream.query(&name, record_type).await
    }

    pub async fn passthrough(&mut self, upstream: &dyn UpstreamResolver, options: PassthroughOptions) {
        self.passthrough_with(upstream, options, |_| {}).await;
    }

    /// Delegates to `upstream` and merges its reply into the response.
    ///
    /// `inspect` sees the raw upstream reply before the merge. Refused when the
    /// client did not ask for recursion, ServFail when nothing came back.
    pub async fn passthrough_with<F>(
        &mut self,
        upstream: &dyn UpstreamResolver,
        options: PassthroughOptions,
        inspect: F,
    ) where
        F: FnOnce(&Message) + Send,
    {
        if !self.may_delegate(&options) {
            debug!(id = self.query.id(), question = %self.question, "Recursion not desired, refusing");
            self.fail(ResponseCode::Refused);
            return;
        }

        let upstream_response = match self.query_upstream(upstream, &options).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    id = self.query.id(),
                    question = %self.question,
                    error = %e,
                    "Upstream query failed"
                );
                None
            }
        };

        match upstream_response {
            Some(message) => {
                inspect(&message);
                self.response.set_recursion_available(true);
                merge_message(self.response, message);
            }
            None => self.fail(ResponseCode::ServFail),
        }
    }

    /// Runs a nested transaction for another (origin-relative) name against
    /// the same response.
    pub async fn append(&mut self, name: Name, record_type: RecordType) -> Result<(), DomainError> {
        if self.depth >= MAX_APPEND_DEPTH {
            return Err(DomainError::ResolutionFailure(format!(
                "append chain exceeded {} levels at {}",
                MAX_APPEND_DEPTH, name
            )));
        }

        let mut nested = Transaction::new(
            self.processor,
            self.query,
            &mut *self.response,
            name,
            record_type,
            &self.origin,
        )?;
        nested.depth = self.depth + 1;
        nested.run().await
    }

    fn push(&mut self, record: Record, section: Section) {
        match section {
            Section::Answer => self.response.add_answer(record),
            Section::Authority => self.response.add_name_server(record),
            Section::Additional => self.response.add_additional(record),
        };
    }
}

fn parse_target(text: &str) -> Result<Name, DomainError> {
    let mut name = Name::from_str(text.trim())
        .map_err(|e| DomainError::InvalidRecordData(format!("{}: {}", text, e)))?;
    name.set_fqdn(true);
    Ok(name)
}

/// Builds record data of `record_type` from its presentation text.
pub fn rdata_from_text(record_type: RecordType, text: &str) -> Result<RData, DomainError> {
    let invalid = |e: &dyn std::fmt::Display| {
        DomainError::InvalidRecordData(format!("{} {}: {}", record_type, text, e))
    };

    let rdata = match record_type {
        RecordType::A => RData::A(A(text.trim().parse::<Ipv4Addr>().map_err(|e| invalid(&e))?)),
        RecordType::AAAA => {
            RData::AAAA(AAAA(text.trim().parse::<Ipv6Addr>().map_err(|e| invalid(&e))?))
        }
        RecordType::CNAME => RData::CNAME(CNAME(parse_target(text)?)),
        RecordType::NS => RData::NS(NS(parse_target(text)?)),
        RecordType::PTR => RData::PTR(PTR(parse_target(text)?)),
        RecordType::MX => {
            let (preference, exchange) = text
                .trim()
                .split_once(char::is_whitespace)
                .ok_or_else(|| invalid(&"expected \"preference exchange\""))?;
            let preference = preference.parse::<u16>().map_err(|e| invalid(&e))?;
            RData::MX(MX::new(preference, parse_target(exchange)?))
        }
        RecordType::TXT => RData::TXT(TXT::new(chunked(text, MAX_CHARACTER_STRING))),
        other => {
            return Err(DomainError::InvalidRecordData(format!(
                "cannot build {} records from text",
                other
            )))
        }
    };
    Ok(rdata)
}
