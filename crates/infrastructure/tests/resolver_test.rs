mod helpers;

use conduit_dns_domain::{DomainError, Endpoint, TransportKind};
use conduit_dns_infrastructure::dns::{Resolver, RetryPolicy};
use helpers::{a, aaaa, cname, query, responder, MockUpstream, Reply};
use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

fn resolver(endpoint: Endpoint) -> Resolver {
    Resolver::new(endpoint)
        .with_timeout(Duration::from_millis(300))
        .with_retry(RetryPolicy::once())
}

fn www() -> Vec<hickory_proto::rr::Record> {
    vec![a("www.example.com.", [192, 0, 2, 10])]
}

#[tokio::test]
async fn test_query_over_udp() {
    let upstream = MockUpstream::zone(www()).await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let response = resolver
        .query(&Name::from_str("www.example.com.").unwrap(), RecordType::A)
        .await
        .unwrap()
        .expect("response");

    assert_eq!(response.message_type(), MessageType::Response);
    assert_eq!(response.answers().len(), 1);
    assert_eq!(upstream.queries()[0].2, TransportKind::Datagram);
}

#[tokio::test]
async fn test_query_over_tcp() {
    let upstream = MockUpstream::zone(www()).await;
    let resolver = resolver(Endpoint::new(vec![upstream.tcp_endpoint()]));

    let response = resolver
        .query(&Name::from_str("www.example.com.").unwrap(), RecordType::A)
        .await
        .unwrap()
        .expect("response");

    assert_eq!(response.answers().len(), 1);
    assert_eq!(upstream.queries()[0].2, TransportKind::Stream);
}

#[tokio::test]
async fn test_falls_back_past_undecodable_server() {
    let broken = MockUpstream::garbage().await;
    let good = MockUpstream::zone(www()).await;
    let resolver = resolver(Endpoint::new(vec![
        broken.udp_endpoint(),
        good.udp_endpoint(),
    ]));

    let response = resolver
        .query(&Name::from_str("www.example.com.").unwrap(), RecordType::A)
        .await
        .unwrap()
        .expect("response from second server");

    assert_eq!(response.answers().len(), 1);
    assert_eq!(broken.total(), 1);
    assert_eq!(good.total(), 1);
}

#[tokio::test]
async fn test_falls_back_past_silent_server() {
    let silent = MockUpstream::silent().await;
    let good = MockUpstream::zone(www()).await;
    let resolver = resolver(Endpoint::new(vec![
        silent.udp_endpoint(),
        good.tcp_endpoint(),
    ]));

    let response = resolver
        .query(&Name::from_str("www.example.com.").unwrap(), RecordType::A)
        .await
        .unwrap();

    assert!(response.is_some());
}

#[tokio::test]
async fn test_all_servers_failing_returns_last_error() {
    let silent = MockUpstream::silent().await;
    let broken = MockUpstream::garbage().await;
    let resolver = resolver(Endpoint::new(vec![
        silent.udp_endpoint(),
        broken.udp_endpoint(),
    ]));

    let result = resolver
        .query(&Name::from_str("www.example.com.").unwrap(), RecordType::A)
        .await;

    assert!(matches!(result, Err(DomainError::Decode(_))));
}

#[tokio::test]
async fn test_timeout_is_a_transport_error() {
    let silent = MockUpstream::silent().await;
    let resolver = resolver(Endpoint::new(vec![silent.udp_endpoint()]));

    let err = resolver
        .query(&Name::from_str("www.example.com.").unwrap(), RecordType::A)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::TransportTimeout { .. }));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_mismatched_id_is_no_response() {
    let upstream = MockUpstream::wrong_id(www()).await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let response = resolver
        .query(&Name::from_str("www.example.com.").unwrap(), RecordType::A)
        .await
        .unwrap();

    assert!(response.is_none());
}

#[tokio::test]
async fn test_truncated_udp_moves_on_to_tcp() {
    let upstream = MockUpstream::truncating_udp(www()).await;
    let resolver = resolver(upstream.endpoint());

    let response = resolver
        .query(&Name::from_str("www.example.com.").unwrap(), RecordType::A)
        .await
        .unwrap()
        .expect("tcp response");

    assert!(!response.truncated());
    assert_eq!(response.answers().len(), 1);
    let kinds: Vec<TransportKind> = upstream.queries().iter().map(|q| q.2).collect();
    assert_eq!(kinds, vec![TransportKind::Datagram, TransportKind::Stream]);
}

#[tokio::test]
async fn test_truncated_only_server_is_no_response() {
    let upstream = MockUpstream::truncating_udp(www()).await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let response = resolver
        .query(&Name::from_str("www.example.com.").unwrap(), RecordType::A)
        .await
        .unwrap();

    assert!(response.is_none());
}

#[tokio::test]
async fn test_empty_endpoint_list_is_no_response() {
    let resolver = resolver(Endpoint::default());

    let mut message = query(1, "www.example.com.", RecordType::A);
    message.set_recursion_desired(true);
    let response = resolver.dispatch_request(&message).await.unwrap();

    assert!(response.is_none());
}

#[tokio::test]
async fn test_addresses_for_direct_answer() {
    let upstream = MockUpstream::zone(vec![
        a("www.example.com.", [192, 0, 2, 10]),
        aaaa("www.example.com.", "2001:db8::10"),
    ])
    .await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let addresses = resolver.addresses_for("www.example.com.").await.unwrap();

    assert_eq!(
        addresses,
        vec![
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)),
            IpAddr::from_str("2001:db8::10").unwrap(),
        ]
    );
}

#[tokio::test]
async fn test_addresses_for_follows_alias() {
    let upstream = MockUpstream::zone(vec![
        cname("alias.example.com.", "target.example.com."),
        a("target.example.com.", [192, 0, 2, 20]),
    ])
    .await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let addresses = resolver
        .addresses_for_types("alias.example.com.", &[RecordType::A])
        .await
        .unwrap();

    assert_eq!(addresses, vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 20))]);
    assert_eq!(upstream.count("alias.example.com.", RecordType::A), 1);
    assert_eq!(upstream.count("target.example.com.", RecordType::A), 1);
}

#[tokio::test]
async fn test_alias_target_seen_twice_is_fetched_once_per_type() {
    let upstream = MockUpstream::zone(vec![
        cname("alias.example.com.", "target.example.com."),
        a("target.example.com.", [192, 0, 2, 20]),
        aaaa("target.example.com.", "2001:db8::20"),
    ])
    .await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let addresses = resolver.addresses_for("alias.example.com.").await.unwrap();

    assert_eq!(addresses.len(), 2);
    assert_eq!(upstream.count("alias.example.com.", RecordType::A), 1);
    assert_eq!(upstream.count("alias.example.com.", RecordType::AAAA), 1);
    assert_eq!(upstream.count("target.example.com.", RecordType::A), 1);
    assert_eq!(upstream.count("target.example.com.", RecordType::AAAA), 1);
    assert_eq!(upstream.total(), 4);
}

#[tokio::test]
async fn test_alias_chain_in_one_answer_needs_one_round_trip() {
    let upstream = MockUpstream::start(responder(|query, _| {
        let mut response = Message::new();
        response.set_id(query.id());
        response.set_message_type(MessageType::Response);
        response.add_queries(query.queries().to_vec());
        response.add_answer(cname("alias.example.com.", "target.example.com."));
        response.add_answer(a("target.example.com.", [192, 0, 2, 30]));
        Reply::Message(response)
    }))
    .await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let addresses = resolver
        .addresses_for_types("alias.example.com.", &[RecordType::A])
        .await
        .unwrap();

    assert_eq!(addresses, vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 30))]);
    assert_eq!(upstream.total(), 1);
}

#[tokio::test]
async fn test_alias_loop_is_bounded() {
    let upstream = MockUpstream::zone(vec![
        cname("ping.example.com.", "pong.example.com."),
        cname("pong.example.com.", "ping.example.com."),
    ])
    .await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let err = resolver
        .addresses_for_types("ping.example.com.", &[RecordType::A])
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::ResolutionFailure(_)));
}

#[tokio::test]
async fn test_unknown_name_is_resolution_failure() {
    let upstream = MockUpstream::zone(www()).await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let err = resolver
        .addresses_for("missing.example.com.")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::ResolutionFailure(_)));
    assert_eq!(upstream.count("missing.example.com.", RecordType::A), 1);
}

#[tokio::test]
async fn test_no_response_is_retried() {
    let silent = MockUpstream::silent().await;
    let resolver = Resolver::new(Endpoint::new(vec![silent.udp_endpoint()]))
        .with_timeout(Duration::from_millis(100))
        .with_retry(RetryPolicy::new(3, Duration::from_millis(5)));

    let err = resolver
        .addresses_for_types("www.example.com.", &[RecordType::A])
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::ResolutionFailure(_)));
    assert_eq!(silent.count("www.example.com.", RecordType::A), 3);
}

#[tokio::test]
async fn test_relative_name_uses_search_list() {
    let upstream = MockUpstream::zone(vec![a("db.internal.test.", [10, 0, 0, 5])]).await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]))
        .with_search(vec![Name::from_str("internal.test.").unwrap()]);

    let addresses = resolver
        .addresses_for_types("db", &[RecordType::A])
        .await
        .unwrap();

    assert_eq!(addresses, vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))]);
    let first = &upstream.queries()[0];
    assert_eq!(first.0, Name::from_str("db.internal.test.").unwrap());
}

#[tokio::test]
async fn test_upstream_answer_passes_through_records() {
    let upstream = MockUpstream::zone(www()).await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let response = resolver
        .query(&Name::from_str("www.example.com").unwrap(), RecordType::A)
        .await
        .unwrap()
        .unwrap();

    match response.answers()[0].data() {
        Some(RData::A(addr)) => assert_eq!(addr.0, Ipv4Addr::new(192, 0, 2, 10)),
        other => panic!("expected A record, got {:?}", other),
    }
}

#[tokio::test]
async fn test_zero_ttl_answer_is_used() {
    let zero = Record::from_rdata(
        Name::from_str("zero.example.com.").unwrap(),
        0,
        RData::A(A(Ipv4Addr::new(192, 0, 2, 9))),
    );
    let upstream = MockUpstream::zone(vec![zero]).await;
    let resolver = resolver(Endpoint::new(vec![upstream.udp_endpoint()]));

    let addresses = resolver
        .addresses_for_types("zero.example.com.", &[RecordType::A])
        .await
        .unwrap();

    assert_eq!(addresses, vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9))]);
    assert_eq!(upstream.total(), 1);
}
