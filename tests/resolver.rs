//! End-to-end coverage of the resolver pipeline against in-process mock
//! nameservers — no real network traffic.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use dnsflow::codec::{decode_message, encode_message};
use dnsflow::config::{Nameserver, Transport};
use dnsflow::hosts::HostsFile;
use dnsflow::message::{Message, Query, RData, Record, RecordClass, RecordType, ResponseCode};
use dnsflow::Resolver;
use tokio::net::UdpSocket;

/// Spawns a UDP nameserver that answers every query with `respond`.
async fn mock_udp_server(respond: impl Fn(Message) -> Message + Send + Sync + 'static) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let respond = Arc::new(respond);
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((n, peer)) = socket.recv_from(&mut buf).await else { break };
            let Ok(request) = decode_message(&buf[..n]) else { continue };
            let response = respond(request);
            let Ok(bytes) = encode_message(&response) else { continue };
            let _ = socket.send_to(&bytes, peer).await;
        }
    });
    addr
}

fn a_response(request: Message, addr: Ipv4Addr) -> Message {
    let mut response = request.clone();
    response.is_response = true;
    response.recursion_available = true;
    let name = request.questions[0].name.clone();
    response.answers.push(Record::new(name, RecordClass::Internet, 300, RData::A(addr)));
    response
}

#[tokio::test]
async fn resolves_a_record_from_mock_nameserver() {
    let addr = mock_udp_server(move |req| a_response(req, Ipv4Addr::new(93, 184, 216, 34))).await;
    let resolver = Resolver::builder(vec![Nameserver { addr, transport: Transport::Udp }])
        .build()
        .unwrap();

    let resolved = resolver.resolve("example.com").await.unwrap();
    assert_eq!(resolved, Ipv4Addr::new(93, 184, 216, 34));
}

#[tokio::test]
async fn nxdomain_surfaces_as_record_not_found() {
    let addr = mock_udp_server(|req| {
        let mut response = req;
        response.is_response = true;
        response.response_code = ResponseCode::NameError;
        response
    })
    .await;
    let resolver = Resolver::builder(vec![Nameserver { addr, transport: Transport::Udp }])
        .build()
        .unwrap();

    let err = resolver.resolve("nonexistent.example.com").await.unwrap_err();
    assert!(matches!(err, dnsflow::DnsError::RecordNotFound { .. }));
}

#[tokio::test]
async fn follows_cname_chain_to_final_address() {
    let addr = mock_udp_server(|req| {
        let mut response = req.clone();
        response.is_response = true;
        let name = req.questions[0].name.clone();
        if name == "www.example.com" {
            response.answers.push(Record::new(
                name,
                RecordClass::Internet,
                300,
                RData::Cname("edge.example.com".into()),
            ));
        } else {
            response
                .answers
                .push(Record::new(name, RecordClass::Internet, 300, RData::A(Ipv4Addr::new(10, 1, 2, 3))));
        }
        response
    })
    .await;
    let resolver = Resolver::builder(vec![Nameserver { addr, transport: Transport::Udp }])
        .build()
        .unwrap();

    let resolved = resolver.resolve("www.example.com").await.unwrap();
    assert_eq!(resolved, Ipv4Addr::new(10, 1, 2, 3));
}

#[tokio::test]
async fn second_nameserver_is_used_when_first_is_unreachable() {
    // An address nobody is listening on: connect/recv will fail quickly.
    let dead = "127.0.0.1:1".parse().unwrap();
    let alive = mock_udp_server(move |req| a_response(req, Ipv4Addr::new(4, 4, 4, 4))).await;

    let resolver = Resolver::builder(vec![
        Nameserver { addr: dead, transport: Transport::Udp },
        Nameserver { addr: alive, transport: Transport::Udp },
    ])
    .build()
    .unwrap();

    let resolved = resolver.resolve("example.com").await.unwrap();
    assert_eq!(resolved, Ipv4Addr::new(4, 4, 4, 4));
}

#[tokio::test]
async fn hosts_file_entry_bypasses_the_network() {
    let resolver = Resolver::builder(vec![Nameserver {
        addr: "127.0.0.1:1".parse().unwrap(),
        transport: Transport::Udp,
    }])
    .hosts_file(HostsFile::parse("10.20.30.40 pinned.internal\n"))
    .build()
    .unwrap();

    let resolved = resolver.resolve("pinned.internal").await.unwrap();
    assert_eq!(resolved, Ipv4Addr::new(10, 20, 30, 40));
}

#[tokio::test]
async fn repeated_queries_are_served_from_cache() {
    let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let hits_clone = hits.clone();
    let addr = mock_udp_server(move |req| {
        hits_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        a_response(req, Ipv4Addr::new(1, 1, 1, 1))
    })
    .await;
    let resolver = Resolver::builder(vec![Nameserver { addr, transport: Transport::Udp }])
        .build()
        .unwrap();

    resolver.resolve("cached.example.com").await.unwrap();
    resolver.resolve("cached.example.com").await.unwrap();

    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn resolve_all_returns_every_matching_record() {
    let addr = mock_udp_server(|req| {
        let mut response = req.clone();
        response.is_response = true;
        let name = req.questions[0].name.clone();
        for octet in [1u8, 2] {
            response.answers.push(Record::new(
                name.clone(),
                RecordClass::Internet,
                300,
                RData::A(Ipv4Addr::new(192, 0, 2, octet)),
            ));
        }
        response
    })
    .await;
    let resolver = Resolver::builder(vec![Nameserver { addr, transport: Transport::Udp }])
        .build()
        .unwrap();

    let records = resolver.resolve_all("multi.example.com", RecordType::A).await.unwrap();
    assert_eq!(records.len(), 2);
}
