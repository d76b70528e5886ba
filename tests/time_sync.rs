#![allow(missing_docs)]
//! SNTP packet handling and retries.

mod common;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use common::MockNet;
use embassy_futures::block_on;
use embassy_time::Duration;
use link_envoy::platform::PlatformError;
use link_envoy::time_sync::{
    NTP_PORT, SNTP_PACKET_LEN, SntpConfig, SntpReject, UnixSeconds, parse_sntp_response,
    sntp_request, sync_time,
};
use link_envoy::Error;

const NTP_SERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(162, 159, 200, 1));
const NTP_SERVER_V6: IpAddr = IpAddr::V6(Ipv6Addr::new(0x2606, 0x4700, 0xf1, 0, 0, 0, 0, 1));
// 2023-11-14T22:13:20Z
const UNIX_2023: i64 = 1_700_000_000;
const NTP_2023: u32 = 3_908_988_800;

fn server_reply(mode: u8, stratum: u8, ntp_seconds: u32) -> Vec<u8> {
    let mut reply = vec![0u8; SNTP_PACKET_LEN];
    reply[0] = 0x18 | mode;
    reply[1] = stratum;
    reply[40..44].copy_from_slice(&ntp_seconds.to_be_bytes());
    reply
}

fn quick() -> SntpConfig {
    SntpConfig {
        attempts: 3,
        timeout: Duration::from_millis(10),
        retry_delay: Duration::from_millis(1),
    }
}

#[test]
fn request_is_a_version_3_client_packet() {
    let request = sntp_request();
    assert_eq!(request.len(), 48);
    assert_eq!(request[0], 0x1B);
    assert!(request[1..].iter().all(|byte| *byte == 0));
}

#[test]
fn parses_transmit_timestamp() {
    let unix = parse_sntp_response(&server_reply(4, 2, NTP_2023)).expect("valid reply");
    assert_eq!(unix, UnixSeconds(UNIX_2023));

    let date_time = unix.to_offset_date_time().expect("in range");
    assert_eq!(date_time.year(), 2023);
    assert_eq!(u8::from(date_time.month()), 11);
    assert_eq!(date_time.day(), 14);
}

#[test]
fn rejects_bad_replies() {
    assert_eq!(
        parse_sntp_response(&server_reply(4, 2, NTP_2023)[..47]),
        Err(SntpReject::Truncated)
    );
    assert_eq!(
        parse_sntp_response(&server_reply(3, 2, NTP_2023)),
        Err(SntpReject::NotServer)
    );
    assert_eq!(
        parse_sntp_response(&server_reply(4, 0, NTP_2023)),
        Err(SntpReject::KissOfDeath)
    );
    assert_eq!(
        parse_sntp_response(&server_reply(4, 2, 0)),
        Err(SntpReject::NoTimestamp)
    );
    assert!(parse_sntp_response(&server_reply(5, 1, NTP_2023)).is_ok());
}

#[test]
fn retries_until_a_good_reply() {
    let net = MockNet::with_answers(&[NTP_SERVER]);
    net.udp_replies.borrow_mut().extend([
        Err(PlatformError::Timeout),
        Ok(server_reply(4, 0, NTP_2023)),
        Ok(server_reply(4, 2, NTP_2023)),
    ]);

    let unix = block_on(sync_time(&net, "pool.ntp.org", &quick()));

    assert_eq!(unix, Ok(UnixSeconds(UNIX_2023)));
    let exchanges = net.exchanges.borrow();
    assert_eq!(exchanges.len(), 3);
    assert!(exchanges.iter().all(|(server, port, request)| {
        *server == NTP_SERVER && *port == NTP_PORT && request.as_slice() == sntp_request()
    }));
}

#[test]
fn lookup_prefers_ipv4_server_address() {
    let net = MockNet::with_answers(&[NTP_SERVER_V6, NTP_SERVER]);
    net.udp_replies
        .borrow_mut()
        .push_back(Ok(server_reply(4, 2, NTP_2023)));

    let result = block_on(sync_time(&net, "time.cloudflare.com", &quick()));

    assert_eq!(result, Ok(UnixSeconds(UNIX_2023)));
    assert_eq!(net.exchanges.borrow()[0].0, NTP_SERVER);
}

#[test]
fn gives_up_after_configured_attempts() {
    let net = MockNet::with_answers(&[NTP_SERVER]);

    let result = block_on(sync_time(&net, "pool.ntp.org", &quick()));

    assert_eq!(result, Err(Error::TimeSync));
    assert_eq!(net.exchanges.borrow().len(), 3);
}

#[test]
fn unresolvable_server() {
    let net = MockNet::default();

    let result = block_on(sync_time(&net, "pool.ntp.org", &quick()));

    assert_eq!(result, Err(Error::Resolution));
    assert!(net.exchanges.borrow().is_empty());
}

#[test]
fn literal_server_address_skips_lookup() {
    let net = MockNet::default();
    net.udp_replies
        .borrow_mut()
        .push_back(Ok(server_reply(4, 3, NTP_2023)));

    let result = block_on(sync_time(&net, "162.159.200.1", &quick()));

    assert_eq!(result, Ok(UnixSeconds(UNIX_2023)));
    assert!(net.lookups().is_empty());
}
