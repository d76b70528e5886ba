//! [`NetStack`] over an `embassy-net` stack.

use core::net::{IpAddr, Ipv4Addr};

use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_time::{Duration, with_timeout};
use heapless::Vec;

use crate::platform::{MAX_RESOLVED_ADDRESSES, NetStack, PlatformError};

const UDP_BUFFER_LEN: usize = 128;

/// A station's `embassy-net` stack, seen through [`NetStack`].
#[derive(Clone, Copy)]
pub struct EmbassyNetStack<'d>(pub Stack<'d>);

impl EmbassyNetStack<'_> {
    async fn query(
        &self,
        host: &str,
        kind: DnsQueryType,
        found: &mut Vec<IpAddr, MAX_RESOLVED_ADDRESSES>,
    ) {
        match self.0.dns_query(host, kind).await {
            Ok(addresses) => {
                for address in addresses {
                    if found.push(from_ip_address(address)).is_err() {
                        break;
                    }
                }
            }
            Err(err) => debug!("NetStack: dns query for {} failed: {:?}", host, err),
        }
    }
}

impl NetStack for EmbassyNetStack<'_> {
    async fn resolve(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr, MAX_RESOLVED_ADDRESSES>, PlatformError> {
        let mut found = Vec::new();
        self.query(host, DnsQueryType::A, &mut found).await;
        if found.is_empty() {
            self.query(host, DnsQueryType::Aaaa, &mut found).await;
        }
        if found.is_empty() {
            return Err(PlatformError::Lookup);
        }
        Ok(found)
    }

    fn default_gateway(&self) -> Option<Ipv4Addr> {
        self.0.config_v4().and_then(|config| config.gateway)
    }

    async fn udp_exchange(
        &self,
        server: IpAddr,
        port: u16,
        request: &[u8],
        response: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, PlatformError> {
        let mut rx_meta = [PacketMetadata::EMPTY; 1];
        let mut rx_buffer = [0; UDP_BUFFER_LEN];
        let mut tx_meta = [PacketMetadata::EMPTY; 1];
        let mut tx_buffer = [0; UDP_BUFFER_LEN];
        let mut socket = UdpSocket::new(
            self.0,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );

        socket.bind(0).map_err(|_| PlatformError::Io)?;
        socket
            .send_to(request, (to_ip_address(server), port))
            .await
            .map_err(|_| PlatformError::Io)?;

        let (len, _meta) = with_timeout(timeout, socket.recv_from(response))
            .await
            .map_err(|_| PlatformError::Timeout)?
            .map_err(|_| PlatformError::Io)?;
        Ok(len)
    }
}

const fn from_ip_address(address: IpAddress) -> IpAddr {
    match address {
        IpAddress::Ipv4(v4) => IpAddr::V4(v4),
        IpAddress::Ipv6(v6) => IpAddr::V6(v6),
    }
}

const fn to_ip_address(address: IpAddr) -> IpAddress {
    match address {
        IpAddr::V4(v4) => IpAddress::Ipv4(v4),
        IpAddr::V6(v6) => IpAddress::Ipv6(v6),
    }
}
