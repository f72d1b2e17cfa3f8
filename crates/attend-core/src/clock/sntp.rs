//! Minimal SNTP (RFC 4330) client: one request, one reply, transmit time only.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;

pub const NTP_PORT: u16 = 123;

const PACKET_LEN: usize = 48;

/// LI = 0, VN = 3, Mode = 3 (client)
const CLIENT_HEADER: u8 = 0x1B;

const MODE_SERVER: u8 = 4;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// Length of one NTP era in seconds.
const ERA_SECONDS: i64 = 1 << 32;

#[derive(Error, Debug)]
pub enum NtpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no address for {0}")]
    NoAddress(String),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("malformed reply: {0}")]
    Malformed(&'static str),

    #[error("server sent kiss-o'-death {0:?}")]
    KissOfDeath(String),
}

/// One NTP query against one server.
#[async_trait]
pub trait NtpTransport: Send + Sync {
    async fn query(&self, server: &str) -> Result<DateTime<Utc>, NtpError>;
}

pub fn encode_request() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = CLIENT_HEADER;
    packet
}

/// Extract the server's transmit timestamp from a reply.
pub fn decode_reply(packet: &[u8]) -> Result<DateTime<Utc>, NtpError> {
    if packet.len() < PACKET_LEN {
        return Err(NtpError::Malformed("short packet"));
    }
    if packet[0] & 0x07 != MODE_SERVER {
        return Err(NtpError::Malformed("not a server reply"));
    }
    if packet[1] == 0 {
        let code = String::from_utf8_lossy(&packet[12..16]).trim_end_matches('\0').to_string();
        return Err(NtpError::KissOfDeath(code));
    }

    let seconds = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]);
    let fraction = u32::from_be_bytes([packet[44], packet[45], packet[46], packet[47]]);
    if seconds == 0 && fraction == 0 {
        return Err(NtpError::Malformed("zero transmit timestamp"));
    }

    // Era 1 starts in 2036, when the seconds field wraps and its top bit clears.
    let mut seconds = i64::from(seconds);
    if seconds & 0x8000_0000 == 0 {
        seconds += ERA_SECONDS;
    }

    #[allow(clippy::cast_possible_truncation)]
    let nanos = ((u64::from(fraction) * 1_000_000_000) >> 32) as u32;
    DateTime::from_timestamp(seconds - NTP_UNIX_OFFSET, nanos)
        .ok_or(NtpError::Malformed("timestamp out of range"))
}

/// UDP SNTP transport.
#[derive(Debug, Clone)]
pub struct SntpClient {
    timeout: Duration,
    port: u16,
}

impl SntpClient {
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            port: NTP_PORT,
        }
    }

    /// Query a non-standard port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn exchange(&self, server: &str) -> Result<DateTime<Utc>, NtpError> {
        let addr = lookup_host((server, self.port))
            .await?
            .next()
            .ok_or_else(|| NtpError::NoAddress(server.to_string()))?;

        let bind = if addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(addr).await?;
        socket.send(&encode_request()).await?;

        let mut buf = [0u8; 512];
        let len = socket.recv(&mut buf).await?;
        decode_reply(&buf[..len])
    }
}

#[async_trait]
impl NtpTransport for SntpClient {
    async fn query(&self, server: &str) -> Result<DateTime<Utc>, NtpError> {
        timeout(self.timeout, self.exchange(server))
            .await
            .map_err(|_| NtpError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Build a server reply carrying `time` as its transmit timestamp.
    pub fn reply_for(time: DateTime<Utc>) -> [u8; PACKET_LEN] {
        let mut packet = [0u8; PACKET_LEN];
        packet[0] = 0x1C; // VN = 3, Mode = 4
        packet[1] = 2;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let seconds = ((time.timestamp() + NTP_UNIX_OFFSET) % ERA_SECONDS) as u32;
        let fraction = ((u64::from(time.timestamp_subsec_nanos()) << 32) / 1_000_000_000) as u32;
        packet[40..44].copy_from_slice(&seconds.to_be_bytes());
        packet[44..48].copy_from_slice(&fraction.to_be_bytes());
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::testing::reply_for;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn request_header_is_client_v3() {
        let packet = encode_request();
        assert_eq!(packet.len(), 48);
        assert_eq!(packet[0], 0x1B);
        assert!(packet[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn decodes_transmit_timestamp() {
        let time = Utc.with_ymd_and_hms(2024, 5, 6, 8, 30, 15).unwrap();
        assert_eq!(decode_reply(&reply_for(time)).unwrap(), time);
    }

    #[test]
    fn decodes_timestamps_after_the_2036_wrap() {
        let time = Utc.with_ymd_and_hms(2040, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(decode_reply(&reply_for(time)).unwrap(), time);
    }

    #[test]
    fn rejects_bad_replies() {
        assert!(matches!(
            decode_reply(&[0u8; 12]),
            Err(NtpError::Malformed(_))
        ));

        let mut client_mode = reply_for(Utc::now());
        client_mode[0] = 0x1B;
        assert!(matches!(
            decode_reply(&client_mode),
            Err(NtpError::Malformed(_))
        ));

        let mut kiss = reply_for(Utc::now());
        kiss[1] = 0;
        kiss[12..16].copy_from_slice(b"RATE");
        match decode_reply(&kiss) {
            Err(NtpError::KissOfDeath(code)) => assert_eq!(code, "RATE"),
            other => panic!("expected kiss-o'-death, got {other:?}"),
        }

        let mut empty = reply_for(Utc::now());
        empty[40..48].fill(0);
        assert!(matches!(decode_reply(&empty), Err(NtpError::Malformed(_))));
    }

    #[tokio::test]
    async fn queries_a_local_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let time = Utc.with_ymd_and_hms(2024, 5, 6, 8, 30, 15).unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 48];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(buf[0], 0x1B);
            server.send_to(&reply_for(time), peer).await.unwrap();
        });

        let client = SntpClient::new(Duration::from_secs(2)).with_port(port);
        assert_eq!(client.query("127.0.0.1").await.unwrap(), time);
    }

    #[tokio::test]
    async fn times_out_when_the_server_is_silent() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let client = SntpClient::new(Duration::from_millis(200)).with_port(port);
        let err = client.query("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, NtpError::Timeout(_)));
        drop(server);
    }
}
