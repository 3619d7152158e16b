//! The responder loop: binds the mDNS multicast socket, decodes
//! incoming queries, and answers them from the registry.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use mdns_proto::protocol::types::Message;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::registry::Handle;

/// The mDNS multicast group (RFC 6762 section 3).
pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// The mDNS port (RFC 6762 section 3).
pub const MULTICAST_PORT: u16 = 5353;

/// Largest datagram this responder expects to receive. mDNS messages
/// are not expected to exceed the link MTU; this is a generous margin
/// above any message this responder itself constructs.
const MAX_DATAGRAM_LEN: usize = 9000;

/// Binds the mDNS multicast socket with `SO_REUSEADDR` set before
/// bind, so multiple responders can share the port on one host (RFC
/// 6762 section 15.1), then joins the multicast group.
pub fn bind() -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MULTICAST_PORT);
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    let tokio_socket = UdpSocket::from_std(std_socket)?;
    tokio_socket.join_multicast_v4(MULTICAST_ADDR, Ipv4Addr::UNSPECIFIED)?;
    Ok(tokio_socket)
}

/// Runs the receive loop until a shutdown signal arrives, then asks
/// the registry to send goodbyes and stop.
///
/// # Errors
///
/// If the socket cannot be read from (a condition this loop cannot
/// recover from, unlike a single malformed datagram, which is simply
/// discarded).
pub async fn run(socket: Arc<UdpSocket>, registry: Handle) -> std::io::Result<()> {
    let multicast_addr = SocketAddr::from((MULTICAST_ADDR, MULTICAST_PORT));
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (len, peer) = result?;
                handle_datagram(&socket, multicast_addr, &registry, &buf[..len], peer).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received interrupt, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                break;
            }
        }
    }

    registry.stop().await;
    Ok(())
}

async fn handle_datagram(
    socket: &UdpSocket,
    multicast_addr: SocketAddr,
    registry: &Handle,
    datagram: &[u8],
    peer: SocketAddr,
) {
    let message = match Message::from_octets(datagram) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(%peer, error = %e, "discarding unparsable datagram");
            return;
        }
    };

    if !message.is_dispatchable_query() {
        return;
    }

    let mut answered: Vec<Arc<Message>> = Vec::new();
    for question in &message.questions {
        let name = question.name.to_dotted_string();
        let Some(response) = registry.lookup(&name).await else {
            continue;
        };

        if answered.iter().any(|a| Arc::ptr_eq(a, &response)) {
            continue;
        }
        answered.push(response.clone());

        if let Err(e) = transmit(socket, multicast_addr, &response).await {
            tracing::warn!(error = %e, "failed to send mDNS response");
        }
    }
}

async fn transmit(
    socket: &UdpSocket,
    multicast_addr: SocketAddr,
    message: &Message,
) -> std::io::Result<()> {
    let octets = message
        .to_octets()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    socket.send_to(&octets, multicast_addr).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mdns_proto::protocol::types::{
        DomainName, Header, Opcode, QueryClass, QueryType, RecordClass, RecordTypeWithData, Rcode,
        Question,
    };

    use crate::descriptor::ServiceDescriptor;
    use crate::registry;

    fn query_for(name: &str, qtype: QueryType) -> Message {
        Message {
            header: Header {
                id: 1,
                is_response: false,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                rcode: Rcode::NoError,
            },
            questions: vec![Question {
                name: DomainName::from_dotted_string(name).unwrap(),
                qtype,
                qclass: QueryClass::Record(RecordClass::IN),
                unicast_response: false,
            }],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// A query for an advertised name yields exactly one outbound
    /// response carrying that service's answer set, QR set.
    #[tokio::test]
    async fn query_for_registered_name_yields_single_response() {
        let outbound_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener_addr = listener.local_addr().unwrap();

        let handle = registry::spawn(Arc::clone(&outbound_socket), listener_addr);
        handle
            .register(ServiceDescriptor {
                instance_name: "s1".to_string(),
                host_name: "localhost".to_string(),
                service_type: "_mdnstest._tcp".to_string(),
                domain: "local".to_string(),
                port: 7623,
                txt_entries: Vec::new(),
            })
            .await
            .unwrap();

        // drain the two announcement datagrams
        let mut buf = [0u8; 2048];
        listener.recv_from(&mut buf).await.unwrap();
        listener.recv_from(&mut buf).await.unwrap();

        let query = query_for(
            "_mdnstest._tcp.local",
            QueryType::Record(mdns_proto::protocol::types::RecordType::PTR),
        );
        let encoded = query.to_octets().unwrap();
        let inbound_source = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = inbound_source.local_addr().unwrap();

        handle_datagram(&outbound_socket, listener_addr, &handle, &encoded, peer).await;

        let (len, _) = tokio::time::timeout(Duration::from_millis(200), listener.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let response = Message::from_octets(&buf[..len]).unwrap();

        assert!(response.header.is_response);
        assert!(response.header.is_authoritative);
        assert_eq!(4, response.answers.len());
        assert!(response.answers.iter().any(|rr| matches!(
            &rr.rtype_with_data,
            RecordTypeWithData::PTR { ptrdname } if ptrdname.to_dotted_string() == "s1._mdnstest._tcp.local"
        )));

        // exactly one response for this single question
        let extra = tokio::time::timeout(Duration::from_millis(50), listener.recv_from(&mut buf)).await;
        assert!(extra.is_err());
    }

    /// A query that names nothing this responder advertises produces
    /// no outbound datagram at all.
    #[tokio::test]
    async fn query_for_unregistered_name_yields_no_response() {
        let outbound_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener_addr = listener.local_addr().unwrap();

        let handle = registry::spawn(Arc::clone(&outbound_socket), listener_addr);

        let query = query_for(
            "nothing.registered.local",
            QueryType::Record(mdns_proto::protocol::types::RecordType::PTR),
        );
        let encoded = query.to_octets().unwrap();
        let inbound_source = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = inbound_source.local_addr().unwrap();

        handle_datagram(&outbound_socket, listener_addr, &handle, &encoded, peer).await;

        let mut buf = [0u8; 2048];
        let result = tokio::time::timeout(Duration::from_millis(50), listener.recv_from(&mut buf)).await;
        assert!(result.is_err());
    }

    /// A response datagram (QR=1) is never dispatched against the
    /// registry, even if it happens to carry questions.
    #[tokio::test]
    async fn response_datagrams_are_never_dispatched() {
        let outbound_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener_addr = listener.local_addr().unwrap();

        let handle = registry::spawn(Arc::clone(&outbound_socket), listener_addr);
        let mut response = query_for(
            "_mdnstest._tcp.local",
            QueryType::Record(mdns_proto::protocol::types::RecordType::PTR),
        );
        response.header.is_response = true;
        let encoded = response.to_octets().unwrap();
        let inbound_source = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = inbound_source.local_addr().unwrap();

        handle_datagram(&outbound_socket, listener_addr, &handle, &encoded, peer).await;

        let mut buf = [0u8; 2048];
        let result = tokio::time::timeout(Duration::from_millis(50), listener.recv_from(&mut buf)).await;
        assert!(result.is_err());
    }
}
