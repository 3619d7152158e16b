//! A service descriptor and the construction of its canonical answer
//! message (see the registry design notes for why this is built once
//! and cached rather than reconstructed per query).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use mdns_proto::protocol::types::{
    DomainName, Header, Message, RecordClass, RecordTypeWithData, ResourceRecord,
};
use tokio::net::lookup_host;

/// TTL, in seconds, for TXT and PTR records (RFC 6762 section 10: the
/// "long" TTL used for records that rarely change).
pub const TTL_LONG: u32 = 4500;

/// TTL, in seconds, for SRV, A, and AAAA records (the "short" TTL for
/// records more likely to change as a host moves between networks).
pub const TTL_SHORT: u32 = 120;

/// The DNS-SD enumeration name, used by clients browsing for every
/// service type advertised on the link (RFC 6763 section 9).
pub const ENUMERATION_NAME: &str = "_services._dns-sd._udp.local";

/// What the host program wants advertised: one instance of one
/// service type, reachable at one host and port.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// The user-visible instance label, e.g. `service1`.
    pub instance_name: String,
    /// The local hostname used to resolve A/AAAA records, e.g. `myhost`.
    pub host_name: String,
    /// e.g. `_mdnstest._tcp`.
    pub service_type: String,
    /// Typically `local`.
    pub domain: String,
    pub port: u16,
    /// Ordered `(key, value)` pairs to advertise in the TXT record.
    pub txt_entries: Vec<(String, String)>,
}

impl ServiceDescriptor {
    /// `instance_name.service_type.domain`, e.g.
    /// `service1._mdnstest._tcp.local`.
    pub fn instance_fqdn(&self) -> String {
        format!(
            "{}.{}.{}",
            self.instance_name, self.service_type, self.domain
        )
    }

    /// `service_type.domain`, e.g. `_mdnstest._tcp.local`.
    pub fn service_fqdn(&self) -> String {
        format!("{}.{}", self.service_type, self.domain)
    }

    /// The fully-qualified host name, e.g. `myhost.local`. Callers are
    /// expected to supply `host_name` already qualified; unlike
    /// `instance_fqdn`/`service_fqdn` it is not combined with `domain`
    /// (the host program names it directly as `host_name` in the SRV
    /// target and A/AAAA owner name).
    pub fn host_fqdn(&self) -> &str {
        &self.host_name
    }

    /// The DNS-SD enumeration name. This is the same for every
    /// descriptor (it is a fixed, well-known name), but is exposed
    /// here as a method so callers never have to hardcode it.
    pub fn enumeration_fqdn(&self) -> String {
        ENUMERATION_NAME.to_string()
    }

    /// Every name this descriptor should answer queries for.
    pub fn answerable_names(&self) -> [String; 4] {
        [
            self.instance_fqdn(),
            self.service_fqdn(),
            self.enumeration_fqdn(),
            self.host_fqdn().to_string(),
        ]
    }

    /// Resolves `host_name` and builds the canonical response message
    /// for this descriptor: TXT + enumeration PTR + service PTR + SRV
    /// in the answers section, A + AAAA in additionals.
    ///
    /// # Errors
    ///
    /// [`BuildError::HostAddressUnresolved`] if the host OS resolver
    /// cannot produce both an IPv4 and an IPv6 address for
    /// `host_name`.
    pub async fn build_response_message(&self) -> Result<Message, BuildError> {
        let (v4, v6) = resolve_host_addresses(&self.host_name).await?;

        let instance_fqdn = name(&self.instance_fqdn())?;
        let service_fqdn = name(&self.service_fqdn())?;
        let enumeration_fqdn = name(&self.enumeration_fqdn())?;
        let host_fqdn = name(self.host_fqdn())?;

        let txt_entries = self
            .txt_entries
            .iter()
            .map(|(k, v)| {
                (
                    bytes::Bytes::copy_from_slice(k.as_bytes()),
                    bytes::Bytes::copy_from_slice(v.as_bytes()),
                )
            })
            .collect();

        let answers = vec![
            ResourceRecord {
                name: instance_fqdn.clone(),
                rtype_with_data: RecordTypeWithData::TXT {
                    entries: txt_entries,
                },
                rclass: RecordClass::IN,
                cache_flush: true,
                ttl: TTL_LONG,
            },
            ResourceRecord {
                name: enumeration_fqdn,
                rtype_with_data: RecordTypeWithData::PTR {
                    ptrdname: service_fqdn.clone(),
                },
                rclass: RecordClass::IN,
                cache_flush: false,
                ttl: TTL_LONG,
            },
            ResourceRecord {
                name: service_fqdn,
                rtype_with_data: RecordTypeWithData::PTR {
                    ptrdname: instance_fqdn.clone(),
                },
                rclass: RecordClass::IN,
                cache_flush: false,
                ttl: TTL_LONG,
            },
            ResourceRecord {
                name: instance_fqdn,
                rtype_with_data: RecordTypeWithData::SRV {
                    priority: 0,
                    weight: 0,
                    port: self.port,
                    target: host_fqdn.clone(),
                },
                rclass: RecordClass::IN,
                cache_flush: true,
                ttl: TTL_SHORT,
            },
        ];

        let additional = vec![
            ResourceRecord {
                name: host_fqdn.clone(),
                rtype_with_data: RecordTypeWithData::A { address: v4 },
                rclass: RecordClass::IN,
                cache_flush: true,
                ttl: TTL_SHORT,
            },
            ResourceRecord {
                name: host_fqdn,
                rtype_with_data: RecordTypeWithData::AAAA { address: v6 },
                rclass: RecordClass::IN,
                cache_flush: true,
                ttl: TTL_SHORT,
            },
        ];

        Ok(Message {
            header: Header::response(0),
            questions: Vec::new(),
            answers,
            authority: Vec::new(),
            additional,
        })
    }
}

fn name(dotted: &str) -> Result<DomainName, BuildError> {
    DomainName::from_dotted_string(dotted).ok_or(BuildError::HostAddressUnresolved)
}

/// Asks the host OS resolver for `host_name`'s addresses twice: once
/// keeping only an IPv4 result, once keeping only an IPv6 one. Each
/// call is independent, so a transient resolver hiccup on one lookup
/// never contaminates the other family's result with a stale answer.
async fn resolve_host_addresses(host_name: &str) -> Result<(Ipv4Addr, Ipv6Addr), BuildError> {
    let v4 = resolve_one_family(host_name, |ip| match ip {
        IpAddr::V4(a) => Some(a),
        IpAddr::V6(_) => None,
    })
    .await;
    let v6 = resolve_one_family(host_name, |ip| match ip {
        IpAddr::V6(a) => Some(a),
        IpAddr::V4(_) => None,
    })
    .await;

    match (v4, v6) {
        (Some(v4), Some(v6)) => Ok((v4, v6)),
        _ => Err(BuildError::HostAddressUnresolved),
    }
}

/// Runs one `lookup_host` call and keeps the first address `pick`
/// accepts, discarding the rest of the result.
async fn resolve_one_family<T>(host_name: &str, pick: impl Fn(IpAddr) -> Option<T>) -> Option<T> {
    let addrs = lookup_host((host_name, 0)).await.ok()?;
    addrs.into_iter().find_map(|addr| pick(addr.ip()))
}

/// Errors that can arise when building a descriptor's response
/// message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BuildError {
    /// The host OS resolver could not produce both an IPv4 and an
    /// IPv6 address for the descriptor's `host_name`.
    HostAddressUnresolved,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildError::HostAddressUnresolved => {
                write!(f, "could not resolve both an IPv4 and an IPv6 address for the service host")
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.instance_fqdn())
    }
}
