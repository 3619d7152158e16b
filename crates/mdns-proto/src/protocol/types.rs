use bytes::Bytes;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Maximum encoded length of a domain name: the number of length
/// octets plus the sum of the lengths of the labels.
pub const DOMAINNAME_MAX_LEN: usize = 255;

/// Maximum length of a single label in a domain name.
pub const LABEL_MAX_LEN: usize = 63;

/// Hard cap on the number of labels a name-pointer chain may expand
/// to. This is the wire-format maximum and also the simplest possible
/// guard against a pointer loop.
pub const MAX_POINTER_CHASE_LABELS: usize = 255;

/// Octet mask for the QR flag (response) in the first flags octet.
pub const HEADER_MASK_QR: u8 = 0b1000_0000;

/// Octet mask for the opcode field in the first flags octet.
pub const HEADER_MASK_OPCODE: u8 = 0b0111_1000;

/// Bit offset of the opcode field in the first flags octet.
pub const HEADER_OFFSET_OPCODE: usize = 3;

/// Octet mask for the AA flag (authoritative) in the first flags octet.
pub const HEADER_MASK_AA: u8 = 0b0000_0100;

/// Octet mask for the TC flag (truncated) in the first flags octet.
pub const HEADER_MASK_TC: u8 = 0b0000_0010;

/// Octet mask for the rcode field in the second flags octet.
pub const HEADER_MASK_RCODE: u8 = 0b0000_1111;

/// Bit offset of the rcode field in the second flags octet.
pub const HEADER_OFFSET_RCODE: usize = 0;

/// High bit of a 16 bit class word: the cache-flush bit on a resource
/// record, or the unicast-response bit on a question (RFC 6762
/// sections 10.2 and 5.4).
pub const CLASS_MASK_FLAG: u16 = 0b1000_0000_0000_0000;

/// Low 15 bits of a 16 bit class word: the actual record/query class.
pub const CLASS_MASK_VALUE: u16 = 0b0111_1111_1111_1111;

/// A DNS message, used for both queries and responses.
///
/// ```text
///     +---------------------+
///     |        Header       |
///     +---------------------+
///     |       Question      | the question for the name server
///     +---------------------+
///     |        Answer       | RRs answering the question
///     +---------------------+
///     |      Authority      | RRs pointing toward an authority
///     +---------------------+
///     |      Additional     | RRs holding additional information
///     +---------------------+
/// ```
///
/// See section 4.1 of RFC 1035. The QDCOUNT/ANCOUNT/NSCOUNT/ARCOUNT
/// fields are omitted from this type: they only matter on the wire,
/// and are inferred from the lengths of the section `Vec`s.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    /// True if this message is a query with at least one question:
    /// the only shape the responder will dispatch against the
    /// registry.
    pub fn is_dispatchable_query(&self) -> bool {
        !self.header.is_response && !self.questions.is_empty()
    }

    /// Reset every RR's TTL to zero, turning an announcement into a
    /// goodbye (RFC 6762 section 10.1).
    pub fn into_goodbye(mut self) -> Self {
        for rr in self
            .answers
            .iter_mut()
            .chain(self.authority.iter_mut())
            .chain(self.additional.iter_mut())
        {
            rr.ttl = 0;
        }
        self
    }
}

/// Common header type for all messages.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      ID                       |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |QR|   Opcode  |AA|TC|        |       RCODE      |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    QDCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ANCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    NSCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ARCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// The bits this responder does not interpret (RD, RA, Z, AD, CD) are
/// always written as zero and ignored on read.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Header {
    /// A 16 bit identifier assigned by the program that generates any
    /// kind of query. This identifier is copied into the
    /// corresponding reply.
    pub id: u16,

    /// Whether this message is a query (false) or a response (true).
    pub is_response: bool,

    /// Kind of query in this message.
    pub opcode: Opcode,

    /// Authoritative Answer: valid in responses, specifies that the
    /// responding host is an authority for the domain name in the
    /// question (or, for mDNS, simply that it is the owner of the
    /// advertised name).
    pub is_authoritative: bool,

    /// Truncation: this message was truncated due to length greater
    /// than that permitted on the transmission channel.
    pub is_truncated: bool,

    /// Response code, set as part of responses.
    pub rcode: Rcode,
}

impl Header {
    /// A header for a fresh, authoritative, no-error response.
    pub fn response(id: u16) -> Self {
        Self {
            id,
            is_response: true,
            opcode: Opcode::Standard,
            is_authoritative: true,
            is_truncated: false,
            rcode: Rcode::NoError,
        }
    }
}

/// What sort of query this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Opcode {
    Standard,
    Inverse,
    Status,
    Reserved(OpcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Opcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct OpcodeReserved(pub(crate) u8);

impl From<u8> for Opcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Opcode::Standard,
            1 => Opcode::Inverse,
            2 => Opcode::Status,
            other => Opcode::Reserved(OpcodeReserved(other)),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Standard => 0,
            Opcode::Inverse => 1,
            Opcode::Status => 2,
            Opcode::Reserved(OpcodeReserved(octet)) => octet,
        }
    }
}

/// Response code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Rcode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Reserved(RcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Rcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RcodeReserved(pub(crate) u8);

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rcode::NoError => write!(f, "no-error"),
            Rcode::FormatError => write!(f, "format-error"),
            Rcode::ServerFailure => write!(f, "server-failure"),
            Rcode::NameError => write!(f, "name-error"),
            Rcode::NotImplemented => write!(f, "not-implemented"),
            Rcode::Refused => write!(f, "refused"),
            Rcode::Reserved(_) => write!(f, "reserved"),
        }
    }
}

impl From<u8> for Rcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Rcode::NoError,
            1 => Rcode::FormatError,
            2 => Rcode::ServerFailure,
            3 => Rcode::NameError,
            4 => Rcode::NotImplemented,
            5 => Rcode::Refused,
            other => Rcode::Reserved(RcodeReserved(other)),
        }
    }
}

impl From<Rcode> for u8 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::NoError => 0,
            Rcode::FormatError => 1,
            Rcode::ServerFailure => 2,
            Rcode::NameError => 3,
            Rcode::NotImplemented => 4,
            Rcode::Refused => 5,
            Rcode::Reserved(RcodeReserved(octet)) => octet,
        }
    }
}

/// The question section has a list of questions (usually one, but
/// possibly more) being asked. This is the structure for a single
/// question.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                                               |
///     /                     QNAME                     /
///     /                                               /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     QTYPE                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |U |                  QCLASS                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// `U` is the mDNS unicast-response bit (RFC 6762 section 5.4); it
/// shares the class word with the 15 bit `QCLASS`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Question {
    pub name: DomainName,
    pub qtype: QueryType,
    pub qclass: QueryClass,
    /// Whether the querier set the unicast-response bit, requesting a
    /// reply be sent unicast rather than to the multicast group. This
    /// responder always replies multicast regardless (see the
    /// responder loop design notes).
    pub unicast_response: bool,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {}{}",
            self.name.to_dotted_string(),
            self.qclass,
            self.qtype,
            if self.unicast_response { " (QU)" } else { "" }
        )
    }
}

/// The answer, authority, and additional sections are all the same
/// format: a variable number of resource records. This is the
/// structure for a single resource record.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                                               |
///     /                      NAME                     /
///     |                                               |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      TYPE                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |F |                   CLASS                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      TTL                      |
///     |                                               |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                   RDLENGTH                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--|
///     /                     RDATA                     /
///     /                                               /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// `F` is the mDNS cache-flush bit (RFC 6762 section 10.2); it shares
/// the class word with the 15 bit `CLASS`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResourceRecord {
    pub name: DomainName,
    pub rtype_with_data: RecordTypeWithData,
    pub rclass: RecordClass,
    /// The cache-flush bit: tells receivers to replace rather than
    /// append to their cached records for this name/type/class.
    pub cache_flush: bool,
    pub ttl: u32,
}

/// A record type with its associated, deserialised, data.
///
/// Only the five record kinds this responder actually constructs have
/// a typed shape; everything else observed on the wire round-trips as
/// an opaque [`RecordTypeWithData::Unknown`] blob.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RecordTypeWithData {
    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                    ADDRESS                    |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    A { address: Ipv4Addr },

    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                    ADDRESS                    |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    ///
    /// `ADDRESS` is a 128 bit IPv6 address.
    AAAA { address: Ipv6Addr },

    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     /                   PTRDNAME                    /
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    PTR { ptrdname: DomainName },

    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                   PRIORITY                    |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                    WEIGHT                     |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                     PORT                      |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     /                    TARGET                     /
    ///     /                                               /
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: DomainName,
    },

    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     /                   TXT-DATA                    /
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    ///
    /// An ordered sequence of `key=value` entries, each carried as
    /// one length-prefixed character string. A character string with
    /// no `=` decodes to `(entire string, empty)`.
    TXT { entries: Vec<(Bytes, Bytes)> },

    /// Any other record type this responder does not itself
    /// construct, but must still be able to round-trip.
    Unknown { tag: RecordTypeUnknown, octets: Bytes },
}

impl RecordTypeWithData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RecordTypeWithData::A { .. } => RecordType::A,
            RecordTypeWithData::AAAA { .. } => RecordType::AAAA,
            RecordTypeWithData::PTR { .. } => RecordType::PTR,
            RecordTypeWithData::SRV { .. } => RecordType::SRV,
            RecordTypeWithData::TXT { .. } => RecordType::TXT,
            RecordTypeWithData::Unknown { tag, .. } => RecordType::Unknown(*tag),
        }
    }
}

/// Query types are a superset of record types: `ANY` can match
/// several record kinds at once.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum QueryType {
    Record(RecordType),
    /// `QTYPE` 255, "ANY": matches every type at the queried name.
    Wildcard,
}

impl QueryType {
    pub fn matches(&self, rtype: RecordType) -> bool {
        match self {
            QueryType::Wildcard => true,
            QueryType::Record(qtype) => *qtype == rtype,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryType::Record(rtype) => rtype.fmt(f),
            QueryType::Wildcard => write!(f, "ANY"),
        }
    }
}

impl From<u16> for QueryType {
    fn from(value: u16) -> Self {
        match value {
            255 => QueryType::Wildcard,
            _ => QueryType::Record(RecordType::from(value)),
        }
    }
}

impl From<QueryType> for u16 {
    fn from(value: QueryType) -> Self {
        match value {
            QueryType::Wildcard => 255,
            QueryType::Record(rtype) => rtype.into(),
        }
    }
}

/// Query classes are a superset of record classes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum QueryClass {
    Record(RecordClass),
    /// `QCLASS` 255, "ANY".
    Wildcard,
}

impl fmt::Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryClass::Record(rclass) => rclass.fmt(f),
            QueryClass::Wildcard => write!(f, "ANY"),
        }
    }
}

impl From<u16> for QueryClass {
    fn from(value: u16) -> Self {
        match value {
            255 => QueryClass::Wildcard,
            _ => QueryClass::Record(RecordClass::from(value)),
        }
    }
}

impl From<QueryClass> for u16 {
    fn from(value: QueryClass) -> Self {
        match value {
            QueryClass::Wildcard => 255,
            QueryClass::Record(rclass) => rclass.into(),
        }
    }
}

/// Record types this responder recognises. Everything else round-trips
/// as [`RecordType::Unknown`] (following the same forward-compatible
/// pattern as `RecordClass::Unknown` below).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordType {
    A,
    AAAA,
    PTR,
    SRV,
    TXT,
    Unknown(RecordTypeUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `RecordType`s cannot be created directly.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RecordTypeUnknown(pub(crate) u16);

impl RecordType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordType::Unknown(_))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::PTR => write!(f, "PTR"),
            RecordType::SRV => write!(f, "SRV"),
            RecordType::TXT => write!(f, "TXT"),
            RecordType::Unknown(RecordTypeUnknown(n)) => write!(f, "TYPE{n}"),
        }
    }
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            28 => RecordType::AAAA,
            12 => RecordType::PTR,
            33 => RecordType::SRV,
            16 => RecordType::TXT,
            _ => RecordType::Unknown(RecordTypeUnknown(value)),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::AAAA => 28,
            RecordType::PTR => 12,
            RecordType::SRV => 33,
            RecordType::TXT => 16,
            RecordType::Unknown(RecordTypeUnknown(value)) => value,
        }
    }
}

/// Record classes are used by resource records and by queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordClass {
    IN,
    Unknown(RecordClassUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `RecordClass`es cannot be created directly.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RecordClassUnknown(pub(crate) u16);

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordClass::IN => write!(f, "IN"),
            RecordClass::Unknown(RecordClassUnknown(n)) => write!(f, "CLASS{n}"),
        }
    }
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::IN,
            _ => RecordClass::Unknown(RecordClassUnknown(value)),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::IN => 1,
            RecordClass::Unknown(RecordClassUnknown(value)) => value,
        }
    }
}

/// A domain name: a sequence of labels, each a length octet followed
/// by that many octets, terminated by the zero-length root label.
///
/// A label must be 63 octets or shorter. A name must be 255 octets or
/// shorter in total, including both length and label octets.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct DomainName {
    pub labels: Vec<Label>,
    // INVARIANT: len == len(labels) + sum(map(len, labels))
    pub len: usize,
}

impl DomainName {
    pub fn root_domain() -> Self {
        DomainName {
            labels: vec![Label::new()],
            len: 1,
        }
    }

    pub fn is_root(&self) -> bool {
        self.len == 1 && self.labels[0].is_empty()
    }

    pub fn to_dotted_string(&self) -> String {
        if self.is_root() {
            return ".".to_string();
        }

        let mut out = String::with_capacity(self.len);
        let mut first = true;
        for label in &self.labels {
            if label.is_empty() {
                continue;
            }
            if first {
                first = false;
            } else {
                out.push('.');
            }
            for octet in label.octets().iter() {
                out.push(*octet as char);
            }
        }

        out
    }

    pub fn from_dotted_string(s: &str) -> Option<Self> {
        if s.is_empty() || s == "." {
            return Some(Self::root_domain());
        }

        let chunks = s.trim_end_matches('.').split('.').collect::<Vec<_>>();
        let mut labels = Vec::with_capacity(chunks.len() + 1);

        for label_chars in &chunks {
            if label_chars.is_empty() {
                return None;
            }
            match label_chars.as_bytes().try_into() {
                Ok(label) => labels.push(label),
                Err(_) => return None,
            }
        }
        labels.push(Label::new());

        Self::from_labels(labels)
    }

    pub fn from_labels(labels: Vec<Label>) -> Option<Self> {
        if labels.is_empty() {
            return None;
        }

        let mut len = labels.len();
        let mut blank_label = false;

        for label in &labels {
            if blank_label {
                return None;
            }

            blank_label |= label.is_empty();
            len += label.len() as usize;
        }

        if blank_label && len <= DOMAINNAME_MAX_LEN {
            Some(Self { labels, len })
        } else {
            None
        }
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainName")
            .field("to_dotted_string()", &self.to_dotted_string())
            .finish()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", &self.to_dotted_string())
    }
}

impl FromStr for DomainName {
    type Err = DomainNameFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainName::from_dotted_string(s).ok_or(DomainNameFromStr::NoParse)
    }
}

/// Errors that can arise when converting a `&str` into a `DomainName`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DomainNameFromStr {
    NoParse,
}

impl fmt::Display for DomainNameFromStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "could not parse string to domain name")
    }
}

impl std::error::Error for DomainNameFromStr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A label is a sequence of octets, compared as case-insensitive
/// ASCII. A label can be no longer than 63 octets.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Label {
    /// Private to this module so constructing an invalid `Label` is
    /// impossible.
    octets: Bytes,
}

impl Label {
    pub fn new() -> Self {
        Self {
            octets: Bytes::new(),
        }
    }

    #[allow(clippy::missing_panics_doc)]
    pub fn len(&self) -> u8 {
        // safe as `TryFrom` below ensures a label is <= 63 bytes
        self.octets.len().try_into().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }

    pub fn octets(&self) -> &Bytes {
        &self.octets
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&[u8]> for Label {
    type Error = LabelTryFromOctetsError;

    fn try_from(mixed_case_octets: &[u8]) -> Result<Self, Self::Error> {
        if mixed_case_octets.len() > LABEL_MAX_LEN {
            return Err(LabelTryFromOctetsError::TooLong);
        }

        Ok(Self {
            octets: Bytes::copy_from_slice(&mixed_case_octets.to_ascii_lowercase()),
        })
    }
}

/// Errors that can arise when converting a `[u8]` into a `Label`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LabelTryFromOctetsError {
    TooLong,
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn u8_opcode_roundtrip() {
        for i in 0..15 {
            assert_eq!(u8::from(Opcode::from(i)), i);
        }
    }

    #[test]
    fn u8_rcode_roundtrip() {
        for i in 0..15 {
            assert_eq!(u8::from(Rcode::from(i)), i);
        }
    }

    #[test]
    fn u16_querytype_roundtrip() {
        for i in 0..100 {
            assert_eq!(u16::from(QueryType::from(i)), i);
        }
    }

    #[test]
    fn u16_queryclass_roundtrip() {
        for i in 0..100 {
            assert_eq!(u16::from(QueryClass::from(i)), i);
        }
    }

    #[test]
    fn u16_recordtype_roundtrip() {
        for i in 0..100 {
            assert_eq!(u16::from(RecordType::from(i)), i);
        }
    }

    #[test]
    fn u16_recordclass_roundtrip() {
        for i in 0..100 {
            assert_eq!(u16::from(RecordClass::from(i)), i);
        }
    }

    #[test]
    fn recordtype_a_is_not_unknown() {
        assert!(!RecordType::A.is_unknown());
        assert!(RecordType::Unknown(RecordTypeUnknown(100)).is_unknown());
    }

    #[test]
    fn domainname_root_conversions() {
        assert_eq!(
            Some(DomainName::root_domain()),
            DomainName::from_dotted_string(".")
        );
        assert_eq!(
            Some(DomainName::root_domain()),
            DomainName::from_labels(vec![Label::new()])
        );
        assert_eq!(".", DomainName::root_domain().to_dotted_string());
    }

    #[test]
    fn domainname_case_folds_on_construction() {
        assert_eq!(
            domain("Service1._MDNSTest._tcp.local."),
            domain("service1._mdnstest._tcp.local.")
        );
    }

    #[test]
    fn domainname_conversions() {
        for s in [
            "local.",
            "_mdnstest._tcp.local.",
            "s1._mdnstest._tcp.local.",
            "_services._dns-sd._udp.local.",
        ] {
            let d = DomainName::from_dotted_string(s).unwrap();
            assert_eq!(s, d.to_dotted_string() + ".");
        }
    }

    #[test]
    fn domainname_rejects_oversize_label() {
        let oversize = "a".repeat(LABEL_MAX_LEN + 1);
        assert!(DomainName::from_dotted_string(&format!("{oversize}.local.")).is_none());
    }
}
