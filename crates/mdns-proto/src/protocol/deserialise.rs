//! Deserialisation of mDNS messages from the network. See the `types`
//! module for details of the format.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::protocol::types::*;

impl Message {
    /// # Errors
    ///
    /// If the datagram cannot be parsed. The responder loop treats
    /// every variant the same way: discard the datagram and continue.
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    /// # Errors
    ///
    /// See [`Message::from_octets`].
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let header = Header::deserialise(buffer)?;
        let qdcount = buffer.next_u16().ok_or(Error::ShortRead)?;
        let ancount = buffer.next_u16().ok_or(Error::ShortRead)?;
        let nscount = buffer.next_u16().ok_or(Error::ShortRead)?;
        let arcount = buffer.next_u16().ok_or(Error::ShortRead)?;

        let mut questions = Vec::with_capacity(qdcount.into());
        let mut answers = Vec::with_capacity(ancount.into());
        let mut authority = Vec::with_capacity(nscount.into());
        let mut additional = Vec::with_capacity(arcount.into());

        for _ in 0..qdcount {
            questions.push(Question::deserialise(buffer)?);
        }
        for _ in 0..ancount {
            answers.push(ResourceRecord::deserialise(buffer)?);
        }
        for _ in 0..nscount {
            authority.push(ResourceRecord::deserialise(buffer)?);
        }
        for _ in 0..arcount {
            additional.push(ResourceRecord::deserialise(buffer)?);
        }

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

impl Header {
    /// # Errors
    ///
    /// If the 12 byte header is truncated.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let id = buffer.next_u16().ok_or(Error::ShortRead)?;
        let flags1 = buffer.next_u8().ok_or(Error::ShortRead)?;
        let flags2 = buffer.next_u8().ok_or(Error::ShortRead)?;

        Ok(Self {
            id,
            is_response: flags1 & HEADER_MASK_QR != 0,
            opcode: Opcode::from((flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE),
            is_authoritative: flags1 & HEADER_MASK_AA != 0,
            is_truncated: flags1 & HEADER_MASK_TC != 0,
            rcode: Rcode::from((flags2 & HEADER_MASK_RCODE) >> HEADER_OFFSET_RCODE),
        })
    }
}

impl Question {
    /// # Errors
    ///
    /// If the question cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(buffer)?;
        let qtype = QueryType::from(buffer.next_u16().ok_or(Error::ShortRead)?);
        let raw_qclass = buffer.next_u16().ok_or(Error::ShortRead)?;
        let unicast_response = raw_qclass & CLASS_MASK_FLAG != 0;
        let qclass = QueryClass::from(raw_qclass & CLASS_MASK_VALUE);

        Ok(Self {
            name,
            qtype,
            qclass,
            unicast_response,
        })
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the record cannot be parsed, or its payload does not
    /// consume exactly `RDLENGTH` bytes.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(buffer)?;
        let rtype = RecordType::from(buffer.next_u16().ok_or(Error::ShortRead)?);
        let raw_rclass = buffer.next_u16().ok_or(Error::ShortRead)?;
        let cache_flush = raw_rclass & CLASS_MASK_FLAG != 0;
        let rclass = RecordClass::from(raw_rclass & CLASS_MASK_VALUE);
        let ttl = buffer.next_u32().ok_or(Error::ShortRead)?;
        let rdlength = buffer.next_u16().ok_or(Error::ShortRead)?;

        let rdata_start = buffer.bytes_read();

        let rtype_with_data = match rtype {
            RecordType::A => RecordTypeWithData::A {
                address: Ipv4Addr::from(buffer.next_u32().ok_or(Error::ShortRead)?),
            },
            RecordType::AAAA => RecordTypeWithData::AAAA {
                address: Ipv6Addr::new(
                    buffer.next_u16().ok_or(Error::ShortRead)?,
                    buffer.next_u16().ok_or(Error::ShortRead)?,
                    buffer.next_u16().ok_or(Error::ShortRead)?,
                    buffer.next_u16().ok_or(Error::ShortRead)?,
                    buffer.next_u16().ok_or(Error::ShortRead)?,
                    buffer.next_u16().ok_or(Error::ShortRead)?,
                    buffer.next_u16().ok_or(Error::ShortRead)?,
                    buffer.next_u16().ok_or(Error::ShortRead)?,
                ),
            },
            RecordType::PTR => RecordTypeWithData::PTR {
                ptrdname: DomainName::deserialise(buffer)?,
            },
            RecordType::SRV => RecordTypeWithData::SRV {
                priority: buffer.next_u16().ok_or(Error::ShortRead)?,
                weight: buffer.next_u16().ok_or(Error::ShortRead)?,
                port: buffer.next_u16().ok_or(Error::ShortRead)?,
                target: DomainName::deserialise(buffer)?,
            },
            RecordType::TXT => {
                let window = buffer
                    .take(rdlength as usize)
                    .ok_or(Error::ShortRead)?;
                RecordTypeWithData::TXT {
                    entries: parse_txt_entries(window)?,
                }
            }
            RecordType::Unknown(tag) => RecordTypeWithData::Unknown {
                tag,
                octets: bytes::Bytes::copy_from_slice(
                    buffer.take(rdlength as usize).ok_or(Error::ShortRead)?,
                ),
            },
        };

        // for types whose payload doesn't carry its own length (A, AAAA,
        // SRV, PTR), confirm the RDLENGTH the peer claimed actually
        // matches what we just consumed - a mismatch means the datagram
        // is lying about its own shape.
        let consumed = buffer.bytes_read() - rdata_start;
        if consumed != rdlength as usize {
            return Err(Error::ShortRead);
        }

        Ok(Self {
            name,
            rtype_with_data,
            rclass,
            cache_flush,
            ttl,
        })
    }
}

/// Splits an RDATA window into `key=value` TXT entries. Each entry is
/// one length-prefixed character string; a string with no `=` yields
/// `(entire, empty)`.
fn parse_txt_entries(mut window: &[u8]) -> Result<Vec<(bytes::Bytes, bytes::Bytes)>, Error> {
    let mut entries = Vec::new();

    while !window.is_empty() {
        let len = window[0] as usize;
        window = &window[1..];
        if window.len() < len {
            return Err(Error::MalformedTxt);
        }
        let (entry, rest) = window.split_at(len);
        window = rest;

        let (key, value) = match entry.iter().position(|b| *b == b'=') {
            Some(i) => (&entry[..i], &entry[i + 1..]),
            None => (entry, &entry[entry.len()..]),
        };
        entries.push((
            bytes::Bytes::copy_from_slice(key),
            bytes::Bytes::copy_from_slice(value),
        ));
    }

    Ok(entries)
}

impl DomainName {
    /// # Errors
    ///
    /// If the domain cannot be parsed: a truncated label, an oversize
    /// label that isn't a pointer, a pointer that chases forward or
    /// onto itself, a pointer chain longer than
    /// [`MAX_POINTER_CHASE_LABELS`] hops, or a name whose total length
    /// exceeds the wire cap.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let mut hops = 0usize;
        Self::deserialise_bounded(buffer, &mut hops)
    }

    /// `hops` is threaded through every recursive call a pointer makes
    /// (rather than being local to one stack frame, as a per-frame
    /// `labels.len()` check would be): each pointer strictly decreases
    /// its target offset, so a chain can never loop, but without a cap
    /// shared across the whole chain a datagram a few kilobytes long
    /// can still force thousands of nested recursive calls, one per
    /// hop. Capping the shared counter at [`MAX_POINTER_CHASE_LABELS`]
    /// bounds both the recursion depth and the total labels a name can
    /// expand to, matching the wire-format hard cap.
    #[allow(clippy::missing_panics_doc)]
    fn deserialise_bounded(buffer: &mut ConsumableBuffer, hops: &mut usize) -> Result<Self, Error> {
        let mut labels = Vec::<Label>::with_capacity(5);
        let mut total_len = 0usize;
        let start = buffer.bytes_read();

        loop {
            let size = buffer.next_u8().ok_or(Error::ShortRead)?;

            if usize::from(size) <= LABEL_MAX_LEN {
                if size == 0 {
                    labels.push(Label::new());
                    total_len += 1;
                    break;
                }

                let octets = buffer.take(size as usize).ok_or(Error::ShortRead)?;
                // safe: bounds already checked above
                let label = Label::try_from(octets).unwrap();
                total_len += 1 + label.len() as usize;
                labels.push(label);

                if total_len > DOMAINNAME_MAX_LEN {
                    return Err(Error::NameTooLong);
                }
            } else if size >= 0b1100_0000 {
                *hops += 1;
                if *hops > MAX_POINTER_CHASE_LABELS {
                    return Err(Error::NameTooLong);
                }

                let hi = size & 0b0011_1111;
                let lo = buffer.next_u8().ok_or(Error::ShortRead)?;
                let ptr = usize::from(u16::from_be_bytes([hi, lo]));

                // a pointer must reference an earlier offset than the
                // name currently being decoded started at (RFC 1035
                // section 4.1.4); this also rules out the simplest
                // infinite loops.
                if ptr >= start {
                    return Err(Error::BadNamePointer);
                }

                let mut pointed = DomainName::deserialise_bounded(&mut buffer.at_offset(ptr), hops)?;
                total_len += pointed.len;
                labels.append(&mut pointed.labels);
                break;
            } else {
                return Err(Error::ReservedLabelKind);
            }
        }

        if total_len <= DOMAINNAME_MAX_LEN {
            Ok(DomainName {
                labels,
                len: total_len,
            })
        } else {
            Err(Error::NameTooLong)
        }
    }
}

/// Errors encountered when parsing a datagram. All are non-fatal at
/// the codec boundary: the responder loop discards the datagram and
/// continues.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// Fewer bytes remained than the section being parsed requires.
    ShortRead,
    /// A name pointer targets the current name's start or somewhere
    /// after it.
    BadNamePointer,
    /// A name's total length exceeds the 255 octet wire cap, or its
    /// pointer chain exceeds the label-count guard.
    NameTooLong,
    /// A TXT character string's declared length runs past the end of
    /// the record's RDATA.
    MalformedTxt,
    /// A label length octet had its two high bits set to `01` or
    /// `10`, which RFC 1035 reserves.
    ReservedLabelKind,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::ShortRead => write!(f, "short read"),
            Error::BadNamePointer => write!(f, "bad name pointer"),
            Error::NameTooLong => write!(f, "name too long"),
            Error::MalformedTxt => write!(f, "malformed txt record"),
            Error::ReservedLabelKind => write!(f, "reserved label kind"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A buffer which is consumed by the parsing process. Supports both
/// sequential reads and an absolute seek, for expanding name-pointer
/// compression.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.octets.len()
    }

    pub fn bytes_read(&self) -> usize {
        self.position
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        let a = *self.octets.get(self.position)?;
        self.position += 1;
        Some(a)
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        let bytes = self.take(2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        let bytes = self.take(4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        if self.octets.len() >= self.position + size {
            let slice = &self.octets[self.position..self.position + size];
            self.position += size;
            Some(slice)
        } else {
            None
        }
    }

    /// Returns a fresh cursor over the same underlying datagram,
    /// seeked to an absolute offset - used to expand a name pointer
    /// without disturbing the caller's own position.
    pub fn at_offset(&self, position: usize) -> ConsumableBuffer<'a> {
        Self {
            octets: self.octets,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::serialise::WritableBuffer;
    use crate::protocol::types::test_util::*;

    #[test]
    fn scenario_a_minimal_question_decode() {
        let raw: Vec<u8> = vec![
            0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x5f,
            0x6d, 0x64, 0x6e, 0x73, 0x74, 0x73, 0x05, 0x5f, 0x74, 0x63, 0x70, 0x05, 0x6c, 0x6f,
            0x63, 0x61, 0x6c, 0x00, 0x00, 0x0c, 0x00, 0x01,
        ];
        let message = Message::from_octets(&raw).unwrap();

        assert_eq!(1, message.questions.len());
        let q = &message.questions[0];
        assert_eq!("_mdnsts._tcp.local", q.name.to_dotted_string());
        assert_eq!(QueryType::Record(RecordType::PTR), q.qtype);
        assert_eq!(QueryClass::Record(RecordClass::IN), q.qclass);
        assert!(!q.unicast_response);
    }

    #[test]
    fn scenario_b_name_pointer_expansion() {
        let mut buf = WritableBuffer::default();
        domain("_mdnstest._tcp.local.").serialise(&mut buf);
        let first_name_offset = 0u16;

        // second question: "s1" followed by a pointer back to the
        // first question's name.
        buf.write_u8(2);
        buf.write_octets(b"s1");
        buf.write_u16(0b1100_0000_0000_0000 | first_name_offset);

        let whole = ConsumableBuffer::new(&buf.octets);
        let parsed = DomainName::deserialise(&mut whole.at_offset(22)).unwrap();
        assert_eq!("s1._mdnstest._tcp.local", parsed.to_dotted_string());
    }

    #[test]
    fn forward_pointer_is_rejected() {
        // a name at offset 0 that points forward to offset 5 is invalid
        let raw = vec![0b1100_0000, 0x05, 0, 0, 0, 0];
        let err = DomainName::deserialise(&mut ConsumableBuffer::new(&raw)).unwrap_err();
        assert_eq!(Error::BadNamePointer, err);
    }

    #[test]
    fn pointer_chain_longer_than_255_hops_is_rejected() {
        // offset 0 is the root label; offset 2*i (i >= 1) is a pointer
        // back to offset 2*(i-1). Each hop's target is strictly
        // earlier than its own offset, so `ptr >= start` never trips -
        // only the shared hop counter can reject this chain.
        const HOPS: usize = 300;
        let mut raw = vec![0u8; 2 * (HOPS + 1)];
        raw[0] = 0; // root label terminates the name
        for i in 1..=HOPS {
            let target = 2 * (i - 1);
            let [hi, lo] = (0b1100_0000_0000_0000u16 | target as u16).to_be_bytes();
            raw[2 * i] = hi;
            raw[2 * i + 1] = lo;
        }

        let whole = ConsumableBuffer::new(&raw);
        let err = DomainName::deserialise(&mut whole.at_offset(2 * HOPS)).unwrap_err();
        assert_eq!(Error::NameTooLong, err);
    }

    #[test]
    fn pointer_chain_within_255_hops_is_accepted() {
        const HOPS: usize = 200;
        let mut raw = vec![0u8; 2 * (HOPS + 1)];
        raw[0] = 0;
        for i in 1..=HOPS {
            let target = 2 * (i - 1);
            let [hi, lo] = (0b1100_0000_0000_0000u16 | target as u16).to_be_bytes();
            raw[2 * i] = hi;
            raw[2 * i + 1] = lo;
        }

        let whole = ConsumableBuffer::new(&raw);
        let parsed = DomainName::deserialise(&mut whole.at_offset(2 * HOPS)).unwrap();
        assert!(parsed.is_root());
    }

    #[test]
    fn self_pointer_is_rejected() {
        let raw = vec![0b1100_0000, 0x00];
        let err = DomainName::deserialise(&mut ConsumableBuffer::new(&raw)).unwrap_err();
        assert_eq!(Error::BadNamePointer, err);
    }

    #[test]
    fn reserved_label_kind_is_rejected() {
        // 0b01xxxxxx / 0b10xxxxxx are reserved, not a valid label length
        let raw = vec![0b0100_0000];
        let err = DomainName::deserialise(&mut ConsumableBuffer::new(&raw)).unwrap_err();
        assert_eq!(Error::ReservedLabelKind, err);
    }

    #[test]
    fn truncated_header_is_short_read() {
        let err = Message::from_octets(&[0, 1, 2]).unwrap_err();
        assert_eq!(Error::ShortRead, err);
    }

    #[test]
    fn decode_never_panics_on_truncated_resource_record() {
        let mut buf = WritableBuffer::default();
        Header::response(7).serialise(&mut buf);
        buf.write_u16(0); // qdcount
        buf.write_u16(1); // ancount
        buf.write_u16(0);
        buf.write_u16(0);
        domain("host.local.").serialise(&mut buf);
        buf.write_u16(1); // A
        buf.write_u16(1); // IN
        buf.write_u32(120);
        buf.write_u16(4); // rdlength claims 4 bytes
        // ...but we don't write them

        assert_eq!(
            Error::ShortRead,
            Message::from_octets(&buf.octets).unwrap_err()
        );
    }

    #[test]
    fn unknown_record_type_round_trips_as_opaque_blob() {
        let mut buf = WritableBuffer::default();
        let rr = unknown_record("host.local.", 999, &[1, 2, 3, 4], 120);
        rr.serialise(&mut buf).unwrap();

        let mut full = WritableBuffer::default();
        Header::response(1).serialise(&mut full);
        full.write_u16(0);
        full.write_u16(1);
        full.write_u16(0);
        full.write_u16(0);
        full.octets.extend_from_slice(&buf.octets);

        let message = Message::from_octets(&full.octets).unwrap();
        match &message.answers[0].rtype_with_data {
            RecordTypeWithData::Unknown { tag, octets } => {
                assert_eq!(999, u16::from(RecordType::Unknown(*tag)));
                assert_eq!(&[1, 2, 3, 4][..], &octets[..]);
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn txt_with_no_equals_sign_yields_entire_key_empty_value() {
        let entries = parse_txt_entries(b"\x05hello").unwrap();
        assert_eq!(1, entries.len());
        assert_eq!(&b"hello"[..], &entries[0].0[..]);
        assert_eq!(&b""[..], &entries[0].1[..]);
    }

    #[test]
    fn txt_round_trips_multiple_entries() {
        let mut buf = WritableBuffer::default();
        let rr = txt_record(
            "s1._mdnstest._tcp.local.",
            vec![("ip", "127.0.0.1"), ("port", "76555")],
            4500,
        );
        rr.serialise(&mut buf).unwrap();

        let mut full = WritableBuffer::default();
        Header::response(1).serialise(&mut full);
        full.write_u16(0);
        full.write_u16(1);
        full.write_u16(0);
        full.write_u16(0);
        full.octets.extend_from_slice(&buf.octets);

        let message = Message::from_octets(&full.octets).unwrap();
        match &message.answers[0].rtype_with_data {
            RecordTypeWithData::TXT { entries } => {
                assert_eq!(2, entries.len());
                assert_eq!((&b"ip"[..], &b"127.0.0.1"[..]), (&entries[0].0[..], &entries[0].1[..]));
                assert_eq!((&b"port"[..], &b"76555"[..]), (&entries[1].0[..], &entries[1].1[..]));
            }
            other => panic!("expected TXT, got {other:?}"),
        }
    }
}
