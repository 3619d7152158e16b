//! Serialisation of mDNS messages to the wire format. See the `types`
//! module for details of the format.
//!
//! Unlike a general-purpose DNS stack, this writer never emits
//! name-compression pointers (see the design notes on the responder):
//! mDNS responses here are a few hundred bytes, well under the link
//! MTU, so the simpler, pointer-free writer is preferred.

use bytes::{BufMut, BytesMut};

use crate::protocol::types::*;

impl Message {
    /// # Errors
    ///
    /// If the message has more than `u16::MAX` records in any one
    /// section (the `Message` type permits more states than the wire
    /// format strictly allows).
    pub fn to_octets(&self) -> Result<BytesMut, Error> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer)?;
        Ok(buffer.octets)
    }

    /// # Errors
    ///
    /// See [`Message::to_octets`].
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        let qdcount = usize_to_u16(self.questions.len())?;
        let ancount = usize_to_u16(self.answers.len())?;
        let nscount = usize_to_u16(self.authority.len())?;
        let arcount = usize_to_u16(self.additional.len())?;

        self.header.serialise(buffer);
        buffer.write_u16(qdcount);
        buffer.write_u16(ancount);
        buffer.write_u16(nscount);
        buffer.write_u16(arcount);

        for question in &self.questions {
            question.serialise(buffer);
        }
        for rr in &self.answers {
            rr.serialise(buffer)?;
        }
        for rr in &self.authority {
            rr.serialise(buffer)?;
        }
        for rr in &self.additional {
            rr.serialise(buffer)?;
        }

        Ok(())
    }
}

impl Header {
    /// Rebuilds the flags octets from scratch every call, rather than
    /// mutating a stored byte in place: each bit-field is fully
    /// cleared-then-set by construction, so there is no risk of a
    /// stale bit surviving a flag change between calls.
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        let flag_qr = if self.is_response { HEADER_MASK_QR } else { 0 };
        let field_opcode = HEADER_MASK_OPCODE & (u8::from(self.opcode) << HEADER_OFFSET_OPCODE);
        let flag_aa = if self.is_authoritative {
            HEADER_MASK_AA
        } else {
            0
        };
        let flag_tc = if self.is_truncated { HEADER_MASK_TC } else { 0 };
        let field_rcode = HEADER_MASK_RCODE & (u8::from(self.rcode) << HEADER_OFFSET_RCODE);

        buffer.write_u16(self.id);
        buffer.write_u8(flag_qr | field_opcode | flag_aa | flag_tc);
        buffer.write_u8(field_rcode);
    }
}

impl Question {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        self.name.serialise(buffer);
        buffer.write_u16(self.qtype.into());

        let qclass: u16 = self.qclass.into();
        let flag = if self.unicast_response {
            CLASS_MASK_FLAG
        } else {
            0
        };
        buffer.write_u16(flag | (qclass & CLASS_MASK_VALUE));
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the RDATA is too long to fit its 16 bit length field.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        self.name.serialise(buffer);
        buffer.write_u16(self.rtype_with_data.rtype().into());

        let rclass: u16 = self.rclass.into();
        let flag = if self.cache_flush { CLASS_MASK_FLAG } else { 0 };
        buffer.write_u16(flag | (rclass & CLASS_MASK_VALUE));

        buffer.write_u32(self.ttl);

        // filled in below, once we know how much RDATA we wrote
        let rdlength_index = buffer.index();
        buffer.write_u16(0);

        match &self.rtype_with_data {
            RecordTypeWithData::A { address } => buffer.write_octets(&address.octets()),
            RecordTypeWithData::AAAA { address } => buffer.write_octets(&address.octets()),
            RecordTypeWithData::PTR { ptrdname } => ptrdname.serialise(buffer),
            RecordTypeWithData::SRV {
                priority,
                weight,
                port,
                target,
            } => {
                buffer.write_u16(*priority);
                buffer.write_u16(*weight);
                buffer.write_u16(*port);
                target.serialise(buffer);
            }
            RecordTypeWithData::TXT { entries } => {
                if entries.is_empty() {
                    // zero entries encodes to zero payload bytes
                } else {
                    for (key, value) in entries {
                        let len = key.len() + 1 + value.len();
                        buffer.write_u8(usize_to_u8(len)?);
                        buffer.write_octets(key);
                        buffer.write_u8(b'=');
                        buffer.write_octets(value);
                    }
                }
            }
            RecordTypeWithData::Unknown { octets, .. } => buffer.write_octets(octets),
        }

        let rdlength = usize_to_u16(buffer.index() - rdlength_index - 2)?;
        let [hi, lo] = rdlength.to_be_bytes();
        buffer.octets[rdlength_index] = hi;
        buffer.octets[rdlength_index + 1] = lo;

        Ok(())
    }
}

impl DomainName {
    /// Writes this name as length-prefixed labels, terminated by the
    /// zero-length root label. Never emits a compression pointer.
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        for label in &self.labels {
            buffer.write_u8(label.len());
            buffer.write_octets(label.octets());
        }
    }
}

/// Errors encountered when serialising a message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// A counter, or a length field, does not fit in the desired
    /// width.
    CounterTooLarge { counter: usize, bits: u32 },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::CounterTooLarge { counter, bits } => {
                write!(f, "'{counter}' cannot be converted to a u{bits}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A buffer which can be written to, for serialisation purposes.
pub struct WritableBuffer {
    pub octets: BytesMut,
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self {
            octets: BytesMut::with_capacity(512),
        }
    }
}

impl WritableBuffer {
    pub fn index(&self) -> usize {
        self.octets.len()
    }

    pub fn write_u8(&mut self, octet: u8) {
        self.octets.put_u8(octet);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_octets(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_octets(&value.to_be_bytes());
    }

    pub fn write_octets(&mut self, octets: &[u8]) {
        self.octets.put_slice(octets);
    }
}

/// # Errors
///
/// If the value cannot be converted.
fn usize_to_u16(counter: usize) -> Result<u16, Error> {
    u16::try_from(counter).map_err(|_| Error::CounterTooLarge {
        counter,
        bits: u16::BITS,
    })
}

/// # Errors
///
/// If the value cannot be converted.
fn usize_to_u8(counter: usize) -> Result<u8, Error> {
    u8::try_from(counter).map_err(|_| Error::CounterTooLarge {
        counter,
        bits: u8::BITS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::test_util::*;

    #[test]
    #[rustfmt::skip]
    fn test_never_compresses_names() {
        let mut buf = WritableBuffer::default();
        domain("www.example.com.").serialise(&mut buf);
        domain("www.example.com.").serialise(&mut buf);

        assert_eq!(
            vec![
                // domain 1
                3, 119, 119, 119, // "www"
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
                // domain 2, written out in full again
                3, 119, 119, 119, // "www"
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
            ],
            buf.octets,
        );
    }

    #[test]
    fn test_sets_rdlength() {
        let mut buf = WritableBuffer::default();
        let rr = srv_record("s1._mdnstest._tcp.local.", 0, 0, 7623, "myhost.local.", 120);
        rr.serialise(&mut buf).unwrap();

        // NAME (3+10+6+4+1 = "s1"/"_mdnstest"/"_tcp"/"local")
        let mut expect = vec![
            2, b's', b'1',
            9, b'_', b'm', b'd', b'n', b's', b't', b'e', b's', b't',
            4, b'_', b't', b'c', b'p',
            5, b'l', b'o', b'c', b'a', b'l',
            0,
        ];
        // TYPE = SRV(33)
        expect.extend_from_slice(&[0, 33]);
        // CLASS = IN, cache-flush set
        expect.extend_from_slice(&[0b1000_0000, 1]);
        // TTL = 120
        expect.extend_from_slice(&120u32.to_be_bytes());
        // RDLENGTH = 6 (priority+weight+port) + len("myhost.local.")
        let target_len = 1 + 6 + 1 + 5 + 1; // 6"myhost" 5"local" root
        expect.extend_from_slice(&((6 + target_len) as u16).to_be_bytes());
        expect.extend_from_slice(&[0, 0]); // priority
        expect.extend_from_slice(&[0, 0]); // weight
        expect.extend_from_slice(&7623u16.to_be_bytes());
        expect.extend_from_slice(&[
            6, b'm', b'y', b'h', b'o', b's', b't',
            5, b'l', b'o', b'c', b'a', b'l',
            0,
        ]);

        assert_eq!(expect, buf.octets);
    }

    #[test]
    fn test_txt_empty_entries_zero_rdlength() {
        let mut buf = WritableBuffer::default();
        let rr = txt_record("s1._mdnstest._tcp.local.", vec![], 4500);
        rr.serialise(&mut buf).unwrap();

        // last two bytes before RDATA (which is empty) are RDLENGTH = 0
        assert_eq!(&buf.octets[buf.octets.len() - 2..], &[0, 0]);
    }

    #[test]
    fn test_txt_joins_key_and_value_with_equals() {
        let mut buf = WritableBuffer::default();
        let rr = txt_record("s1._mdnstest._tcp.local.", vec![("ip", "127.0.0.1")], 4500);
        rr.serialise(&mut buf).unwrap();

        let entry_len = "ip=127.0.0.1".len();
        assert_eq!(buf.octets[buf.octets.len() - entry_len - 1], entry_len as u8);
        assert_eq!(
            &buf.octets[buf.octets.len() - entry_len..],
            b"ip=127.0.0.1"
        );
    }

    #[test]
    fn test_cache_flush_bit_is_high_bit_of_class() {
        let mut buf = WritableBuffer::default();
        let rr = a_record("host.local.", std::net::Ipv4Addr::new(127, 0, 0, 1), 120, true);
        rr.serialise(&mut buf).unwrap();

        // NAME "host.local." = 5+1+5+1+1 = 13 bytes, then TYPE (2), then CLASS (2)
        let name_len = 1 + 4 + 1 + 5 + 1;
        let class_offset = name_len + 2;
        assert_eq!(buf.octets[class_offset], 0b1000_0000);
        assert_eq!(buf.octets[class_offset + 1], 1);
    }
}
