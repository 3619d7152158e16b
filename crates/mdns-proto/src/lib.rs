#![warn(clippy::pedantic)]
// False positives for `bytes::Bytes`.
#![allow(clippy::mutable_key_type)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::wildcard_imports)]

//! Wire-format types and codec for Multicast DNS / DNS-SD messages
//! (RFC 1035 section 4, with the RFC 6762 multicast extensions:
//! cache-flush and unicast-response bits).

pub mod protocol;
