use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use super::codec::{get_str, put_str, Codec, DecodeError, Result};
use crate::rules::{Rule, RuleSet, MAX_KEY_LEN};
use crate::types::ConnectionId;

/// Longest textual address accepted in a relay request.
pub const MAX_ADDRESS_LEN: usize = 64;

/// Leading byte of every lobby message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageTag {
    /// Client asks the master for servers
    Query = 0x60,
    /// Full server record(s)
    SetServer = 0x61,
    /// Server summaries carrying only matched rules
    UpdateServer = 0x62,
    /// Client withdraws its listing
    DelistServer = 0x63,
    /// NAT-traversal introduction, in either direction
    RelayNotification = 0x64,
}

impl TryFrom<u8> for MessageTag {
    type Error = u8;

    fn try_from(byte: u8) -> std::result::Result<Self, u8> {
        match byte {
            0x60 => Ok(Self::Query),
            0x61 => Ok(Self::SetServer),
            0x62 => Ok(Self::UpdateServer),
            0x63 => Ok(Self::DelistServer),
            0x64 => Ok(Self::RelayNotification),
            other => Err(other),
        }
    }
}

/// Wire form of a server: identity header plus a count-prefixed rule list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Connection identifier of the server
    pub identity: ConnectionId,

    /// Advertised game address
    pub address: SocketAddr,

    /// Rules carried by this entry
    pub rules: RuleSet,
}

impl Codec for ServerEntry {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        let identity = ConnectionId::new(u64::decode(buf)?);
        let address = SocketAddr::decode(buf)?;
        let count = u16::decode(buf)?;
        let mut rules = RuleSet::new();
        for _ in 0..count {
            let rule = Rule::decode(buf)?;
            // Reserved keys from peers are dropped here.
            rules.set_rule(&rule.key, rule.text.as_deref(), rule.int);
        }
        Ok(Self {
            identity,
            address,
            rules,
        })
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64(self.identity.get());
        self.address.encode(buf);
        put_count(buf, self.rules.len());
        for rule in self.rules.iter().take(usize::from(u16::MAX)) {
            rule.encode(buf);
        }
    }
}

/// Messages the master role accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToMaster {
    /// Request a listing; empty `keys` asks for every server
    Query { keys: Vec<String> },

    /// Register or refresh the sender's server record
    SetServer(ServerEntry),

    /// Remove the sender's listing
    DelistServer { port: u16 },

    /// Ask the master to introduce the sender to a listed server
    RelayRequest {
        requester_port: u16,
        target_port: u16,
        target_address: String,
    },
}

impl ToMaster {
    /// Tag this message is sent with
    #[must_use]
    pub const fn tag(&self) -> MessageTag {
        match self {
            Self::Query { .. } => MessageTag::Query,
            Self::SetServer(_) => MessageTag::SetServer,
            Self::DelistServer { .. } => MessageTag::DelistServer,
            Self::RelayRequest { .. } => MessageTag::RelayNotification,
        }
    }

    /// Decode a packet; `Ok(None)` means the packet is not a master message
    pub fn decode(payload: &[u8]) -> std::result::Result<Option<Self>, DecodeError> {
        let mut buf = payload;
        let Some(tag) = read_tag(&mut buf) else {
            return Ok(None);
        };

        let message = match tag {
            MessageTag::Query => {
                let mut keys = Vec::new();
                while buf.has_remaining() {
                    let key = get_str(&mut buf, MAX_KEY_LEN)?;
                    if key.is_empty() {
                        break;
                    }
                    keys.push(key);
                }
                Self::Query { keys }
            }
            MessageTag::SetServer => Self::SetServer(ServerEntry::decode(&mut buf)?),
            MessageTag::DelistServer => Self::DelistServer {
                port: u16::decode(&mut buf)?,
            },
            MessageTag::RelayNotification => Self::RelayRequest {
                requester_port: u16::decode(&mut buf)?,
                target_port: u16::decode(&mut buf)?,
                target_address: get_str(&mut buf, MAX_ADDRESS_LEN)?,
            },
            MessageTag::UpdateServer => return Ok(None),
        };
        Ok(Some(message))
    }

    /// Encode into a packet
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(self.tag() as u8);
        match self {
            Self::Query { keys } => {
                for key in keys {
                    put_str(&mut buf, key);
                }
            }
            Self::SetServer(entry) => entry.encode(&mut buf),
            Self::DelistServer { port } => buf.put_u16(*port),
            Self::RelayRequest {
                requester_port,
                target_port,
                target_address,
            } => {
                buf.put_u16(*requester_port);
                buf.put_u16(*target_port);
                put_str(&mut buf, target_address);
            }
        }
        buf.freeze()
    }
}

/// Messages the client role accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToClient {
    /// Every server with all of its rules; replaces the client's view
    FullListing(Vec<ServerEntry>),

    /// Matching servers with only their matched rules; merged into the client's view
    FilteredListing(Vec<ServerEntry>),

    /// A peer wants to connect to the receiving server
    RelayIntroduction {
        requester_address: String,
        requester_port: u16,
    },
}

impl ToClient {
    /// Tag this message is sent with
    #[must_use]
    pub const fn tag(&self) -> MessageTag {
        match self {
            Self::FullListing(_) => MessageTag::SetServer,
            Self::FilteredListing(_) => MessageTag::UpdateServer,
            Self::RelayIntroduction { .. } => MessageTag::RelayNotification,
        }
    }

    /// Decode a packet; `Ok(None)` means the packet is not a client message
    pub fn decode(payload: &[u8]) -> std::result::Result<Option<Self>, DecodeError> {
        let mut buf = payload;
        let Some(tag) = read_tag(&mut buf) else {
            return Ok(None);
        };

        let message = match tag {
            MessageTag::SetServer => Self::FullListing(decode_entries(&mut buf)?),
            MessageTag::UpdateServer => Self::FilteredListing(decode_entries(&mut buf)?),
            MessageTag::RelayNotification => Self::RelayIntroduction {
                requester_address: get_str(&mut buf, MAX_ADDRESS_LEN)?,
                requester_port: u16::decode(&mut buf)?,
            },
            MessageTag::Query | MessageTag::DelistServer => return Ok(None),
        };
        Ok(Some(message))
    }

    /// Encode into a packet
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(self.tag() as u8);
        match self {
            Self::FullListing(entries) | Self::FilteredListing(entries) => {
                put_count(&mut buf, entries.len());
                for entry in entries.iter().take(usize::from(u16::MAX)) {
                    entry.encode(&mut buf);
                }
            }
            Self::RelayIntroduction {
                requester_address,
                requester_port,
            } => {
                put_str(&mut buf, requester_address);
                buf.put_u16(*requester_port);
            }
        }
        buf.freeze()
    }
}

fn read_tag(buf: &mut &[u8]) -> Option<MessageTag> {
    let byte = u8::decode(buf).ok()?;
    MessageTag::try_from(byte).ok()
}

fn decode_entries<B: Buf>(buf: &mut B) -> Result<Vec<ServerEntry>> {
    let count = u16::decode(buf)?;
    (0..count).map(|_| ServerEntry::decode(buf)).collect()
}

fn put_count<B: BufMut>(buf: &mut B, count: usize) {
    buf.put_u16(u16::try_from(count).unwrap_or(u16::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64) -> ServerEntry {
        let mut rules = RuleSet::new();
        rules.set_rule("map", Some("harbor"), None);
        rules.set_rule("players", None, Some(12));
        ServerEntry {
            identity: ConnectionId::new(id),
            address: "192.0.2.10:27015".parse().unwrap(),
            rules,
        }
    }

    #[test]
    fn test_query_layout() {
        let bytes = ToMaster::Query {
            keys: vec!["map".into(), "region".into()],
        }
        .encode();
        assert_eq!(bytes[0], 0x60);
        assert_eq!(&bytes[1..6], &[0, 3, b'm', b'a', b'p']);

        let decoded = ToMaster::decode(&bytes).unwrap().unwrap();
        assert_eq!(
            decoded,
            ToMaster::Query {
                keys: vec!["map".into(), "region".into()]
            }
        );
    }

    #[test]
    fn test_query_stops_at_empty_key() {
        let mut raw = vec![0x60, 0, 1, b'a', 0, 0, 0, 1, b'b'];
        let decoded = ToMaster::decode(&raw).unwrap().unwrap();
        assert_eq!(decoded, ToMaster::Query { keys: vec!["a".into()] });

        raw.truncate(1);
        let decoded = ToMaster::decode(&raw).unwrap().unwrap();
        assert_eq!(decoded, ToMaster::Query { keys: vec![] });
    }

    #[test]
    fn test_query_rejects_oversized_key() {
        let bytes = ToMaster::Query {
            keys: vec!["k".repeat(MAX_KEY_LEN + 1)],
        }
        .encode();
        assert!(ToMaster::decode(&bytes).is_err());
    }

    #[test]
    fn test_set_server_drops_reserved_rules() {
        let mut with_reserved = entry(5);
        with_reserved.rules.set_internal("Ping", None, Some(1));
        let bytes = ToMaster::SetServer(with_reserved).encode();

        let Some(ToMaster::SetServer(decoded)) = ToMaster::decode(&bytes).unwrap() else {
            panic!("expected SetServer");
        };
        assert_eq!(decoded, entry(5));
    }

    #[test]
    fn test_truncated_set_server_is_an_error() {
        let bytes = ToMaster::SetServer(entry(5)).encode();
        let cut = &bytes[..bytes.len() - 3];
        assert_eq!(ToMaster::decode(cut), Err(DecodeError::UnexpectedEnd));
    }

    #[test]
    fn test_listing_tags() {
        let full = ToClient::FullListing(vec![entry(1), entry(2)]).encode();
        let filtered = ToClient::FilteredListing(vec![entry(3)]).encode();
        assert_eq!(full[0], MessageTag::SetServer as u8);
        assert_eq!(filtered[0], MessageTag::UpdateServer as u8);

        match ToClient::decode(&full).unwrap() {
            Some(ToClient::FullListing(entries)) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        match ToClient::decode(&filtered).unwrap() {
            Some(ToClient::FilteredListing(entries)) => assert_eq!(entries[0], entry(3)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_relay_shapes_differ_by_direction() {
        let request = ToMaster::RelayRequest {
            requester_port: 5000,
            target_port: 27015,
            target_address: "192.0.2.10".into(),
        };
        let decoded = ToMaster::decode(&request.encode()).unwrap();
        assert_eq!(decoded, Some(request));

        let intro = ToClient::RelayIntroduction {
            requester_address: "198.51.100.4".into(),
            requester_port: 5000,
        };
        let decoded = ToClient::decode(&intro.encode()).unwrap();
        assert_eq!(decoded, Some(intro));
    }

    #[test]
    fn test_foreign_packets_pass_through() {
        assert_eq!(ToMaster::decode(&[]).unwrap(), None);
        assert_eq!(ToMaster::decode(&[0x10, 1, 2]).unwrap(), None);
        assert_eq!(ToClient::decode(&[0x60]).unwrap(), None);
        assert_eq!(ToMaster::decode(&[0x62, 0, 0]).unwrap(), None);
    }
}
