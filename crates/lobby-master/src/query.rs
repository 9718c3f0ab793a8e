//! Query engine: matches a requested-key filter against the registry.
//!
//! An empty filter asks for a full listing (every server, every rule). A
//! non-empty filter returns only servers holding at least one requested key,
//! each carrying just the requested rules it actually has.

use indexmap::IndexMap;

use lobby_core::{is_reserved_key, ConnectionId, Registry, RuleSet, ServerEntry, ToClient};

/// A server that matched a filtered query
///
/// `matched` ranks servers on the master side only; the UPDATE_SERVER
/// listing carries just the entry, so clients count matched rules themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMatch {
    /// Identity, address and the matched subset of rules
    pub entry: ServerEntry,
    /// Number of requested keys the server matched (repeated keys count again)
    pub matched: usize,
}

/// Result of running a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Every assigned server with all of its rules
    Full(Vec<ServerEntry>),
    /// Servers with at least one requested key
    Filtered(Vec<QueryMatch>),
}

impl Listing {
    /// Number of servers in the listing
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Full(entries) => entries.len(),
            Self::Filtered(matches) => matches.len(),
        }
    }

    /// Returns true if no server is listed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Response message: full listings go out as SET_SERVER, filtered as UPDATE_SERVER
    #[must_use]
    pub fn into_message(self) -> ToClient {
        match self {
            Self::Full(entries) => ToClient::FullListing(entries),
            Self::Filtered(matches) => {
                ToClient::FilteredListing(matches.into_iter().map(|m| m.entry).collect())
            }
        }
    }
}

/// Run a query over `registry`.
///
/// Keys after the first empty key are ignored. Reserved keys never match.
/// Servers appear in the order they first matched, which follows registry
/// order for each key in turn.
#[must_use]
pub fn run_query(registry: &Registry, keys: &[String]) -> Listing {
    let keys: Vec<&str> = keys
        .iter()
        .map(String::as_str)
        .take_while(|key| !key.is_empty())
        .collect();

    if keys.is_empty() {
        let entries = registry
            .iter()
            .filter(|record| record.is_assigned())
            .map(lobby_core::ServerRecord::to_entry)
            .collect();
        return Listing::Full(entries);
    }

    let requested: Vec<&str> = keys.into_iter().filter(|key| !is_reserved_key(key)).collect();

    let mut found: IndexMap<ConnectionId, usize> = IndexMap::new();
    for key in &requested {
        for record in registry.iter().filter(|record| record.is_assigned()) {
            if record.rules.contains(key) {
                *found.entry(record.identity).or_insert(0) += 1;
            }
        }
    }

    let matches = found
        .into_iter()
        .filter_map(|(identity, matched)| {
            let record = registry.find(identity)?;
            let mut rules = RuleSet::new();
            for key in &requested {
                if let Some(rule) = record.rules.find_rule(key) {
                    rules.set_rule(&rule.key, rule.text.as_deref(), rule.int);
                }
            }
            Some(QueryMatch {
                entry: ServerEntry {
                    identity,
                    address: record.address,
                    rules,
                },
                matched,
            })
        })
        .collect();

    Listing::Filtered(matches)
}
