use std::collections::HashMap;

use crate::{error::ResolveError, ChainId};

/// Base URIs of the blockchain nodes, keyed by chain identifier.
///
/// Built once from configuration and only read afterwards, so it is shared
/// between concurrent deliveries without locking. Identifiers configured with
/// an empty URI are left out and resolve as unknown.
#[derive(Debug, Clone, Default)]
pub struct ChainUriTable {
    uris: HashMap<ChainId, String>,
}

impl ChainUriTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<ChainId>,
        V: Into<String>,
    {
        let uris = entries
            .into_iter()
            .map(|(id, uri)| (id.into(), uri.into()))
            .filter(|(_, uri)| !uri.is_empty())
            .collect();

        Self { uris }
    }

    pub fn lookup(&self, chain: &str) -> Option<&str> {
        self.uris.get(chain).map(String::as_str)
    }

    /// Appends `data` to the base URI of `chain`. Plain concatenation, the
    /// request data carries its own leading slash and query string.
    pub fn url_for(&self, chain: &str, data: &str) -> Result<String, ResolveError> {
        self.lookup(chain)
            .map(|base| format!("{base}{data}"))
            .ok_or_else(|| ResolveError::UnknownChain(chain.to_string()))
    }

    pub fn chain_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.uris.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}
