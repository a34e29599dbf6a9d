//! Descriptor cache keyed by caller-supplied signatures.
//!
//! A signature must uniquely determine the shape of the request it names.
//! The first options seen for a signature are the ones assembled and stored;
//! later lookups with the same signature return that descriptor even when
//! different options are passed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::assembler::{RequestAssembler, RequestDescriptor};
use crate::error::Result;
use crate::options::RequestOptions;

/// Opaque key naming a request shape. Never sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Signature {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Signature {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub struct DescriptorCache {
    entries: Mutex<HashMap<Signature, Arc<RequestDescriptor>>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the descriptor stored for `signature`, assembling and storing
    /// it from `options` on first use. Assembly failures are not cached.
    pub fn get_or_build(
        &self,
        signature: &Signature,
        options: &RequestOptions,
        assembler: &RequestAssembler,
    ) -> Result<Arc<RequestDescriptor>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(descriptor) = entries.get(signature) {
            return Ok(Arc::clone(descriptor));
        }

        tracing::debug!(%signature, "assembling request descriptor");
        let descriptor = Arc::new(assembler.assemble(options)?);
        entries.insert(signature.clone(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    pub fn get(&self, signature: &Signature) -> Option<Arc<RequestDescriptor>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(signature)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use url::Url;

    fn assembler() -> RequestAssembler {
        RequestAssembler::new(Url::parse("https://api.example.com/").unwrap())
    }

    fn options(path: &str) -> RequestOptions {
        RequestOptions::builder().path(path).build().unwrap()
    }

    #[test]
    fn second_lookup_returns_cached_descriptor() {
        let cache = DescriptorCache::new();
        let signature = Signature::from("users");

        let first = cache.get_or_build(&signature, &options("users"), &assembler()).unwrap();
        let second = cache.get_or_build(&signature, &options("users"), &assembler()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn first_options_win_for_a_signature() {
        let cache = DescriptorCache::new();
        let signature = Signature::from("shared");

        cache.get_or_build(&signature, &options("first"), &assembler()).unwrap();
        let again = cache.get_or_build(&signature, &options("second"), &assembler()).unwrap();

        assert_eq!(again.url(), "https://api.example.com/first");
    }

    #[test]
    fn assembly_failures_are_not_cached() {
        let cache = DescriptorCache::new();
        let signature = Signature::from("bad");
        let bad = RequestOptions::builder().path("a").header("X", "").build().unwrap();

        assert!(cache.get_or_build(&signature, &bad, &assembler()).is_err());
        assert!(cache.is_empty());
        assert!(cache.get(&signature).is_none());
    }

    #[test]
    fn concurrent_lookups_store_one_descriptor() {
        let cache = Arc::new(DescriptorCache::new());
        let assembler = Arc::new(assembler());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let assembler = Arc::clone(&assembler);
                thread::spawn(move || {
                    cache
                        .get_or_build(&Signature::from("race"), &options("race"), &assembler)
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let stored = cache.get(&Signature::from("race")).unwrap();

        assert_eq!(cache.len(), 1);
        assert!(results.iter().all(|d| Arc::ptr_eq(d, &stored)));
    }
}
