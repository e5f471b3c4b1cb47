//! Key extractor registry
//!
//! Maps capabilities (a concrete type, or any predicate over `&dyn Any`) to
//! functions producing a cache key from a matching value. Lookup walks the
//! registry in registration order and the first matching capability wins.

use std::any::{type_name, Any, TypeId};
use std::fmt;

use crate::key::CacheKey;

type Matcher = Box<dyn Fn(&dyn Any) -> bool + Send + Sync>;
type Extractor = Box<dyn Fn(&dyn Any) -> Option<String> + Send + Sync>;

/// Describes which values an extractor applies to
pub struct Capability {
    name: String,
    matches: Matcher,
}

impl Capability {
    /// Values of exactly type `T`
    pub fn of<T: Any>() -> Self {
        Self {
            name: type_name::<T>().to_string(),
            matches: Box::new(|value| value.is::<T>()),
        }
    }

    /// Values accepted by an arbitrary predicate
    ///
    /// Use this to group several concrete types behind one "interface", e.g.
    /// every type implementing a trait the caller cares about.
    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&dyn Any) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            matches: Box::new(predicate),
        }
    }

    /// Human-readable capability name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `value` satisfies this capability
    pub fn matches(&self, value: &dyn Any) -> bool {
        (self.matches)(value)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability").field("name", &self.name).finish()
    }
}

struct KeyExtractor {
    capability: Capability,
    extract: Extractor,
}

/// Ordered capability -> key extractor mapping
#[derive(Default)]
pub struct KeyExtractorRegistry {
    extractors: Vec<KeyExtractor>,
}

impl KeyExtractorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor for values of type `T`
    pub fn register<T, F>(&mut self, extract: F) -> &mut Self
    where
        T: Any,
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.register_capability(Capability::of::<T>(), move |value| {
            value.downcast_ref::<T>().map(&extract)
        })
    }

    /// Register an extractor against an arbitrary capability
    ///
    /// The extractor is only called for values the capability matches. A
    /// `None` from the extractor means "no key" and does not fall through to
    /// later entries.
    pub fn register_capability<F>(&mut self, capability: Capability, extract: F) -> &mut Self
    where
        F: Fn(&dyn Any) -> Option<String> + Send + Sync + 'static,
    {
        self.extractors.push(KeyExtractor {
            capability,
            extract: Box::new(extract),
        });
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<T, F>(mut self, extract: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.register::<T, F>(extract);
        self
    }

    /// Builder-style [`register_capability`](Self::register_capability)
    pub fn with_capability<F>(mut self, capability: Capability, extract: F) -> Self
    where
        F: Fn(&dyn Any) -> Option<String> + Send + Sync + 'static,
    {
        self.register_capability(capability, extract);
        self
    }

    /// Derive a raw key from a structured value
    ///
    /// Scalars never have a derivable key, whatever is registered.
    pub fn derive(&self, value: &dyn Any) -> Option<String> {
        if is_scalar(value) {
            return None;
        }

        self.extractors
            .iter()
            .find(|entry| entry.capability.matches(value))
            .and_then(|entry| (entry.extract)(value))
    }

    /// Resolve the sanitized key for `value`
    ///
    /// An explicit key always wins over derivation. Returns `None` when no key
    /// can be produced or the produced key has no safe file name.
    pub fn resolve_key(&self, value: &dyn Any, explicit: Option<&str>) -> Option<CacheKey> {
        match explicit {
            Some(key) => CacheKey::sanitize(key),
            None => self.derive(value).and_then(|key| CacheKey::sanitize(&key)),
        }
    }

    /// Registered capability names, in lookup order
    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.extractors.iter().map(|entry| entry.capability.name())
    }

    /// Number of registered extractors
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Whether no extractor is registered
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl fmt::Debug for KeyExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.capabilities()).finish()
    }
}

/// Whether `value` is a bare scalar with no structure to derive a key from
pub fn is_scalar(value: &dyn Any) -> bool {
    let scalars = [
        TypeId::of::<()>(),
        TypeId::of::<bool>(),
        TypeId::of::<char>(),
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
        TypeId::of::<String>(),
        TypeId::of::<&'static str>(),
    ];

    let id = value.type_id();
    scalars.contains(&id)
}
