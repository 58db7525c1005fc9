//! Result registry - maps a response's `resultType` tag to its decoder.
//!
//! Each feature registers its result schema once, before the bridge is
//! started. The built registry is immutable and shared behind `Arc`, so adding
//! a new result kind never touches the decode path.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;

use crate::error::RegistryError;

/// A concrete response schema identified by a type tag.
///
/// Implementors should carry `#[serde(deny_unknown_fields)]`: the payload is
/// decoded strictly once the tag has told us exactly what to expect.
pub trait ResultSchema: DeserializeOwned {
    const RESULT_TYPE: &'static str;
}

/// Decodes the payload fields of a response (envelope keys already removed).
pub type Decoder<R> =
    Box<dyn Fn(serde_json::Value) -> Result<R, serde_json::Error> + Send + Sync + 'static>;

pub struct ResultRegistry<R> {
    decoders: HashMap<String, Decoder<R>>,
}

impl<R> ResultRegistry<R> {
    pub fn builder() -> RegistryBuilder<R> {
        RegistryBuilder {
            decoders: HashMap::new(),
        }
    }

    pub fn get(&self, result_type: &str) -> Option<&Decoder<R>> {
        self.decoders.get(result_type)
    }

    pub fn contains(&self, result_type: &str) -> bool {
        self.decoders.contains_key(result_type)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Registered tags, sorted.
    pub fn result_types(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl<R> fmt::Debug for ResultRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultRegistry")
            .field("result_types", &self.result_types())
            .finish()
    }
}

pub struct RegistryBuilder<R> {
    decoders: HashMap<String, Decoder<R>>,
}

impl<R: 'static> RegistryBuilder<R> {
    /// Register a schema type, wrapping decoded values into the result enum.
    ///
    /// ```ignore
    /// let registry = ResultRegistry::builder()
    ///     .register::<AutoCompleteResult>(LanguageResult::AutoComplete)?
    ///     .build();
    /// ```
    pub fn register<T>(
        self,
        wrap: impl Fn(T) -> R + Send + Sync + 'static,
    ) -> Result<Self, RegistryError>
    where
        T: ResultSchema + 'static,
    {
        self.register_decoder(T::RESULT_TYPE, move |payload| {
            serde_json::from_value::<T>(payload).map(&wrap)
        })
    }

    /// Register a hand-written decoder for `result_type`.
    pub fn register_decoder(
        mut self,
        result_type: impl Into<String>,
        decoder: impl Fn(serde_json::Value) -> Result<R, serde_json::Error> + Send + Sync + 'static,
    ) -> Result<Self, RegistryError> {
        let result_type = result_type.into();
        if result_type.is_empty() {
            return Err(RegistryError::EmptyResultType);
        }
        if self.decoders.contains_key(&result_type) {
            return Err(RegistryError::DuplicateResultType(result_type));
        }
        tracing::trace!(result_type = %result_type, "Registered result decoder");
        self.decoders.insert(result_type, Box::new(decoder));
        Ok(self)
    }

    pub fn build(self) -> ResultRegistry<R> {
        ResultRegistry {
            decoders: self.decoders,
        }
    }
}
