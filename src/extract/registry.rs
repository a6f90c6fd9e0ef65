//! Format key to tokenizer mapping.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use crate::error::{ImportError, ImportResult};

use super::Extractor;
use super::csv::{DelimitedOptions, DelimitedTokenizer};

/// Builds a tokenizer over an opened input.
pub type TokenizerFactory =
    Box<dyn Fn(Box<dyn Read>) -> ImportResult<Box<dyn Extractor>> + Send + Sync>;

/// Registered tokenizer constructors, keyed by lower-case format key (usually a file
/// extension).
///
/// Build one at startup and hand it to [`super::FileSource`]; tests can build their own.
#[derive(Default)]
pub struct FormatRegistry {
    factories: BTreeMap<String, TokenizerFactory>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in formats: `csv`, `tsv`, and (feature `excel`) the workbook
    /// extensions `xlsx`, `xls`, `xlsm`, `xlsb`, `ods`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register_delimited("csv", DelimitedOptions::default());
        registry.register_delimited("tsv", DelimitedOptions::tsv());

        #[cfg(feature = "excel")]
        for key in ["xlsx", "xls", "xlsm", "xlsb", "ods"] {
            registry.register(key, |input| {
                let tokenizer = super::excel::WorkbookTokenizer::from_reader(input, None)?;
                Ok(Box::new(tokenizer) as Box<dyn Extractor>)
            });
        }

        registry
    }

    /// Register (or replace) the factory for `key`. Keys are case-insensitive.
    pub fn register<F>(&mut self, key: &str, factory: F) -> &mut Self
    where
        F: Fn(Box<dyn Read>) -> ImportResult<Box<dyn Extractor>> + Send + Sync + 'static,
    {
        self.factories
            .insert(key.to_ascii_lowercase(), Box::new(factory));
        self
    }

    /// Register a delimited-text dialect under `key`.
    pub fn register_delimited(&mut self, key: &str, options: DelimitedOptions) -> &mut Self {
        self.register(key, move |input| {
            Ok(Box::new(DelimitedTokenizer::with_options(input, options)) as Box<dyn Extractor>)
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(&key.to_ascii_lowercase())
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Look up the factory for `key`.
    pub fn factory(&self, key: &str) -> ImportResult<&TokenizerFactory> {
        self.factories
            .get(&key.to_ascii_lowercase())
            .ok_or_else(|| ImportError::UnsupportedFormat {
                key: key.to_string(),
            })
    }

    /// Build the tokenizer registered for `key` over `input`.
    pub fn tokenizer(&self, key: &str, input: Box<dyn Read>) -> ImportResult<Box<dyn Extractor>> {
        (self.factory(key)?)(input)
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
