//! Ordered instrument registry.
//!
//! Dispatch is first match in registration order, not best match: the order
//! variants are registered in is their priority. [`RegistryBuilder::build`]
//! refuses orderings in which a variant could never be selected.

use log::debug;
use once_cell::sync::Lazy;

use super::{variants, Identity, Instrument};
use crate::error::{Error, Result};
use crate::header::Header;

pub struct Registry {
    variants: Vec<Box<dyn Instrument>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// First variant recognising the file, with its position in the registry.
    pub fn find(&self, identity: &Identity<'_>, header: &Header) -> Option<(usize, &dyn Instrument)> {
        let found = self
            .variants
            .iter()
            .enumerate()
            .find(|(_, v)| v.identifier(identity, header))
            .map(|(i, v)| (i, v.as_ref()));
        match found {
            Some((i, v)) => debug!("matched instrument {} (priority {i})", v.name()),
            None => debug!("no instrument matches {identity:?}"),
        }
        found
    }

    /// Variant names in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Instrument> {
        self.variants
            .iter()
            .find(|v| v.name() == name)
            .map(|v| v.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Instrument> {
        self.variants.iter().map(|v| v.as_ref())
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    variants: Vec<Box<dyn Instrument>>,
}

impl RegistryBuilder {
    /// Append a variant at the lowest priority so far.
    pub fn register(mut self, variant: impl Instrument + 'static) -> Self {
        self.variants.push(Box::new(variant));
        self
    }

    pub fn register_all<I: Instrument + 'static>(
        mut self,
        variants: impl IntoIterator<Item = I>,
    ) -> Self {
        for variant in variants {
            self.variants.push(Box::new(variant));
        }
        self
    }

    /// Check names are unique and that no variant is shadowed by an earlier
    /// one matching everything it matches. Custom predicates are opaque and
    /// only shadowed by an earlier catch-all.
    pub fn build(self) -> Result<Registry> {
        for (j, later) in self.variants.iter().enumerate() {
            for earlier in &self.variants[..j] {
                if earlier.name() == later.name() {
                    return Err(Error::DuplicateVariant(later.name().to_string()));
                }
                let Some(broad) = earlier.match_criteria() else {
                    continue;
                };
                let shadowed = match later.match_criteria() {
                    Some(narrow) => broad.covers(narrow),
                    None => broad.is_catch_all(),
                };
                if shadowed {
                    return Err(Error::UnreachableVariant {
                        shadowed: later.name().to_string(),
                        by: earlier.name().to_string(),
                    });
                }
            }
        }
        Ok(Registry {
            variants: self.variants,
        })
    }
}

static BUILTIN: Lazy<Registry> = Lazy::new(|| {
    Registry::builder()
        .register_all(variants::all())
        .build()
        .expect("built-in instrument registry is well ordered")
});

/// The built-in registry of all supported instruments.
pub fn builtin() -> &'static Registry {
    &BUILTIN
}
