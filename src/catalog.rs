//! Letter categories and tenancy subtypes
//!
//! The category list comes from the backend as a map of category key to the
//! subtype directories it holds. Only `possession` asks the person which kind
//! of tenancy applies; every other category uses the implicit `root` subtype.

use crate::backend::BackendError;
use crate::runtime::DraftingBackend;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The one category that needs a tenancy-type distinction
pub const POSSESSION: &str = "possession";

/// A category identifier as the backend knows it (e.g. `possession`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the person must pick a tenancy type before describing their case
    pub fn requires_subtype(&self) -> bool {
        self.0 == POSSESSION
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secondary classifier narrowing a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subtype {
    #[serde(rename = "private")]
    Private,
    #[serde(rename = "local")]
    LocalAuthority,
    /// Implicit default for categories without a tenancy distinction
    #[serde(rename = "root")]
    Root,
}

impl Subtype {
    /// Choices offered for `possession`, in display order
    pub const CHOICES: [Subtype; 2] = [Subtype::Private, Subtype::LocalAuthority];

    /// Value sent to the backend
    pub fn wire_name(self) -> &'static str {
        match self {
            Subtype::Private => "private",
            Subtype::LocalAuthority => "local",
            Subtype::Root => "root",
        }
    }

    /// Text echoed into the transcript when the person picks this subtype
    pub fn label(self) -> &'static str {
        match self {
            Subtype::Private => "Private Tenancy",
            Subtype::LocalAuthority => "Local Authority Tenancy",
            Subtype::Root => "General",
        }
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A selectable category with its display label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
    pub category: Category,
    pub label: String,
    /// Subtype directories the backend holds for this category
    pub subtypes: Vec<String>,
}

impl CategoryEntry {
    /// Whether the backend has templates for `subtype`. An empty listing
    /// means the backend did not say, so every choice is allowed.
    pub fn offers(&self, subtype: Subtype) -> bool {
        self.subtypes.is_empty() || self.subtypes.iter().any(|s| s == subtype.wire_name())
    }

    /// Tenancy types to offer, in display order
    pub fn subtype_choices(&self) -> Vec<Subtype> {
        Subtype::CHOICES
            .into_iter()
            .filter(|subtype| self.offers(*subtype))
            .collect()
    }
}

/// Finite set of categories valid for this session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCatalog {
    entries: Vec<CategoryEntry>,
}

impl CategoryCatalog {
    /// Build from the backend's `{category: [subtype, ...]}` listing.
    ///
    /// Entries are ordered by key so the numbered choices are stable.
    pub fn from_listing(listing: BTreeMap<String, Vec<String>>) -> Self {
        let entries = listing
            .into_iter()
            .map(|(key, subtypes)| CategoryEntry {
                label: format_label(&key),
                category: Category::new(key),
                subtypes,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CategoryEntry> {
        self.entries.iter().find(|e| e.category.as_str() == key)
    }
}

/// Load the category listing, logging why it failed if it did
pub async fn fetch_catalog<B: DraftingBackend + ?Sized>(
    backend: &B,
) -> Result<CategoryCatalog, BackendError> {
    match backend.categories().await {
        Ok(listing) => {
            let catalog = CategoryCatalog::from_listing(listing);
            if catalog.is_empty() {
                tracing::warn!("Backend offered no letter categories");
            }
            Ok(catalog)
        }
        Err(e) => {
            tracing::error!(kind = ?e.kind, error = %e.message, "Failed to load categories");
            Err(e)
        }
    }
}

/// Turn a category key into a button label: `rent_arrears` -> `Rent Arrears`
pub fn format_label(key: &str) -> String {
    let mut label = String::with_capacity(key.len());
    let mut at_word_start = true;
    for c in key.chars() {
        let c = if c == '_' { ' ' } else { c };
        if at_word_start && c.is_alphanumeric() {
            label.extend(c.to_uppercase());
        } else {
            label.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    label
}
