//! Paged free-text search over entities.

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::error::EntityError;
use crate::types::{Entity, EntityId};

pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Metadata fields matched anywhere (case-insensitive).
pub const TEXT_FIELDS: [&str; 3] = ["name", "addressLine1", "addressLine2"];
/// Metadata field matched as a prefix (case-insensitive).
pub const PREFIX_FIELD: &str = "externalId";

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub size: usize,
    pub number: usize,
}

impl Page {
    /// `size <= 0` is rejected; `number < 1` is read as the first page.
    /// The resulting offset must fit in an `i64`.
    pub fn new(size: i64, number: i64) -> Result<Self, EntityError> {
        if size <= 0 {
            return Err(EntityError::BadRequest(format!(
                "page size must be positive, got {size}"
            )));
        }
        let number = number.max(1);
        if size.checked_mul(number - 1).is_none() {
            return Err(EntityError::BadRequest(format!(
                "page {number} of size {size} is out of range"
            )));
        }
        Ok(Self {
            size: size as usize,
            number: number as usize,
        })
    }

    /// Build from optional query values, falling back to the default size.
    pub fn from_query(limit: Option<i64>, page: Option<i64>) -> Result<Self, EntityError> {
        Self::new(limit.unwrap_or(DEFAULT_PAGE_SIZE), page.unwrap_or(1))
    }

    pub fn skip(&self) -> usize {
        self.size * (self.number - 1)
    }

    pub fn limit(&self) -> usize {
        self.size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub tenant_id: String,
    /// `Some` restricts to these IDs. An empty set matches nothing.
    pub entity_ids: Option<Vec<EntityId>>,
    pub entity_type: Option<String>,
    pub search_text: String,
    pub page: Page,
}

impl SearchQuery {
    pub fn new(tenant_id: impl Into<String>, page: Page) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            entity_ids: None,
            entity_type: None,
            search_text: String::new(),
            page,
        }
    }

    pub fn within(mut self, ids: Vec<EntityId>) -> Self {
        self.entity_ids = Some(ids);
        self
    }

    pub fn of_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }

    pub fn has_text(&self) -> bool {
        !self.search_text.trim().is_empty()
    }

    /// Escaped pattern for the user text, shared by both adapters.
    pub fn escaped_text(&self) -> String {
        regex::escape(self.search_text.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub data: Vec<Entity>,
    pub count: u64,
}

impl SearchPage {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            count: 0,
        }
    }
}

/// In-process evaluation of a search's text predicate.
pub struct TextMatcher {
    anywhere: Regex,
    prefix: Regex,
}

impl TextMatcher {
    pub fn new(query: &SearchQuery) -> Result<Option<Self>, EntityError> {
        if !query.has_text() {
            return Ok(None);
        }
        let escaped = query.escaped_text();
        let build = |pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| EntityError::BadRequest(format!("invalid search text: {e}")))
        };
        Ok(Some(Self {
            anywhere: build(&escaped)?,
            prefix: build(&format!("^{escaped}"))?,
        }))
    }

    pub fn matches(&self, e: &Entity) -> bool {
        let meta = &e.meta_information;
        TEXT_FIELDS
            .iter()
            .filter_map(|f| meta.get_str(f))
            .any(|v| self.anywhere.is_match(v))
            || self.prefix.is_match(&meta.external_id)
    }
}
