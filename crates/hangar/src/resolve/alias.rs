use std::collections::BTreeMap;

/// Wildcard character in alias targets, with SQL `LIKE` semantics.
pub const WILDCARD: char = '%';

/// Built-in aliases: abbreviated upstream tags to a canonical slug or a `%` pattern.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("890j", "890-jump"),
    ("hornet", "%hornet%"),
    ("msr", "mercury-star-runner"),
    ("mercury", "mercury-star-runner"),
    ("starfarer", "starfarer%"),
    ("cutlass", "cutlass-%"),
    ("herc", "%hercules%"),
    ("hercules", "%hercules%"),
    ("c2", "c2-hercules"),
    ("m2", "m2-hercules"),
    ("a2", "a2-hercules"),
    ("idris", "idris-%"),
    ("reclaimer", "reclaimer"),
    ("retaliator", "retaliator%"),
];

/// What an alias points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget<'a> {
    Slug(&'a str),
    Pattern(&'a str),
}

/// Fixed mapping from normalized tag to canonical slug or wildcard pattern.
///
/// Keys are stored normalized, so lookups use the resolver's normalized tag directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (tag, target) in DEFAULT_ALIASES {
            table.insert(tag, target);
        }
        table
    }
}

impl AliasTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace an alias. The tag is normalized before storing.
    pub fn insert(&mut self, tag: &str, target: &str) {
        self.entries
            .insert(super::normalize_paint(tag), target.trim().to_lowercase());
    }

    #[must_use]
    pub fn with_alias(mut self, tag: &str, target: &str) -> Self {
        self.insert(tag, target);
        self
    }

    pub fn get(&self, normalized_tag: &str) -> Option<AliasTarget<'_>> {
        self.entries.get(normalized_tag).map(|target| {
            if target.contains(WILDCARD) {
                AliasTarget::Pattern(target)
            } else {
                AliasTarget::Slug(target)
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Match `text` against a `LIKE`-style pattern where `%` is any run of characters.
pub fn like_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split(WILDCARD).collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = text.strip_prefix(first) else {
        return false;
    };

    let (last, middle) = match rest.split_last() {
        Some((last, middle)) => (*last, middle),
        None => return true,
    };

    for part in middle {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    remaining.len() >= last.len() && remaining.ends_with(last)
}
