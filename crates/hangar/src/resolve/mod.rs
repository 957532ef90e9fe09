//! Entity resolution: free-text tags to canonical vehicle ids.
//!
//! Resolution is pure and deterministic. Candidates are loaded once per category and
//! kept sorted by slug, so every step yields its matches in ascending slug order.
//!
//! Steps, first non-empty result wins:
//! 1. normalize the tag, stripping paint prefix and suffix tokens
//! 2. alias table (a `%` pattern may return several matches)
//! 3. exact slug
//! 4. slug prefix (all matches)
//! 5. display-name substring (all matches)

mod alias;

pub use alias::{AliasTable, AliasTarget, WILDCARD, like_match};

use uuid::Uuid;

const STRIP_PREFIXES: &[&str] = &["paint_", "paint-"];
const STRIP_SUFFIXES: &[&str] = &["_paint", "-paint"];
const SEPARATORS: &[char] = &['_', ' ', '.', '/', '\\', '-'];

/// Canonical separator in normalized tags and slugs.
pub const CANONICAL_SEPARATOR: char = '-';

/// Normalize a name or slug.
///
/// Lowercases, maps separator characters to `-`, collapses runs of separators and trims
/// them from both ends.
pub fn normalize(text: &str) -> String {
    collapse_separators(&text.trim().to_lowercase())
}

/// Normalize a paint class name or vehicle tag from the paint corpus.
///
/// Same as [`normalize`] after stripping one `paint_` prefix and one `_paint` suffix.
pub fn normalize_paint(tag: &str) -> String {
    let mut lowered = tag.trim().to_lowercase();

    for prefix in STRIP_PREFIXES {
        if let Some(rest) = lowered.strip_prefix(prefix) {
            lowered = rest.to_string();
            break;
        }
    }
    for suffix in STRIP_SUFFIXES {
        if let Some(rest) = lowered.strip_suffix(suffix) {
            lowered = rest.to_string();
            break;
        }
    }

    collapse_separators(&lowered)
}

fn collapse_separators(lowered: &str) -> String {
    let mut out = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if SEPARATORS.contains(&c) {
            if !out.is_empty() && !out.ends_with(CANONICAL_SEPARATOR) {
                out.push(CANONICAL_SEPARATOR);
            }
        } else {
            out.push(c);
        }
    }
    while out.ends_with(CANONICAL_SEPARATOR) {
        out.pop();
    }
    out
}

/// A vehicle the resolver can match against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

/// Which step produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Alias,
    ExactSlug,
    Prefix,
    NameContains,
}

/// Result of resolving one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub ids: Vec<Uuid>,
    pub kind: Option<MatchKind>,
}

impl Resolution {
    fn none() -> Self {
        Self {
            ids: Vec::new(),
            kind: None,
        }
    }

    pub fn is_unmatched(&self) -> bool {
        self.ids.is_empty()
    }

    /// The first id, for callers that link to a single record.
    pub fn first(&self) -> Option<Uuid> {
        self.ids.first().copied()
    }
}

/// Resolves tags against a fixed candidate set.
#[derive(Debug, Clone)]
pub struct Resolver {
    candidates: Vec<Candidate>,
    /// Lowercased display names, parallel to `candidates`.
    names: Vec<String>,
    aliases: AliasTable,
}

impl Resolver {
    pub fn new(mut candidates: Vec<Candidate>, aliases: AliasTable) -> Self {
        candidates.sort_by(|a, b| a.slug.cmp(&b.slug));
        candidates.dedup_by(|a, b| a.slug == b.slug);
        let names = candidates.iter().map(|c| c.name.to_lowercase()).collect();
        Self {
            candidates,
            names,
            aliases,
        }
    }

    /// Resolve a tag to zero or more candidate ids.
    pub fn resolve(&self, tag: &str) -> Resolution {
        let normalized = normalize_paint(tag);
        if normalized.is_empty() {
            return Resolution::none();
        }

        let steps: [(MatchKind, Vec<usize>); 4] = [
            (MatchKind::Alias, self.by_alias(&normalized)),
            (MatchKind::ExactSlug, self.by_exact_slug(&normalized)),
            (MatchKind::Prefix, self.by_prefix(&normalized)),
            (MatchKind::NameContains, self.by_name(&normalized)),
        ];

        for (kind, hits) in steps {
            if !hits.is_empty() {
                return Resolution {
                    ids: hits.into_iter().map(|i| self.candidates[i].id).collect(),
                    kind: Some(kind),
                };
            }
        }

        tracing::debug!(tag, normalized = %normalized, "No vehicle matched tag");
        Resolution::none()
    }

    fn by_alias(&self, normalized: &str) -> Vec<usize> {
        match self.aliases.get(normalized) {
            Some(AliasTarget::Slug(slug)) => self.by_exact_slug(slug),
            Some(AliasTarget::Pattern(pattern)) => self.positions(|c| like_match(pattern, &c.slug)),
            None => Vec::new(),
        }
    }

    fn by_exact_slug(&self, slug: &str) -> Vec<usize> {
        self.candidates
            .binary_search_by(|c| c.slug.as_str().cmp(slug))
            .map(|i| vec![i])
            .unwrap_or_default()
    }

    fn by_prefix(&self, normalized: &str) -> Vec<usize> {
        self.positions(|c| c.slug.starts_with(normalized))
    }

    fn by_name(&self, normalized: &str) -> Vec<usize> {
        let needle = normalized.replace(CANONICAL_SEPARATOR, " ");
        self.names
            .iter()
            .enumerate()
            .filter(|(_, name)| name.contains(&needle))
            .map(|(i, _)| i)
            .collect()
    }

    fn positions(&self, pred: impl Fn(&Candidate) -> bool) -> Vec<usize> {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| pred(c))
            .map(|(i, _)| i)
            .collect()
    }
}
