//! Column descriptors: hierarchical key paths referenced by filters and
//! projections.

use itertools::Itertools;
use kvlog_common::{Error, Result};
use kvlog_format::Namespace;

use crate::literal::LiteralTypeSet;

/// One segment of a column path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorToken {
    /// Matches a key with exactly this name.
    Literal(String),
    /// Matches any single key.
    Wildcard,
    /// Reserved: currently treated like a wildcard by the matcher.
    Regex(String),
}

impl DescriptorToken {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, DescriptorToken::Wildcard)
    }

    /// Whether the token can consume more than one concrete key name.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, DescriptorToken::Wildcard | DescriptorToken::Regex(_))
    }

    pub fn matches_name(&self, name: &str) -> bool {
        match self {
            DescriptorToken::Literal(token) => token == name,
            DescriptorToken::Wildcard | DescriptorToken::Regex(_) => true,
        }
    }
}

impl std::fmt::Display for DescriptorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DescriptorToken::Literal(token) => f.write_str(token),
            DescriptorToken::Wildcard => f.write_str("*"),
            DescriptorToken::Regex(pattern) => write!(f, "re:{pattern}"),
        }
    }
}

/// A hierarchical column path with a namespace and the set of literal
/// types it may still match.
///
/// Adjacent wildcard tokens collapse at construction, so a descriptor
/// never contains `* . *` runs. A descriptor consisting of a single
/// wildcard token is *pure wildcard*: it matches any key of any record in
/// either namespace and bypasses path resolution entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    namespace: Namespace,
    tokens: Vec<DescriptorToken>,
    type_mask: LiteralTypeSet,
    original: String,
}

impl ColumnDescriptor {
    /// Parses a textual path of the form `[auto:|user:]seg(.seg)*`, where
    /// a `*` segment is a wildcard. The namespace defaults to `user`.
    pub fn parse(text: &str) -> Result<ColumnDescriptor> {
        let (namespace, path) = if let Some(rest) = text.strip_prefix("auto:") {
            (Namespace::Auto, rest)
        } else if let Some(rest) = text.strip_prefix("user:") {
            (Namespace::User, rest)
        } else {
            (Namespace::User, text)
        };
        if path.is_empty() {
            return Err(Error::invalid_arg("column", "empty column path"));
        }
        let mut tokens = Vec::new();
        for segment in path.split('.') {
            if segment.is_empty() {
                return Err(Error::invalid_arg(
                    "column",
                    format!("empty path segment in '{text}'"),
                ));
            }
            if segment == "*" {
                tokens.push(DescriptorToken::Wildcard);
            } else {
                tokens.push(DescriptorToken::Literal(segment.to_string()));
            }
        }
        Ok(ColumnDescriptor::new(namespace, tokens, text.to_string()))
    }

    pub fn new(
        namespace: Namespace,
        tokens: Vec<DescriptorToken>,
        original: String,
    ) -> ColumnDescriptor {
        ColumnDescriptor {
            namespace,
            tokens: collapse_wildcard_runs(tokens),
            type_mask: LiteralTypeSet::ALL,
            original,
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn tokens(&self) -> &[DescriptorToken] {
        &self.tokens
    }

    pub fn type_mask(&self) -> LiteralTypeSet {
        self.type_mask
    }

    pub(crate) fn set_type_mask(&mut self, mask: LiteralTypeSet) {
        self.type_mask = mask;
    }

    /// The text the descriptor was parsed from (or a synthesized form for
    /// programmatic descriptors).
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Exactly one token and it is a wildcard. Matches regardless of
    /// namespace.
    pub fn is_pure_wildcard(&self) -> bool {
        self.tokens.len() == 1 && self.tokens[0].is_wildcard()
    }

    /// Whether any token requires matching against the schema tree rather
    /// than naming one key.
    pub fn has_unresolved_tokens(&self) -> bool {
        self.tokens.iter().any(DescriptorToken::is_unresolved)
    }

}

impl std::fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.tokens.iter().join("."))
    }
}

fn collapse_wildcard_runs(tokens: Vec<DescriptorToken>) -> Vec<DescriptorToken> {
    let mut collapsed: Vec<DescriptorToken> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.is_wildcard() && collapsed.last().is_some_and(DescriptorToken::is_wildcard) {
            continue;
        }
        collapsed.push(token);
    }
    collapsed
}

/// Index of a column interned in a [`ColumnArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(u32);

impl ColumnId {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Owns every column descriptor referenced by a query and its projections.
///
/// Filters and resolutions address columns by [`ColumnId`], replacing the
/// pointer identity a shared-ownership design would rely on. Two filters
/// over the same textual path intern two distinct columns, since type
/// narrowing is per filter.
#[derive(Debug, Default, Clone)]
pub struct ColumnArena {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnArena {
    pub fn new() -> ColumnArena {
        ColumnArena::default()
    }

    pub fn intern(&mut self, descriptor: ColumnDescriptor) -> ColumnId {
        let id = ColumnId(self.columns.len() as u32);
        self.columns.push(descriptor);
        id
    }

    pub fn get(&self, id: ColumnId) -> &ColumnDescriptor {
        &self.columns[id.as_usize()]
    }

    pub fn get_mut(&mut self, id: ColumnId) -> &mut ColumnDescriptor {
        &mut self.columns[id.as_usize()]
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
