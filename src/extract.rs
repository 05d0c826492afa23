//! Extractor-facing record types and the extractor registry
//!
//! Per-language parsing is delegated to pluggable extractors. The core
//! consumes [`SymbolRecord`]s and [`ReferenceRecord`]s per file and
//! resolves reference names to stored symbol ids itself; extractors
//! never see the store.
//!
//! The registry is an explicit object constructed once at process
//! start and passed by reference into the indexer. There is no ambient
//! global state keyed by extension.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Kind of symbol extracted from source code.
///
/// Language-agnostic symbol kinds that map across multiple programming
/// languages. Closed set: every consumer pattern-matches exhaustively.
/// Extractor-specific detail rides in [`SymbolRecord::extra`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Function definition
    Function,
    /// Method inside a class/impl block
    Method,
    /// Class or struct-like type definition
    Class,
    /// Interface or trait definition
    Interface,
    /// Struct definition where the language distinguishes it from class
    Struct,
    /// Enum definition
    Enum,
    /// Field inside a type
    Field,
    /// Property (getter/setter-backed member)
    Property,
    /// Constant binding
    Constant,
    /// Module or package declaration
    Module,
    /// Variable binding at module scope
    Variable,
    /// Type alias
    TypeAlias,
    /// Anything the extractor could not map
    Unknown,
}

impl SymbolKind {
    /// Stable lower-case storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Field => "field",
            SymbolKind::Property => "property",
            SymbolKind::Constant => "constant",
            SymbolKind::Module => "module",
            SymbolKind::Variable => "variable",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::Unknown => "unknown",
        }
    }

    /// Parse the storage string back into a kind.
    pub fn parse(s: &str) -> SymbolKind {
        match s {
            "function" => SymbolKind::Function,
            "method" => SymbolKind::Method,
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            "struct" => SymbolKind::Struct,
            "enum" => SymbolKind::Enum,
            "field" => SymbolKind::Field,
            "property" => SymbolKind::Property,
            "constant" => SymbolKind::Constant,
            "module" => SymbolKind::Module,
            "variable" => SymbolKind::Variable,
            "type_alias" => SymbolKind::TypeAlias,
            _ => SymbolKind::Unknown,
        }
    }

    /// Kinds that participate in dead-code candidacy: things a caller
    /// could reference (callables and named types).
    pub fn is_callable_or_type(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function
                | SymbolKind::Method
                | SymbolKind::Class
                | SymbolKind::Interface
                | SymbolKind::Struct
        )
    }

    /// Kinds that can be invoked directly.
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

/// Kind of directed relation between two symbols.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Calls,
    Imports,
    Inherits,
    Implements,
    UsesTrait,
    Template,
    References,
    Uses,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
            EdgeKind::Inherits => "inherits",
            EdgeKind::Implements => "implements",
            EdgeKind::UsesTrait => "uses_trait",
            EdgeKind::Template => "template",
            EdgeKind::References => "references",
            EdgeKind::Uses => "uses",
        }
    }

    pub fn parse(s: &str) -> EdgeKind {
        match s {
            "calls" => EdgeKind::Calls,
            "imports" => EdgeKind::Imports,
            "inherits" => EdgeKind::Inherits,
            "implements" => EdgeKind::Implements,
            "uses_trait" => EdgeKind::UsesTrait,
            "template" => EdgeKind::Template,
            "references" => EdgeKind::References,
            _ => EdgeKind::Uses,
        }
    }
}

/// Symbol visibility as reported by the extractor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::Internal => "internal",
        }
    }

    pub fn parse(s: &str) -> Visibility {
        match s {
            "private" => Visibility::Private,
            "protected" => Visibility::Protected,
            "internal" => Visibility::Internal,
            _ => Visibility::Public,
        }
    }
}

/// One symbol emitted by an extractor for a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub name: String,
    pub qualified_name: Option<String>,
    pub kind: SymbolKind,
    pub line_start: u32,
    pub line_end: u32,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub visibility: Visibility,
    pub is_exported: bool,
    /// Name of the enclosing symbol in the same file, for nesting.
    pub parent_name: Option<String>,
    /// Open metadata map for extractor-specific detail.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl SymbolRecord {
    /// Minimal record with everything optional defaulted.
    pub fn new(name: &str, kind: SymbolKind, line_start: u32, line_end: u32) -> Self {
        Self {
            name: name.to_string(),
            qualified_name: None,
            kind,
            line_start,
            line_end,
            signature: None,
            docstring: None,
            visibility: Visibility::Public,
            is_exported: true,
            parent_name: None,
            extra: BTreeMap::new(),
        }
    }
}

/// One reference emitted by an extractor for a file.
///
/// `source_name`/`target_name` are unresolved names; the core resolves
/// them to symbol ids (exact qualified name, then exact name, then
/// case-insensitive). Unresolved references are dropped, not errored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub source_name: String,
    pub target_name: String,
    pub kind: EdgeKind,
    pub line: u32,
    /// Module path for import references, when the extractor knows it.
    pub import_path: Option<String>,
}

/// Everything an extractor produces for one file.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub symbols: Vec<SymbolRecord>,
    pub references: Vec<ReferenceRecord>,
}

/// A per-language extractor. Implementations consume a parsed syntax
/// tree (however they obtain it) and emit symbol/reference records.
pub trait Extractor: Send + Sync {
    /// Language tag stored on files this extractor handles.
    fn language(&self) -> &str;

    /// File extensions (without dot) this extractor claims.
    fn extensions(&self) -> &[&str];

    /// Extract symbols and references from one file.
    fn extract(&self, path: &str, source: &[u8]) -> anyhow::Result<Extraction>;
}

/// Explicit extractor registry, constructed once and passed into the
/// indexer by reference.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Register an extractor. Later registrations win on extension
    /// conflicts so embedders can override defaults.
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    /// Find the extractor claiming a path's extension, if any.
    pub fn for_path(&self, path: &Path) -> Option<&dyn Extractor> {
        let ext = path.extension()?.to_str()?;
        self.extractors
            .iter()
            .rev()
            .find(|e| e.extensions().iter().any(|x| x.eq_ignore_ascii_case(ext)))
            .map(|b| b.as_ref())
    }

    /// Language tag for a path, when some extractor claims it.
    pub fn detect_language(&self, path: &Path) -> Option<&str> {
        self.for_path(path).map(|e| e.language())
    }

    /// Whether any extractor claims the path.
    pub fn supports(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let languages: Vec<&str> = self.extractors.iter().map(|e| e.language()).collect();
        f.debug_struct("ExtractorRegistry")
            .field("languages", &languages)
            .finish()
    }
}
