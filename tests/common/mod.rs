//! Shared test scaffolding: a line-oriented toy language so the engine
//! can be driven end to end without a real parser.
//!
//! Grammar, one directive per line:
//!   def <name>            function symbol
//!   class <name>          class symbol
//!   call <src> <tgt>      call reference
//!   import <src> <tgt>    import reference

use std::fs;
use std::path::Path;

use meridian::extract::{
    EdgeKind, Extraction, Extractor, ReferenceRecord, SymbolKind, SymbolRecord,
};
use meridian::ExtractorRegistry;

pub struct ToyExtractor;

impl Extractor for ToyExtractor {
    fn language(&self) -> &str {
        "toy"
    }

    fn extensions(&self) -> &[&str] {
        &["py"]
    }

    fn extract(&self, _path: &str, source: &[u8]) -> anyhow::Result<Extraction> {
        let text = std::str::from_utf8(source)?;
        let mut out = Extraction::default();
        for (i, line) in text.lines().enumerate() {
            let line_no = i as u32 + 1;
            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                ["def", name] => {
                    out.symbols
                        .push(SymbolRecord::new(name, SymbolKind::Function, line_no, line_no));
                }
                ["class", name] => {
                    out.symbols
                        .push(SymbolRecord::new(name, SymbolKind::Class, line_no, line_no));
                }
                ["call", src, tgt] => out.references.push(ReferenceRecord {
                    source_name: src.to_string(),
                    target_name: tgt.to_string(),
                    kind: EdgeKind::Calls,
                    line: line_no,
                    import_path: None,
                }),
                ["import", src, tgt] => out.references.push(ReferenceRecord {
                    source_name: src.to_string(),
                    target_name: tgt.to_string(),
                    kind: EdgeKind::Imports,
                    line: line_no,
                    import_path: None,
                }),
                ["fail"] => anyhow::bail!("deliberate parse failure"),
                _ => {}
            }
        }
        Ok(out)
    }
}

pub fn registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(Box::new(ToyExtractor));
    registry
}

pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// The 4-file layout used by several end-to-end tests: main imports
/// service, service imports models and utils, utils has one
/// never-called function.
pub fn write_demo_project(root: &Path) {
    write_file(root, "main.py", "def main\nimport main run_service\n");
    write_file(
        root,
        "service.py",
        "def run_service\nimport run_service Model\nimport run_service format_util\n",
    );
    write_file(root, "models.py", "class Model\n");
    write_file(root, "utils.py", "def format_util\ndef unused_helper\n");
}
