//! Content transformers and their extension registry

use crate::config::{PipelineConfig, TransformerKind};
use crate::store::write_output_atomic;
use crate::TransformError;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Single-file-in, single-file-out content transform
///
/// Implementations read the whole input and either produce `output` in full
/// or fail without creating it. The input is never modified. `output` does
/// not exist when `transform` is called.
pub trait Transformer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Produce `output` from the contents of `input`
    fn transform(&self, input: &Path, output: &Path) -> Result<(), TransformError>;
}

/// Upper-cases UTF-8 text
///
/// Input that is not valid UTF-8 is rejected rather than lossily decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct UppercaseText;

impl Transformer for UppercaseText {
    fn name(&self) -> &'static str {
        "uppercase"
    }

    fn transform(&self, input: &Path, output: &Path) -> Result<(), TransformError> {
        let bytes = std::fs::read(input)?;
        let text = String::from_utf8(bytes).map_err(|_| TransformError::Encoding {
            path: input.to_path_buf(),
            expected: "UTF-8",
        })?;
        write_output_atomic(output, text.to_uppercase().as_bytes())
    }
}

/// Archives the input unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Transformer for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn transform(&self, input: &Path, output: &Path) -> Result<(), TransformError> {
        let bytes = std::fs::read(input)?;
        write_output_atomic(output, &bytes)
    }
}

impl TransformerKind {
    /// Instantiate the built-in transformer for this kind
    pub fn build(self) -> Arc<dyn Transformer> {
        match self {
            TransformerKind::Uppercase => Arc::new(UppercaseText),
            TransformerKind::Passthrough => Arc::new(Passthrough),
        }
    }
}

/// Extension -> transformer mapping, populated at startup
///
/// Keys are stored without a leading dot and matched case-sensitively, so
/// `notes.TXT` does not select the `txt` transformer.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    by_extension: HashMap<String, Arc<dyn Transformer>>,
}

impl TransformerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry built from the `[pipeline.transformers]` table
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut registry = Self::new();
        for (ext, kind) in &config.transformers {
            registry.register(ext, kind.build());
        }
        registry
    }

    /// Register (or replace) the transformer for an extension
    ///
    /// `"txt"` and `".txt"` are the same key.
    pub fn register(&mut self, extension: &str, transformer: Arc<dyn Transformer>) {
        let key = extension.strip_prefix('.').unwrap_or(extension);
        self.by_extension.insert(key.to_string(), transformer);
    }

    /// Transformer for an extension as returned by `Path::extension`
    pub fn get(&self, extension: &str) -> Option<Arc<dyn Transformer>> {
        self.by_extension.get(extension).cloned()
    }

    /// Transformer for a path, by its extension
    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn Transformer>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.get(ext))
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<_> = self.by_extension.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for ext in self.extensions() {
            if let Some(t) = self.by_extension.get(ext) {
                map.entry(&ext, &t.name());
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_uppercase_text() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("report.txt");
        let output = temp_dir.path().join("out.txt");
        fs::write(&input, "hello world").unwrap();

        UppercaseText.transform(&input, &output).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "HELLO WORLD");
        // Input untouched
        assert_eq!(fs::read_to_string(&input).unwrap(), "hello world");
    }

    #[test]
    fn test_uppercase_handles_unicode() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.txt");
        let output = temp_dir.path().join("out.txt");
        fs::write(&input, "straße ünïcode").unwrap();

        UppercaseText.transform(&input, &output).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "STRASSE ÜNÏCODE");
    }

    #[test]
    fn test_uppercase_rejects_binary_without_output() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.txt");
        let output = temp_dir.path().join("out.txt");
        fs::write(&input, [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let err = UppercaseText.transform(&input, &output).unwrap_err();

        assert!(matches!(err, TransformError::Encoding { .. }));
        assert!(!output.exists());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_input_leaves_no_output() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.txt");

        let err = Passthrough
            .transform(&temp_dir.path().join("gone.bin"), &output)
            .unwrap_err();

        assert!(matches!(err, TransformError::Io(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_passthrough_copies_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.bin");
        let output = temp_dir.path().join("out.bin");
        let data: Vec<u8> = (0..=255).collect();
        fs::write(&input, &data).unwrap();

        Passthrough.transform(&input, &output).unwrap();

        assert_eq!(fs::read(&output).unwrap(), data);
    }

    #[test]
    fn test_registry_lookup_is_case_sensitive() {
        let registry = TransformerRegistry::from_config(&PipelineConfig::default());

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.for_path(Path::new("/in/report.txt")).map(|t| t.name()),
            Some("uppercase")
        );
        assert!(registry.for_path(Path::new("/in/REPORT.TXT")).is_none());
        assert!(registry.for_path(Path::new("/in/image.bin")).is_none());
        assert!(registry.for_path(Path::new("/in/README")).is_none());
    }

    #[test]
    fn test_register_accepts_leading_dot() {
        let mut registry = TransformerRegistry::new();
        registry.register(".csv", Arc::new(Passthrough));
        registry.register("txt", Arc::new(UppercaseText));

        assert_eq!(registry.extensions(), vec!["csv", "txt"]);
        assert!(registry.get("csv").is_some());
        assert!(registry.get(".csv").is_none());
    }
}
