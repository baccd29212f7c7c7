//! Snippet compilation.
//!
//! Turns submitted wasm text into a [`CompiledArtifact`]:
//!
//! 1. bare snippets are wrapped (see [`crate::source`])
//! 2. the text is assembled into a binary image
//! 3. the image is validated and compiled by the shared engine
//! 4. imports are resolved against the console functions and the frozen
//!    [`ReferenceSet`]
//! 5. the entry point is picked from the exports
//!
//! Compilation never fails with an `Err`: every problem becomes a
//! [`Diagnostic`], and an artifact with an error diagnostic carries no
//! image.
//!
//! # Examples
//!
//! ```
//! use snipbox_runtime::compiler::compile;
//! use snipbox_runtime::engine::build_engine;
//! use snipbox_runtime::resolver::ReferenceSet;
//!
//! let engine = build_engine().unwrap();
//! let artifact = compile(&engine, &ReferenceSet::default(), "(call $newline)");
//! assert!(artifact.success());
//! ```

use crate::host_functions::{CONSOLE_MODULE, MEMORY_EXPORT, console_function};
use crate::resolver::ReferenceSet;
use crate::source::{PreparedSource, SYNTHETIC_ENTRY, SourceSubmission, prepare};
use regex::Regex;
use serde::{Deserialize, Serialize};
use snipbox_core::{Diagnostic, Location};
use std::sync::{Arc, LazyLock};
use wasmtime::{Engine, ExternType, FuncType, Module};

static WAT_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--> [^:\n]*:(\d+):(\d+)").expect("valid regex"));

/// Exports tried as entry points, in order of preference.
const ENTRY_EXPORTS: &[&str] = &["main", "_start"];

/// Calling convention of an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySignature {
    /// `() -> ()`
    Unit,
    /// `() -> i32`, the result is the exit code
    ExitCode,
    /// `(i32, i32) -> ()`, called with an empty argument list
    Args,
    /// `(i32, i32) -> i32`
    ArgsExitCode,
    /// No exported entry; the module's start function does the work
    StartOnly,
}

impl EntrySignature {
    fn of(ty: &FuncType) -> Option<Self> {
        let params: Vec<String> = ty.params().map(|t| t.to_string()).collect();
        let results: Vec<String> = ty.results().map(|t| t.to_string()).collect();
        match (params.as_slice(), results.as_slice()) {
            ([], []) => Some(Self::Unit),
            ([], [r]) if r == "i32" => Some(Self::ExitCode),
            ([a, b], []) if a == "i32" && b == "i32" => Some(Self::Args),
            ([a, b], [r]) if a == "i32" && b == "i32" && r == "i32" => Some(Self::ArgsExitCode),
            _ => None,
        }
    }
}

/// Resolved entry point of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    /// Export name, or `start` for [`EntrySignature::StartOnly`]
    pub name: String,
    /// How to call it
    pub signature: EntrySignature,
}

/// Result of compiling one submission.
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    image: Option<Arc<[u8]>>,
    module: Option<Module>,
    diagnostics: Vec<Diagnostic>,
    entry: Option<EntryPoint>,
    compiled_text: String,
    hash: String,
    wrapped: bool,
}

impl CompiledArtifact {
    /// Whether compilation produced an image.
    #[must_use]
    pub fn success(&self) -> bool {
        self.image.is_some()
    }

    /// Binary image, present only on success.
    #[must_use]
    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    /// Compiled module, present only on success.
    #[must_use]
    pub const fn module(&self) -> Option<&Module> {
        self.module.as_ref()
    }

    /// Every diagnostic, in the order produced.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of error diagnostics.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Entry point, if one was found.
    #[must_use]
    pub const fn entry(&self) -> Option<&EntryPoint> {
        self.entry.as_ref()
    }

    /// Text handed to the assembler, after wrapping.
    #[must_use]
    pub fn compiled_text(&self) -> &str {
        &self.compiled_text
    }

    /// BLAKE3 hash of the submitted text.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Whether the submission was wrapped in a synthetic entry point.
    #[must_use]
    pub const fn wrapped(&self) -> bool {
        self.wrapped
    }

    /// Serializable summary.
    #[must_use]
    pub fn report(&self) -> CompileReport {
        CompileReport {
            success: self.success(),
            diagnostics: self.diagnostics.clone(),
            entry: self.entry.clone(),
            image_size: self.image.as_ref().map(|image| image.len()),
            image: None,
            hash: self.hash.clone(),
        }
    }

    /// Like [`CompiledArtifact::report`], with the image bytes included.
    #[must_use]
    pub fn report_with_image(&self) -> CompileReport {
        CompileReport {
            image: self.image().map(<[u8]>::to_vec),
            ..self.report()
        }
    }
}

/// Compile result as sent to hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileReport {
    /// Whether an image was produced
    pub success: bool,
    /// Every diagnostic
    pub diagnostics: Vec<Diagnostic>,
    /// Resolved entry point
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryPoint>,
    /// Size of the image in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<usize>,
    /// The binary image, only when asked for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
    /// Hash of the submitted text
    pub hash: String,
}

/// Hash identifying a submission.
#[must_use]
pub fn source_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Compiles `text` against `references`.
#[must_use]
pub fn compile(engine: &Engine, references: &ReferenceSet, text: &str) -> CompiledArtifact {
    let submission = SourceSubmission::new(text);
    let prepared = prepare(&submission);
    let mut diagnostics = Vec::new();

    if prepared.wrapped {
        diagnostics.push(Diagnostic::info(format!(
            "snippet wrapped in a synthetic `{SYNTHETIC_ENTRY}` entry point"
        )));
    }

    let mut artifact = CompiledArtifact {
        image: None,
        module: None,
        diagnostics: Vec::new(),
        entry: None,
        compiled_text: prepared.text.clone(),
        hash: source_hash(text),
        wrapped: prepared.wrapped,
    };

    let image = match wat::parse_str(&prepared.text) {
        Ok(image) => image,
        Err(e) => {
            diagnostics.push(assembler_diagnostic(&e.to_string(), &prepared));
            return finish(artifact, diagnostics, None, None);
        }
    };

    let module = match Module::from_binary(engine, &image) {
        Ok(module) => module,
        Err(e) => {
            diagnostics.push(Diagnostic::error(format!("{e:#}")));
            return finish(artifact, diagnostics, None, None);
        }
    };

    check_imports(&module, references, &prepared, &mut diagnostics);
    check_memory_export(&module, &mut diagnostics);
    artifact.entry = find_entry(&module, &submission, &mut diagnostics);

    finish(artifact, diagnostics, Some(image), Some(module))
}

fn finish(
    mut artifact: CompiledArtifact,
    diagnostics: Vec<Diagnostic>,
    image: Option<Vec<u8>>,
    module: Option<Module>,
) -> CompiledArtifact {
    if diagnostics.iter().any(Diagnostic::is_error) {
        tracing::debug!(
            errors = diagnostics.iter().filter(|d| d.is_error()).count(),
            "compilation failed"
        );
    } else {
        artifact.image = image.map(Arc::from);
        artifact.module = module;
        tracing::debug!(
            bytes = artifact.image.as_ref().map_or(0, |i| i.len()),
            wrapped = artifact.wrapped,
            "compilation succeeded"
        );
    }
    artifact.diagnostics = diagnostics;
    if !artifact.success() {
        artifact.entry = None;
    }
    artifact
}

fn assembler_diagnostic(rendered: &str, prepared: &PreparedSource) -> Diagnostic {
    let message = rendered.lines().next().unwrap_or("invalid wasm text").trim();
    let diagnostic = Diagnostic::error(message);

    let location = WAT_LOCATION.captures(rendered).and_then(|caps| {
        let line = caps[1].parse().ok()?;
        let column = caps[2].parse().ok()?;
        prepared.map.resolve(Location::new(line, column))
    });

    match location {
        Some(location) => diagnostic.at(location),
        None => diagnostic,
    }
}

fn check_imports(
    module: &Module,
    references: &ReferenceSet,
    prepared: &PreparedSource,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for import in module.imports() {
        let (namespace, name) = (import.module(), import.name());

        let problem = if namespace == CONSOLE_MODULE {
            match (console_function(name), import.ty()) {
                (None, _) => Some(format!("unknown console function `{name}`")),
                (Some(function), ExternType::Func(ty)) => {
                    let params: Vec<String> = ty.params().map(|t| t.to_string()).collect();
                    let results: Vec<String> = ty.results().map(|t| t.to_string()).collect();
                    (params != function.params || results != function.results).then(|| {
                        format!(
                            "console function `{name}` has signature {}, imported as ({}) -> ({})",
                            function.signature(),
                            params.join(" "),
                            results.join(" ")
                        )
                    })
                }
                (Some(_), _) => Some(format!("console `{name}` must be imported as a function")),
            }
        } else {
            match references.get(namespace) {
                None => Some(format!(
                    "unknown import module `{namespace}`: no reference module by that name is loaded"
                )),
                Some(reference) if reference.module().get_export(name).is_none() => Some(format!(
                    "reference module `{namespace}` has no export named `{name}`"
                )),
                Some(_) => None,
            }
        };

        if let Some(message) = problem {
            let diagnostic = Diagnostic::error(message);
            diagnostics.push(match import_location(prepared, namespace, name) {
                Some(location) => diagnostic.at(location),
                None => diagnostic,
            });
        }
    }
}

/// Buffer functions read the guest's exported `memory`; without it every
/// call to them fails at run time.
fn check_memory_export(module: &Module, diagnostics: &mut Vec<Diagnostic>) {
    if matches!(module.get_export(MEMORY_EXPORT), Some(ExternType::Memory(_))) {
        return;
    }
    let buffered: Vec<&str> = module
        .imports()
        .filter(|import| import.module() == CONSOLE_MODULE)
        .filter_map(|import| console_function(import.name()))
        .filter(|function| function.uses_memory)
        .map(|function| function.name)
        .collect();
    if let Some(first) = buffered.first() {
        diagnostics.push(Diagnostic::warning(format!(
            "module imports console `{first}` but exports no memory named `{MEMORY_EXPORT}`; \
             calls to it will fail"
        )));
    }
}

/// Location of the `"module" "name"` pair of an import in the submission.
fn import_location(prepared: &PreparedSource, namespace: &str, name: &str) -> Option<Location> {
    let pattern = format!(
        r#""{}"\s+"{}""#,
        regex::escape(namespace),
        regex::escape(name)
    );
    let found = Regex::new(&pattern).ok()?.find(&prepared.text)?;

    let before = &prepared.text[..found.start()];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;

    let location = Location::new(u32::try_from(line).ok()?, u32::try_from(column).ok()?);
    prepared.map.resolve(location)
}

fn find_entry(
    module: &Module,
    submission: &SourceSubmission,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<EntryPoint> {
    let exported: Vec<(&str, ExternType)> = ENTRY_EXPORTS
        .iter()
        .filter_map(|name| module.get_export(name).map(|ty| (*name, ty)))
        .collect();

    if exported.len() > 1 {
        diagnostics.push(Diagnostic::warning(
            "both `main` and `_start` are exported; `main` is used",
        ));
    }

    let Some((name, ty)) = exported.into_iter().next() else {
        if submission.has_start() {
            return Some(EntryPoint {
                name: "start".to_string(),
                signature: EntrySignature::StartOnly,
            });
        }
        diagnostics.push(Diagnostic::warning(
            "module exports no `main` or `_start` function and will not run",
        ));
        return None;
    };

    let signature = match &ty {
        ExternType::Func(func) => EntrySignature::of(func),
        _ => None,
    };
    match signature {
        Some(signature) => Some(EntryPoint {
            name: name.to_string(),
            signature,
        }),
        None => {
            diagnostics.push(Diagnostic::error(format!(
                "entry point `{name}` must be a function of type () -> (), () -> i32, \
                 (i32 i32) -> () or (i32 i32) -> i32"
            )));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::build_engine;
    use snipbox_core::Severity;

    fn compile_text(text: &str) -> CompiledArtifact {
        compile(&build_engine().unwrap(), &ReferenceSet::default(), text)
    }

    #[test]
    fn test_bare_snippet_is_wrapped() {
        let artifact = compile_text("(call $newline)");
        assert!(artifact.success());
        assert!(artifact.wrapped());
        assert_eq!(
            artifact.entry(),
            Some(&EntryPoint {
                name: "main".to_string(),
                signature: EntrySignature::Unit,
            })
        );
        assert_eq!(artifact.diagnostics().len(), 1);
        assert_eq!(artifact.diagnostics()[0].severity, Severity::Info);
        assert!(crate::engine::has_wasm_header(artifact.image().unwrap()));
    }

    #[test]
    fn test_module_with_exit_code_entry() {
        let artifact = compile_text(r#"(module (func (export "main") (result i32) i32.const 3))"#);
        assert!(artifact.success());
        assert!(!artifact.wrapped());
        assert!(artifact.diagnostics().is_empty());
        assert_eq!(artifact.entry().unwrap().signature, EntrySignature::ExitCode);
    }

    #[test]
    fn test_args_entry_shapes() {
        let artifact = compile_text(
            r#"(module (func (export "_start") (param i32 i32) (result i32) i32.const 0))"#,
        );
        assert_eq!(artifact.entry().unwrap().name, "_start");
        assert_eq!(artifact.entry().unwrap().signature, EntrySignature::ArgsExitCode);
    }

    #[test]
    fn test_syntax_error_maps_to_submitted_line() {
        let artifact = compile_text("(call $newline)\n(i32.bogus)\n");
        assert!(!artifact.success());
        assert!(artifact.image().is_none());
        assert!(artifact.entry().is_none());

        let error = artifact.diagnostics().iter().find(|d| d.is_error()).unwrap();
        assert_eq!(error.location.map(|l| l.line), Some(2));
    }

    #[test]
    fn test_unknown_console_function() {
        let artifact = compile_text(
            r#"(module
  (import "console" "beep" (func))
  (func (export "main")))"#,
        );
        assert!(!artifact.success());
        let error = &artifact.diagnostics()[0];
        assert!(error.message.contains("unknown console function `beep`"));
        assert_eq!(error.location, Some(Location::new(2, 11)));
    }

    #[test]
    fn test_console_signature_mismatch() {
        let artifact = compile_text(
            r#"(module (import "console" "print" (func (param i32))) (func (export "main")))"#,
        );
        assert!(!artifact.success());
        assert!(artifact.diagnostics()[0].message.contains("(i32 i32) -> ()"));
    }

    #[test]
    fn test_missing_reference_module() {
        let artifact = compile_text(
            r#"(module (import "math" "square" (func (param i32) (result i32))) (func (export "main")))"#,
        );
        assert!(!artifact.success());
        assert!(artifact.diagnostics()[0].message.contains("unknown import module `math`"));
    }

    #[test]
    fn test_reference_imports_resolve() {
        let engine = build_engine().unwrap();
        let references = ReferenceSet::from_wat(
            &engine,
            &[(
                "math",
                r#"(module (func (export "square") (param i32) (result i32)
                    local.get 0 local.get 0 i32.mul))"#,
            )],
        );

        let ok = compile(
            &engine,
            &references,
            r#"(module (import "math" "square" (func (param i32) (result i32))) (func (export "main")))"#,
        );
        assert!(ok.success());

        let missing_export = compile(
            &engine,
            &references,
            r#"(module (import "math" "cube" (func (param i32) (result i32))) (func (export "main")))"#,
        );
        assert!(missing_export.diagnostics()[0].message.contains("no export named `cube`"));
    }

    #[test]
    fn test_missing_entry_compiles_with_warning() {
        let artifact = compile_text("(module (func $helper))");
        assert!(artifact.success());
        assert!(artifact.entry().is_none());
        assert_eq!(artifact.diagnostics()[0].severity, Severity::Warning);
    }

    #[test]
    fn test_unexported_user_memory_in_bare_snippet() {
        let artifact = compile_text(
            "(memory 1)\n(data (i32.const 0) \"Hi\")\n(call $println (i32.const 0) (i32.const 2))",
        );
        assert!(artifact.success());
        assert_eq!(artifact.diagnostics().len(), 1);
        assert_eq!(artifact.diagnostics()[0].severity, Severity::Info);
    }

    #[test]
    fn test_buffer_import_without_memory_export_warns() {
        let artifact = compile_text(
            r#"(module
  (import "console" "println" (func $println (param i32 i32)))
  (memory 1)
  (func (export "main") (call $println (i32.const 0) (i32.const 0))))"#,
        );
        assert!(artifact.success());
        assert_eq!(artifact.diagnostics().len(), 1);
        assert_eq!(artifact.diagnostics()[0].severity, Severity::Warning);
        assert!(artifact.diagnostics()[0].message.contains("`println`"));

        let artifact = compile_text(
            r#"(module
  (import "console" "newline" (func $newline))
  (func (export "main") (call $newline)))"#,
        );
        assert!(artifact.diagnostics().is_empty());
    }

    #[test]
    fn test_both_entries_prefer_main() {
        let artifact = compile_text(
            r#"(module (func (export "main")) (func (export "_start")))"#,
        );
        assert_eq!(artifact.entry().unwrap().name, "main");
        assert_eq!(artifact.diagnostics()[0].severity, Severity::Warning);
    }

    #[test]
    fn test_bad_entry_signature() {
        let artifact = compile_text(r#"(module (func (export "main") (param i64)))"#);
        assert!(!artifact.success());
        assert!(artifact.diagnostics()[0].message.contains("entry point `main`"));
    }

    #[test]
    fn test_start_only_module() {
        let artifact = compile_text("(module (func $init) (start $init))");
        assert!(artifact.success());
        assert_eq!(artifact.entry().unwrap().signature, EntrySignature::StartOnly);
    }

    #[test]
    fn test_report_serializes() {
        let report = compile_text("(call $newline)").report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["diagnostics"][0]["severity"], "info");
        assert_eq!(json["hash"].as_str().unwrap().len(), 64);
        assert!(json.get("image").is_none());
    }

    #[test]
    fn test_report_with_image_carries_bytes() {
        let artifact = compile_text("(call $newline)");
        let report = artifact.report_with_image();
        assert_eq!(report.image.as_deref(), artifact.image());
        assert_eq!(report.image_size, report.image.as_ref().map(Vec::len));

        let failed = compile_text("(bogus)").report_with_image();
        assert!(failed.image.is_none());
    }

    #[test]
    fn test_compile_is_deterministic() {
        let text = "(call $print (i32.const 0) (i32.const 3))\n(bogus)";
        let first = compile_text(text);
        let second = compile_text(text);
        assert_eq!(first.success(), second.success());
        assert_eq!(first.diagnostics(), second.diagnostics());
        assert_eq!(first.hash(), second.hash());
    }
}
