//! Reference module resolution.
//!
//! Snippets may import from precompiled library modules ("reference
//! modules"). The resolver fetches every module named in the manifest
//! once per process, keeps the ones that look like core wasm, and freezes
//! the result into a [`ReferenceSet`].
//!
//! A module that cannot be fetched is logged and skipped; compiling a
//! snippet that needs it then produces an ordinary diagnostic.

use crate::engine::has_wasm_header;
use async_trait::async_trait;
use snipbox_core::{Error, ModuleName, ResolverConfig, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use wasmtime::{Engine, Module};

/// Source of reference module bytes.
#[async_trait]
pub trait ModuleFetcher: Send + Sync + fmt::Debug {
    /// Fetches the file at `path` relative to the endpoint.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>>;
}

/// Fetches modules over HTTP(S) from a static file endpoint.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base: String,
}

impl HttpFetcher {
    /// Creates a fetcher rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ModuleFetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::ReferenceLoadFailure {
                module: path.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "reference fetch missed");
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::ReferenceLoadFailure {
                module: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(body.to_vec()))
    }
}

/// Reads modules from a local directory.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    /// Creates a fetcher rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ModuleFetcher for DirFetcher {
    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::InvalidArgument(format!(
                "reference path escapes the module directory: {path}"
            )));
        }

        match tokio::fs::read(self.root.join(relative)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::ReferenceLoadFailure {
                module: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Picks a fetcher for an endpoint: URLs go over HTTP, anything else is a directory.
#[must_use]
pub fn fetcher_for_endpoint(endpoint: &str) -> Arc<dyn ModuleFetcher> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Arc::new(HttpFetcher::new(endpoint))
    } else {
        Arc::new(DirFetcher::new(endpoint))
    }
}

/// A loaded reference module.
#[derive(Debug, Clone)]
pub struct ReferenceModule {
    name: ModuleName,
    path: String,
    size: usize,
    module: Module,
}

impl ReferenceModule {
    /// Import namespace snippets use for this module.
    #[must_use]
    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    /// Path it was fetched from.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Size of the binary in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Compiled module.
    #[must_use]
    pub fn module(&self) -> &Module {
        &self.module
    }
}

/// Frozen set of reference modules, in manifest order.
#[derive(Debug, Default)]
pub struct ReferenceSet {
    modules: Vec<ReferenceModule>,
    failures: Vec<Error>,
}

impl ReferenceSet {
    /// Looks up a module by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ReferenceModule> {
        self.modules.iter().find(|m| m.name.as_str() == name)
    }

    /// Loaded modules in manifest order.
    pub fn iter(&self) -> impl Iterator<Item = &ReferenceModule> {
        self.modules.iter()
    }

    /// Number of loaded modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// One [`Error::ReferenceLoadFailure`] per module that was skipped.
    #[must_use]
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }
}

#[cfg(test)]
impl ReferenceSet {
    /// Builds a set straight from wasm text, in the given order.
    pub(crate) fn from_wat(engine: &Engine, modules: &[(&str, &str)]) -> Self {
        let modules = modules
            .iter()
            .map(|(name, text)| {
                let bytes = wat::parse_str(text).unwrap();
                ReferenceModule {
                    name: ModuleName::new(*name),
                    path: format!("{name}.wasm"),
                    size: bytes.len(),
                    module: Module::from_binary(engine, &bytes).unwrap(),
                }
            })
            .collect();
        Self {
            modules,
            failures: Vec::new(),
        }
    }
}

/// Loads the reference set once and hands out the frozen result.
#[derive(Debug)]
pub struct ReferenceResolver {
    config: ResolverConfig,
    engine: Engine,
    fetcher: Arc<dyn ModuleFetcher>,
    loaded: OnceCell<Arc<ReferenceSet>>,
}

impl ReferenceResolver {
    /// Creates a resolver using the fetcher implied by the endpoint.
    #[must_use]
    pub fn new(config: ResolverConfig, engine: Engine) -> Self {
        let fetcher = fetcher_for_endpoint(&config.endpoint);
        Self::with_fetcher(config, engine, fetcher)
    }

    /// Creates a resolver with an explicit fetcher.
    #[must_use]
    pub fn with_fetcher(
        config: ResolverConfig,
        engine: Engine,
        fetcher: Arc<dyn ModuleFetcher>,
    ) -> Self {
        Self {
            config,
            engine,
            fetcher,
            loaded: OnceCell::new(),
        }
    }

    /// Loads the reference set if that has not happened yet.
    ///
    /// Concurrent first calls share a single fetch pass; later calls
    /// return the cached set without fetching.
    pub async fn ensure_loaded(&self) -> Arc<ReferenceSet> {
        self.loaded
            .get_or_init(|| async { Arc::new(self.load().await) })
            .await
            .clone()
    }

    /// The set, if it has been loaded.
    #[must_use]
    pub fn loaded(&self) -> Option<Arc<ReferenceSet>> {
        self.loaded.get().cloned()
    }

    /// Whether the set has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    async fn load(&self) -> ReferenceSet {
        tracing::info!(
            endpoint = %self.config.endpoint,
            modules = self.config.manifest.len(),
            "loading reference modules"
        );

        let fingerprints = self.fetch_fingerprints().await;
        let mut set = ReferenceSet::default();

        for name in &self.config.manifest {
            match self.load_module(name, &fingerprints).await {
                Ok(module) => {
                    tracing::debug!(module = %name, path = %module.path, bytes = module.size, "reference module loaded");
                    set.modules.push(module);
                }
                Err(e) => {
                    tracing::warn!(module = %name, error = %e, "skipping reference module");
                    set.failures.push(e);
                }
            }
        }

        tracing::info!(
            loaded = set.len(),
            skipped = set.failures.len(),
            "reference modules ready"
        );
        set
    }

    async fn load_module(
        &self,
        name: &ModuleName,
        fingerprints: &HashMap<String, String>,
    ) -> Result<ReferenceModule> {
        let mut candidates = Vec::new();
        if let Some(file) = fingerprints.get(name.as_str()) {
            candidates.push(file.clone());
        }
        candidates.extend(self.config.candidate_paths(name.as_str()));

        let mut last_reason = "not found at any candidate path".to_string();
        for path in candidates {
            let bytes = match self.fetcher.fetch(&path).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(module = %name, %path, error = %e, "reference fetch failed");
                    last_reason = e.to_string();
                    continue;
                }
            };

            if !has_wasm_header(&bytes) {
                tracing::debug!(module = %name, %path, "response is not a wasm module");
                last_reason = format!("{path} is not a wasm module");
                continue;
            }

            match Module::from_binary(&self.engine, &bytes) {
                Ok(module) => {
                    return Ok(ReferenceModule {
                        name: name.clone(),
                        path,
                        size: bytes.len(),
                        module,
                    });
                }
                Err(e) => {
                    last_reason = format!("{path} failed to compile: {e}");
                }
            }
        }

        Err(Error::ReferenceLoadFailure {
            module: name.to_string(),
            reason: last_reason,
        })
    }

    async fn fetch_fingerprints(&self) -> HashMap<String, String> {
        let Some(path) = &self.config.fingerprint_manifest else {
            return HashMap::new();
        };

        match self.fetcher.fetch(path).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(%path, error = %e, "ignoring malformed fingerprint manifest");
                HashMap::new()
            }),
            Ok(None) => HashMap::new(),
            Err(e) => {
                tracing::debug!(%path, error = %e, "fingerprint manifest unavailable");
                HashMap::new()
            }
        }
    }
}
