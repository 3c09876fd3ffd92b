//! Source fetching for `import` and `use`.
//!
//! The resolver asks a [`SourceFetcher`] for the text of every imported
//! file or package before execution starts. [`DirFetcher`] is the real
//! implementation; [`StaticFetcher`] serves canned sources in tests.

use lru::LruCache;
use rustc_hash::FxHashMap;
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Mutex;

/// What a script asked to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportTarget {
    /// `import "./helpers.gk"`, relative to the importing script.
    Path(String),
    /// `use "@shared/quality"`, resolved in the package directory.
    Package(String),
}

impl ImportTarget {
    /// Stable cache/visited key for this target.
    pub fn key(&self) -> String {
        match self {
            ImportTarget::Path(p) => format!("path:{}", p),
            ImportTarget::Package(p) => format!("pkg:{}", p),
        }
    }
}

pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, target: &ImportTarget) -> io::Result<String>;
}

/// Reads imports relative to the script directory and packages from the
/// configured package directory, with an LRU over fetched sources so
/// diamond-shaped import graphs read each file once.
pub struct DirFetcher {
    script_root: PathBuf,
    package_dir: PathBuf,
    cache: Mutex<LruCache<String, String>>,
}

impl DirFetcher {
    pub fn new(script_root: impl Into<PathBuf>, package_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_root: script_root.into(),
            package_dir: package_dir.into(),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(32).expect("valid cache size"),
            )),
        }
    }

    fn resolve(&self, target: &ImportTarget) -> PathBuf {
        match target {
            ImportTarget::Path(path) => self.script_root.join(path),
            ImportTarget::Package(name) => {
                let name = name.strip_prefix('@').unwrap_or(name);
                let mut path = self.package_dir.join(name);
                if path.extension().is_none() {
                    path.set_extension("gk");
                }
                path
            }
        }
    }
}

impl SourceFetcher for DirFetcher {
    fn fetch(&self, target: &ImportTarget) -> io::Result<String> {
        let key = target.key();
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(source) = cache.get(&key) {
                return Ok(source.clone());
            }
        }

        let source = std::fs::read_to_string(self.resolve(target))?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, source.clone());
        }
        Ok(source)
    }
}

/// In-memory fetcher keyed by [`ImportTarget::key`].
#[derive(Default)]
pub struct StaticFetcher {
    sources: FxHashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: &str, source: &str) -> Self {
        self.sources
            .insert(ImportTarget::Path(path.to_string()).key(), source.to_string());
        self
    }

    pub fn with_package(mut self, name: &str, source: &str) -> Self {
        self.sources.insert(
            ImportTarget::Package(name.to_string()).key(),
            source.to_string(),
        );
        self
    }
}

impl SourceFetcher for StaticFetcher {
    fn fetch(&self, target: &ImportTarget) -> io::Result<String> {
        self.sources.get(&target.key()).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{:?} not found", target))
        })
    }
}
