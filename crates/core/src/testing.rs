//! Fixtures shared by the adapter test suites.

use crate::registry::{DEFAULT_REGISTRY_NAME, InMemoryRegistryDirectory, MoldRegistry};
use crate::rjs::RequireJsProvider;
use moldserve_api::{Provider, ServeError, ServeResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempDir;

pub const TEST_PACKAGE: &str = "nunja.testing.mold";

pub const BASIC_TEMPLATE: &str = "<span>{{ value }}</span>\n";

/// Provider with canned answers: core ids echo as `config:{id}`, object ids
/// as `object:{id}`, and anything containing `notfound` is not found.
pub struct DummyProvider {
    base_url: String,
    core_subpaths: Vec<String>,
}

impl DummyProvider {
    pub fn new(base_url: impl Into<String>, core_subpaths: &[&str]) -> Self {
        Self {
            base_url: base_url.into(),
            core_subpaths: core_subpaths.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Provider for DummyProvider {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn is_core(&self, identifier: &str) -> bool {
        self.core_subpaths.iter().any(|s| s == identifier)
    }

    fn fetch_core(&self, identifier: &str) -> ServeResult<String> {
        Ok(format!("config:{}", identifier))
    }

    fn fetch_path(&self, identifier: &str) -> ServeResult<PathBuf> {
        Err(ServeError::not_found(format!("no file behind '{}'", identifier)))
    }

    fn fetch_object(&self, identifier: &str) -> ServeResult<String> {
        if identifier.contains("notfound") {
            return Err(ServeError::not_found("notfound is not found"));
        }
        Ok(format!("object:{}", identifier))
    }
}

/// A temporary `nunja.testing.mold` package registered as `nunja.mold`.
pub struct MoldFixture {
    temp: TempDir,
    directory: Arc<InMemoryRegistryDirectory>,
}

impl MoldFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let package = temp.path().join(TEST_PACKAGE);

        let molds: [(&str, &[(&str, &str)]); 4] = [
            (
                "basic",
                &[
                    ("template.nja", BASIC_TEMPLATE),
                    ("index.js", "define(['nunja/core'], function(core) {});\n"),
                ],
            ),
            (
                "itemlist",
                &[
                    (
                        "template.nja",
                        "<ul>{% for item in list %}<li>{{ item }}</li>{% endfor %}</ul>\n",
                    ),
                    ("index.js", "define([], function() { return {}; });\n"),
                ],
            ),
            (
                "include_by_name",
                &[(
                    "template.nja",
                    "{% include 'nunja.testing.mold/basic/template.nja' %}\n",
                )],
            ),
            (
                "include_by_value",
                &[("template.nja", "{% include value %}\n")],
            ),
        ];

        for (mold, files) in molds {
            let dir = package.join(mold);
            std::fs::create_dir_all(&dir).expect("create mold dir");
            for (name, content) in files {
                std::fs::write(dir.join(name), content).expect("write mold file");
            }
        }

        let mut registry = MoldRegistry::new(DEFAULT_REGISTRY_NAME);
        registry
            .add_package(TEST_PACKAGE, &package)
            .expect("register test package");

        let directory = InMemoryRegistryDirectory::new();
        directory.register(Arc::new(registry));

        Self {
            temp,
            directory: Arc::new(directory),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn directory(&self) -> Arc<InMemoryRegistryDirectory> {
        self.directory.clone()
    }

    pub fn provider(&self, base_url: &str) -> RequireJsProvider {
        RequireJsProvider::new(base_url, self.directory()).expect("build provider")
    }
}

impl Default for MoldFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Default)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return what it logged.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let writer = CaptureWriter::default();
    let make_writer = writer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || make_writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&writer.0.lock().unwrap_or_else(PoisonError::into_inner))
        .into_owned();
    (result, logs)
}
