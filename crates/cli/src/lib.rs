use clap::{Parser, ValueEnum};
use moldserve_api::Provider;
use moldserve_core::ServeManifest;
use moldserve_simple::{DEFAULT_BIND, DEFAULT_PORT, DEFAULT_PREFIX, ServeOptions, default_interpreter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Manifest picked up from the served root when `--manifest` is not given.
pub const MANIFEST_FILE: &str = "moldserve.json";

const INTERRUPT_MESSAGE: &str = "\nKeyboard interrupt received, shutting down...";

#[derive(Parser, Debug)]
#[command(
    name = "moldserve",
    version,
    about = "Development server for nunja molds",
    long_about = "Serves the RequireJS configuration and the templates of every registered \
                  mold under a URL prefix. With the simple adapter, everything outside the \
                  prefix is served from the root directory, including CGI scripts."
)]
pub struct Cli {
    /// Port to listen on
    #[arg(value_name = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, value_name = "ADDRESS", default_value = DEFAULT_BIND)]
    pub bind: String,

    /// URL prefix the molds are served under [default: /nunja]
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Directory served outside the prefix
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Registry manifest (defaults to moldserve.json in the root, if present)
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Registry to expose; repeat for several [default: nunja.mold]
    #[arg(long = "registry", value_name = "NAME")]
    pub registries: Vec<String>,

    /// HTTP stack to serve with
    #[arg(long, value_enum, default_value_t = Adapter::Simple)]
    pub adapter: Adapter,

    /// Interpreter for `*.py` CGI scripts [default: $MOLDSERVE_PYTHON or python3]
    #[arg(long, value_name = "PROGRAM")]
    pub python: Option<String>,

    /// Worker threads for the tiny adapter
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub workers: usize,

    /// Also log to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adapter {
    Simple,
    Axum,
    Tiny,
}

impl Cli {
    /// Load the manifest and apply the command line overrides.
    pub fn manifest(&self) -> moldserve_core::Result<ServeManifest> {
        let mut manifest = match &self.manifest {
            Some(path) => ServeManifest::load(path)?,
            None => {
                let default = self.root.join(MANIFEST_FILE);
                if default.is_file() {
                    ServeManifest::load(&default)?
                } else {
                    ServeManifest::default()
                }
            }
        };

        if let Some(prefix) = &self.prefix {
            manifest.base_url = Some(base_url_for(prefix));
        } else if manifest.base_url.is_none() {
            manifest.base_url = Some(base_url_for(DEFAULT_PREFIX));
        }
        if !self.registries.is_empty() {
            manifest.registry_names = self.registries.clone();
        }
        Ok(manifest)
    }

    pub fn options(&self, manifest: &ServeManifest) -> ServeOptions {
        let prefix = manifest
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        ServeOptions {
            bind: self.bind.clone(),
            port: self.port,
            prefix,
            root: self.root.clone(),
            interpreter: self.python.clone().unwrap_or_else(default_interpreter),
        }
    }
}

/// `/nunja` and `/nunja/` both become `/nunja/`.
pub fn base_url_for(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = moldserve_runtime::init_logging("moldserve", cli.verbose);

    check_root(&cli.root)?;
    let manifest = cli.manifest()?;
    let options = cli.options(&manifest);
    let provider = moldserve_runtime::build_default_provider(&manifest)?;
    info!(
        "Starting {:?} adapter on {}:{} for '{}'",
        cli.adapter,
        options.bind,
        options.port,
        provider.base_url()
    );

    let rt = tokio::runtime::Runtime::new()?;

    match cli.adapter {
        Adapter::Simple => rt.block_on(moldserve_simple::serve_nunja(options, provider))?,
        Adapter::Axum => rt.block_on(run_axum(&options, provider))?,
        Adapter::Tiny => run_tiny(&rt, &options, provider, cli.workers)?,
    }
    Ok(())
}

/// Token cancelled on Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("{}", INTERRUPT_MESSAGE);
            trigger.cancel();
        }
    });
    token
}

async fn run_axum(
    options: &ServeOptions,
    provider: Arc<dyn Provider>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind((options.bind.as_str(), options.port)).await?;
    let addr = listener.local_addr()?;
    println!("Serving HTTP on {}:{}...", addr.ip(), addr.port());

    let router = moldserve_axum::MoldRoutes::new(provider).router();
    moldserve_axum::serve(listener, router, interrupt_token()).await?;
    Ok(())
}

fn run_tiny(
    rt: &tokio::runtime::Runtime,
    options: &ServeOptions,
    provider: Arc<dyn Provider>,
    workers: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = tiny_http::Server::http((options.bind.as_str(), options.port))
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let server = Arc::new(server);
    match server.server_addr().to_ip() {
        Some(addr) => println!("Serving HTTP on {}:{}...", addr.ip(), addr.port()),
        None => println!("Serving HTTP on {}:{}...", options.bind, options.port),
    }

    let workers = workers.max(1);
    let unblocker = server.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("{}", INTERRUPT_MESSAGE);
            for _ in 0..workers {
                unblocker.unblock();
            }
        }
    });

    moldserve_tiny::TinyAdapter::new(provider).serve(&server, workers);
    Ok(())
}

pub fn check_root(root: &Path) -> Result<(), String> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(format!("root '{}' is not a directory", root.display()))
    }
}
