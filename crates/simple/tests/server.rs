use moldserve_api::Provider;
use moldserve_core::testing::{BASIC_TEMPLATE, DummyProvider, MoldFixture};
use moldserve_simple::{
    DirectoryResponder, ProviderResponder, RequestHandler, Responder, ServeOptions, serve,
    serve_until,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct Running {
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl Running {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start(provider: Arc<dyn Provider>, root: &Path) -> Running {
    start_handler(RequestHandler::new(provider, root)).await
}

async fn start_handler(handler: RequestHandler) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(serve(listener, Arc::new(handler), shutdown.clone()));
    Running { addr, shutdown }
}

/// Handler whose `*.py` scripts are shell scripts run by `/bin/sh -u`.
#[cfg(unix)]
fn shell_cgi_handler(root: &Path) -> RequestHandler {
    let responders: Vec<Arc<dyn Responder>> = vec![
        Arc::new(ProviderResponder::new(dummy())),
        Arc::new(DirectoryResponder::new(root).with_interpreter("/bin/sh")),
    ];
    RequestHandler::with_responders(responders)
}

async fn get(url: &str) -> (u16, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

fn dummy() -> Arc<dyn Provider> {
    Arc::new(DummyProvider::new("/base", &["config.js"]))
}

#[tokio::test]
async fn test_fallback_to_files() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("file.txt"), "some text").unwrap();
    let server = start(dummy(), temp.path()).await;

    assert_eq!(get(&server.url("/file.txt")).await, (200, "some text".to_string()));
    assert_eq!(get(&server.url("/no_such_file.txt")).await.0, 404);

    let (status, body) = get(&server.url("/")).await;
    assert_eq!(status, 200);
    assert!(body.contains("Directory listing for /"));
    assert!(body.contains("file.txt"));
}

#[tokio::test]
async fn test_provider_paths() {
    let temp = TempDir::new().unwrap();
    let server = start(dummy(), temp.path()).await;

    assert_eq!(
        get(&server.url("/base/an_object")).await,
        (200, "object:an_object".to_string())
    );
    assert_eq!(
        get(&server.url("/base/config.js")).await,
        (200, "config:config.js".to_string())
    );
    assert_eq!(
        get(&server.url("/base/notfound")).await,
        (404, "404 NOT FOUND".to_string())
    );
}

#[tokio::test]
async fn test_mold_provider() {
    let fixture = MoldFixture::new();
    let provider: Arc<dyn Provider> = Arc::new(fixture.provider("/nunja/"));
    let server = start(provider, fixture.root()).await;

    let (status, body) = get(&server.url("/nunja/config.js")).await;
    assert_eq!(status, 200);
    assert!(body.starts_with("(function() {\n    'use strict';\n\n"));

    let (status, body) = get(&server.url("/nunja/init.js")).await;
    assert_eq!(status, 200);
    assert!(body.starts_with("'use strict';"));

    assert_eq!(
        get(&server.url("/nunja/nunja.mold/nunja.testing.mold/basic/template.nja")).await,
        (200, BASIC_TEMPLATE.to_string())
    );
    assert_eq!(get(&server.url("/nunja/nested/init.js")).await.0, 404);
}

#[tokio::test]
async fn test_serve_until_announces_address() {
    let temp = TempDir::new().unwrap();
    let options = ServeOptions {
        port: 0,
        root: temp.path().to_path_buf(),
        ..ServeOptions::default()
    };
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let mut out = Vec::new();
    serve_until(&options, dummy(), &mut out, shutdown).await.unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("Serving HTTP on 127.0.0.1:"));
    assert!(out.ends_with("...\n"));
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_plain_python_script_runs_through_interpreter() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let script = temp.path().join("plain.py");
    std::fs::write(&script, "printf 'Content-Type: text/plain\\n\\nHello World\\n'\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();
    let server = start_handler(shell_cgi_handler(temp.path())).await;

    assert_eq!(
        get(&server.url("/plain.py")).await,
        (200, "Hello World\n".to_string())
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_cgi_scripts() {
    let temp = TempDir::new().unwrap();
    write_script(
        &temp.path().join("hello.py"),
        "printf 'Content-Type: text/plain\\n\\nHello World\\n'\n",
    );
    write_script(
        &temp.path().join("header.py"),
        "printf 'Content-Type: text/plain\\n\\n%s' \"$HTTP_ACCEPT\"\n",
    );
    write_script(
        &temp.path().join("cgi-bin").join("moved"),
        "printf 'Location: /hello.py\\n\\n'\n",
    );
    let server = start_handler(shell_cgi_handler(temp.path())).await;

    assert_eq!(
        get(&server.url("/hello.py")).await,
        (200, "Hello World\n".to_string())
    );
    assert_eq!(
        get(&server.url("/hello.py?/hello")).await,
        (200, "Hello World\n".to_string())
    );

    let client = reqwest::Client::new();
    let response = client
        .get(server.url("/header.py"))
        .header("Accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "application/json");

    let response = client
        .post(server.url("/hello.py"))
        .body("ignored")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let redirect = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = redirect.get(server.url("/cgi-bin/moved")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 302);
    assert_eq!(response.headers()["location"], "/hello.py");
}
