use moldserve_core::testing::{BASIC_TEMPLATE, MoldFixture};
use moldserve_tiny::TinyAdapter;
use std::sync::Arc;
use tiny_http::Server;

const WORKERS: usize = 2;

#[tokio::test(flavor = "multi_thread")]
async fn test_serves_fixture() {
    let fixture = MoldFixture::new();
    let adapter = TinyAdapter::new(Arc::new(fixture.provider("/nunja/")));
    let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
    let addr = server.server_addr().to_ip().unwrap();

    let worker_server = server.clone();
    let handle = std::thread::spawn(move || adapter.serve(&worker_server, WORKERS));

    let get = |path: &str| {
        let url = format!("http://{}{}", addr, path);
        async move {
            let response = reqwest::get(url).await.unwrap();
            let status = response.status().as_u16();
            (status, response.text().await.unwrap())
        }
    };

    let (status, body) = get("/nunja/config.js").await;
    assert_eq!(status, 200);
    assert!(body.starts_with("(function() {\n    'use strict';\n\n"));

    let (status, body) = get("/nunja/init.js").await;
    assert_eq!(status, 200);
    assert!(body.starts_with("'use strict';"));

    assert_eq!(
        get("/nunja/nunja.mold/nunja.testing.mold/basic/template.nja").await,
        (200, BASIC_TEMPLATE.to_string())
    );
    assert_eq!(get("/nunja/nested/init.js").await.0, 404);
    assert_eq!(get("/somewhere/else").await.0, 404);

    for _ in 0..WORKERS {
        server.unblock();
    }
    handle.join().unwrap();
}
