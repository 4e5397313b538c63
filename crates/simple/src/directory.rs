use crate::cgi;
use crate::options::default_interpreter;
use crate::responder::{Body, RequestInfo, Responder, bytes_response, error_response, text_response};
use async_trait::async_trait;
use hyper::header::{HeaderValue, LOCATION};
use hyper::{Method, Response, StatusCode};
use moldserve_core::dispatch::guess_content_type;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::path::{Path, PathBuf};
use tracing::debug;

const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

const HREF_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Static files, directory listings and CGI scripts below a root directory.
pub struct DirectoryResponder {
    root: PathBuf,
    interpreter: String,
}

impl DirectoryResponder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            interpreter: default_interpreter(),
        }
    }

    /// Run `*.py` scripts with `interpreter` instead of the default.
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    async fn serve_path(&self, request: &RequestInfo) -> Response<Body> {
        let url_path = request.path();
        let file = cgi::translate_path(&self.root, url_path);

        if file.is_dir() {
            if !url_path.ends_with('/') {
                let mut location = format!("{}/", url_path);
                if !request.query().is_empty() {
                    location.push('?');
                    location.push_str(request.query());
                }
                let mut response = text_response(StatusCode::MOVED_PERMANENTLY, "text/plain", "");
                if let Ok(value) = HeaderValue::from_str(&location) {
                    response.headers_mut().insert(LOCATION, value);
                }
                return response;
            }

            for index in INDEX_FILES {
                let candidate = file.join(index);
                if candidate.is_file() {
                    return send_file(&candidate).await;
                }
            }
            return list_directory(&file, url_path).await;
        }

        send_file(&file).await
    }
}

async fn send_file(file: &Path) -> Response<Body> {
    match tokio::fs::read(file).await {
        Ok(content) => {
            let content_type = guess_content_type(&file.to_string_lossy());
            bytes_response(StatusCode::OK, &content_type, content)
        }
        Err(e) => {
            debug!("{}: {}", file.display(), e);
            error_response(StatusCode::NOT_FOUND, "File not found")
        }
    }
}

/// Render an HTML index of `dir`, requested as `url_path`.
pub async fn list_directory(dir: &Path, url_path: &str) -> Response<Body> {
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) => {
            debug!("{}: {}", dir.display(), e);
            return error_response(StatusCode::NOT_FOUND, "No permission to list directory");
        }
    };

    let mut names = Vec::new();
    loop {
        let entry = match reader.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                debug!("{}: listing stopped early: {}", dir.display(), e);
                break;
            }
        };
        let mut name = entry.file_name().to_string_lossy().into_owned();
        match entry.file_type().await {
            Ok(file_type) if file_type.is_dir() => name.push('/'),
            Ok(_) => {}
            Err(e) => debug!("{}: {}", entry.path().display(), e),
        }
        names.push(name);
    }
    names.sort_by_key(|name| name.to_lowercase());

    let decoded_path = percent_decode_str(url_path).decode_utf8_lossy();
    let display_path = html_escape::encode_text(&decoded_path);
    let title = format!("Directory listing for {}", display_path);

    let mut html = String::new();
    html.push_str("<!DOCTYPE HTML>\n<html>\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n</head>\n<body>\n", title));
    html.push_str(&format!("<h1>{}</h1>\n<hr>\n<ul>\n", title));
    for name in &names {
        let href = utf8_percent_encode(name, HREF_ENCODE).to_string();
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            html_escape::encode_double_quoted_attribute(&href),
            html_escape::encode_text(name)
        ));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");

    text_response(StatusCode::OK, "text/html; charset=utf-8", html)
}

#[async_trait]
impl Responder for DirectoryResponder {
    async fn respond(&self, request: &RequestInfo) -> Option<Response<Body>> {
        if let Some(script) = cgi::locate(&request.target, &self.root) {
            return Some(cgi::run(&script, request, &self.interpreter).await);
        }

        let response = if request.method == Method::POST {
            error_response(StatusCode::NOT_IMPLEMENTED, "Can only POST to CGI scripts")
        } else {
            self.serve_path(request).await
        };
        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tempfile::TempDir;

    async fn body_text(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn site() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("file.txt"), "some text").unwrap();
        std::fs::create_dir(temp.path().join("docs")).unwrap();
        std::fs::write(temp.path().join("docs").join("index.html"), "<p>docs</p>").unwrap();
        std::fs::create_dir(temp.path().join("Beta dir")).unwrap();
        std::fs::write(temp.path().join("alpha<&>.txt"), "").unwrap();
        temp
    }

    #[tokio::test]
    async fn test_serves_file() {
        let temp = site();
        let responder = DirectoryResponder::new(temp.path());
        let response = responder.respond(&RequestInfo::get("/file.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(body_text(response).await, "some text");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let temp = site();
        let responder = DirectoryResponder::new(temp.path());
        let response = responder.respond(&RequestInfo::get("/nope.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "404 File not found");
    }

    #[tokio::test]
    async fn test_directory_redirect_and_index() {
        let temp = site();
        let responder = DirectoryResponder::new(temp.path());

        let response = responder.respond(&RequestInfo::get("/docs?x=1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()["location"], "/docs/?x=1");

        let response = responder.respond(&RequestInfo::get("/docs/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "<p>docs</p>");
    }

    #[tokio::test]
    async fn test_directory_listing() {
        let temp = site();
        let responder = DirectoryResponder::new(temp.path());
        let response = responder.respond(&RequestInfo::get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("Directory listing for /"));
        assert!(html.contains("<a href=\"Beta%20dir/\">Beta dir/</a>"));
        assert!(html.contains("alpha&lt;&amp;&gt;.txt"));

        let alpha = html.find("alpha").unwrap();
        let beta = html.find("Beta").unwrap();
        let docs = html.find("docs/").unwrap();
        assert!(alpha < beta && beta < docs);
    }

    #[tokio::test]
    async fn test_listing_escapes_ampersand_in_href() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a&b.txt"), "").unwrap();
        let responder = DirectoryResponder::new(temp.path());
        let html = body_text(responder.respond(&RequestInfo::get("/")).await.unwrap()).await;
        assert!(html.contains("<a href=\"a&amp;b.txt\">a&amp;b.txt</a>"));
    }

    #[test]
    fn test_interpreter_override() {
        let responder = DirectoryResponder::new("/srv").with_interpreter("/opt/python/bin/python3");
        assert_eq!(responder.interpreter(), "/opt/python/bin/python3");
    }

    #[tokio::test]
    async fn test_post_to_static_file() {
        let temp = site();
        let responder = DirectoryResponder::new(temp.path());
        let mut request = RequestInfo::get("/file.txt");
        request.method = Method::POST;
        let response = responder.respond(&request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_traversal_stays_in_root() {
        let temp = site();
        let responder = DirectoryResponder::new(temp.path().join("docs"));
        let response = responder
            .respond(&RequestInfo::get("/../file.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
