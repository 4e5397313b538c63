//! CGI script detection and execution.
//!
//! Any existing `*.py` file below the served root is treated as a CGI
//! script, as is anything under `/cgi-bin/` or `/htbin/`. `*.py` scripts
//! run through a Python interpreter as `{interpreter} -u {script}`; other
//! scripts are executed directly and need the executable bit.

use crate::responder::{Body, RequestInfo, bytes_response, error_response, split_query};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use moldserve_core::identifier::normpath;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};

pub const CGI_DIRECTORIES: &[&str] = &["/cgi-bin", "/htbin"];

const SERVER_SOFTWARE: &str = concat!("moldserve/", env!("CARGO_PKG_VERSION"));

/// A request target that resolved to a CGI script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgiScript {
    /// URL path of the script itself.
    pub script_name: String,
    /// Extra path after the script (only for CGI directories).
    pub path_info: String,
    pub query: String,
    pub file: PathBuf,
}

/// Map a URL path onto `root`, ignoring anything that would climb above it.
pub fn translate_path(root: &Path, url_path: &str) -> PathBuf {
    let decoded = percent_decode_str(url_path).decode_utf8_lossy();
    let mut path = root.to_path_buf();
    for segment in normpath(&decoded).split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}

/// Decide whether `target` names a CGI script under `root`.
///
/// Returns `(is_cgi, path, query)` where `path` is the target without its
/// query string.
pub fn is_cgi<'a>(target: &'a str, root: &Path) -> (bool, &'a str, &'a str) {
    let (path, query) = split_query(target);
    (locate(target, root).is_some(), path, query)
}

/// Resolve `target` to the CGI script it names, if any.
pub fn locate(target: &str, root: &Path) -> Option<CgiScript> {
    let (path, query) = split_query(target);
    let normalized = normpath(path);

    if normalized.ends_with(".py") {
        let file = translate_path(root, &normalized);
        if file.is_file() {
            return Some(CgiScript {
                script_name: normalized,
                path_info: String::new(),
                query: query.to_string(),
                file,
            });
        }
        return None;
    }

    for dir in CGI_DIRECTORIES {
        let Some(rest) = normalized.strip_prefix(dir) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix('/') else {
            continue;
        };

        // The first existing file along the path is the script, the
        // remainder becomes PATH_INFO.
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        for i in 1..=segments.len() {
            let script_name = format!("{}/{}", dir, segments[..i].join("/"));
            let file = translate_path(root, &script_name);
            if file.is_file() {
                let path_info = if i < segments.len() {
                    format!("/{}", segments[i..].join("/"))
                } else {
                    String::new()
                };
                return Some(CgiScript {
                    script_name,
                    path_info,
                    query: query.to_string(),
                    file,
                });
            }
            if !file.is_dir() {
                break;
            }
        }
    }

    None
}

fn header_str(request: &RequestInfo, name: &str) -> String {
    request
        .headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(",")
}

/// Environment handed to the script on top of the server's own.
pub fn build_env(script: &CgiScript, request: &RequestInfo) -> Vec<(String, String)> {
    let (server_name, server_port) = match request.local_addr {
        Some(addr) => (addr.ip().to_string(), addr.port().to_string()),
        None => (String::new(), String::new()),
    };
    let remote_addr = request
        .remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default();

    let mut env = vec![
        ("GATEWAY_INTERFACE", "CGI/1.1".to_string()),
        ("SERVER_SOFTWARE", SERVER_SOFTWARE.to_string()),
        ("SERVER_NAME", server_name),
        ("SERVER_PORT", server_port),
        ("SERVER_PROTOCOL", format!("{:?}", request.version)),
        ("REQUEST_METHOD", request.method.to_string()),
        ("SCRIPT_NAME", script.script_name.clone()),
        ("PATH_INFO", script.path_info.clone()),
        ("QUERY_STRING", script.query.clone()),
        ("REMOTE_ADDR", remote_addr),
        ("HTTP_ACCEPT", header_str(request, "accept")),
        ("HTTP_USER_AGENT", header_str(request, "user-agent")),
        ("HTTP_COOKIE", header_str(request, "cookie")),
        ("HTTP_REFERER", header_str(request, "referer")),
        ("CONTENT_TYPE", header_str(request, "content-type")),
    ];
    if !script.path_info.is_empty() {
        let translated = translate_path(Path::new("/"), &script.path_info);
        env.push(("PATH_TRANSLATED", translated.display().to_string()));
    }
    env.push((
        "CONTENT_LENGTH",
        if request.body.is_empty() {
            String::new()
        } else {
            request.body.len().to_string()
        },
    ));

    env.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Turn raw script output into a response.
///
/// Output is a block of `Name: value` lines, a blank line, then the body. A
/// `Status:` header sets the status; a bare `Location:` implies a redirect.
pub fn parse_output(output: &[u8]) -> Response<Body> {
    let (head, body) = split_head(output);

    let mut status = StatusCode::OK;
    let mut content_type = None;
    let mut extra = Vec::new();
    let mut saw_location = false;
    let mut saw_status = false;

    for line in head.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "status" => {
                let code = value.split_whitespace().next().unwrap_or_default();
                if let Ok(code) = code.parse::<u16>()
                    && let Ok(parsed) = StatusCode::from_u16(code)
                {
                    status = parsed;
                    saw_status = true;
                }
            }
            "content-type" => content_type = Some(value.to_string()),
            other => {
                if other == "location" {
                    saw_location = true;
                }
                extra.push((other.to_string(), value.to_string()));
            }
        }
    }

    if saw_location && !saw_status {
        status = StatusCode::FOUND;
    }

    let mut response = bytes_response(
        status,
        content_type.as_deref().unwrap_or("text/plain"),
        body.to_vec(),
    );
    for (name, value) in extra {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            response.headers_mut().append(name, value);
        }
    }
    response
}

fn split_head(output: &[u8]) -> (String, &[u8]) {
    for separator in [&b"\r\n\r\n"[..], &b"\n\n"[..]] {
        if let Some(pos) = output
            .windows(separator.len())
            .position(|window| window == separator)
        {
            let head = String::from_utf8_lossy(&output[..pos]).into_owned();
            return (head, &output[pos + separator.len()..]);
        }
    }
    (String::new(), output)
}

/// Whether `script` is handed to the interpreter instead of executed.
pub fn is_python(script: &CgiScript) -> bool {
    script.script_name.ends_with(".py")
}

/// The command line for `script`, before environment and stdio are set.
pub fn command_for(script: &CgiScript, interpreter: &str) -> tokio::process::Command {
    if is_python(script) {
        let mut command = tokio::process::Command::new(interpreter);
        command.arg("-u").arg(&script.file);
        command
    } else {
        tokio::process::Command::new(&script.file)
    }
}

/// Execute `script` for `request` and translate its output.
pub async fn run(script: &CgiScript, request: &RequestInfo, interpreter: &str) -> Response<Body> {
    let mut command = command_for(script, interpreter);
    if let Some(dir) = script.file.parent() {
        command.current_dir(dir);
    }
    command
        .envs(build_env(script, request))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!("CGI script {} could not be executed: {}", script.script_name, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "CGI script could not be executed");
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        if !request.body.is_empty()
            && let Err(e) = stdin.write_all(&request.body).await
        {
            warn!("CGI script {} did not take its input: {}", script.script_name, e);
        }
        drop(stdin);
    }

    let output = match child.wait_with_output().await {
        Ok(output) => output,
        Err(e) => {
            error!("CGI script {} failed: {}", script.script_name, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "CGI script failed");
        }
    };

    if !output.stderr.is_empty() {
        warn!(
            "CGI script {} stderr: {}",
            script.script_name,
            String::from_utf8_lossy(&output.stderr).trim_end()
        );
    }
    if !output.status.success() {
        error!("CGI script {} exit status {}", script.script_name, output.status);
    }

    parse_output(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "print('hello')").unwrap();
    }

    #[test]
    fn test_is_cgi_filename() {
        let temp = TempDir::new().unwrap();
        let (result, path, query) = is_cgi("/somewhere/path.txt", temp.path());
        assert!(!result);
        assert_eq!(path, "/somewhere/path.txt");
        assert_eq!(query, "");
    }

    #[test]
    fn test_is_cgi_python_not_exists() {
        let temp = TempDir::new().unwrap();
        let (result, path, query) = is_cgi("/nowhere/path.py", temp.path());
        assert!(!result);
        assert_eq!(path, "/nowhere/path.py");
        assert_eq!(query, "");
    }

    #[test]
    fn test_is_cgi_python_exists() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "script.py");

        let (result, path, query) = is_cgi("script.py", temp.path());
        assert!(result);
        assert_eq!(path, "script.py");
        assert_eq!(query, "");
    }

    #[test]
    fn test_is_cgi_query() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "some/nested/script.py");

        let (result, path, query) = is_cgi("/some/nested/script.py?some_argument", temp.path());
        assert!(result);
        assert_eq!(path, "/some/nested/script.py");
        assert_eq!(query, "some_argument");

        let (result, path, query) = is_cgi("/some/nested/script.py?path/argument", temp.path());
        assert!(result);
        assert_eq!(path, "/some/nested/script.py");
        assert_eq!(query, "path/argument");
    }

    #[test]
    fn test_locate_cgi_bin_path_info() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "cgi-bin/report");

        let script = locate("/cgi-bin/report/extra/path?x=1", temp.path()).unwrap();
        assert_eq!(script.script_name, "/cgi-bin/report");
        assert_eq!(script.path_info, "/extra/path");
        assert_eq!(script.query, "x=1");

        assert!(locate("/cgi-bin/missing", temp.path()).is_none());
        assert!(locate("/cgi-binary/report", temp.path()).is_none());
    }

    #[test]
    fn test_translate_path_stays_under_root() {
        let root = Path::new("/srv/www");
        assert_eq!(translate_path(root, "/../../etc/passwd"), root.join("etc/passwd"));
        assert_eq!(translate_path(root, "/a%20b/c.txt"), root.join("a b/c.txt"));
    }

    #[test]
    fn test_build_env() {
        let script = CgiScript {
            script_name: "/header.py".to_string(),
            path_info: String::new(),
            query: "a=b".to_string(),
            file: PathBuf::from("/srv/header.py"),
        };
        let mut request = RequestInfo::get("/header.py?a=b");
        request
            .headers
            .append("accept", HeaderValue::from_static("application/json"));
        request
            .headers
            .append("accept", HeaderValue::from_static("text/html"));

        let env: std::collections::HashMap<String, String> =
            build_env(&script, &request).into_iter().collect();
        assert_eq!(env["HTTP_ACCEPT"], "application/json,text/html");
        assert_eq!(env["QUERY_STRING"], "a=b");
        assert_eq!(env["REQUEST_METHOD"], "GET");
        assert_eq!(env["SCRIPT_NAME"], "/header.py");
        assert_eq!(env["CONTENT_LENGTH"], "");
        assert_eq!(env["HTTP_COOKIE"], "");
    }

    #[test]
    fn test_python_scripts_use_interpreter() {
        let python = CgiScript {
            script_name: "/table.py".to_string(),
            path_info: String::new(),
            query: String::new(),
            file: PathBuf::from("/srv/table.py"),
        };
        let command = command_for(&python, "python3");
        let command = command.as_std();
        assert_eq!(command.get_program(), "python3");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, ["-u", "/srv/table.py"]);

        let binary = CgiScript {
            script_name: "/cgi-bin/report".to_string(),
            file: PathBuf::from("/srv/cgi-bin/report"),
            ..python
        };
        let command = command_for(&binary, "python3");
        assert_eq!(command.as_std().get_program(), "/srv/cgi-bin/report");
        assert_eq!(command.as_std().get_args().count(), 0);
    }

    #[test]
    fn test_parse_output() {
        let response = parse_output(b"Content-Type: text/html\nX-Extra: 1\n\nHello World\n");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/html");
        assert_eq!(response.headers()["x-extra"], "1");

        let response = parse_output(b"Status: 404 Not Found\r\n\r\nmissing");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = parse_output(b"Location: /elsewhere\n\n");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/elsewhere");
    }
}
