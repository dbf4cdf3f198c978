use std::ffi::OsStr;
use std::fmt::Write as _;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const ETAG: &str = "\"v1\"";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

type RequestLog = Arc<Mutex<Vec<RecordedRequest>>>;

pub struct ServerHandle {
    pub url: String,
    requests: RequestLog,
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawns a small HTTP/1.1 server with a handful of fixed routes:
///
/// - `/status/{code}` answers with that status
/// - `/login` sets `session=abc`, `/logout` expires it
/// - `/whoami` echoes the `Cookie` header, or `anonymous`
/// - `/etag` serves an `ETag` and honours `If-None-Match`
/// - anything else answers `200 OK`
///
/// Returns `Ok(None)` when the sandbox forbids binding a local socket.
///
/// # Errors
///
/// Returns an error if the listener cannot be configured.
pub fn spawn_http_server_or_skip() -> Result<Option<ServerHandle>, String> {
    let listener = match TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => listener,
        Err(err) if err.kind() == ErrorKind::PermissionDenied => return Ok(None),
        Err(err) => return Err(format!("bind test server failed: {}", err)),
    };
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let requests: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match listener.accept() {
                Ok((stream, _)) => {
                    let log = Arc::clone(&log);
                    thread::spawn(move || handle_client(stream, &log));
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
    });

    Ok(Some(ServerHandle {
        url: format!("http://{}", addr),
        requests,
        shutdown: shutdown_tx,
        thread: Some(handle),
    }))
}

fn handle_client(mut stream: TcpStream, log: &RequestLog) {
    if stream.set_nonblocking(false).is_err() || stream.set_read_timeout(Some(READ_TIMEOUT)).is_err()
    {
        return;
    }
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let response = respond(&request);
    log.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(request);

    if stream.write_all(&response).is_err() || stream.flush().is_err() {
        return;
    }
    drop(stream.shutdown(Shutdown::Both));
}

fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buffer) {
            break pos;
        }
        let read = stream.read(&mut chunk).ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(chunk.get(..read)?);
    };

    let head = String::from_utf8_lossy(buffer.get(..head_end)?).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_owned();
    let target = request_line.next()?;
    let path = target.split('?').next().unwrap_or(target).to_owned();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = head_end.saturating_add(4);
    while buffer.len() < body_start.saturating_add(content_length) {
        let read = stream.read(&mut chunk).ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(chunk.get(..read)?);
    }
    let body = buffer.get(body_start..)?.to_vec();

    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

fn respond(request: &RecordedRequest) -> Vec<u8> {
    let mut headers: Vec<(&str, String)> = Vec::new();
    let (status, body) = match request.path.as_str() {
        "/login" => {
            headers.push(("Set-Cookie", "session=abc; Path=/".to_owned()));
            (200, "logged in".to_owned())
        }
        "/logout" => {
            headers.push(("Set-Cookie", "session=; Max-Age=0; Path=/".to_owned()));
            (200, "bye".to_owned())
        }
        "/whoami" => (
            200,
            request.header("cookie").unwrap_or("anonymous").to_owned(),
        ),
        "/etag" => {
            headers.push(("ETag", ETAG.to_owned()));
            if request.header("if-none-match") == Some(ETAG) {
                (304, String::new())
            } else {
                (200, "tagged".to_owned())
            }
        }
        path => match path.strip_prefix("/status/") {
            Some(code) => (code.parse::<u16>().unwrap_or(400), "status".to_owned()),
            None => (200, "OK".to_owned()),
        },
    };

    let mut response = format!("HTTP/1.1 {} {}\r\n", status, reason(status));
    for (name, value) in headers {
        let _write_result = write!(response, "{}: {}\r\n", name, value);
    }
    let _write_result = write!(
        response,
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    response.into_bytes()
}

const fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        304 => "Not Modified",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

/// Returns a local URL nothing listens on, or `Ok(None)` when the sandbox
/// forbids binding a local socket.
///
/// # Errors
///
/// Returns an error if the probe listener cannot report its address.
pub fn closed_port_url_or_skip() -> Result<Option<String>, String> {
    let listener = match TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => listener,
        Err(err) if err.kind() == ErrorKind::PermissionDenied => return Ok(None),
        Err(err) => return Err(format!("bind failed: {}", err)),
    };
    let addr = listener
        .local_addr()
        .map_err(|err| format!("listener addr failed: {}", err))?;
    drop(listener);
    Ok(Some(format!("http://{}", addr)))
}

/// Run the `sortie` binary and capture output.
///
/// # Errors
///
/// Returns an error if the binary cannot be executed.
pub fn run_sortie<I, S>(args: I) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = sortie_bin()?;
    Command::new(bin)
        .args(args)
        .env("SORTIE_LOG", "error")
        .output()
        .map_err(|err| format!("run sortie failed: {}", err))
}

fn sortie_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_sortie").map_or_else(
        || Err("CARGO_BIN_EXE_sortie missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}
