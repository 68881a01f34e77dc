//! Shared fakes for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt};
use signalmice::shutdown::{CommandError, CommandOutput, CommandRunner, MethodError, ShutdownAction};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Command runner that fails the listed programs and records every call.
#[derive(Default)]
pub struct ScriptedRunner {
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedRunner {
    pub fn failing(programs: &[&str]) -> Self {
        Self {
            failing: programs.iter().map(|p| p.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Programs invoked so far, in order.
    pub fn programs(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(
        &'a self,
        program: &'a str,
        _args: &'a [&'a str],
        _ctx: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<CommandOutput, CommandError>> {
        self.calls.lock().unwrap().push(program.to_string());
        let fail = self.failing.iter().any(|p| p == program);
        async move {
            if fail {
                Err(CommandError::Failed {
                    program: program.to_string(),
                    status: "exit status: 1".to_string(),
                    output: "operation not permitted".to_string(),
                })
            } else {
                Ok(CommandOutput::default())
            }
        }
        .boxed()
    }
}

/// Shutdown action with a fixed outcome that appends its name to a shared log.
pub struct ScriptedAction {
    name: String,
    succeed: bool,
    log: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl ScriptedAction {
    pub fn new(name: &str, succeed: bool, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            succeed,
            log,
        }
    }
}

impl ShutdownAction for ScriptedAction {
    fn attempt<'a>(
        &'a self,
        _ctx: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), MethodError>> {
        self.log.lock().unwrap().push(self.name.clone());
        let succeed = self.succeed;
        let name = self.name.clone();
        async move {
            if succeed {
                Ok(())
            } else {
                Err(MethodError::Command(CommandError::Failed {
                    program: name,
                    status: "exit status: 1".to_string(),
                    output: String::new(),
                }))
            }
        }
        .boxed()
    }
}

/// A request seen by the mock backend.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[allow(dead_code)]
impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Start a mock HTTP backend on an ephemeral port that answers every
/// request with `status` and records it.
#[allow(dead_code)]
pub async fn start_recording_backend(
    status: u16,
) -> (SocketAddr, Arc<Mutex<Vec<RecordedRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        if let Some(request) = read_request(&mut socket).await {
                            recorded.lock().unwrap().push(request);
                        }
                        let status_text = match status {
                            200 => "200 OK",
                            201 => "201 Created",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let body = "{}";
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\n\
                             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, requests)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body_end = (header_end + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();

    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}
