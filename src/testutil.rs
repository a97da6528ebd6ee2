// src/testutil.rs
//
// In-process HTTP and FTP fixtures so tests never touch the real network.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Route test logs through the test harness writer; repeated calls are no-ops.
pub fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,oceandata=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Serves fixed bodies by request path (query strings ignored); anything else is a 404.
pub struct StubServer {
    base: String,
    hits: Arc<AtomicUsize>,
}

impl StubServer {
    pub fn start(routes: Vec<(&str, Vec<u8>)>) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let base = format!("http://{}", listener.local_addr().expect("local addr"));
        let routes: HashMap<String, Vec<u8>> =
            routes.into_iter().map(|(p, b)| (p.to_string(), b)).collect();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = respond(stream, &routes);
            }
        });
        StubServer { base, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn respond(stream: TcpStream, routes: &HashMap<String, Vec<u8>>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" {
            break;
        }
    }
    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let path = target.split('?').next().unwrap_or(target);

    let mut stream = stream;
    match routes.get(path) {
        Some(body) => {
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )?;
            stream.write_all(body)?;
        }
        None => {
            stream.write_all(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            )?;
        }
    }
    stream.flush()
}

/// URL of a server that accepts connections but never answers.
pub fn hanging_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind hanging server");
    let url = format!("http://{}/slow", listener.local_addr().expect("local addr"));
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    url
}

/// How [`FtpStub`] answers `RETR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retr {
    /// `150`, the whole file, then `226`.
    Serve,
    /// `550` without opening a transfer.
    Refuse,
    /// `150`, the first half of the file, then `451`.
    Abort,
    /// `150` and then silence on both connections.
    Stall,
}

/// Anonymous passive-mode FTP server for one directory of files.
pub struct FtpStub {
    addr: SocketAddr,
}

impl FtpStub {
    pub fn start(files: Vec<(&str, Vec<u8>)>, retr: Retr) -> FtpStub {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ftp stub");
        let addr = listener.local_addr().expect("local addr");
        let files: BTreeMap<String, Vec<u8>> =
            files.into_iter().map(|(n, b)| (n.to_string(), b)).collect();
        thread::spawn(move || {
            for control in listener.incoming().flatten() {
                let _ = ftp_session(control, &files, retr);
            }
        });
        FtpStub { addr }
    }

    /// `ftp://` URL of `dir` on this server.
    pub fn url(&self, dir: &str) -> String {
        format!("ftp://{}{}", self.addr, dir)
    }
}

fn reply(out: &mut TcpStream, line: &str) -> io::Result<()> {
    write!(out, "{line}\r\n")?;
    out.flush()
}

fn accept_data(passive: &mut Option<TcpListener>) -> io::Result<TcpStream> {
    let listener = passive
        .take()
        .ok_or_else(|| io::Error::other("no PASV before transfer"))?;
    Ok(listener.accept()?.0)
}

fn ftp_session(control: TcpStream, files: &BTreeMap<String, Vec<u8>>, retr: Retr) -> io::Result<()> {
    let mut reader = BufReader::new(control.try_clone()?);
    let mut out = control;
    let mut passive: Option<TcpListener> = None;
    let mut held = Vec::new();
    reply(&mut out, "220 stub ready")?;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim_end();
        let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
        match cmd.to_ascii_uppercase().as_str() {
            "USER" => reply(&mut out, "331 password please")?,
            "PASS" => reply(&mut out, "230 logged in")?,
            "CWD" => reply(&mut out, "250 directory changed")?,
            "TYPE" => reply(&mut out, "200 type set")?,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0")?;
                let port = listener.local_addr()?.port();
                reply(
                    &mut out,
                    &format!("227 Entering Passive Mode (127,0,0,1,{},{})", port >> 8, port & 0xff),
                )?;
                passive = Some(listener);
            }
            "NLST" => {
                reply(&mut out, "150 here comes the listing")?;
                let mut conn = accept_data(&mut passive)?;
                for name in files.keys() {
                    write!(conn, "{name}\r\n")?;
                }
                drop(conn);
                reply(&mut out, "226 listing sent")?;
            }
            "RETR" => {
                let body = files.get(arg).map(Vec::as_slice).unwrap_or_default();
                match retr {
                    Retr::Refuse => reply(&mut out, "550 file unavailable")?,
                    Retr::Serve | Retr::Abort => {
                        reply(&mut out, "150 opening data connection")?;
                        let mut conn = accept_data(&mut passive)?;
                        if retr == Retr::Serve {
                            conn.write_all(body)?;
                            drop(conn);
                            reply(&mut out, "226 transfer complete")?;
                        } else {
                            conn.write_all(&body[..body.len() / 2])?;
                            drop(conn);
                            reply(&mut out, "451 transfer aborted")?;
                        }
                    }
                    Retr::Stall => {
                        reply(&mut out, "150 opening data connection")?;
                        held.push(accept_data(&mut passive)?);
                    }
                }
            }
            "QUIT" => return reply(&mut out, "221 bye"),
            _ => reply(&mut out, "502 not implemented")?,
        }
    }
}
