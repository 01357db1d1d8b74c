//! Loopback fake SOCKS5 proxy that also plays the chat server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::proxy::ProxyEndpoint;

/// How the fake proxy answers.
#[derive(Clone)]
pub(crate) struct FakeProxyOptions {
    pub method_reply: [u8; 2],
    pub credentials: Option<(String, String)>,
    pub connect_status: u8,
    /// ATYP followed by the bound address bytes
    pub bound_address: Vec<u8>,
    /// Sent after registration; the reply is recorded as a line
    pub ping: Option<String>,
}

impl Default for FakeProxyOptions {
    fn default() -> Self {
        Self {
            method_reply: [0x05, 0x00],
            credentials: None,
            connect_status: 0x00,
            bound_address: vec![0x01, 127, 0, 0, 1],
            ping: Some("PING :tmi.twitch.tv".into()),
        }
    }
}

/// What one client connection did.
#[derive(Debug, Clone, Default)]
pub(crate) struct SeenSession {
    pub offer: Vec<u8>,
    pub target: (String, u16),
    pub lines: Vec<String>,
    pub closed_by_client: bool,
}

pub(crate) struct FakeProxy {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenSession>>>,
}

impl FakeProxy {
    pub fn endpoint(&self) -> ProxyEndpoint {
        ProxyEndpoint::new(self.addr.ip().to_string(), self.addr.port())
    }

    pub fn sessions(&self) -> Vec<SeenSession> {
        self.seen.lock().clone()
    }

    /// NICK of every finished session, in completion order.
    pub fn nicks(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .filter_map(|s| s.lines.iter().find_map(|l| l.strip_prefix("NICK ")))
            .map(str::to_string)
            .collect()
    }

    pub async fn wait_for_sessions(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.seen.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("fake proxy did not see enough sessions");
    }
}

pub(crate) async fn spawn_fake_proxy(options: FakeProxyOptions) -> FakeProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let seen_accept = Arc::clone(&seen);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let options = options.clone();
            let seen = Arc::clone(&seen_accept);
            tokio::spawn(async move {
                let record = serve(stream, &options).await;
                seen.lock().push(record);
            });
        }
    });

    FakeProxy { addr, seen }
}

async fn serve(stream: TcpStream, options: &FakeProxyOptions) -> SeenSession {
    let mut conn = BufReader::new(stream);
    let mut record = SeenSession::default();

    let mut head = [0u8; 2];
    conn.read_exact(&mut head).await.unwrap();
    let mut methods = vec![0u8; head[1] as usize];
    conn.read_exact(&mut methods).await.unwrap();
    record.offer = [head.to_vec(), methods].concat();

    conn.write_all(&options.method_reply).await.unwrap();

    match options.method_reply[1] {
        0x00 => {}
        0x02 => {
            let mut ver_len = [0u8; 2];
            conn.read_exact(&mut ver_len).await.unwrap();
            let mut user = vec![0u8; ver_len[1] as usize];
            conn.read_exact(&mut user).await.unwrap();
            let mut plen = [0u8; 1];
            conn.read_exact(&mut plen).await.unwrap();
            let mut pass = vec![0u8; plen[0] as usize];
            conn.read_exact(&mut pass).await.unwrap();

            let expected = options
                .credentials
                .as_ref()
                .map(|(u, p)| (u.as_bytes().to_vec(), p.as_bytes().to_vec()));
            if expected == Some((user, pass)) {
                conn.write_all(&[0x01, 0x00]).await.unwrap();
            } else {
                conn.write_all(&[0x01, 0x01]).await.unwrap();
                record.closed_by_client = wait_for_close(&mut conn).await;
                return record;
            }
        }
        _ => {
            record.closed_by_client = wait_for_close(&mut conn).await;
            return record;
        }
    }

    let mut request = [0u8; 5];
    conn.read_exact(&mut request).await.unwrap();
    let mut host = vec![0u8; request[4] as usize];
    conn.read_exact(&mut host).await.unwrap();
    let mut port = [0u8; 2];
    conn.read_exact(&mut port).await.unwrap();
    record.target = (
        String::from_utf8(host).unwrap(),
        u16::from_be_bytes(port),
    );

    let mut reply = vec![0x05, options.connect_status, 0x00];
    reply.extend_from_slice(&options.bound_address);
    reply.extend_from_slice(&[0x00, 0x00]);
    conn.write_all(&reply).await.unwrap();

    if options.connect_status != 0x00 {
        record.closed_by_client = wait_for_close(&mut conn).await;
        return record;
    }

    for _ in 0..3 {
        match read_crlf_line(&mut conn).await {
            Some(line) => record.lines.push(line),
            None => return record,
        }
    }

    if let Some(ping) = &options.ping {
        conn.write_all(format!("{}\r\n", ping).as_bytes()).await.unwrap();
        if let Some(line) = read_crlf_line(&mut conn).await {
            record.lines.push(line);
        }
    }

    record
}

async fn read_crlf_line(conn: &mut BufReader<TcpStream>) -> Option<String> {
    let mut line = String::new();
    match conn.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches("\r\n").to_string()),
    }
}

/// True once the client hangs up without sending anything else.
async fn wait_for_close(conn: &mut BufReader<TcpStream>) -> bool {
    let mut rest = Vec::new();
    matches!(conn.read_to_end(&mut rest).await, Ok(_) if rest.is_empty())
}
