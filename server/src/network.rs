//! Server network layer: TCP listener and per-connection tasks
//!
//! Every client speaks newline-delimited JSON. Each accepted socket gets a
//! reader task that feeds envelopes to its [`Connection`] and a writer task
//! that drains the connection's outbound queue, which carries both command
//! responses and the pushes of the connection's watcher.

use crate::dispatcher::{Connection, Services};
use crate::gamecode::CodeGenerator;
use crate::repository::DEFAULT_TTL;
use crate::store::MemoryStore;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Runtime settings of a [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Lifetime of game and session records after their last write
    pub ttl: Duration,
    /// How often expired records are swept out of the store
    pub sweep_interval: Duration,
    pub codes: CodeGenerator,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            sweep_interval: Duration::from_secs(60),
            codes: CodeGenerator::default(),
        }
    }
}

pub struct Server {
    listener: TcpListener,
    store: Arc<MemoryStore>,
    services: Arc<Services>,
    sweep_interval: Duration,
}

impl Server {
    pub async fn new(
        addr: &str,
        store: Arc<MemoryStore>,
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let services = Arc::new(Services::new(store.clone(), config.ttl, config.codes));

        Ok(Server {
            listener,
            store,
            services,
            sweep_interval: config.sweep_interval,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn services(&self) -> Arc<Services> {
        Arc::clone(&self.services)
    }

    /// Spawns task that periodically drops expired records
    fn spawn_sweeper(&self) {
        let store = Arc::clone(&self.store);
        let period = self.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                store.purge_expired().await;
            }
        });
    }

    /// Accepts connections until the listener fails
    pub async fn run(self) -> std::io::Result<()> {
        self.spawn_sweeper();

        loop {
            let (stream, addr) = self.listener.accept().await?;
            let services = Arc::clone(&self.services);

            tokio::spawn(async move {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Could not disable Nagle for {}: {}", addr, e);
                }
                handle_connection(stream, addr, services).await;
            });
        }
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, services: Arc<Services>) {
    let id = services.sessions.connect(addr).await;
    let (reader, mut writer) = stream.into_split();
    let (outbound, mut queue) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        while let Some(mut line) = queue.recv().await {
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                error!("Failed to write to connection {}: {}", id, e);
                break;
            }
        }
    });

    let mut connection = Connection::new(id, services, outbound.clone());
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }

                let response = connection.handle_message(&line).await;
                match serde_json::to_string(&response) {
                    Ok(text) => {
                        if outbound.send(text).is_err() {
                            break;
                        }
                    }
                    Err(e) => error!("Failed to encode response for {}: {}", id, e),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading from connection {}: {}", id, e);
                break;
            }
        }
    }

    connection.close().await;
    drop(connection);
    drop(outbound);

    if let Err(e) = writer_task.await {
        error!("Writer for connection {} failed: {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Command, Response, Verb};

    async fn start_server() -> (SocketAddr, Arc<Services>) {
        let server = Server::new("127.0.0.1:0", Arc::new(MemoryStore::new()), ServerConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let services = server.services();
        tokio::spawn(server.run());
        (addr, services)
    }

    #[tokio::test]
    async fn test_open_session_over_tcp() {
        let (addr, services) = start_server().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let cmd = Command::new("1", Verb::OpenSession);
        let mut text = serde_json::to_string(&cmd).unwrap();
        text.push('\n');
        writer.write_all(text.as_bytes()).await.unwrap();

        let line = lines.next_line().await.unwrap().unwrap();
        let response: Response = serde_json::from_str(&line).unwrap();
        assert_eq!(response.req_id, "1");
        assert!(!response.error);
        assert_eq!(services.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_blank_lines_are_ignored() {
        let (addr, _) = start_server().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"\n\nnot json\n").await.unwrap();

        let line = lines.next_line().await.unwrap().unwrap();
        let response: Response = serde_json::from_str(&line).unwrap();
        assert!(response.error);
        assert_eq!(response.req_id, "");
    }

    #[tokio::test]
    async fn test_disconnect_is_noticed() {
        let (addr, services) = start_server().await;
        let stream = TcpStream::connect(addr).await.unwrap();

        let connected = tokio::time::timeout(Duration::from_secs(2), async {
            while services.sessions.is_empty().await {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(connected.is_ok());

        drop(stream);

        let gone = tokio::time::timeout(Duration::from_secs(2), async {
            while !services.sessions.is_empty().await {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(gone.is_ok());
    }
}
