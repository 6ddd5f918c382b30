//! Public server-directory fetcher
//!
//! Fetches the plain-text public server list on a background worker
//! thread so the poll loop never blocks on HTTP. `request` is
//! fire-and-forget (duplicate requests for a URL already in flight are
//! ignored); `poll` is non-blocking and returns at most one completed
//! result per call. Fetch failures come back as text in the result,
//! never as a panic.

use std::collections::HashSet;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::types::ServerListEntry;

/// Default port for entries listed without one
const DEFAULT_PORT: u16 = 2049;

/// HTTP timeout for a directory fetch
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Completed directory fetch
#[derive(Debug)]
pub struct ServerListResult {
    pub entries: Vec<ServerListEntry>,
    pub error: Option<String>,
}

/// Background fetcher for the public server directory
pub struct ServerListFetcher {
    result_tx: Sender<ServerListResult>,
    result_rx: Receiver<ServerListResult>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ServerListFetcher {
    pub fn new() -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            result_tx,
            result_rx,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start a fetch for `url` unless one is already in flight
    pub fn request(&self, url: &str) {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(url.to_string()) {
                log::debug!("Server list fetch already in flight for {}", url);
                return;
            }
        }

        let url = url.to_string();
        let result_tx = self.result_tx.clone();
        let in_flight = Arc::clone(&self.in_flight);

        let thread_url = url.clone();
        let spawned = thread::Builder::new()
            .name("server-list-fetch".into())
            .spawn(move || {
                log::info!("Fetching server list from {}", thread_url);
                let result = match fetch_server_list(&thread_url) {
                    Ok(entries) => {
                        log::info!("Server list: {} entries", entries.len());
                        ServerListResult { entries, error: None }
                    }
                    Err(e) => {
                        log::warn!("Server list fetch failed: {:#}", e);
                        ServerListResult {
                            entries: Vec::new(),
                            error: Some(format!("{:#}", e)),
                        }
                    }
                };
                in_flight.lock().unwrap().remove(&thread_url);
                let _ = result_tx.send(result);
            });

        if let Err(e) = spawned {
            log::warn!("Failed to spawn server list fetch thread: {}", e);
            self.in_flight.lock().unwrap().remove(&url);
            let _ = self.result_tx.send(ServerListResult {
                entries: Vec::new(),
                error: Some(format!("Failed to start fetch: {}", e)),
            });
        }
    }

    /// Take one completed result, if any (non-blocking)
    pub fn poll(&self) -> Option<ServerListResult> {
        self.result_rx.try_recv().ok()
    }
}

impl Default for ServerListFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch and parse the directory at `url` (blocking; worker thread only)
fn fetch_server_list(url: &str) -> anyhow::Result<Vec<ServerListEntry>> {
    let response = ureq::get(url)
        .timeout(FETCH_TIMEOUT)
        .call()
        .with_context(|| format!("Failed to fetch server list from {}", url))?;

    let mut body = String::new();
    response
        .into_reader()
        .take(1 << 20)
        .read_to_string(&mut body)
        .context("Failed to read server list body")?;

    Ok(parse_server_list(&body))
}

/// Parse the plain-text directory format
///
/// One entry per line: `SERVER "host:port" "name" "users/max" ["topic"]`.
/// Unparseable lines are skipped.
pub fn parse_server_list(body: &str) -> Vec<ServerListEntry> {
    let mut entries = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        if !line.starts_with("SERVER") {
            continue;
        }

        let fields = quoted_fields(line);
        if fields.len() < 2 {
            continue;
        }

        let (host, port) = match fields[0].rsplit_once(':') {
            Some((host, port_str)) => match port_str.parse::<u16>() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (fields[0].clone(), DEFAULT_PORT),
            },
            None => (fields[0].clone(), DEFAULT_PORT),
        };
        if host.is_empty() {
            continue;
        }

        // "users/max" — only the current count matters here
        let users = fields
            .get(2)
            .and_then(|f| f.split('/').next())
            .and_then(|n| n.trim().parse::<i32>().ok())
            .unwrap_or(0);

        entries.push(ServerListEntry {
            name: fields[1].clone(),
            host,
            port,
            users,
            topic: fields.get(3).cloned().unwrap_or_default(),
        });
    }

    entries
}

/// Extract the double-quoted fields of a directory line
fn quoted_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut rest = line;
    while let Some(start) = rest.find('"') {
        let after = &rest[start + 1..];
        match after.find('"') {
            Some(end) => {
                fields.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    fields
}
