//! Git protocol v2 client over smart HTTP.
//!
//! Implements just enough of the protocol to list refs and fetch the tree of
//! a single commit with a shallow fetch.
//! See: https://git-scm.com/docs/protocol-v2

use crate::config::ClientConfig;
use crate::interrupt::{CancellationFlag, Interruptible};
use crate::pack::{unpack, PackSummary};
use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::transport::{HttpTransport, Method, Request, Response, Transport};
use crate::{GitError, Result};
use gitfs_storage::{ObjectId, ObjectStore};
use gitfs_vfs::TreeFs;
use std::collections::BTreeMap;
use std::io::Read;

/// Content type of a capability advertisement.
pub const ADVERTISEMENT_CONTENT_TYPE: &str = "application/x-git-upload-pack-advertisement";
/// Content type of an upload-pack command request.
pub const REQUEST_CONTENT_TYPE: &str = "application/x-git-upload-pack-request";
/// Content type of an upload-pack command result.
pub const RESULT_CONTENT_TYPE: &str = "application/x-git-upload-pack-result";

/// Sideband channel carrying pack data.
const BAND_DATA: u8 = 1;
/// Sideband channel carrying progress text.
const BAND_PROGRESS: u8 = 2;
/// Sideband channel carrying a fatal error.
const BAND_ERROR: u8 = 3;

/// How much of an error response body to keep in messages.
const ERROR_BODY_LIMIT: u64 = 1024;

/// A single git reference, like `refs/heads/main` or `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ref {
    /// Full reference name.
    pub name: String,
    /// Object the reference points to.
    pub id: ObjectId,
}

/// A connection to one remote repository.
///
/// Created by a successful capability handshake; every command reuses the
/// capabilities negotiated then.
pub struct Client<T> {
    url: String,
    transport: T,
    config: ClientConfig,
    capabilities: BTreeMap<String, String>,
    interrupt: CancellationFlag,
}

impl Client<HttpTransport> {
    /// Connects to `url` over HTTP(S).
    pub fn connect_http(url: &str, config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::connect_with(url, transport, config, CancellationFlag::new())
    }
}

impl<T: Transport> Client<T> {
    /// Connects to `url` through `transport` with the default configuration.
    pub fn connect(url: &str, transport: T) -> Result<Self> {
        Self::connect_with(
            url,
            transport,
            ClientConfig::default(),
            CancellationFlag::new(),
        )
    }

    /// Connects to `url`, negotiating protocol v2 capabilities.
    ///
    /// `interrupt` is honoured from the handshake on.
    pub fn connect_with(
        url: &str,
        transport: T,
        config: ClientConfig,
        interrupt: CancellationFlag,
    ) -> Result<Self> {
        config.validate()?;
        let mut client = Self {
            url: url.trim_end_matches('/').to_string(),
            transport,
            config,
            capabilities: BTreeMap::new(),
            interrupt,
        };
        client.capabilities = client.handshake()?;
        tracing::debug!(
            url = %client.url,
            capabilities = client.capabilities.len(),
            "negotiated protocol v2"
        );
        Ok(client)
    }

    /// Replaces the cancellation flag used by later operations.
    pub fn with_interrupt(mut self, interrupt: CancellationFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Returns the remote URL, without a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the capabilities the server advertised, name to argument.
    pub fn capabilities(&self) -> &BTreeMap<String, String> {
        &self.capabilities
    }

    fn handshake(&self) -> Result<BTreeMap<String, String>> {
        let request = Request {
            method: Method::Get,
            url: format!("{}/info/refs?service=git-upload-pack", self.url),
            headers: vec![
                ("Accept".to_string(), "*/*".to_string()),
                ("Git-Protocol".to_string(), "version=2".to_string()),
            ],
            body: Vec::new(),
        };
        let response = self.send("handshake", request)?;
        let failed = |reason: String| self.cancelled_or(GitError::HandshakeFailed(reason));

        if response.status != 200 {
            let body = error_body(response.body);
            return Err(failed(format!("HTTP {}: {body}", response.status)));
        }
        if response.content_type != ADVERTISEMENT_CONTENT_TYPE {
            return Err(failed(format!(
                "invalid response Content-Type: {}",
                response.content_type
            )));
        }

        let mut reader = PktLineReader::new(response.body);
        let mut lines = reader
            .lines()
            .map_err(|e| failed(format!("parsing response: {e}")))?;
        if lines.len() == 1 && lines[0] == "# service=git-upload-pack" {
            lines = reader
                .lines()
                .map_err(|e| failed(format!("parsing response: {e}")))?;
        }

        let capabilities: BTreeMap<String, String> = lines
            .iter()
            .map(|line| match line.split_once('=') {
                Some((name, args)) => (name.to_string(), args.to_string()),
                None => (line.clone(), String::new()),
            })
            .collect();
        if !capabilities.contains_key("version 2") {
            return Err(failed(format!("not version 2: {lines:?}")));
        }
        Ok(capabilities)
    }

    /// Lists the remote refs matching any of `prefixes`, or all refs when empty.
    pub fn list_refs<I, S>(&self, prefixes: I) -> Result<Vec<Ref>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.capabilities.contains_key("ls-refs") {
            return Err(GitError::UnsupportedCapability {
                command: "ls-refs",
                capability: "ls-refs",
            });
        }

        let mut writer = PktLineWriter::new(Vec::new());
        writer.write_str("command=ls-refs")?;
        writer.delimiter()?;
        writer.write_str("peel")?;
        writer.write_str("symrefs")?;
        for prefix in prefixes {
            writer.write_str(&format!("ref-prefix {}", prefix.as_ref()))?;
        }
        writer.close()?;

        let response = self.send("ls-refs", self.command_request(writer.into_inner()))?;
        let failed = |reason: String| self.cancelled_or(GitError::RefListingFailed(reason));
        if response.status != 200 {
            let body = error_body(response.body);
            return Err(failed(format!("HTTP {}: {body}", response.status)));
        }
        if response.content_type != RESULT_CONTENT_TYPE {
            return Err(failed(format!(
                "invalid response Content-Type: {}",
                response.content_type
            )));
        }

        let lines = PktLineReader::new(response.body)
            .lines()
            .map_err(|e| failed(format!("parsing response: {e}")))?;
        let refs = lines
            .iter()
            .map(|line| {
                parse_ref_line(line).ok_or_else(|| failed(format!("invalid line: {line:?}")))
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(url = %self.url, refs = refs.len(), "listed refs");
        Ok(refs)
    }

    /// Resolves a ref name, or a 40-digit hex id, to an object id.
    pub fn resolve(&self, name: &str) -> Result<ObjectId> {
        if let Ok(id) = ObjectId::from_hex(name) {
            return Ok(id);
        }
        self.list_refs([name])?
            .into_iter()
            .find(|known| known.name == name)
            .map(|known| known.id)
            .ok_or_else(|| GitError::UnknownRef(name.to_string()))
    }

    /// Fetches the tree of commit `id` into a fresh store.
    pub fn fetch(&self, id: ObjectId) -> Result<ObjectStore> {
        let mut store = ObjectStore::new();
        self.fetch_into(id, &mut store)?;
        Ok(store)
    }

    /// Fetches the tree of commit `id` into `store`.
    pub fn fetch_into(&self, id: ObjectId, store: &mut ObjectStore) -> Result<PackSummary> {
        let pack = self.download_pack(id)?;
        if !pack.starts_with(b"PACK") {
            return Err(GitError::InvalidPack(
                "response is not a packfile".to_string(),
            ));
        }
        self.interrupt.check()?;
        unpack(&pack, store)
    }

    /// Resolves `name` and returns the commit id with a filesystem over its tree.
    pub fn clone(&self, name: &str) -> Result<(ObjectId, TreeFs)> {
        let id = self.resolve(name)?;
        let fs = self.clone_hash(id)?;
        Ok((id, fs))
    }

    /// Returns a filesystem over the tree of commit `id`.
    pub fn clone_hash(&self, id: ObjectId) -> Result<TreeFs> {
        let store = self.fetch(id)?;
        let tree = store.commit_tree(&id)?;
        tracing::info!(url = %self.url, commit = %id, %tree, objects = store.len(), "cloned");
        Ok(TreeFs::new(store, tree))
    }

    /// Runs a shallow fetch of `id`, returning the raw pack bytes.
    fn download_pack(&self, id: ObjectId) -> Result<Vec<u8>> {
        let fetch_args = self
            .capabilities
            .get("fetch")
            .ok_or(GitError::UnsupportedCapability {
                command: "fetch",
                capability: "fetch",
            })?;
        if !fetch_args.split_whitespace().any(|arg| arg == "shallow") {
            return Err(GitError::UnsupportedCapability {
                command: "fetch",
                capability: "shallow",
            });
        }

        let mut writer = PktLineWriter::new(Vec::new());
        writer.write_str("command=fetch")?;
        writer.delimiter()?;
        writer.write_str("deepen 1")?;
        writer.write_str(&format!("want {id}"))?;
        writer.write_str("done")?;
        writer.close()?;

        let response = self.send("fetch", self.command_request(writer.into_inner()))?;
        let failed = |reason: String| self.cancelled_or(GitError::RemoteFetchError(reason));
        if response.status != 200 {
            let body = error_body(response.body);
            return Err(failed(format!("HTTP {}: {body}", response.status)));
        }
        if response.content_type != RESULT_CONTENT_TYPE {
            return Err(failed(format!(
                "invalid response Content-Type: {}",
                response.content_type
            )));
        }

        // Plain text sections until "packfile", then sideband packets whose
        // first byte names the channel.
        let mut reader = PktLineReader::new(response.body);
        let mut pack = Vec::new();
        let mut saw_packfile = false;
        loop {
            let line = match reader.read() {
                Ok(PktLine::Flush) => break,
                Ok(PktLine::Delimiter) => continue,
                Ok(PktLine::Data(line)) => line,
                Err(e) => return Err(failed(format!("parsing response: {e}"))),
            };
            if !saw_packfile {
                saw_packfile = line.strip_suffix(b"\n").unwrap_or(&line[..]) == b"packfile";
                continue;
            }
            match line.split_first() {
                Some((&BAND_DATA, data)) => {
                    pack.extend_from_slice(data);
                    if let Some(limit) = self.config.max_pack_bytes {
                        if pack.len() as u64 > limit {
                            return Err(GitError::PackTooLarge { limit });
                        }
                    }
                }
                Some((&BAND_PROGRESS, text)) => {
                    let text = String::from_utf8_lossy(text);
                    tracing::info!("remote: {}", text.trim_end());
                }
                Some((&BAND_ERROR, text)) => {
                    return Err(GitError::RemoteFetchError(format!(
                        "server error: {}",
                        String::from_utf8_lossy(text).trim_end()
                    )));
                }
                _ => tracing::warn!(
                    packet = ?String::from_utf8_lossy(&line),
                    "ignoring unknown sideband packet"
                ),
            }
        }

        tracing::debug!(url = %self.url, %id, bytes = pack.len(), "downloaded pack");
        Ok(pack)
    }

    fn command_request(&self, body: Vec<u8>) -> Request {
        Request {
            method: Method::Post,
            url: format!("{}/git-upload-pack", self.url),
            headers: vec![
                ("Content-Type".to_string(), REQUEST_CONTENT_TYPE.to_string()),
                ("Accept".to_string(), RESULT_CONTENT_TYPE.to_string()),
                ("Git-Protocol".to_string(), "version=2".to_string()),
            ],
            body,
        }
    }

    /// Sends a request, wrapping the response body so reads honour cancellation.
    fn send(&self, op: &'static str, request: Request) -> Result<Response> {
        self.interrupt.check()?;
        tracing::debug!(op, method = ?request.method, url = %request.url, "sending request");
        let response = self
            .transport
            .send(request)
            .map_err(|source| self.cancelled_or(GitError::Transport { op, source }))?;
        Ok(Response {
            status: response.status,
            content_type: response.content_type,
            body: Box::new(Interruptible::new(response.body, self.interrupt.clone())),
        })
    }

    fn cancelled_or(&self, err: GitError) -> GitError {
        if self.interrupt.is_cancelled() {
            GitError::Cancelled
        } else {
            err
        }
    }
}

/// Parses an ls-refs line: `<hex id> <name>[ <attributes>...]`.
fn parse_ref_line(line: &str) -> Option<Ref> {
    let (hash, rest) = line.split_once(' ')?;
    let id = ObjectId::from_hex(hash).ok()?;
    let name = rest.split(' ').next().unwrap_or(rest);
    Some(Ref {
        name: name.to_string(),
        id,
    })
}

/// Reads the start of an error response for inclusion in a message.
fn error_body(body: impl Read) -> String {
    let mut data = Vec::new();
    match body.take(ERROR_BODY_LIMIT).read_to_end(&mut data) {
        Ok(_) => String::from_utf8_lossy(&data).trim_end().to_string(),
        Err(e) => format!("<unreadable body: {e}>"),
    }
}
