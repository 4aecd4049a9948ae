// src/mirror/fetch.rs
// =============================================================================
// Downloads one remote file to one local path.
//
// Per file, strictly in this order:
// 1. Size:     HEAD the URL to learn its size (retried on network errors,
//              giving up quietly; an unknown size just means "no skip")
// 2. Skip:     local file exists and its size equals the remote size
//              -> Skipped, nothing transferred
// 3. Transfer: GET, stream the body into a fresh ".<name>.<random>.part"
//              sibling, then rename it over the final path. Retried on
//              network errors and bad statuses.
//
// The rename is the reliability guarantee: the final path only ever holds
// the old complete file or the new complete file, never half of one. If the
// process dies mid-transfer, the worst leftover is a stray .part file.
//
// Nothing in here returns an error to the caller. Every file ends up as a
// DownloadOutcome, so one broken file can't take the run down.
// =============================================================================

use futures::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, StatusCode};
use std::path::Path;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::progress::Progress;
use crate::config::HttpSettings;
use crate::error::FetchError;

/// Bytes buffered before each write to disk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Marks an in-progress download next to its final path.
const PART_SUFFIX: &str = ".part";

/// How much of the target's name goes into its temp file name.
const PART_NAME_CHARS: usize = 64;

#[derive(Debug)]
pub enum DownloadOutcome {
    Downloaded { bytes: u64 },
    Skipped,
    Failed(FetchError),
}

// Cheap to clone: the client is reference counted inside
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    http: HttpSettings,
}

impl Fetcher {
    pub fn new(client: Client, http: HttpSettings) -> Self {
        Self { client, http }
    }

    // Mirrors `url` into `local_path`
    //
    // Records the outcome on `progress` exactly once, on every path
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &Url, local_path: &Path, progress: &Progress) -> DownloadOutcome {
        let outcome = self.fetch_file(url, local_path).await;

        match &outcome {
            DownloadOutcome::Downloaded { bytes } => {
                info!(path = %local_path.display(), bytes, "Downloaded");
            }
            DownloadOutcome::Skipped => {
                debug!(path = %local_path.display(), "Skipped, local size matches");
            }
            DownloadOutcome::Failed(e) => {
                error!(error = %e, "Failed to download after retries");
            }
        }

        progress.record(&outcome);
        outcome
    }

    async fn fetch_file(&self, url: &Url, local_path: &Path) -> DownloadOutcome {
        if let Some(parent) = local_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return DownloadOutcome::Failed(FetchError::io(parent, e));
            }
        }

        if let Some(remote_size) = self.remote_size(url).await {
            if local_size(local_path).await == Some(remote_size) {
                return DownloadOutcome::Skipped;
            }
        }

        match self.transfer(url, local_path).await {
            Ok(bytes) => {
                if !self.http.delay.is_zero() {
                    tokio::time::sleep(self.http.delay).await;
                }
                DownloadOutcome::Downloaded { bytes }
            }
            Err(e) => DownloadOutcome::Failed(e),
        }
    }

    // HEAD request for the remote size
    //
    // Returns None when the server doesn't answer, doesn't answer 200,
    // or doesn't send a usable Content-Length
    async fn remote_size(&self, url: &Url) -> Option<u64> {
        for attempt in 1..=self.http.retries {
            match self
                .client
                .head(url.clone())
                .timeout(self.http.timeout)
                .send()
                .await
            {
                Ok(response) if response.status() == StatusCode::OK => {
                    return response
                        .headers()
                        .get(CONTENT_LENGTH)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse().ok());
                }
                Ok(_) => return None,
                Err(e) => {
                    debug!(attempt, error = %e, "HEAD request failed");
                    if attempt < self.http.retries {
                        tokio::time::sleep(self.http.retry_delay).await;
                    }
                }
            }
        }
        None
    }

    async fn transfer(&self, url: &Url, local_path: &Path) -> Result<u64, FetchError> {
        let mut attempt = 1;
        loop {
            match self.transfer_once(url, local_path).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_transient() && attempt < self.http.retries => {
                    warn!(attempt, error = %e, "Download attempt failed, retrying");
                    tokio::time::sleep(self.http.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn transfer_once(&self, url: &Url, local_path: &Path) -> Result<u64, FetchError> {
        let request = self.client.get(url.clone()).send();
        let response = tokio::time::timeout(self.http.timeout, request)
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })?
            .map_err(|e| FetchError::transport(url.as_str(), e))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // `part` deletes its file when dropped, so every early return below
        // cleans up after itself
        let (file, part) = reserve_part_file(local_path)?;
        let written = self.stream_to_file(response, url, file, &part).await?;

        part.persist(local_path)
            .map_err(|e| FetchError::io(local_path, std::io::Error::from(e)))?;

        Ok(written)
    }

    // Streams the body into `file`, returning the bytes written.
    // The timeout is per chunk, so a slow but steady transfer never trips it.
    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        url: &Url,
        file: File,
        part: &Path,
    ) -> Result<u64, FetchError> {
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let next = tokio::time::timeout(self.http.timeout, stream.next())
                .await
                .map_err(|_| FetchError::Timeout {
                    url: url.to_string(),
                })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| FetchError::transport(url.as_str(), e))?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(part, e))?;
            written += chunk.len() as u64;
        }

        writer.flush().await.map_err(|e| FetchError::io(part, e))?;
        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| FetchError::io(part, e))?;

        Ok(written)
    }
}

async fn local_size(path: &Path) -> Option<u64> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.is_file().then(|| metadata.len())
}

// Creates a fresh temp file next to `local_path`, named like
// `.c.txt.Xy12Ab.part`. Creation is exclusive, so two attempts (or two
// workers, or a remote file that happens to be called `c.txt.part`) never
// share one.
fn reserve_part_file(local_path: &Path) -> Result<(File, TempPath), FetchError> {
    let dir = match local_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name: String = local_path
        .file_name()
        .map(|n| n.to_string_lossy().chars().take(PART_NAME_CHARS).collect())
        .unwrap_or_default();

    let named = tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(PART_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| FetchError::io(dir, e))?;

    let (file, path) = named.into_parts();
    Ok((File::from_std(file), path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(retries: u32) -> Fetcher {
        let http = HttpSettings {
            timeout: Duration::from_secs(5),
            retries,
            retry_delay: Duration::ZERO,
            ..HttpSettings::default()
        };
        Fetcher::new(Client::new(), http)
    }

    fn file_url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    // Temp files still sitting in `dir`
    fn leftover_parts(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.to_string_lossy().ends_with(PART_SUFFIX))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_part_files_are_unique_siblings() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("c.txt");

        let (_first_file, first) = reserve_part_file(&target).unwrap();
        let (_second_file, second) = reserve_part_file(&target).unwrap();

        assert_ne!(first.to_path_buf(), second.to_path_buf());
        for part in [&first, &second] {
            assert_eq!(part.parent(), Some(dir.path()));
            let name = part.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with(".c.txt."));
            assert!(name.ends_with(PART_SUFFIX));
        }
    }

    #[tokio::test]
    async fn test_dropped_part_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let (_file, part) = reserve_part_file(&dir.path().join("c.txt")).unwrap();
        let path = part.to_path_buf();
        assert!(path.exists());

        drop(part);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_downloads_new_file_into_missing_dirs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/sub/c.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello mirror".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("sub").join("c.txt");
        let progress = Progress::new(1, false);

        let outcome = fetcher(3)
            .fetch(&file_url(&server, "/a/sub/c.txt"), &target, &progress)
            .await;

        assert!(matches!(outcome, DownloadOutcome::Downloaded { bytes: 12 }));
        assert_eq!(std::fs::read(&target).unwrap(), b"hello mirror");
        assert!(leftover_parts(target.parent().unwrap()).is_empty());
        assert_eq!(progress.completed(), 1);
    }

    #[tokio::test]
    async fn test_skips_when_sizes_match() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/a/b.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-length", "100")
                    .set_body_bytes(vec![0u8; 100]),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a/b.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 100]))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b.txt");
        std::fs::write(&target, vec![7u8; 100]).unwrap();
        let progress = Progress::new(1, false);

        let outcome = fetcher(3)
            .fetch(&file_url(&server, "/a/b.txt"), &target, &progress)
            .await;

        assert!(matches!(outcome, DownloadOutcome::Skipped));
        assert_eq!(std::fs::read(&target).unwrap(), vec![7u8; 100]);
        assert_eq!(progress.completed(), 1);
    }

    #[tokio::test]
    async fn test_redownloads_when_sizes_differ() {
        let server = MockServer::start().await;
        Mock::given(path("/a/b.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 100]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b.txt");
        std::fs::write(&target, b"stale").unwrap();
        let progress = Progress::new(1, false);

        let outcome = fetcher(3)
            .fetch(&file_url(&server, "/a/b.txt"), &target, &progress)
            .await;

        assert!(matches!(outcome, DownloadOutcome::Downloaded { bytes: 100 }));
        assert_eq!(std::fs::read(&target).unwrap(), vec![1u8; 100]);
    }

    #[tokio::test]
    async fn test_unknown_remote_size_always_downloads() {
        let server = MockServer::start().await;
        // No HEAD mock: wiremock answers 404, so the size stays unknown
        Mock::given(method("GET"))
            .and(path("/a/b.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b.txt");
        std::fs::write(&target, b"abc").unwrap();
        let progress = Progress::new(1, false);

        let outcome = fetcher(3)
            .fetch(&file_url(&server, "/a/b.txt"), &target, &progress)
            .await;

        assert!(matches!(outcome, DownloadOutcome::Downloaded { .. }));
    }

    #[tokio::test]
    async fn test_accepts_partial_content_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/b.txt"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"part".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b.txt");
        let progress = Progress::new(1, false);

        let outcome = fetcher(1)
            .fetch(&file_url(&server, "/a/b.txt"), &target, &progress)
            .await;

        assert!(matches!(outcome, DownloadOutcome::Downloaded { bytes: 4 }));
    }

    #[tokio::test]
    async fn test_three_503s_fail_and_count_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/b.txt"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b.txt");
        let progress = Progress::new(1, false);

        let outcome = fetcher(3)
            .fetch(&file_url(&server, "/a/b.txt"), &target, &progress)
            .await;

        match outcome {
            DownloadOutcome::Failed(FetchError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected a 503 failure, got {:?}", other),
        }
        assert_eq!(progress.completed(), 1);
        assert!(!target.exists());
        assert!(leftover_parts(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/b.txt"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a/b.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b.txt");
        let progress = Progress::new(1, false);

        let outcome = fetcher(3)
            .fetch(&file_url(&server, "/a/b.txt"), &target, &progress)
            .await;

        assert!(matches!(outcome, DownloadOutcome::Downloaded { bytes: 2 }));
        assert_eq!(progress.completed(), 1);
    }

    #[tokio::test]
    async fn test_slow_headers_keep_existing_file_intact() {
        let server = MockServer::start().await;
        // Slow headers trip the timeout on every attempt
        Mock::given(method("GET"))
            .and(path("/a/b.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![9u8; 64])
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b.txt");
        std::fs::write(&target, b"previous complete download").unwrap();
        let progress = Progress::new(1, false);

        let http = HttpSettings {
            timeout: Duration::from_millis(100),
            retries: 2,
            retry_delay: Duration::ZERO,
            ..HttpSettings::default()
        };
        let outcome = Fetcher::new(Client::new(), http)
            .fetch(&file_url(&server, "/a/b.txt"), &target, &progress)
            .await;

        assert!(matches!(outcome, DownloadOutcome::Failed(FetchError::Timeout { .. })));
        assert_eq!(
            std::fs::read(&target).unwrap(),
            b"previous complete download"
        );
        assert!(leftover_parts(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_filesystem_error_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/sub/c.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        // A regular file where the parent directory should be
        let blocker = dir.path().join("sub");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let target = blocker.join("c.txt");
        let progress = Progress::new(1, false);

        let outcome = fetcher(3)
            .fetch(&file_url(&server, "/a/sub/c.txt"), &target, &progress)
            .await;

        assert!(matches!(outcome, DownloadOutcome::Failed(FetchError::Io { .. })));
        assert_eq!(progress.completed(), 1);
    }

    // Reads one request head (requests here never carry a body)
    async fn read_request_head(socket: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => head.extend_from_slice(&buf[..n]),
            }
        }
        String::from_utf8_lossy(&head).into_owned()
    }

    // Bare HTTP server for failures wiremock can't produce (cut bodies,
    // hang-ups). `respond` gets the request line and returns the raw bytes
    // to send back, or None to hang up without answering. One exchange per
    // connection.
    async fn raw_server<F>(respond: F) -> SocketAddr
    where
        F: Fn(&str) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let respond = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let head = read_request_head(&mut socket).await;
                    let request_line = head.lines().next().unwrap_or_default().to_string();
                    if let Some(reply) = respond(&request_line) {
                        let _ = socket.write_all(&reply).await;
                        let _ = socket.shutdown().await;
                    }
                });
            }
        });

        addr
    }

    const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    #[tokio::test]
    async fn test_connection_cut_mid_body_keeps_existing_file() {
        let gets = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&gets);
        let addr = raw_server(move |request_line| {
            if request_line.starts_with("HEAD") {
                return Some(NOT_FOUND.to_vec());
            }
            counter.fetch_add(1, Ordering::SeqCst);
            // Promises 100 bytes, sends 10, hangs up
            let mut reply =
                b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n".to_vec();
            reply.extend_from_slice(&[b'n'; 10]);
            Some(reply)
        })
        .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b.txt");
        std::fs::write(&target, b"previous complete download").unwrap();
        let progress = Progress::new(1, false);

        let url = Url::parse(&format!("http://{}/a/b.txt", addr)).unwrap();
        let outcome = fetcher(2).fetch(&url, &target, &progress).await;

        assert!(matches!(outcome, DownloadOutcome::Failed(FetchError::Transport { .. })));
        assert_eq!(gets.load(Ordering::SeqCst), 2);
        assert_eq!(
            std::fs::read(&target).unwrap(),
            b"previous complete download"
        );
        assert!(leftover_parts(dir.path()).is_empty());
        assert_eq!(progress.completed(), 1);
    }

    #[tokio::test]
    async fn test_head_hangups_are_retried_then_download_proceeds() {
        let heads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&heads);
        let addr = raw_server(move |request_line| {
            if request_line.starts_with("HEAD") {
                counter.fetch_add(1, Ordering::SeqCst);
                return None;
            }
            Some(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok".to_vec())
        })
        .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b.txt");
        let progress = Progress::new(1, false);

        let url = Url::parse(&format!("http://{}/a/b.txt", addr)).unwrap();
        let outcome = fetcher(3).fetch(&url, &target, &progress).await;

        assert!(matches!(outcome, DownloadOutcome::Downloaded { bytes: 2 }));
        assert_eq!(heads.load(Ordering::SeqCst), 3);
        assert_eq!(std::fs::read(&target).unwrap(), b"ok");
    }

    #[tokio::test]
    async fn test_download_leaves_same_named_part_file_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/b.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bee".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b.txt");
        // A mirrored remote file that happens to carry the temp suffix
        let neighbour = dir.path().join("b.txt.part");
        std::fs::write(&neighbour, b"a real remote file").unwrap();
        let progress = Progress::new(1, false);

        let outcome = fetcher(1)
            .fetch(&file_url(&server, "/a/b.txt"), &target, &progress)
            .await;

        assert!(matches!(outcome, DownloadOutcome::Downloaded { bytes: 3 }));
        assert_eq!(std::fs::read(&target).unwrap(), b"bee");
        assert_eq!(std::fs::read(&neighbour).unwrap(), b"a real remote file");
    }
}
