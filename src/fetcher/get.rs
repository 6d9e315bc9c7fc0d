use std::io::{self, Seek, SeekFrom, Write};
use std::thread;
use std::time::Duration;

use rand::Rng;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use super::errors::{FetchError, is_recoverable_copy_error};
use crate::base_system::context::Config;

const MAX_RETRIES: usize = 10;
const BACKOFF_BASE: Duration = Duration::from_millis(50);

/// Shifts beyond this would overflow the nanosecond budget, so the window
/// stops growing at attempt 62.
const BACKOFF_SHIFT_CAP: u32 = 62;

/// Full-jitter exponential backoff: a uniform draw from
/// `[0, base * 2^min(attempt, 62))`.
fn backoff_time(base: Duration, attempt: usize) -> Duration {
    let shift = (attempt as u32).min(BACKOFF_SHIFT_CAP);
    let window = base.as_nanos() << shift;
    let drawn = rand::rng().random_range(0..window.max(1));
    Duration::from_nanos(drawn.min(u64::MAX as u128) as u64)
}

/// HTTP fetch with bounded retries and resumable streaming transfers.
pub(crate) struct Fetcher {
    client: Client,
    max_retries: usize,
    backoff_base: Duration,
}

impl Fetcher {
    pub(crate) fn new(config: &Config) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );

        let mut builder = Client::builder().default_headers(default_headers);
        if config.request_timeout > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout));
        }

        Ok(Self {
            client: builder.build()?,
            max_retries: MAX_RETRIES,
            backoff_base: BACKOFF_BASE,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_client(client: Client, max_retries: usize, backoff_base: Duration) -> Self {
        Self {
            client,
            max_retries,
            backoff_base,
        }
    }

    /// GET `url`, retrying transport errors and 5xx responses with backoff.
    ///
    /// Any other non-200 status is terminal and reported immediately.
    pub(crate) fn get(&self, url: &str) -> Result<Response, FetchError> {
        self.request(Method::GET, url)
    }

    fn request(&self, method: Method, url: &str) -> Result<Response, FetchError> {
        let mut last = String::new();
        for attempt in 0..self.max_retries {
            match self.client.request(method.clone(), url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_server_error() {
                        debug!(url, %status, attempt, "server error, backing off");
                        last = format!("status {status}");
                        thread::sleep(backoff_time(self.backoff_base, attempt));
                        continue;
                    }
                    if status != StatusCode::OK {
                        return Err(FetchError::UnexpectedStatus {
                            url: url.to_string(),
                            status,
                        });
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    debug!(url, %err, attempt, "transport error, backing off");
                    last = err.to_string();
                    thread::sleep(backoff_time(self.backoff_base, attempt));
                }
            }
        }
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.max_retries,
            last,
        })
    }

    /// Stream `url` into `dest`, resuming across recoverable failures.
    ///
    /// If `existing_size` is non-zero, a HEAD request compares the remote
    /// content length first; an exact match is treated as already downloaded
    /// and nothing is written. This is a size check only, not a content hash.
    ///
    /// During the body copy, timeout/temporary errors, server stream aborts
    /// and peer resets rewind `dest` to the start and retry with backoff; any
    /// other error is terminal.
    pub(crate) fn get_to<W: Write + Seek>(
        &self,
        url: &str,
        dest: &mut W,
        existing_size: u64,
    ) -> Result<(), FetchError> {
        if existing_size > 0 {
            let resp = self.request(Method::HEAD, url)?;
            if resp.content_length() == Some(existing_size) {
                debug!(url, existing_size, "size matches, skipping download");
                return Ok(());
            }
        }

        let mut last = String::new();
        for attempt in 0..self.max_retries {
            let mut resp = self.get(url)?;
            match io::copy(&mut resp, dest) {
                Ok(_) => return Ok(()),
                Err(err) if is_recoverable_copy_error(&err) => {
                    debug!(url, %err, attempt, "recoverable transfer error, restarting");
                    dest.seek(SeekFrom::Start(0))
                        .map_err(|source| FetchError::Rewind {
                            url: url.to_string(),
                            source,
                        })?;
                    last = err.to_string();
                    thread::sleep(backoff_time(self.backoff_base, attempt));
                }
                Err(source) => {
                    return Err(FetchError::Copy {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.max_retries,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_fetcher() -> Fetcher {
        Fetcher::with_client(Client::new(), MAX_RETRIES, Duration::from_micros(50))
    }

    // The fetcher is blocking, so the mock server runs on a runtime that is
    // kept alive for the duration of the test.
    fn start_server() -> (tokio::runtime::Runtime, MockServer) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        (rt, server)
    }

    fn mount(rt: &tokio::runtime::Runtime, server: &MockServer, mock: Mock) {
        rt.block_on(mock.mount(server));
    }

    #[test]
    fn backoff_stays_within_window() {
        for attempt in [0usize, 1, 5, 20, 62, 63, 100] {
            let window = BACKOFF_BASE.as_nanos() << (attempt as u32).min(BACKOFF_SHIFT_CAP);
            for _ in 0..50 {
                let dur = backoff_time(BACKOFF_BASE, attempt);
                assert!(dur.as_nanos() < window, "attempt {attempt}: {dur:?}");
            }
        }
    }

    #[test]
    fn persistent_server_error_exhausts_retries() {
        let (rt, server) = start_server();
        mount(
            &rt,
            &server,
            Mock::given(method("GET"))
                .and(path("/boom"))
                .respond_with(ResponseTemplate::new(500))
                .expect(MAX_RETRIES as u64),
        );

        let url = format!("{}/boom", server.uri());
        let err = test_fetcher().get(&url).unwrap_err();
        match err {
            FetchError::Exhausted { url: u, attempts, .. } => {
                assert_eq!(u, url);
                assert_eq!(attempts, MAX_RETRIES);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_server_error_status_is_terminal() {
        let (rt, server) = start_server();
        mount(
            &rt,
            &server,
            Mock::given(method("GET"))
                .and(path("/missing"))
                .respond_with(ResponseTemplate::new(404))
                .expect(1),
        );

        let url = format!("{}/missing", server.uri());
        let err = test_fetcher().get(&url).unwrap_err();
        assert!(matches!(
            err,
            FetchError::UnexpectedStatus {
                status: StatusCode::NOT_FOUND,
                ..
            }
        ));
    }

    #[test]
    fn recovers_after_transient_server_errors() {
        let (rt, server) = start_server();
        mount(
            &rt,
            &server,
            Mock::given(method("GET"))
                .and(path("/flaky"))
                .respond_with(ResponseTemplate::new(503))
                .up_to_n_times(2),
        );
        mount(
            &rt,
            &server,
            Mock::given(method("GET"))
                .and(path("/flaky"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".as_slice())),
        );

        let url = format!("{}/flaky", server.uri());
        let resp = test_fetcher().get(&url).unwrap();
        assert_eq!(resp.bytes().unwrap().as_ref(), b"ok");
    }

    #[test]
    fn get_to_writes_body() {
        let (rt, server) = start_server();
        mount(
            &rt,
            &server,
            Mock::given(method("GET"))
                .and(path("/asset.jpg"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"imagedata".as_slice())),
        );

        let url = format!("{}/asset.jpg", server.uri());
        let mut dest = Cursor::new(Vec::new());
        test_fetcher().get_to(&url, &mut dest, 0).unwrap();
        assert_eq!(dest.into_inner(), b"imagedata");
    }

    /// Writes a 4-byte prefix, then fails once with a peer reset, then
    /// accepts everything.
    struct FlakyDest {
        inner: Cursor<Vec<u8>>,
        calls: usize,
    }

    impl Write for FlakyDest {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            match self.calls {
                1 => self.inner.write(&buf[..4.min(buf.len())]),
                2 => Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "reset by peer",
                )),
                _ => self.inner.write(buf),
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for FlakyDest {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn get_to_restarts_from_the_beginning_after_a_recoverable_error() {
        let (rt, server) = start_server();
        mount(
            &rt,
            &server,
            Mock::given(method("GET"))
                .and(path("/asset.jpg"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"imagedata".as_slice()))
                .expect(2),
        );

        let url = format!("{}/asset.jpg", server.uri());
        let mut dest = FlakyDest {
            inner: Cursor::new(Vec::new()),
            calls: 0,
        };
        test_fetcher().get_to(&url, &mut dest, 0).unwrap();
        // The partial prefix from the failed transfer was overwritten.
        assert_eq!(dest.inner.into_inner(), b"imagedata");
    }

    #[test]
    fn get_to_skips_when_size_matches() {
        let (rt, server) = start_server();
        mount(
            &rt,
            &server,
            Mock::given(method("HEAD"))
                .and(path("/asset.jpg"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 9]))
                .expect(1),
        );
        mount(
            &rt,
            &server,
            Mock::given(method("GET"))
                .and(path("/asset.jpg"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0),
        );

        let url = format!("{}/asset.jpg", server.uri());
        let mut dest = Cursor::new(Vec::new());
        test_fetcher().get_to(&url, &mut dest, 9).unwrap();
        assert!(dest.into_inner().is_empty());
    }
}
