//! HTTP client implementation
//!
//! This module drives response reception: it reads from the transport,
//! feeds the bytes to a [`ResponseParser`] and hands back the finished
//! response.

use super::{
    CookieCapture, CookieStore, Error, HttpSession, Method, ParserConfig, Progress, Response,
    ResponseObserver, ResponseParser, Result, SessionCookies, SessionOps,
};
use std::sync::Arc;
use std::time::Duration;

/// How a response reception ended
#[derive(Debug)]
pub enum Outcome {
    /// The response was received in full
    Complete(Response),
    /// An observer stopped reception; the response holds what was parsed
    ForceStopped(Response),
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }

    pub fn response(&self) -> &Response {
        match self {
            Outcome::Complete(r) | Outcome::ForceStopped(r) => r,
        }
    }

    pub fn into_response(self) -> Response {
        match self {
            Outcome::Complete(r) | Outcome::ForceStopped(r) => r,
        }
    }
}

/// HTTP client
///
/// Receives responses over a session. Session cookies set by the server
/// are captured into the client's cookie store.
pub struct HttpClient<S: SessionOps> {
    session: HttpSession<S>,
    config: ParserConfig,
    cookies: Arc<dyn CookieStore>,
}

impl<S: SessionOps> HttpClient<S> {
    /// Create a new HTTP client with a session
    pub fn new(session: S) -> Self {
        Self::with_config(session, ParserConfig::default())
    }

    pub fn with_config(session: S, config: ParserConfig) -> Self {
        HttpClient {
            session: HttpSession::new(session),
            config,
            cookies: Arc::new(SessionCookies::new()),
        }
    }

    /// Replace the store that receives session cookies
    pub fn with_cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookies = store;
        self
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.session.set_timeout(timeout);
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn cookies(&self) -> &Arc<dyn CookieStore> {
        &self.cookies
    }

    pub fn session(&self) -> &HttpSession<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut HttpSession<S> {
        &mut self.session
    }

    /// Send raw bytes
    pub fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.session.write_all(data)
    }

    /// Receive an HTTP response
    ///
    /// `method` is the method of the request being answered. `Set-Cookie`
    /// headers are stored under the transport's server identity.
    pub fn receive_response(&mut self, method: Method) -> Result<Outcome> {
        let observer = CookieCapture::new(self.session.server_identity(), self.cookies.clone());
        self.receive_response_with(observer, method)
    }

    /// Receive an HTTP response, reporting milestones to `observer`
    pub fn receive_response_with<O: ResponseObserver>(
        &mut self,
        observer: O,
        method: Method,
    ) -> Result<Outcome> {
        if !self.session.is_open() {
            return Err(Error::ConnectionClosed);
        }

        let mut parser = ResponseParser::with_observer_and_config(observer, self.config);
        let mut buf = vec![0u8; self.config.read_buffer_size()];

        loop {
            let n = self.session.read(&mut buf)?;
            let progress = if n == 0 {
                log::debug!("end of stream in phase {:?}", parser.phase());
                parser.finish()?
            } else {
                log::debug!("read {} bytes", n);
                parser.feed(&buf[..n], method)?
            };

            match progress {
                Progress::NeedMore => continue,
                Progress::Complete => {
                    log::debug!("response complete: {}", parser.response().status());
                    return Ok(Outcome::Complete(parser.into_response()));
                }
                Progress::Stopped => {
                    log::debug!("response reception stopped by observer");
                    return Ok(Outcome::ForceStopped(parser.into_response()));
                }
            }
        }
    }

    /// Close the connection
    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::session::PollEvents;
    use crate::http::{Header, Missing, ResponseState, Status};
    use std::collections::VecDeque;

    /// Transport that hands out scripted reads, then end-of-stream
    struct Scripted {
        reads: VecDeque<Vec<u8>>,
        written: Vec<u8>,
        open: bool,
    }

    impl Scripted {
        fn new(reads: &[&[u8]]) -> Self {
            Scripted {
                reads: reads.iter().map(|r| r.to_vec()).collect(),
                written: Vec::new(),
                open: true,
            }
        }
    }

    impl SessionOps for Scripted {
        fn poll(&self, _events: PollEvents, _timeout: Option<Duration>) -> Result<bool> {
            Ok(true)
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let Some(mut next) = self.reads.pop_front() else {
                return Ok(0);
            };
            let n = next.len().min(buf.len());
            buf[..n].copy_from_slice(&next[..n]);
            if n < next.len() {
                self.reads.push_front(next.split_off(n));
            }
            Ok(n)
        }

        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            // Short writes exercise the write_all loop
            let n = buf.len().min(3);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn close(&mut self) -> Result<()> {
            self.open = false;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn server_identity(&self) -> String {
            "scripted:80".to_string()
        }
    }

    #[test]
    fn test_receive_across_reads() {
        let mut client = HttpClient::new(Scripted::new(&[
            b"HTTP/1.1 200 OK\r\nContent-Le",
            b"ngth: 5\r\n\r\nhel",
            b"lo",
        ]));

        let outcome = client.receive_response(Method::Get).unwrap();
        assert!(outcome.is_complete());
        let response = outcome.into_response();
        assert_eq!(response.status(), Status::OK);
        assert_eq!(response.body().as_bytes(), Some(&b"hello"[..]));
        assert_eq!(response.state(), ResponseState::Complete);
    }

    #[test]
    fn test_small_read_buffer() {
        let config = ParserConfig::new().with_read_buffer_size(1);
        let wire: &[u8] =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n";
        let mut client = HttpClient::with_config(Scripted::new(&[wire]), config);

        let response = client.receive_response(Method::Get).unwrap().into_response();
        assert_eq!(response.body().as_bytes(), Some(&b"abc"[..]));
    }

    #[test]
    fn test_until_close_completes_at_end_of_stream() {
        let mut client = HttpClient::new(Scripted::new(&[
            b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nfirst ",
            b"second",
        ]));

        let response = client.receive_response(Method::Get).unwrap().into_response();
        assert_eq!(response.body().as_bytes(), Some(&b"first second"[..]));
    }

    #[test]
    fn test_truncated_response_is_incomplete() {
        let mut client = HttpClient::new(Scripted::new(&[b"HTTP/1.1 200 OK\r\n"]));

        let err = client.receive_response(Method::Get).unwrap_err();
        assert!(matches!(err, Error::Incomplete(Missing::Headers)));
        assert!(err.is_incomplete());
    }

    #[test]
    fn test_framing_error_propagates() {
        let mut client = HttpClient::new(Scripted::new(&[b"garbage\r\n\r\n"]));

        let err = client.receive_response(Method::Get).unwrap_err();
        assert!(err.is_framing());
    }

    #[test]
    fn test_closed_transport() {
        let mut client = HttpClient::new(Scripted::new(&[b"HTTP/1.1 200 OK\r\n\r\n"]));
        client.close().unwrap();

        let err = client.receive_response(Method::Get).unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[test]
    fn test_cookies_captured() {
        let store = Arc::new(SessionCookies::new());
        let mut client = HttpClient::new(Scripted::new(&[
            b"HTTP/1.1 204 No Content\r\nSet-Cookie: sid=1\r\n\
Set-Cookie: theme=dark; Path=/\r\n\r\n",
        ]))
        .with_cookie_store(store.clone());

        let outcome = client.receive_response(Method::Get).unwrap();
        assert!(outcome.is_complete());
        assert_eq!(
            store.header_value("scripted:80").as_deref(),
            Some("sid=1; theme=dark")
        );
    }

    #[test]
    fn test_observer_stop() {
        struct StopOnServer;
        impl ResponseObserver for StopOnServer {
            fn on_header(&mut self, header: &Header, _response: &Response) -> bool {
                !header.is("Server")
            }
        }

        let mut client = HttpClient::new(Scripted::new(&[
            b"HTTP/1.1 200 OK\r\nServer: x\r\nContent-Length: 2\r\n\r\nok",
        ]));

        let outcome = client
            .receive_response_with(StopOnServer, Method::Get)
            .unwrap();
        assert!(!outcome.is_complete());
        let response = outcome.response();
        assert_eq!(response.state(), ResponseState::Stopped);
        assert!(response.headers().contains("Server"));
        assert!(!response.headers().contains("Content-Length"));
    }

    #[test]
    fn test_send_raw_loops_short_writes() {
        let mut client = HttpClient::new(Scripted::new(&[]));
        client.send_raw(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(client.session().get_ref().written, b"GET / HTTP/1.1\r\n\r\n");
    }
}
