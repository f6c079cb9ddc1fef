//! Parsing milestone observers
//!
//! A [`ResponseObserver`] is called by the parser in wire order:
//! status, each header, headers complete, then chunk start/end pairs for
//! chunked bodies, then response complete. Returning `false` from any
//! callback stops parsing at once; the parser enters its force-stopped
//! state and no later callback fires.

use super::{Chunk, Cookie, CookieStore, Header, Headers, Response, Status};
use std::sync::Arc;

/// Callbacks fired at parsing milestones
///
/// Every method defaults to approving the milestone.
pub trait ResponseObserver {
    /// Status line parsed
    fn on_status(&mut self, _status: Status, _response: &Response) -> bool {
        true
    }

    /// One header line parsed and added to the response
    fn on_header(&mut self, _header: &Header, _response: &Response) -> bool {
        true
    }

    /// Blank line after the headers reached
    fn on_headers_complete(&mut self, _headers: &Headers, _response: &Response) -> bool {
        true
    }

    /// Chunk-size line parsed; the chunk carries no data yet
    fn on_chunk_start(&mut self, _chunk: &Chunk, _response: &Response) -> bool {
        true
    }

    /// Chunk payload complete and appended to the body
    fn on_chunk_end(&mut self, _chunk: &Chunk, _response: &Response) -> bool {
        true
    }

    /// Response complete. Nothing is left to stop, so the return value is
    /// only logged.
    fn on_complete(&mut self, _response: &Response) -> bool {
        true
    }
}

impl<O: ResponseObserver + ?Sized> ResponseObserver for &mut O {
    fn on_status(&mut self, status: Status, response: &Response) -> bool {
        (**self).on_status(status, response)
    }

    fn on_header(&mut self, header: &Header, response: &Response) -> bool {
        (**self).on_header(header, response)
    }

    fn on_headers_complete(&mut self, headers: &Headers, response: &Response) -> bool {
        (**self).on_headers_complete(headers, response)
    }

    fn on_chunk_start(&mut self, chunk: &Chunk, response: &Response) -> bool {
        (**self).on_chunk_start(chunk, response)
    }

    fn on_chunk_end(&mut self, chunk: &Chunk, response: &Response) -> bool {
        (**self).on_chunk_end(chunk, response)
    }

    fn on_complete(&mut self, response: &Response) -> bool {
        (**self).on_complete(response)
    }
}

impl<O: ResponseObserver + ?Sized> ResponseObserver for Box<O> {
    fn on_status(&mut self, status: Status, response: &Response) -> bool {
        (**self).on_status(status, response)
    }

    fn on_header(&mut self, header: &Header, response: &Response) -> bool {
        (**self).on_header(header, response)
    }

    fn on_headers_complete(&mut self, headers: &Headers, response: &Response) -> bool {
        (**self).on_headers_complete(headers, response)
    }

    fn on_chunk_start(&mut self, chunk: &Chunk, response: &Response) -> bool {
        (**self).on_chunk_start(chunk, response)
    }

    fn on_chunk_end(&mut self, chunk: &Chunk, response: &Response) -> bool {
        (**self).on_chunk_end(chunk, response)
    }

    fn on_complete(&mut self, response: &Response) -> bool {
        (**self).on_complete(response)
    }
}

/// Observer that approves every milestone and does nothing else
#[derive(Debug, Clone, Copy, Default)]
pub struct Approve;

impl ResponseObserver for Approve {}

/// Default observer of [`HttpClient`](super::HttpClient)
///
/// Forwards every parsable `Set-Cookie` header to a cookie store under the
/// identity of the server the response came from.
#[derive(Clone)]
pub struct CookieCapture {
    server: String,
    store: Arc<dyn CookieStore>,
}

impl CookieCapture {
    pub fn new(server: impl Into<String>, store: Arc<dyn CookieStore>) -> Self {
        CookieCapture {
            server: server.into(),
            store,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }
}

impl ResponseObserver for CookieCapture {
    fn on_header(&mut self, header: &Header, _response: &Response) -> bool {
        if !header.is("Set-Cookie") {
            return true;
        }
        match header.value().and_then(Cookie::parse) {
            Some(cookie) => {
                log::trace!("session cookie {} from {}", cookie.name(), self.server);
                self.store.set_session_cookie(&self.server, cookie);
            }
            None => log::debug!("skipping unparsable Set-Cookie: {}", header),
        }
        true
    }
}
