use bytes::Bytes;
use http::{HeaderValue, StatusCode, header};

/// The response type flowing back out of the pipeline.
pub type Response = http::Response<ResponseBody>;

/// A fully buffered response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBody {
    inner: Bytes,
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: Bytes::new() }
    }

    pub fn once(bytes: Bytes) -> Self {
        Self { inner: bytes }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.inner
    }

    pub fn into_bytes(self) -> Bytes {
        self.inner
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::once(bytes)
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()))
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(value: Vec<u8>) -> Self {
        Self::once(Bytes::from(value))
    }
}

/// Replaces status and body of `response`, tagging the body as plain text.
pub(crate) fn plain_text(mut response: Response, status: StatusCode, body: impl Into<ResponseBody>) -> Response {
    *response.status_mut() = status;
    *response.body_mut() = body.into();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(mime::TEXT_PLAIN_UTF_8.as_ref()));
    response
}
