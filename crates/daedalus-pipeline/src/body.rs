//! Bounded request body reading.

use bytes::Bytes;
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use thiserror::Error;

/// A boxed, sendable error as produced by body implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reading a request body failed.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The body exceeded the configured limit.
    #[error("request body exceeds the {limit} byte limit")]
    TooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The transport failed while the body was being read.
    #[error("failed to read request body: {0}")]
    Read(String),
}

/// Reads `body` to the end, failing once more than `limit` bytes arrive.
///
/// `None` reads without a limit. A body whose size hint already exceeds the
/// limit is rejected before any data is polled.
///
/// # Errors
///
/// [`BodyError::TooLarge`] when the limit is exceeded, [`BodyError::Read`]
/// for any other body error.
pub async fn read_body<B>(body: B, limit: Option<usize>) -> Result<Bytes, BodyError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let Some(limit) = limit else {
        return body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| {
                let e: BoxError = e.into();
                BodyError::Read(e.to_string())
            });
    };

    if body.size_hint().lower() > limit as u64 {
        return Err(BodyError::TooLarge { limit });
    }

    Limited::new(body, limit)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                BodyError::TooLarge { limit }
            } else {
                BodyError::Read(e.to_string())
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{Full, StreamBody};
    use http_body::Frame;

    #[tokio::test]
    async fn test_reads_within_limit() {
        let bytes = read_body(Full::new(Bytes::from_static(b"hello")), Some(5))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_rejects_over_limit() {
        let err = read_body(Full::new(Bytes::from_static(b"hello!")), Some(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BodyError::TooLarge { limit: 5 }));
    }

    #[tokio::test]
    async fn test_unlimited() {
        let big = Bytes::from(vec![b'x'; 64 * 1024]);
        let bytes = read_body(Full::new(big.clone()), None).await.unwrap();
        assert_eq!(bytes, big);
    }

    #[tokio::test]
    async fn test_streamed_body_over_limit() {
        let chunks: Vec<Result<Frame<Bytes>, BoxError>> = vec![
            Ok(Frame::data(Bytes::from_static(b"abc"))),
            Ok(Frame::data(Bytes::from_static(b"def"))),
        ];
        let body = StreamBody::new(futures_util::stream::iter(chunks));
        let err = read_body(body, Some(4)).await.unwrap_err();
        assert!(matches!(err, BodyError::TooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let chunks: Vec<Result<Frame<Bytes>, BoxError>> = vec![
            Ok(Frame::data(Bytes::from_static(b"abc"))),
            Err("connection reset".into()),
        ];
        let body = StreamBody::new(futures_util::stream::iter(chunks));
        let err = read_body(body, Some(1024)).await.unwrap_err();
        match err {
            BodyError::Read(reason) => assert!(reason.contains("connection reset")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
