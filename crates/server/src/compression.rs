use tower_http::compression::predicate::{Predicate, PredicateExt, SizeAbove};
use tower_http::compression::CompressionLayer;
use tower_http::CompressionLevel;

/// Compresses `application/json` and `text/plain` responses over 50 bytes at gzip level 5.
/// Smaller or differently-typed bodies pass through uncompressed — most of this surface's
/// responses (an empty 200, a short plain-text value) fall well under the threshold.
pub fn layer() -> CompressionLayer<impl Predicate> {
    let predicate = JsonOrText.and(SizeAbove::new(50));
    CompressionLayer::new()
        .gzip(true)
        .quality(CompressionLevel::Precise(5))
        .compress_when(predicate)
}

#[derive(Clone, Copy)]
struct JsonOrText;

impl Predicate for JsonOrText {
    fn should_compress<B>(&self, response: &axum::http::Response<B>) -> bool
    where
        B: http_body::Body,
    {
        response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json") || ct.starts_with("text/plain"))
    }
}
