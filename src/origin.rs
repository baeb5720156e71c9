//! Upstream origin checks for `verify --check-origins uri`.
//!
//! Every `origin` in the verified part of the tree must answer an HTTP GET
//! with a success status. Requests go out concurrently in batches; failures
//! are reported in tree order.

use std::time::Duration;

use futures::future::join_all;
use indicatif::ProgressBar;
use tracing::debug;

use crate::error::BomError;
use crate::manifest::ManifestNode;
use crate::models::SourcePosition;

const BATCH_SIZE: usize = 75;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// An origin URI and where it was declared.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginRef {
    pub uri: String,
    pub position: Option<SourcePosition>,
}

/// Origins in pre-order. Development dependencies count only for a source
/// distribution.
pub fn collect_origins(tree: &ManifestNode, is_source_dist: bool) -> Vec<OriginRef> {
    fn walk(node: &ManifestNode, is_source_dist: bool, out: &mut Vec<OriginRef>) {
        if let Some(origin) = &node.origin {
            out.push(OriginRef {
                uri: strip_fragment(origin).to_string(),
                position: node.value_position("origin"),
            });
        }
        for dep in node.selected_dependencies(is_source_dist) {
            walk(dep, is_source_dist, out);
        }
    }

    let mut out = Vec::new();
    walk(tree, is_source_dist, &mut out);
    out
}

/// The URI without its `#fragment`, which names a path inside an archive.
pub fn strip_fragment(uri: &str) -> &str {
    uri.split('#').next().unwrap_or(uri)
}

/// True when `uri` answers with a success status.
async fn fetch(client: &reqwest::Client, uri: &str) -> Result<bool, reqwest::Error> {
    let response = client.get(uri).send().await?;
    Ok(response.status().is_success())
}

/// Checks every origin, failing on the first unreachable one in tree order.
pub async fn verify_origins(origins: &[OriginRef], progress: Option<&ProgressBar>) -> Result<(), BomError> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| BomError::new(format!("Cannot create HTTP client: {e}"), None))?;

    for batch in origins.chunks(BATCH_SIZE) {
        let futures: Vec<_> = batch
            .iter()
            .map(|origin| {
                let client = client.clone();
                let uri = origin.uri.clone();
                async move { fetch(&client, &uri).await }
            })
            .collect();

        let results = join_all(futures).await;

        for (origin, result) in batch.iter().zip(results) {
            if let Some(pb) = progress {
                pb.inc(1);
            }
            let found = match result {
                Ok(found) => found,
                Err(e) => {
                    debug!(uri = %origin.uri, "origin check failed: {e}");
                    false
                }
            };
            if !found {
                return Err(BomError::new(
                    format!("Not found '{}'", origin.uri),
                    origin.position.clone(),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::load_str;
    use std::path::Path;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pkg.tar.gz"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.tar.gz"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    fn origin(uri: &str) -> OriginRef {
        OriginRef {
            uri: uri.to_string(),
            position: None,
        }
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(strip_fragment("http://a.com/x.tar.gz#foo"), "http://a.com/x.tar.gz");
        assert_eq!(strip_fragment("http://a.com/x.tar.gz"), "http://a.com/x.tar.gz");
    }

    #[test]
    fn test_collect_origins() {
        let text = "\
origin: http://a.com/app.tar.gz#app
dependencies:
  - {origin: http://b.com/b.zip}
development-dependencies:
  - {origin: http://c.com/c.zip}
";
        let tree = load_str(text, "foo", Path::new(".")).unwrap();
        let uris: Vec<_> = collect_origins(&tree, false).into_iter().map(|o| o.uri).collect();
        assert_eq!(uris, vec!["http://a.com/app.tar.gz", "http://b.com/b.zip"]);
        assert_eq!(collect_origins(&tree, true).len(), 3);
        assert_eq!(
            collect_origins(&tree, false)[0].position,
            Some(SourcePosition::new(1, 9, "foo"))
        );
    }

    #[tokio::test]
    async fn test_reachable_origin() {
        let server = server().await;
        let uri = format!("{}/pkg.tar.gz", server.uri());
        assert_eq!(verify_origins(&[origin(&uri)], None).await, Ok(()));
    }

    #[tokio::test]
    async fn test_missing_origin() {
        let server = server().await;
        let ok = format!("{}/pkg.tar.gz", server.uri());
        let missing = format!("{}/missing.tar.gz", server.uri());
        let err = verify_origins(&[origin(&ok), origin(&missing)], None).await.unwrap_err();
        assert_eq!(err.message, format!("Not found '{missing}'"));
    }

    #[tokio::test]
    async fn test_relative_origin_is_not_found() {
        let err = verify_origins(&[origin("zlib-1.2.tar.gz")], None).await.unwrap_err();
        assert_eq!(err.message, "Not found 'zlib-1.2.tar.gz'");
    }
}
