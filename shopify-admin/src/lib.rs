#![deny(clippy::unwrap_used)]

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub mod collection;
pub mod error;
pub mod memory;
pub mod product;

pub use collection::{
    ensure_collection, Collect, CollectionFilter, CollectionId, CollectionKind,
};
pub use error::ApiError;
pub use reqwest::StatusCode;
pub use product::{
    get_product_by_id_or_handle, ImagePayload, NewProduct, Product, ProductId, TemplateFields,
};

pub const DEFAULT_API_VERSION: &str = "2024-10";
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const COLLECTS_PAGE_LIMIT: u32 = 250;

/// Endpoints of the Admin REST API used by the uploader.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn find_collection(
        &self,
        kind: CollectionKind,
        filter: CollectionFilter<'_>,
    ) -> Result<Option<CollectionId>, ApiError>;

    async fn create_custom_collection(&self, title: &str) -> Result<CollectionId, ApiError>;

    /// Creates a collect. Calling it twice for the same pair issues two requests.
    async fn add_product_to_collection(
        &self,
        product_id: ProductId,
        collection_id: CollectionId,
    ) -> Result<Collect, ApiError>;

    /// Collection ids of the first page of collects for `product_id`.
    async fn list_product_collections(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<CollectionId>, ApiError>;

    async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>, ApiError>;

    async fn get_product_by_handle(&self, handle: &str) -> Result<Option<Product>, ApiError>;

    async fn create_product(&self, request: &NewProduct) -> Result<Product, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopifyConfig {
    pub domain: String,
    pub access_token: String,
    pub api_version: String,
    pub timeout: Option<Duration>,
}

impl ShopifyConfig {
    /// `https://` is assumed when the domain carries no scheme.
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        let origin = if domain.starts_with("https://") || domain.starts_with("http://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };
        format!("{origin}/admin/api/{}", self.api_version.trim())
    }
}

pub struct ShopifyClient {
    client: Client,
    base: String,
}

#[derive(Deserialize)]
struct CollectionRef {
    id: CollectionId,
}

#[derive(Deserialize)]
struct CustomCollectionEnvelope {
    custom_collection: CollectionRef,
}

#[derive(Serialize)]
struct NewCustomCollection<'a> {
    custom_collection: CollectionTitle<'a>,
}

#[derive(Serialize)]
struct CollectionTitle<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct NewCollect {
    collect: CollectPair,
}

#[derive(Serialize)]
struct CollectPair {
    product_id: ProductId,
    collection_id: CollectionId,
}

#[derive(Deserialize)]
struct CollectEnvelope {
    collect: Collect,
}

#[derive(Deserialize)]
struct CollectsEnvelope {
    #[serde(default, deserialize_with = "product::null_as_default")]
    collects: Vec<Collect>,
}

#[derive(Deserialize)]
struct ProductResponse {
    product: Product,
}

#[derive(Deserialize)]
struct ProductsResponse {
    #[serde(default, deserialize_with = "product::null_as_default")]
    products: Vec<Product>,
}

impl ShopifyClient {
    pub fn new(config: &ShopifyConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(config.access_token.trim())
            .map_err(|source| ApiError::InvalidToken { source })?;
        token.set_sensitive(true);
        headers.insert(ACCESS_TOKEN_HEADER, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base: config.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let resp = self.client.get(self.url(path)).query(query).send().await?;
        read_json(resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        read_json(resp).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    let url = resp.url().path().to_string();
    let text = resp.text().await?;
    if !status.is_success() {
        log::warn!("Shopify API {status} for {url}");
        return Err(ApiError::Status { status, body: text });
    }
    serde_json::from_str(&text).map_err(|source| ApiError::Decode { source })
}

#[async_trait]
impl AdminApi for ShopifyClient {
    async fn find_collection(
        &self,
        kind: CollectionKind,
        filter: CollectionFilter<'_>,
    ) -> Result<Option<CollectionId>, ApiError> {
        let (key, value) = filter.query();
        let mut resp: HashMap<String, Vec<CollectionRef>> = self
            .get_json(
                &format!("{}.json", kind.resource()),
                &[(key, value.to_string()), ("limit", "1".to_string())],
            )
            .await?;
        Ok(resp
            .remove(kind.resource())
            .and_then(|found| found.into_iter().next())
            .map(|c| c.id))
    }

    async fn create_custom_collection(&self, title: &str) -> Result<CollectionId, ApiError> {
        let resp: CustomCollectionEnvelope = self
            .post_json(
                "custom_collections.json",
                &NewCustomCollection {
                    custom_collection: CollectionTitle { title },
                },
            )
            .await?;
        log::info!(
            "Created custom collection {title:?} ({})",
            resp.custom_collection.id
        );
        Ok(resp.custom_collection.id)
    }

    async fn add_product_to_collection(
        &self,
        product_id: ProductId,
        collection_id: CollectionId,
    ) -> Result<Collect, ApiError> {
        let resp: CollectEnvelope = self
            .post_json(
                "collects.json",
                &NewCollect {
                    collect: CollectPair {
                        product_id,
                        collection_id,
                    },
                },
            )
            .await?;
        Ok(resp.collect)
    }

    async fn list_product_collections(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<CollectionId>, ApiError> {
        let resp: CollectsEnvelope = self
            .get_json(
                "collects.json",
                &[
                    ("product_id", product_id.to_string()),
                    ("limit", COLLECTS_PAGE_LIMIT.to_string()),
                ],
            )
            .await?;
        Ok(resp.collects.into_iter().map(|c| c.collection_id).collect())
    }

    async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("products/{id}.json")))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp: ProductResponse = read_json(resp).await?;
        Ok(Some(resp.product))
    }

    async fn get_product_by_handle(&self, handle: &str) -> Result<Option<Product>, ApiError> {
        let resp: ProductsResponse = self
            .get_json(
                "products.json",
                &[("handle", handle.to_string()), ("limit", "1".to_string())],
            )
            .await?;
        Ok(resp.products.into_iter().next())
    }

    async fn create_product(&self, request: &NewProduct) -> Result<Product, ApiError> {
        let resp: ProductResponse = self.post_json("products.json", &request.envelope()).await?;
        Ok(resp.product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn config(domain: &str) -> ShopifyConfig {
        ShopifyConfig {
            domain: domain.to_string(),
            access_token: "shpat_test".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Some(Duration::from_secs(5)),
        }
    }

    #[test]
    fn base_url_is_versioned() {
        assert_eq!(
            config("my-store.myshopify.com").base_url(),
            "https://my-store.myshopify.com/admin/api/2024-10"
        );
        assert_eq!(
            config(" https://my-store.myshopify.com/ ").base_url(),
            "https://my-store.myshopify.com/admin/api/2024-10"
        );
    }

    #[test]
    fn client_rejects_tokens_that_are_not_header_values() {
        let mut cfg = config("my-store.myshopify.com");
        cfg.access_token = "bad\ntoken".to_string();
        assert!(matches!(
            ShopifyClient::new(&cfg),
            Err(ApiError::InvalidToken { .. })
        ));
    }

    #[test]
    fn explicit_scheme_is_kept() {
        assert_eq!(
            config("http://127.0.0.1:8080/").base_url(),
            "http://127.0.0.1:8080/admin/api/2024-10"
        );
    }

    /// Answers a single request with `status` and `body`, returning the raw
    /// request it received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (ShopifyClient, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        let client = ShopifyClient::new(&config(&format!("http://{addr}"))).unwrap();
        (client, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= length
    }

    fn request_line(request: &str) -> &str {
        request.lines().next().unwrap_or_default()
    }

    #[tokio::test]
    async fn missing_product_id_is_absent() {
        let (client, server) = serve_once("404 Not Found", r#"{"errors":"Not Found"}"#).await;
        assert!(client.get_product_by_id(42).await.unwrap().is_none());
        let request = server.await.unwrap();
        assert_eq!(
            request_line(&request),
            "GET /admin/api/2024-10/products/42.json HTTP/1.1"
        );
        assert!(request
            .to_lowercase()
            .contains("x-shopify-access-token: shpat_test"));
    }

    #[tokio::test]
    async fn error_status_keeps_body_verbatim() {
        let body = r#"{"errors":{"title":["bad"]}}"#;
        let (client, server) = serve_once("422 Unprocessable Entity", body).await;
        let err = client
            .find_collection(CollectionKind::Smart, CollectionFilter::Title("Decorative"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(matches!(&err, ApiError::Status { body: raw, .. } if raw == body));
        assert_eq!(err.detail(), serde_json::json!({"errors": {"title": ["bad"]}}));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn storefront_lookup_filters_by_handle() {
        let (client, server) =
            serve_once("200 OK", r#"{"custom_collections":[{"id":9,"handle":"frontpage"}]}"#).await;
        let id = client
            .find_collection(CollectionKind::Custom, CollectionFilter::Handle("frontpage"))
            .await
            .unwrap();
        assert_eq!(id, Some(9));
        assert_eq!(
            request_line(&server.await.unwrap()),
            "GET /admin/api/2024-10/custom_collections.json?handle=frontpage&limit=1 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn empty_collection_list_is_absent() {
        let (client, server) = serve_once("200 OK", r#"{"smart_collections":[]}"#).await;
        let id = client
            .find_collection(CollectionKind::Smart, CollectionFilter::Title("Window Films"))
            .await
            .unwrap();
        assert_eq!(id, None);
        assert_eq!(
            request_line(&server.await.unwrap()),
            "GET /admin/api/2024-10/smart_collections.json?title=Window+Films&limit=1 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn product_collections_come_from_first_collects_page() {
        let (client, server) = serve_once(
            "200 OK",
            r#"{"collects":[{"id":1,"product_id":7,"collection_id":70},{"id":2,"product_id":7,"collection_id":71}]}"#,
        )
        .await;
        assert_eq!(client.list_product_collections(7).await.unwrap(), vec![70, 71]);
        assert_eq!(
            request_line(&server.await.unwrap()),
            "GET /admin/api/2024-10/collects.json?product_id=7&limit=250 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn create_product_posts_envelope() {
        let (client, server) = serve_once(
            "201 Created",
            r#"{"product":{"id":8001,"handle":"aurora","title":"Aurora","status":"active"}}"#,
        )
        .await;
        let request = NewProduct::Plain {
            title: "Aurora".to_string(),
            body_html: None,
            images: vec![],
        };
        let product = client.create_product(&request).await.unwrap();
        assert_eq!(product.id, 8001);
        assert_eq!(product.status.as_deref(), Some("active"));

        let raw = server.await.unwrap();
        assert_eq!(
            request_line(&raw),
            "POST /admin/api/2024-10/products.json HTTP/1.1"
        );
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        let sent: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            sent,
            serde_json::json!({"product": {"title": "Aurora", "body_html": null, "images": []}})
        );
    }

    #[test]
    fn collection_list_envelope_is_keyed_by_resource() {
        let body = r#"{"smart_collections":[{"id":42,"title":"Decorative"}]}"#;
        let mut parsed: HashMap<String, Vec<CollectionRef>> = serde_json::from_str(body).unwrap();
        let id = parsed
            .remove(CollectionKind::Smart.resource())
            .and_then(|found| found.into_iter().next())
            .map(|c| c.id);
        assert_eq!(id, Some(42));
    }
}
