//! In-process stand-in for a shop. Backs dry runs and tests.

use crate::collection::{Collect, CollectionFilter, CollectionId, CollectionKind};
use crate::product::{NewProduct, Product, ProductId};
use crate::{AdminApi, ApiError};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

const FIRST_ID: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCollection {
    pub id: CollectionId,
    pub kind: CollectionKind,
    pub title: String,
    pub handle: String,
}

#[derive(Default)]
struct State {
    last_id: u64,
    collections: Vec<StoredCollection>,
    products: Vec<Product>,
    collects: Vec<Collect>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.last_id = self.last_id.max(FIRST_ID) + 1;
        self.last_id
    }

    fn unique_product_handle(&self, title: &str) -> String {
        let base = handleize(title);
        let taken = |h: &str| self.products.iter().any(|p| p.handle.as_deref() == Some(h));
        if !taken(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}-{n}");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[derive(Default)]
pub struct InMemoryShop {
    state: Mutex<State>,
}

impl InMemoryShop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, kind: CollectionKind, title: &str, handle: &str) -> Self {
        let state = self.state.get_mut();
        let id = state.next_id();
        state.collections.push(StoredCollection {
            id,
            kind,
            title: title.to_string(),
            handle: handle.to_string(),
        });
        self
    }

    pub fn with_product(mut self, product: Product) -> Self {
        let state = self.state.get_mut();
        state.last_id = state.last_id.max(product.id);
        state.products.push(product);
        self
    }

    pub fn with_collect(mut self, product_id: ProductId, collection_id: CollectionId) -> Self {
        let state = self.state.get_mut();
        let id = state.next_id();
        state.collects.push(Collect {
            id: Some(id),
            product_id,
            collection_id,
        });
        self
    }

    pub async fn collections(&self) -> Vec<StoredCollection> {
        self.state.lock().await.collections.clone()
    }

    pub async fn products(&self) -> Vec<Product> {
        self.state.lock().await.products.clone()
    }

    pub async fn collects(&self) -> Vec<Collect> {
        self.state.lock().await.collects.clone()
    }
}

#[async_trait]
impl AdminApi for InMemoryShop {
    async fn find_collection(
        &self,
        kind: CollectionKind,
        filter: CollectionFilter<'_>,
    ) -> Result<Option<CollectionId>, ApiError> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .iter()
            .filter(|c| c.kind == kind)
            .find(|c| match filter {
                CollectionFilter::Title(title) => c.title.eq_ignore_ascii_case(title),
                CollectionFilter::Handle(handle) => c.handle == handle,
            })
            .map(|c| c.id))
    }

    async fn create_custom_collection(&self, title: &str) -> Result<CollectionId, ApiError> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.collections.push(StoredCollection {
            id,
            kind: CollectionKind::Custom,
            title: title.to_string(),
            handle: handleize(title),
        });
        log::debug!("Created custom collection {id} {title:?}");
        Ok(id)
    }

    async fn add_product_to_collection(
        &self,
        product_id: ProductId,
        collection_id: CollectionId,
    ) -> Result<Collect, ApiError> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let collect = Collect {
            id: Some(id),
            product_id,
            collection_id,
        };
        state.collects.push(collect.clone());
        Ok(collect)
    }

    async fn list_product_collections(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<CollectionId>, ApiError> {
        let state = self.state.lock().await;
        Ok(state
            .collects
            .iter()
            .filter(|c| c.product_id == product_id)
            .map(|c| c.collection_id)
            .collect())
    }

    async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>, ApiError> {
        let state = self.state.lock().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn get_product_by_handle(&self, handle: &str) -> Result<Option<Product>, ApiError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .iter()
            .find(|p| p.handle.as_deref() == Some(handle))
            .cloned())
    }

    async fn create_product(&self, request: &NewProduct) -> Result<Product, ApiError> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let handle = state.unique_product_handle(request.title());
        let images = request
            .images()
            .iter()
            .map(|image| {
                json!({
                    "product_id": id,
                    "position": image.position,
                    "src": format!("memory://{handle}/{}", image.filename),
                })
            })
            .collect();
        let template = request.template();
        let product = Product {
            id,
            handle: Some(handle),
            title: request.title().to_string(),
            body_html: request.body_html().map(ToString::to_string),
            vendor: template.and_then(|t| t.vendor.clone()),
            product_type: template.and_then(|t| t.product_type.clone()),
            tags: template.and_then(|t| t.tags.clone()),
            status: Some("active".to_string()),
            options: template.map(|t| t.options.clone()).unwrap_or_default(),
            variants: template.map(|t| t.variants.clone()).unwrap_or_default(),
            images,
            extra: Default::default(),
        };
        state.products.push(product.clone());
        log::debug!("Created product {id} {:?}", product.title);
        Ok(product)
    }
}

fn handleize(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_dash = true;
    for ch in title.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}
