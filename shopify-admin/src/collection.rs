use crate::product::ProductId;
use crate::{AdminApi, ApiError};
use serde::{Deserialize, Serialize};

pub type CollectionId = u64;

/// Titles that refer to the storefront's built-in home page collection.
pub const STOREFRONT_ALIASES: [&str; 4] = ["homepage", "home page", "frontpage", "home"];
pub const STOREFRONT_HANDLE: &str = "frontpage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Smart,
    Custom,
}

impl CollectionKind {
    /// REST resource name, also the key of the list response.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Smart => "smart_collections",
            Self::Custom => "custom_collections",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionFilter<'a> {
    Title(&'a str),
    Handle(&'a str),
}

impl<'a> CollectionFilter<'a> {
    pub fn query(&self) -> (&'static str, &'a str) {
        match self {
            Self::Title(title) => ("title", title),
            Self::Handle(handle) => ("handle", handle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionLookup<'a> {
    pub kind: CollectionKind,
    pub filter: CollectionFilter<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collect {
    #[serde(default)]
    pub id: Option<u64>,
    pub product_id: ProductId,
    pub collection_id: CollectionId,
}

pub fn is_storefront_alias(title: &str) -> bool {
    let normalized = title.trim().to_lowercase();
    STOREFRONT_ALIASES.contains(&normalized.as_str())
}

/// Lookups tried in order by [`ensure_collection`]. The first hit wins.
pub fn lookup_plan(title: &str) -> Vec<CollectionLookup<'_>> {
    let mut plan = Vec::with_capacity(3);
    if is_storefront_alias(title) {
        plan.push(CollectionLookup {
            kind: CollectionKind::Custom,
            filter: CollectionFilter::Handle(STOREFRONT_HANDLE),
        });
    }
    plan.push(CollectionLookup {
        kind: CollectionKind::Smart,
        filter: CollectionFilter::Title(title),
    });
    plan.push(CollectionLookup {
        kind: CollectionKind::Custom,
        filter: CollectionFilter::Title(title),
    });
    plan
}

/// Returns the id of the collection titled `title`, creating a custom
/// collection when no existing one matches.
pub async fn ensure_collection(api: &dyn AdminApi, title: &str) -> Result<CollectionId, ApiError> {
    for lookup in lookup_plan(title) {
        if let Some(id) = api.find_collection(lookup.kind, lookup.filter).await? {
            log::info!(
                "Collection {title:?} resolved to {} {id} via {:?}",
                lookup.kind.resource(),
                lookup.filter
            );
            return Ok(id);
        }
    }
    log::info!("Collection {title:?} not found, creating custom collection");
    api.create_custom_collection(title).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryShop;

    #[test]
    fn storefront_aliases_are_case_insensitive() {
        for title in ["Homepage", "home page", "Frontpage", "HOME", "  Home  "] {
            assert!(is_storefront_alias(title), "{title}");
        }
        assert!(!is_storefront_alias("Home decor"));
        assert!(!is_storefront_alias("Decorative"));
    }

    #[test]
    fn plan_probes_frontpage_first_for_aliases() {
        let plan = lookup_plan("Homepage");
        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan[0],
            CollectionLookup {
                kind: CollectionKind::Custom,
                filter: CollectionFilter::Handle("frontpage"),
            }
        );
        assert_eq!(plan[1].kind, CollectionKind::Smart);
        assert_eq!(plan[2].kind, CollectionKind::Custom);

        let plan = lookup_plan("Decorative");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].filter, CollectionFilter::Title("Decorative"));
    }

    #[tokio::test]
    async fn aliases_reuse_the_storefront_collection() {
        let shop = InMemoryShop::new().with_collection(
            CollectionKind::Custom,
            "Home page",
            STOREFRONT_HANDLE,
        );
        let frontpage = shop.collections().await[0].id;
        for title in ["Homepage", "home page", "Frontpage", "HOME"] {
            assert_eq!(ensure_collection(&shop, title).await.unwrap(), frontpage);
        }
        assert_eq!(shop.collections().await.len(), 1);
    }

    #[tokio::test]
    async fn smart_collections_win_over_custom() {
        let shop = InMemoryShop::new()
            .with_collection(CollectionKind::Custom, "Decorative", "decorative-1")
            .with_collection(CollectionKind::Smart, "Decorative", "decorative");
        let smart = shop
            .collections()
            .await
            .into_iter()
            .find(|c| c.kind == CollectionKind::Smart)
            .unwrap();
        assert_eq!(ensure_collection(&shop, "Decorative").await.unwrap(), smart.id);
    }

    #[tokio::test]
    async fn missing_collection_is_created_once() {
        let shop = InMemoryShop::new();
        let first = ensure_collection(&shop, "Window Films").await.unwrap();
        let second = ensure_collection(&shop, "Window Films").await.unwrap();
        assert_eq!(first, second);
        let collections = shop.collections().await;
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].kind, CollectionKind::Custom);
        assert_eq!(collections[0].title, "Window Films");
    }

    #[tokio::test]
    async fn alias_without_frontpage_falls_back_to_title() {
        let shop = InMemoryShop::new();
        let id = ensure_collection(&shop, "Homepage").await.unwrap();
        let collections = shop.collections().await;
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].id, id);
        assert_eq!(collections[0].title, "Homepage");
    }
}
