use crate::{AdminApi, ApiError};
use serde::{Deserialize, Deserializer, Serialize};

pub type ProductId = u64;

/// Loosely typed JSON object, used for the nested records (options, variants)
/// whose shape belongs to the platform rather than to us.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Identity fields assigned by the server. They must not travel with a copy
/// of an option or variant into a new product.
pub const IDENTITY_FIELDS: [&str; 6] = [
    "id",
    "product_id",
    "admin_graphql_api_id",
    "position",
    "created_at",
    "updated_at",
];

/// Variants additionally reference the source product's image.
pub const VARIANT_IDENTITY_FIELDS: [&str; 7] = [
    "id",
    "product_id",
    "admin_graphql_api_id",
    "position",
    "created_at",
    "updated_at",
    "image_id",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<Fields>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variants: Vec<Fields>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: Fields,
}

/// Image uploaded inline with a new product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Base64-encoded image bytes.
    #[serde(rename = "attachment")]
    pub content: String,
    pub filename: String,
    pub position: u32,
}

/// Attributes copied from an existing product when duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateFields {
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub tags: Option<String>,
    pub options: Vec<Fields>,
    pub variants: Vec<Fields>,
}

impl TemplateFields {
    pub fn from_product(product: &Product) -> Self {
        Self {
            vendor: product.vendor.clone(),
            product_type: product.product_type.clone(),
            tags: product.tags.clone(),
            options: product.options.iter().map(scrub_option).collect(),
            variants: product.variants.iter().map(scrub_variant).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NewProduct {
    Plain {
        title: String,
        body_html: Option<String>,
        images: Vec<ImagePayload>,
    },
    FromTemplate {
        title: String,
        body_html: Option<String>,
        images: Vec<ImagePayload>,
        template: TemplateFields,
    },
}

#[derive(Serialize)]
struct ProductDraft<'a> {
    title: &'a str,
    body_html: Option<&'a str>,
    images: &'a [ImagePayload],
    #[serde(flatten)]
    template: Option<&'a TemplateFields>,
}

#[derive(Serialize)]
pub(crate) struct ProductEnvelope<'a> {
    product: ProductDraft<'a>,
}

impl NewProduct {
    /// Builds a request that takes its description and attributes from
    /// `template`.
    pub fn from_template(title: String, images: Vec<ImagePayload>, template: &Product) -> Self {
        Self::FromTemplate {
            title,
            body_html: template.body_html.clone(),
            images,
            template: TemplateFields::from_product(template),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Plain { title, .. } | Self::FromTemplate { title, .. } => title,
        }
    }

    pub fn body_html(&self) -> Option<&str> {
        match self {
            Self::Plain { body_html, .. } | Self::FromTemplate { body_html, .. } => {
                body_html.as_deref()
            }
        }
    }

    pub fn images(&self) -> &[ImagePayload] {
        match self {
            Self::Plain { images, .. } | Self::FromTemplate { images, .. } => images,
        }
    }

    pub fn template(&self) -> Option<&TemplateFields> {
        match self {
            Self::Plain { .. } => None,
            Self::FromTemplate { template, .. } => Some(template),
        }
    }

    pub(crate) fn envelope(&self) -> ProductEnvelope<'_> {
        ProductEnvelope {
            product: ProductDraft {
                title: self.title(),
                body_html: self.body_html(),
                images: self.images(),
                template: self.template(),
            },
        }
    }
}

pub fn scrub_option(option: &Fields) -> Fields {
    scrub(option, &IDENTITY_FIELDS)
}

pub fn scrub_variant(variant: &Fields) -> Fields {
    scrub(variant, &VARIANT_IDENTITY_FIELDS)
}

fn scrub(fields: &Fields, drop: &[&str]) -> Fields {
    fields
        .iter()
        .filter(|(key, _)| !drop.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Resolves a product by numeric id, or by handle for anything else.
pub async fn get_product_by_id_or_handle(
    api: &dyn AdminApi,
    identifier: &str,
) -> Result<Option<Product>, ApiError> {
    let identifier = identifier.trim();
    if !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit()) {
        return match identifier.parse::<ProductId>() {
            Ok(id) => api.get_product_by_id(id).await,
            Err(_) => {
                log::warn!("Product id {identifier} is out of range");
                Ok(None)
            }
        };
    }
    api.get_product_by_handle(identifier).await
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryShop;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn template() -> Product {
        serde_json::from_value(json!({
            "id": 7001,
            "handle": "aurora-01",
            "title": "Aurora 01",
            "body_html": "<p>Template</p>",
            "vendor": "SOLAR SCREEN",
            "product_type": "Window film",
            "tags": "decorative, privacy",
            "status": "active",
            "created_at": "2024-01-01T00:00:00Z",
            "options": [{
                "id": 11, "product_id": 7001, "name": "Width", "position": 1,
                "values": ["60cm", "120cm"]
            }],
            "variants": [{
                "id": 21, "product_id": 7001, "admin_graphql_api_id": "gid://shopify/ProductVariant/21",
                "position": 1, "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-02T00:00:00Z",
                "image_id": 31, "price": "49.90", "sku": "AUR-60", "option1": "60cm",
                "inventory_policy": "deny"
            }],
            "images": [{ "id": 31, "src": "https://cdn.example/a.jpg" }]
        }))
        .unwrap()
    }

    #[test]
    fn scrubbing_strips_only_identity_fields() {
        let variant = fields(json!({
            "id": 1, "product_id": 2, "admin_graphql_api_id": "gid", "position": 3,
            "created_at": "c", "updated_at": "u", "image_id": 4,
            "price": "10.00", "sku": "SKU", "weight": 1.5, "option1": null
        }));
        assert_eq!(
            scrub_variant(&variant),
            fields(json!({ "price": "10.00", "sku": "SKU", "weight": 1.5, "option1": null }))
        );

        let option = fields(json!({
            "id": 1, "product_id": 2, "position": 1, "name": "Size", "values": ["S", "M"], "image_id": 9
        }));
        assert_eq!(
            scrub_option(&option),
            fields(json!({ "name": "Size", "values": ["S", "M"], "image_id": 9 }))
        );
    }

    #[test]
    fn unknown_product_fields_are_kept() {
        let product = template();
        assert_eq!(product.extra["created_at"], json!("2024-01-01T00:00:00Z"));
        assert_eq!(product.handle.as_deref(), Some("aurora-01"));
    }

    #[test]
    fn null_collections_deserialize_as_empty() {
        let product: Product =
            serde_json::from_value(json!({ "id": 1, "title": null, "options": null, "variants": null }))
                .unwrap();
        assert!(product.title.is_empty());
        assert!(product.options.is_empty());
        assert!(product.variants.is_empty());
    }

    #[test]
    fn plain_request_has_no_template_fields() {
        let request = NewProduct::Plain {
            title: "SOLAR SCREEN® Decorative Films - AURORA-01".to_string(),
            body_html: Some("<p>Films</p>".to_string()),
            images: vec![ImagePayload {
                content: "aGVsbG8=".to_string(),
                filename: "a.jpg".to_string(),
                position: 1,
            }],
        };
        let payload = serde_json::to_value(request.envelope()).unwrap();
        assert_eq!(
            payload,
            json!({
                "product": {
                    "title": "SOLAR SCREEN® Decorative Films - AURORA-01",
                    "body_html": "<p>Films</p>",
                    "images": [{ "attachment": "aGVsbG8=", "filename": "a.jpg", "position": 1 }]
                }
            })
        );
    }

    #[test]
    fn template_request_copies_scrubbed_attributes() {
        let request = NewProduct::from_template("New".to_string(), vec![], &template());
        let payload = serde_json::to_value(request.envelope()).unwrap();
        let product = &payload["product"];
        assert_eq!(product["title"], json!("New"));
        assert_eq!(product["body_html"], json!("<p>Template</p>"));
        assert_eq!(product["vendor"], json!("SOLAR SCREEN"));
        assert_eq!(product["product_type"], json!("Window film"));
        assert_eq!(product["tags"], json!("decorative, privacy"));
        assert_eq!(
            product["options"],
            json!([{ "name": "Width", "values": ["60cm", "120cm"] }])
        );
        assert_eq!(
            product["variants"],
            json!([{ "price": "49.90", "sku": "AUR-60", "option1": "60cm", "inventory_policy": "deny" }])
        );
        assert!(product.get("id").is_none());
        assert!(product.get("handle").is_none());
    }

    #[tokio::test]
    async fn resolves_numeric_identifier_by_id() {
        let shop = InMemoryShop::new().with_product(template());
        let found = get_product_by_id_or_handle(&shop, " 7001 ").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(7001));
        assert!(get_product_by_id_or_handle(&shop, "7002").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolves_other_identifiers_by_handle() {
        let shop = InMemoryShop::new().with_product(template());
        let found = get_product_by_id_or_handle(&shop, "aurora-01").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(7001));
        assert!(get_product_by_id_or_handle(&shop, "7001-b").await.unwrap().is_none());
        assert!(get_product_by_id_or_handle(&shop, "99999999999999999999999")
            .await
            .unwrap()
            .is_none());
    }
}
