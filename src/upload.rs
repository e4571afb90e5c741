use crate::archive::ModelGroup;
use crate::config::CatalogSettings;
use derive_more::{Display, Error};
use itertools::Itertools;
use shopify_admin::{
    ensure_collection, get_product_by_id_or_handle, AdminApi, ApiError, CollectionId, NewProduct,
    Product, ProductId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadMode {
    Plain,
    /// Clone attributes of an existing product, given by numeric id or handle.
    Duplicate {
        source: String,
        copy_collections: bool,
    },
}

#[derive(Debug, Display, Error)]
pub enum UploadError {
    #[display("Duplication requires a source product id or handle")]
    MissingSource,
    #[display("Source product {identifier:?} not found")]
    SourceNotFound { identifier: String },
    #[display("Unable to load source product {identifier:?}: {source}")]
    SourceLookup { identifier: String, source: ApiError },
    #[display("Unable to set up collection {title:?}: {source}")]
    CollectionSetup { title: String, source: ApiError },
}

/// Collections every product of a run is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionTargets {
    /// Configured titles with their resolved ids, in configured order.
    Defaults(Vec<(String, CollectionId)>),
    /// Collections the template product belonged to.
    Template(Vec<CollectionId>),
}

impl CollectionTargets {
    pub fn ids(&self) -> Vec<CollectionId> {
        match self {
            Self::Defaults(resolved) => resolved.iter().map(|(_, id)| *id).collect(),
            Self::Template(ids) => ids.clone(),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Defaults(resolved) => resolved.iter().map(|(title, _)| title).join(", "),
            Self::Template(ids) => ids.iter().map(|id| format!("#{id}")).join(", "),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatedProduct {
    pub model: String,
    pub product_id: ProductId,
    pub title: String,
    pub handle: Option<String>,
    pub status: Option<String>,
    pub collections: String,
}

#[derive(Debug)]
pub struct FailedModel {
    pub model: String,
    pub title: String,
    /// Set when the product was created but attaching it failed.
    pub product_id: Option<ProductId>,
    pub collections: String,
    pub error: ApiError,
}

pub type ModelOutcome = Result<CreatedProduct, FailedModel>;

struct Template {
    product: Product,
    collections: Option<Vec<CollectionId>>,
}

pub struct Uploader<'a> {
    api: &'a dyn AdminApi,
    settings: &'a CatalogSettings,
    mode: UploadMode,
}

impl<'a> Uploader<'a> {
    pub fn new(api: &'a dyn AdminApi, settings: &'a CatalogSettings, mode: UploadMode) -> Self {
        Self {
            api,
            settings,
            mode,
        }
    }

    /// Creates one product per model. Errors returned from here abort the
    /// whole run before any product is created; failures of a single model
    /// end up in its outcome instead.
    pub async fn run(
        &self,
        models: &[ModelGroup],
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<Vec<ModelOutcome>, UploadError> {
        let template = self.resolve_template().await?;
        let targets = match template.as_ref().and_then(|t| t.collections.clone()) {
            Some(ids) => {
                log::info!("Reusing {} collection(s) of the source product", ids.len());
                CollectionTargets::Template(ids)
            }
            None => self.resolve_collections().await?,
        };

        let total = models.len();
        let mut outcomes = Vec::with_capacity(total);
        for (idx, model) in models.iter().enumerate() {
            let outcome = self
                .upload_model(model, template.as_ref().map(|t| &t.product), &targets)
                .await;
            if let Err(failed) = &outcome {
                log::error!("Model {} failed: {}", failed.model, failed.error);
            }
            outcomes.push(outcome);
            on_progress(idx + 1, total);
        }
        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        log::info!(
            "Batch finished: {} created, {failed} failed",
            total - failed
        );
        Ok(outcomes)
    }

    async fn resolve_template(&self) -> Result<Option<Template>, UploadError> {
        let UploadMode::Duplicate {
            source,
            copy_collections,
        } = &self.mode
        else {
            return Ok(None);
        };
        let identifier = source.trim();
        if identifier.is_empty() {
            return Err(UploadError::MissingSource);
        }
        let lookup_failed = |source| UploadError::SourceLookup {
            identifier: identifier.to_string(),
            source,
        };
        let product = get_product_by_id_or_handle(self.api, identifier)
            .await
            .map_err(lookup_failed)?
            .ok_or_else(|| UploadError::SourceNotFound {
                identifier: identifier.to_string(),
            })?;
        log::info!("Using product {} ({:?}) as template", product.id, product.title);
        let collections = if *copy_collections {
            Some(
                self.api
                    .list_product_collections(product.id)
                    .await
                    .map_err(lookup_failed)?,
            )
        } else {
            None
        };
        Ok(Some(Template {
            product,
            collections,
        }))
    }

    async fn resolve_collections(&self) -> Result<CollectionTargets, UploadError> {
        let mut resolved = Vec::with_capacity(self.settings.default_collections.len());
        for title in &self.settings.default_collections {
            let id = ensure_collection(self.api, title)
                .await
                .map_err(|source| UploadError::CollectionSetup {
                    title: title.clone(),
                    source,
                })?;
            resolved.push((title.clone(), id));
        }
        Ok(CollectionTargets::Defaults(resolved))
    }

    async fn upload_model(
        &self,
        model: &ModelGroup,
        template: Option<&Product>,
        targets: &CollectionTargets,
    ) -> ModelOutcome {
        let title = self.settings.product_title(&model.name);
        let request = match template {
            Some(template) => NewProduct::from_template(title.clone(), model.images.clone(), template),
            None => NewProduct::Plain {
                title: title.clone(),
                body_html: Some(self.settings.description_html.clone()),
                images: model.images.clone(),
            },
        };
        let collections = targets.summary();
        let mut created_id = None;
        match self.create_and_attach(&request, targets, &mut created_id).await {
            Ok(product) => Ok(CreatedProduct {
                model: model.name.clone(),
                product_id: product.id,
                title: product.title,
                handle: product.handle,
                status: product.status,
                collections,
            }),
            Err(error) => Err(FailedModel {
                model: model.name.clone(),
                title,
                product_id: created_id,
                collections,
                error,
            }),
        }
    }

    async fn create_and_attach(
        &self,
        request: &NewProduct,
        targets: &CollectionTargets,
        created_id: &mut Option<ProductId>,
    ) -> Result<Product, ApiError> {
        let product = self.api.create_product(request).await?;
        *created_id = Some(product.id);
        log::info!("Created product {} {:?}", product.id, product.title);
        for collection_id in targets.ids() {
            self.api
                .add_product_to_collection(product.id, collection_id)
                .await?;
            log::debug!("Attached product {} to collection {collection_id}", product.id);
        }
        Ok(product)
    }
}
