//! Saved-image actions
//!
//! Creating, editing, deleting and listing saved transformations, plus the
//! background-removal round trip that produces a transparent subject.

use crate::error::{ImaginariumError, Result};
use crate::services::hosting::HostingProvider;
use crate::services::removal::{validate_png, BackgroundRemover};
use crate::store::{Author, DocumentStore, ImageData, ImageFilter, ImageRecord, Page};
use crate::tracing_config::{events, spans};
use crate::types::ImageAsset;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Page size used when the caller gives none
pub const DEFAULT_PAGE_SIZE: usize = 9;

/// Folder every uploaded image lives in
pub const DEFAULT_FOLDER: &str = "imaginarium";

/// Result of the global listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePage {
    pub data: Vec<ImageRecord>,
    pub total_pages: usize,
    /// Images saved across all users, present on the global listing only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_images: Option<usize>,
}

/// Saved image created together with the buyer's remaining balance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedImage {
    pub image: ImageRecord,
    pub credit_balance: i64,
}

/// Image actions over the store and the providers
pub struct ImageService {
    store: Arc<dyn DocumentStore>,
    hosting: Arc<dyn HostingProvider>,
    remover: Arc<dyn BackgroundRemover>,
    folder: String,
    page_size: usize,
}

impl ImageService {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        hosting: Arc<dyn HostingProvider>,
        remover: Arc<dyn BackgroundRemover>,
    ) -> Self {
        Self {
            store,
            hosting,
            remover,
            folder: DEFAULT_FOLDER.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Scope searches to another hosting folder
    #[must_use]
    pub fn with_folder<S: Into<String>>(mut self, folder: S) -> Self {
        self.folder = folder.into();
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Save a transformation and charge its credit cost
    ///
    /// # Errors
    /// - `NotFound` if the user does not exist
    /// - `InvalidRequest` for missing required fields
    /// - `InsufficientCredits`; nothing is written
    pub async fn add_image(&self, user_id: &str, data: ImageData) -> Result<CreatedImage> {
        let span = spans::image_action("add", user_id);
        self.charge_and_insert(user_id, data).instrument(span).await
    }

    /// Edit a saved image owned by `user_id`
    ///
    /// # Errors
    /// - `NotFound` if the image does not exist
    /// - `Unauthorized` if someone else authored it; checked before writing
    /// - `InvalidRequest` for missing required fields
    pub async fn update_image(&self, user_id: &str, id: Uuid, data: ImageData) -> Result<ImageRecord> {
        let mut record = self.owned_image(user_id, id).await?;
        record.apply_update(data)?;
        let record = self.store.update_image(record).await?;
        tracing::info!(image_id = %id, user_id, "Image updated");
        Ok(record)
    }

    /// Delete a saved image owned by `user_id` and its hosted assets
    ///
    /// The record goes first; a hosting failure afterwards is returned but
    /// the record stays deleted.
    ///
    /// # Errors
    /// - `NotFound`, `Unauthorized` as for [`ImageService::update_image`]
    /// - `UpstreamUnavailable` if the host could not delete the assets
    pub async fn delete_image(&self, user_id: &str, id: Uuid) -> Result<ImageRecord> {
        let record = self.owned_image(user_id, id).await?;
        self.store.delete_image(id).await?;

        let hosted = record.data.hosted_ids();
        if let Err(error) = self.hosting.delete_resources(&hosted).await {
            events::upstream_failure(&error, "delete hosted assets");
            return Err(error);
        }
        tracing::info!(image_id = %id, assets = hosted.len(), "Image deleted");
        Ok(record)
    }

    /// # Errors
    /// - `NotFound` if the image does not exist
    pub async fn get_image_by_id(&self, id: Uuid) -> Result<ImageRecord> {
        self.store
            .get_image(id)
            .await?
            .ok_or_else(|| ImaginariumError::not_found(format!("image {id}")))
    }

    /// Most recently updated images across all users
    ///
    /// A non-empty `search` goes through the host's search first and keeps
    /// only records whose public id it returned.
    ///
    /// # Errors
    /// - `UpstreamUnavailable` if the search call fails
    pub async fn get_all_images(
        &self,
        page: usize,
        limit: Option<usize>,
        search: Option<&str>,
    ) -> Result<ImagePage> {
        let page = Page::new(page, limit.unwrap_or(self.page_size));
        let filter = match search.map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => {
                let expression = format!("folder={} AND {query}", self.folder);
                let found = self.hosting.search(&expression).await?;
                ImageFilter::PublicIds(found.into_iter().map(|asset| asset.public_id).collect())
            },
            None => ImageFilter::All,
        };

        let data = self.store.list_images(&filter, page).await?;
        let total = self.store.count_images(&filter).await?;
        let saved_images = self.store.count_images(&ImageFilter::All).await?;
        Ok(ImagePage {
            data,
            total_pages: page.total_pages(total),
            saved_images: Some(saved_images),
        })
    }

    /// Most recently updated images authored by `user_id`
    ///
    /// # Errors
    /// - Store failures
    pub async fn get_user_images(
        &self,
        user_id: &str,
        page: usize,
        limit: Option<usize>,
    ) -> Result<ImagePage> {
        let page = Page::new(page, limit.unwrap_or(self.page_size));
        let filter = ImageFilter::Author(user_id.to_string());
        let data = self.store.list_images(&filter, page).await?;
        let total = self.store.count_images(&filter).await?;
        Ok(ImagePage {
            data,
            total_pages: page.total_pages(total),
            saved_images: None,
        })
    }

    /// Cut the subject out of `image` and host the transparent result
    ///
    /// Removal and upload run in sequence, so the returned asset is always
    /// the upload of this call's cutout.
    ///
    /// # Errors
    /// - `UpstreamUnavailable` from either provider, or a non-PNG result
    pub async fn remove_background(&self, image: &ImageAsset) -> Result<ImageAsset> {
        let span = spans::upstream_call("background removal", "remove_background");
        self.cut_out_and_upload(image).instrument(span).await
    }

    async fn charge_and_insert(&self, user_id: &str, data: ImageData) -> Result<CreatedImage> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ImaginariumError::not_found(format!("user {user_id}")))?;

        let cost = data.transformation_type.credit_cost();
        let record = ImageRecord::new(data, Author::from(&user))?;
        let (image, balance) = self.store.insert_image_charged(record, cost).await?;

        events::credits_changed(user_id, -i64::from(cost), balance);
        tracing::info!(image_id = %image.id, kind = %image.data.transformation_type, "Image saved");
        Ok(CreatedImage {
            image,
            credit_balance: balance,
        })
    }

    async fn cut_out_and_upload(&self, image: &ImageAsset) -> Result<ImageAsset> {
        let png = self.remover.remove_background(&image.secure_url).await?;
        validate_png(&png)?;
        let transparent = self.hosting.upload_png(&png).await?;
        tracing::info!(
            source = %image.public_id,
            transparent = %transparent.public_id,
            "Transparent subject uploaded"
        );
        Ok(transparent)
    }

    async fn owned_image(&self, user_id: &str, id: Uuid) -> Result<ImageRecord> {
        let record = self.get_image_by_id(id).await?;
        if !record.is_authored_by(user_id) {
            tracing::warn!(image_id = %id, user_id, "Rejected edit of another user's image");
            return Err(ImaginariumError::unauthorized(format!(
                "image {id} belongs to another user"
            )));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MockHosting, MockRemover};
    use crate::store::fixtures::image_data;
    use crate::store::{MemoryStore, UserRecord};
    use crate::transformations::TransformationKind;
    use crate::types::fixtures::asset;

    struct Harness {
        service: ImageService,
        store: Arc<MemoryStore>,
        hosting: Arc<MockHosting>,
        remover: Arc<MockRemover>,
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        store.put_user(UserRecord::new("alice", "Alice", "A")).await.unwrap();
        store.put_user(UserRecord::new("bob", "Bob", "B")).await.unwrap();
        let hosting = Arc::new(MockHosting::new());
        let remover = Arc::new(MockRemover::new(40, 30));
        let service = ImageService::new(store.clone(), hosting.clone(), remover.clone());
        Harness {
            service,
            store,
            hosting,
            remover,
        }
    }

    #[tokio::test]
    async fn test_add_charges_credits() {
        let h = harness().await;
        let created = h
            .service
            .add_image("alice", image_data("a", TransformationKind::RemoveBackground))
            .await
            .unwrap();
        assert_eq!(created.credit_balance, 4);
        assert_eq!(created.image.author.first_name, "Alice");

        // 4 left, background replacement costs 5
        let err = h
            .service
            .add_image("alice", image_data("b", TransformationKind::RemoveBackground))
            .await
            .unwrap_err();
        assert!(matches!(err, ImaginariumError::InsufficientCredits { .. }));
        assert_eq!(h.store.count_images(&ImageFilter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_requires_user() {
        let h = harness().await;
        let err = h
            .service
            .add_image("mallory", image_data("a", TransformationKind::Fill))
            .await
            .unwrap_err();
        assert!(matches!(err, ImaginariumError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_checks_author() {
        let h = harness().await;
        let created = h
            .service
            .add_image("alice", image_data("a", TransformationKind::Fill))
            .await
            .unwrap();
        let id = created.image.id;

        let mut edit = image_data("a", TransformationKind::Fill);
        edit.title = "Renamed".to_string();

        let err = h.service.update_image("bob", id, edit.clone()).await.unwrap_err();
        assert!(matches!(err, ImaginariumError::Unauthorized(_)));
        assert_eq!(h.service.get_image_by_id(id).await.unwrap().data.title, "Image a");

        let updated = h.service.update_image("alice", id, edit).await.unwrap();
        assert_eq!(updated.data.title, "Renamed");
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn test_delete_removes_hosted_assets() {
        let h = harness().await;
        let mut data = image_data("a", TransformationKind::RemoveBackground);
        data.background_public_id = Some("bg".to_string());
        data.transparent_public_id = Some("cutout".to_string());
        let id = h.service.add_image("alice", data).await.unwrap().image.id;

        assert!(matches!(
            h.service.delete_image("bob", id).await,
            Err(ImaginariumError::Unauthorized(_))
        ));
        assert!(h.hosting.deleted().is_empty());

        h.service.delete_image("alice", id).await.unwrap();
        assert_eq!(h.hosting.deleted(), vec!["a", "bg", "cutout"]);
        assert!(matches!(
            h.service.get_image_by_id(id).await,
            Err(ImaginariumError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_goes_through_host() {
        let h = harness().await;
        for id in ["imaginarium/cat", "imaginarium/dog", "imaginarium/catfish"] {
            h.hosting.insert(asset(id, 10, 10));
            h.service
                .add_image("alice", image_data(id, TransformationKind::Restore))
                .await
                .unwrap();
        }

        let page = h.service.get_all_images(1, None, Some("cat")).await.unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.saved_images, Some(3));
        assert_eq!(h.hosting.searches(), vec!["folder=imaginarium AND cat"]);

        let all = h.service.get_all_images(1, Some(2), None).await.unwrap();
        assert_eq!(all.data.len(), 2);
        assert_eq!(all.total_pages, 2);
    }

    #[tokio::test]
    async fn test_user_images() {
        let h = harness().await;
        h.service
            .add_image("alice", image_data("a", TransformationKind::Restore))
            .await
            .unwrap();
        h.service
            .add_image("bob", image_data("b", TransformationKind::Restore))
            .await
            .unwrap();

        let page = h.service.get_user_images("bob", 1, None).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].data.public_id, "b");
        assert_eq!(page.saved_images, None);
    }

    #[tokio::test]
    async fn test_remove_background_uploads_cutout() {
        let h = harness().await;
        let source = asset("imaginarium/photo", 400, 300);
        let transparent = h.service.remove_background(&source).await.unwrap();
        assert_eq!((transparent.width, transparent.height), (40, 30));
        assert_eq!(h.remover.calls(), vec![source.secure_url.clone()]);
        assert_eq!(h.hosting.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_background_failure_skips_upload() {
        let h = harness().await;
        h.remover.set_failing(true);
        let err = h
            .service
            .remove_background(&asset("imaginarium/photo", 400, 300))
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(h.hosting.upload_count(), 0);
    }
}
