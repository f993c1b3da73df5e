//! Document store for saved images and user credit balances
//!
//! [`DocumentStore`] is the persistence seam; [`MemoryStore`] keeps
//! everything behind one `RwLock` so multi-document writes (charge credits,
//! then insert) either fully happen or leave nothing behind.

use crate::error::{ImaginariumError, Result};
use crate::transformations::{AspectRatio, TransformationConfig, TransformationKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Credits granted to a newly registered user
pub const SIGNUP_CREDITS: i64 = 9;

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub credit_balance: i64,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// New user with the sign-up credit grant
    #[must_use]
    pub fn new<I: Into<String>, F: Into<String>, L: Into<String>>(
        id: I,
        first_name: F,
        last_name: L,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            credit_balance: SIGNUP_CREDITS,
            created_at: Utc::now(),
        }
    }
}

/// Author fields embedded in image responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&UserRecord> for Author {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Fields a client supplies when saving or editing an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    pub title: String,
    pub transformation_type: TransformationKind,
    pub public_id: String,
    pub transparent_public_id: Option<String>,
    #[serde(alias = "bgPublicId")]
    pub background_public_id: Option<String>,
    pub secure_url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub config: Option<TransformationConfig>,
    pub transformation_url: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
    pub color: Option<String>,
    pub prompt: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
}

impl ImageData {
    /// Data with only the required fields set
    #[must_use]
    pub fn new<T: Into<String>, P: Into<String>, U: Into<String>>(
        title: T,
        transformation_type: TransformationKind,
        public_id: P,
        secure_url: U,
    ) -> Self {
        Self {
            title: title.into(),
            transformation_type,
            public_id: public_id.into(),
            transparent_public_id: None,
            background_public_id: None,
            secure_url: secure_url.into(),
            width: None,
            height: None,
            config: None,
            transformation_url: None,
            aspect_ratio: None,
            color: None,
            prompt: None,
            to: None,
            from: None,
        }
    }

    /// Required fields are present
    ///
    /// # Errors
    /// - Empty title, public id or secure URL
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("title", &self.title),
            ("public_id", &self.public_id),
            ("secure_url", &self.secure_url),
        ] {
            if value.trim().is_empty() {
                return Err(ImaginariumError::invalid_request(format!("{name} is required")));
            }
        }
        Ok(())
    }

    /// Hosted assets backing this image
    #[must_use]
    pub fn hosted_ids(&self) -> Vec<String> {
        std::iter::once(Some(&self.public_id))
            .chain([
                self.background_public_id.as_ref(),
                self.transparent_public_id.as_ref(),
            ])
            .flatten()
            .filter(|id| !id.is_empty())
            .cloned()
            .collect()
    }
}

/// A saved transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub data: ImageData,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Build a record from validated data
    ///
    /// # Errors
    /// - Data fails [`ImageData::validate`]
    pub fn new(data: ImageData, author: Author) -> Result<Self> {
        data.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            data,
            author,
            created_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author.id == user_id
    }

    /// Replace the editable fields and bump `updated_at`
    ///
    /// # Errors
    /// - Data fails [`ImageData::validate`]
    pub fn apply_update(&mut self, data: ImageData) -> Result<()> {
        data.validate()?;
        self.data = data;
        self.updated_at = Utc::now().max(self.updated_at);
        Ok(())
    }
}

/// Which images a listing covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFilter {
    All,
    Author(String),
    PublicIds(Vec<String>),
}

impl ImageFilter {
    fn matches(&self, record: &ImageRecord) -> bool {
        match self {
            Self::All => true,
            Self::Author(id) => record.author.id == *id,
            Self::PublicIds(ids) => ids.contains(&record.data.public_id),
        }
    }
}

/// A 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    /// Page numbers below 1 are treated as 1; size is at least 1
    #[must_use]
    pub fn new(number: usize, size: usize) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    /// Items before this page; saturates for out-of-range page numbers
    #[must_use]
    pub fn skip(&self) -> usize {
        (self.number - 1).saturating_mul(self.size)
    }

    /// Pages needed to show `total` items
    #[must_use]
    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.size)
    }
}

/// Persistence operations
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>>;

    /// Insert or replace a user
    async fn put_user(&self, user: UserRecord) -> Result<UserRecord>;

    /// Add `delta` to the balance and return the new balance
    ///
    /// A negative delta that would overdraw fails with
    /// `InsufficientCredits` and writes nothing.
    async fn adjust_credits(&self, user_id: &str, delta: i64) -> Result<i64>;

    /// Charge `cost` credits and insert `record` as one write
    async fn insert_image_charged(&self, record: ImageRecord, cost: u32) -> Result<(ImageRecord, i64)>;

    async fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>>;

    /// Replace an existing record
    async fn update_image(&self, record: ImageRecord) -> Result<ImageRecord>;

    /// Remove a record, returning it if it existed
    async fn delete_image(&self, id: Uuid) -> Result<Option<ImageRecord>>;

    /// Matching records, most recently updated first
    async fn list_images(&self, filter: &ImageFilter, page: Page) -> Result<Vec<ImageRecord>>;

    async fn count_images(&self, filter: &ImageFilter) -> Result<usize>;
}

#[derive(Debug, Default)]
struct Collections {
    users: HashMap<String, UserRecord>,
    images: HashMap<Uuid, ImageRecord>,
}

fn charge(user: &mut UserRecord, delta: i64) -> Result<i64> {
    let balance = user.credit_balance + delta;
    if balance < 0 {
        return Err(ImaginariumError::InsufficientCredits {
            required: delta.unsigned_abs() as u32,
            available: user.credit_balance,
        });
    }
    user.credit_balance = balance;
    Ok(balance)
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn put_user(&self, user: UserRecord) -> Result<UserRecord> {
        self.inner
            .write()
            .await
            .users
            .insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn adjust_credits(&self, user_id: &str, delta: i64) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| ImaginariumError::not_found(format!("user {user_id}")))?;
        charge(user, delta)
    }

    async fn insert_image_charged(&self, record: ImageRecord, cost: u32) -> Result<(ImageRecord, i64)> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&record.author.id)
            .ok_or_else(|| ImaginariumError::not_found(format!("user {}", record.author.id)))?;
        let balance = charge(user, -i64::from(cost))?;
        inner.images.insert(record.id, record.clone());
        Ok((record, balance))
    }

    async fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>> {
        Ok(self.inner.read().await.images.get(&id).cloned())
    }

    async fn update_image(&self, record: ImageRecord) -> Result<ImageRecord> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .images
            .get_mut(&record.id)
            .ok_or_else(|| ImaginariumError::not_found(format!("image {}", record.id)))?;
        *slot = record.clone();
        Ok(record)
    }

    async fn delete_image(&self, id: Uuid) -> Result<Option<ImageRecord>> {
        Ok(self.inner.write().await.images.remove(&id))
    }

    async fn list_images(&self, filter: &ImageFilter, page: Page) -> Result<Vec<ImageRecord>> {
        let inner = self.inner.read().await;
        let mut matching: Vec<&ImageRecord> =
            inner.images.values().filter(|r| filter.matches(r)).collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(matching
            .into_iter()
            .skip(page.skip())
            .take(page.size)
            .cloned()
            .collect())
    }

    async fn count_images(&self, filter: &ImageFilter) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner.images.values().filter(|r| filter.matches(r)).count())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::image_data;
    use super::*;

    async fn store_with_user(credits: i64) -> MemoryStore {
        let store = MemoryStore::new();
        let mut user = UserRecord::new("u1", "Ada", "Lovelace");
        user.credit_balance = credits;
        store.put_user(user).await.unwrap();
        store
    }

    fn author() -> Author {
        Author {
            id: "u1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[test]
    fn test_page_math() {
        let page = Page::new(0, 9);
        assert_eq!(page.number, 1);
        assert_eq!(page.skip(), 0);
        assert_eq!(Page::new(3, 9).skip(), 18);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(9), 1);
        assert_eq!(page.total_pages(10), 2);
    }

    #[tokio::test]
    async fn test_page_far_past_end_is_empty() {
        let store = store_with_user(9).await;
        store
            .insert_image_charged(ImageRecord::new(image_data("a", TransformationKind::Fill), author()).unwrap(), 1)
            .await
            .unwrap();

        let page = Page::new(usize::MAX, 9);
        assert_eq!(page.skip(), usize::MAX);
        assert!(store.list_images(&ImageFilter::All, page).await.unwrap().is_empty());
    }

    #[test]
    fn test_image_data_validation() {
        let mut data = image_data("a", TransformationKind::Restore);
        assert!(data.validate().is_ok());
        data.title = " ".to_string();
        assert!(matches!(data.validate(), Err(ImaginariumError::InvalidRequest(_))));
    }

    #[test]
    fn test_hosted_ids_skip_missing() {
        let mut data = image_data("a", TransformationKind::RemoveBackground);
        data.background_public_id = Some("bg".to_string());
        data.transparent_public_id = Some(String::new());
        assert_eq!(data.hosted_ids(), vec!["a".to_string(), "bg".to_string()]);
    }

    #[tokio::test]
    async fn test_charge_is_all_or_nothing() {
        let store = store_with_user(3).await;
        let record =
            ImageRecord::new(image_data("a", TransformationKind::RemoveBackground), author())
                .unwrap();

        let err = store.insert_image_charged(record, 5).await.unwrap_err();
        assert!(matches!(
            err,
            ImaginariumError::InsufficientCredits {
                required: 5,
                available: 3
            }
        ));
        assert_eq!(store.count_images(&ImageFilter::All).await.unwrap(), 0);
        assert_eq!(store.get_user("u1").await.unwrap().unwrap().credit_balance, 3);
    }

    #[tokio::test]
    async fn test_adjust_credits() {
        let store = store_with_user(9).await;
        assert_eq!(store.adjust_credits("u1", 50).await.unwrap(), 59);
        assert!(store.adjust_credits("u1", -60).await.is_err());
        assert_eq!(store.adjust_credits("u1", -59).await.unwrap(), 0);
        assert!(matches!(
            store.adjust_credits("nobody", 1).await,
            Err(ImaginariumError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_and_paged() {
        let store = store_with_user(100).await;
        let mut ids = Vec::new();
        for i in 0..5 {
            let mut record =
                ImageRecord::new(image_data(&format!("p{i}"), TransformationKind::Fill), author())
                    .unwrap();
            record.updated_at += chrono::Duration::seconds(i);
            ids.push(record.id);
            store.insert_image_charged(record, 1).await.unwrap();
        }

        let first = store.list_images(&ImageFilter::All, Page::new(1, 2)).await.unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);
        let last = store.list_images(&ImageFilter::All, Page::new(3, 2)).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].id, ids[0]);

        let filter = ImageFilter::PublicIds(vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(store.count_images(&filter).await.unwrap(), 2);
        assert_eq!(
            store
                .count_images(&ImageFilter::Author("someone-else".to_string()))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_update_missing_image() {
        let store = store_with_user(1).await;
        let record = ImageRecord::new(image_data("a", TransformationKind::Fill), author()).unwrap();
        assert!(matches!(
            store.update_image(record).await,
            Err(ImaginariumError::NotFound(_))
        ));
    }

    #[test]
    fn test_record_json_shape() {
        let record =
            ImageRecord::new(image_data("a", TransformationKind::RemoveBackground), author())
                .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["transformationType"], "removeBackground");
        assert_eq!(json["publicId"], "a");
        assert_eq!(json["author"]["firstName"], "Ada");
    }
}
