//! In-memory provider implementations for tests
//!
//! These never touch the network. Each mock records the calls it receives so
//! tests can assert on side effects, and can be switched into a failing mode
//! to exercise upstream error paths.

use crate::error::{ImaginariumError, Result, Upstream};
use crate::services::hosting::HostingProvider;
use crate::services::payments::{CapturedOrder, PaymentGateway, PaymentOrder};
use crate::services::removal::{validate_png, BackgroundRemover};
use crate::types::ImageAsset;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Encode a transparent `width` x `height` PNG
#[must_use]
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::new(width, height);
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("encoding an in-memory PNG cannot fail");
    buffer.into_inner()
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Image host backed by a map of public id to asset
#[derive(Debug, Default)]
pub struct MockHosting {
    resources: Mutex<HashMap<String, ImageAsset>>,
    deleted: Mutex<Vec<String>>,
    searches: Mutex<Vec<String>>,
    uploads: AtomicUsize,
    failing: AtomicBool,
}

impl MockHosting {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset so `resource` and `search` can find it
    #[must_use]
    pub fn with_asset(self, asset: ImageAsset) -> Self {
        self.insert(asset);
        self
    }

    pub fn insert(&self, asset: ImageAsset) {
        lock(&self.resources).insert(asset.public_id.clone(), asset);
    }

    /// Make every call fail with an upstream error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    #[must_use]
    pub fn searches(&self) -> Vec<String> {
        lock(&self.searches).clone()
    }

    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ImaginariumError::upstream(
                Upstream::Hosting,
                format!("{operation} returned 503 Service Unavailable"),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HostingProvider for MockHosting {
    async fn resource(&self, public_id: &str) -> Result<ImageAsset> {
        self.check("resource lookup")?;
        lock(&self.resources)
            .get(public_id)
            .cloned()
            .ok_or_else(|| ImaginariumError::not_found(format!("hosted image '{public_id}'")))
    }

    async fn upload_png(&self, png: &[u8]) -> Result<ImageAsset> {
        self.check("upload")?;
        let dimensions = validate_png(png)?;
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let public_id = format!("imaginarium/upload_{n}");
        let asset = ImageAsset {
            secure_url: self.build_url(&public_id, ""),
            public_id,
            width: dimensions.width,
            height: dimensions.height,
        };
        self.insert(asset.clone());
        Ok(asset)
    }

    async fn delete_resources(&self, public_ids: &[String]) -> Result<()> {
        self.check("delete")?;
        let mut resources = lock(&self.resources);
        for id in public_ids {
            resources.remove(id);
        }
        lock(&self.deleted).extend(public_ids.iter().cloned());
        Ok(())
    }

    /// Matches assets whose public id contains the text after the last `AND`
    async fn search(&self, expression: &str) -> Result<Vec<ImageAsset>> {
        self.check("search")?;
        lock(&self.searches).push(expression.to_string());
        let needle = expression
            .rsplit_once(" AND ")
            .map_or("", |(_, query)| query.trim());
        let mut found: Vec<ImageAsset> = lock(&self.resources)
            .values()
            .filter(|asset| asset.public_id.contains(needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.public_id.cmp(&b.public_id));
        Ok(found)
    }

    fn build_url(&self, public_id: &str, transformation: &str) -> String {
        if transformation.is_empty() {
            format!("https://images.test/upload/{public_id}")
        } else {
            format!("https://images.test/upload/{transformation}/{public_id}")
        }
    }
}

/// Background remover returning a fixed PNG
#[derive(Debug)]
pub struct MockRemover {
    png: Vec<u8>,
    calls: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MockRemover {
    /// Remover producing a `width` x `height` cutout
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_bytes(png_bytes(width, height))
    }

    /// Remover returning arbitrary bytes, valid or not
    #[must_use]
    pub fn with_bytes(png: Vec<u8>) -> Self {
        Self {
            png,
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl BackgroundRemover for MockRemover {
    async fn remove_background(&self, image_url: &str) -> Result<Vec<u8>> {
        lock(&self.calls).push(image_url.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(ImaginariumError::upstream(
                Upstream::BackgroundRemoval,
                "remove background returned 402 Payment Required",
            ));
        }
        validate_png(&self.png)?;
        Ok(self.png.clone())
    }
}

/// Payment gateway that approves every order at the requested price
#[derive(Debug, Default)]
pub struct MockPayments {
    orders: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MockPayments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ImaginariumError::upstream(
                Upstream::Payments,
                format!("{operation} returned 500 Internal Server Error"),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPayments {
    async fn create_order(&self, price: &str) -> Result<PaymentOrder> {
        self.check("create order")?;
        let mut orders = lock(&self.orders);
        let id = format!("ORDER-{}", orders.len() + 1);
        orders.insert(id.clone(), price.to_string());
        Ok(PaymentOrder {
            id,
            status: "CREATED".to_string(),
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<CapturedOrder> {
        self.check("capture order")?;
        let price = lock(&self.orders)
            .get(order_id)
            .cloned()
            .ok_or_else(|| {
                ImaginariumError::upstream(
                    Upstream::Payments,
                    format!("capture order returned 404 Not Found: {order_id}"),
                )
            })?;
        Ok(CapturedOrder {
            id: order_id.to_string(),
            status: "COMPLETED".to_string(),
            amount: Some(price),
        })
    }
}
