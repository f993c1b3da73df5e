#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Imaginarium
//!
//! Core of an AI image transformation service: background-replacement
//! compositing, generative edit configuration, saved-image actions and credit
//! billing, exposed as a library and an HTTP API server.
//!
//! ## Features
//!
//! - **Background replacement**: fit a transparent subject onto a background
//!   canvas whose long edge is 1280px, then scale, offset, blur and brighten it
//!   through a provider-side transformation chain
//! - **Generative edits**: typed restore, fill, remove, replace and recolor
//!   configuration with a field-wise merge
//! - **Providers**: image hosting, background removal and payments behind
//!   async traits, with HTTP clients for Cloudinary, remove.bg and PayPal
//! - **Previews**: request sequencing so only the latest response is shown,
//!   and a cancellable debouncer for prompt input
//! - **Server**: axum JSON API (enable with the `server` feature, on by default)
//!
//! ## Quick Start
//!
//! ```rust
//! use imaginarium::{compose, CompositionInputs, ImageAsset};
//!
//! # fn example() -> imaginarium::Result<()> {
//! let background = ImageAsset {
//!     public_id: "imaginarium/beach".to_string(),
//!     width: 1920,
//!     height: 1280,
//!     secure_url: "https://res.cloudinary.com/demo/image/upload/imaginarium/beach".to_string(),
//! };
//! let subject = ImageAsset {
//!     public_id: "imaginarium/dog".to_string(),
//!     width: 613,
//!     height: 407,
//!     secure_url: "https://res.cloudinary.com/demo/image/upload/imaginarium/dog".to_string(),
//! };
//!
//! let inputs = CompositionInputs::builder(background, subject)
//!     .scale(1.5)
//!     .offset(40, -20)
//!     .background_blur(300)
//!     .build()?;
//! let composition = compose(&inputs)?;
//!
//! assert_eq!(composition.geometry.canvas_width, 1280);
//! assert_eq!(composition.geometry.canvas_height, 853);
//! assert!(composition.transformation().starts_with("c_scale,w_1280,h_853/"));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! imaginarium = { version = "0.2", default-features = false }
//! ```

pub mod billing;
#[cfg(feature = "server")]
pub mod cli;
pub mod composition;
pub mod config;
pub mod error;
pub mod geometry;
pub mod images;
pub mod instructions;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
pub mod store;
pub mod tracing_config;
pub mod transformations;
pub mod types;

// Public API exports
pub use billing::{plan_for_price, BillingService, CaptureOutcome, Plan, PLANS};
pub use composition::{compose, Composition};
pub use config::{AppConfig, AppConfigBuilder, HostingConfig, PaymentConfig, PaymentMode, RemovalApiConfig};
pub use error::{ImaginariumError, Result, Upstream};
pub use geometry::{apply_scale, gravity, resolve, Gravity, ResolvedGeometry, ScaledPlacement, CANVAS_LONG_EDGE};
pub use images::{CreatedImage, ImagePage, ImageService};
pub use instructions::{Instruction, InstructionChain};
pub use services::{
    BackgroundRemover, Debouncer, HostingProvider, Notification, NotificationSink, PaymentGateway,
    Preview, PreviewSession, RequestSequencer, Ticket,
};
pub use store::{DocumentStore, ImageData, ImageRecord, MemoryStore, UserRecord};
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
pub use transformations::{
    merge_config, AspectRatio, EditMode, TransformationConfig, TransformationDraft,
    TransformationFragment, TransformationKind,
};
pub use types::{CompositionInputs, Dimensions, ImageAsset, InputChange};
