//! # h51 - Client for the H51 image asset API
//!
//! Upload assets, run analyzers against them, generate named variations and
//! page through your asset library. All processing happens on the server;
//! this crate marshals requests and wraps the JSON documents it gets back.
//!
//! ## Quick Start
//!
//! ```no_run
//! use h51::{Analyzer, Asset, AssetFilter, Client, CreateOptions, Transform, Upload, Variation};
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), h51::Error> {
//!     let client = Client::builder()
//!         .api_key("my-api-key")
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     // Upload an image
//!     let upload = Upload::from_path("photo.jpg").await?;
//!     let mut asset = Asset::create(&client, upload, &CreateOptions::default()).await?;
//!
//!     // Analyze it
//!     asset.analyze(&[Analyzer::Animation, Analyzer::focal_point()], None).await?;
//!     println!("meta: {:?}", asset.meta());
//!
//!     // Generate a web-friendly variation
//!     let mut variations = BTreeMap::new();
//!     variations.insert(
//!         "web".to_string(),
//!         vec![Transform::AutoOrient, Transform::fit(1024, 1024), Transform::output("WebP")],
//!     );
//!     Variation::create(&mut asset, &variations, None).await?;
//!
//!     // Fetch every image, pausing for the rate limit to reset when fewer
//!     // than 5 requests remain
//!     let images = Asset::all(&client, &AssetFilter::default().asset_type("image"), 5).await?;
//!     println!("{} images", images.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every non-success response is returned as [`Error::Api`], classified into
//! an [`ErrorKind`] and carrying the server's hint and per-argument messages.
//! Calls are never retried, including on `429 Too Many Requests`.
//!
//! ```no_run
//! use h51::{Asset, Client, Error, ErrorKind};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::new("my-api-key")?;
//! match Asset::one(&client, "missing").await {
//!     Ok(asset) => println!("{}", asset),
//!     Err(e @ Error::Api { kind: ErrorKind::RequestLimitExceeded, .. }) => {
//!         eprintln!("{}", e);
//!         if let Some(rate_limit) = client.rate_limit() {
//!             eprintln!("resets in {:?}", rate_limit.delay_until_reset());
//!         }
//!     }
//!     Err(Error::Timeout) => eprintln!("timed out"),
//!     Err(e) => eprintln!("{}", e),
//! }
//! # Ok(())
//! # }
//! ```

mod asset;
mod client;
mod document;
mod error;
pub mod instructions;
pub mod metadata;
mod page;
pub mod rate_limit;
mod response;
mod variation;

pub use asset::{Asset, AssetFilter, Batch, CreateOptions, Expiry, PageRequest, PartialAsset};
pub use client::{Client, ClientBuilder, API_KEY_HEADER, DEFAULT_BASE_URL};
pub use document::Document;
pub use error::{ArgErrors, Error, ErrorKind, Result};
pub use instructions::{Analyzer, Instruction, Transform};
pub use metadata::Upload;
pub use page::Page;
pub use response::{Payload, Response};
pub use variation::{RemovedVariation, Variation, VariationSet};
