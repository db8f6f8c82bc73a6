//! Assets stored on H51.
//!
//! [`Asset`] and [`PartialAsset`] are views over documents fetched by the
//! [`Client`]. They can only be obtained from the operations in this module
//! (`create`, `one`, `many`, `all`, `expand`, ...), never built directly.

use crate::{
    document::Document,
    instructions::{encode_all, Analyzer},
    metadata::{RequestMetadata, Upload},
    page::{ListResponse, Page},
    response::Payload,
    variation::{RemovedVariation, Variation},
    Client, Error, Result,
};
use chrono::{DateTime, Utc};
use http::Method;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::time::Duration;

/// Page size used by [`Asset::all`].
const ALL_PAGE_SIZE: u32 = 100;

/// Filters shared by the asset list endpoints.
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    /// Only secure (`true`) or only public (`false`) assets.
    pub secure: Option<bool>,
    /// Only assets of this type (e.g. `image`, `file`).
    pub asset_type: Option<String>,
    /// A search query.
    pub q: Option<String>,
}

impl AssetFilter {
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn asset_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = Some(asset_type.into());
        self
    }

    pub fn query(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }
}

/// Cursor and size of a single page request.
///
/// `before` and `after` reference the `uid` of a row from a previous page.
/// The server decides ordering.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub before: Option<String>,
    pub after: Option<String>,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn before(mut self, uid: impl Into<String>) -> Self {
        self.before = Some(uid.into());
        self
    }

    pub fn after(mut self, uid: impl Into<String>) -> Self {
        self.after = Some(uid.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for uploading a new asset.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// A name for the asset; defaults to the uploaded file name.
    pub name: Option<String>,
    /// Seconds until the asset expires.
    pub expire: Option<u64>,
    /// Store the asset as secure.
    pub secure: bool,
}

impl CreateOptions {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn expire(mut self, seconds: u64) -> Self {
        self.expire = Some(seconds);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    fn apply(&self, metadata: RequestMetadata) -> RequestMetadata {
        metadata
            .with_form_field("name", self.name.as_deref())
            .with_form_field("expire", self.expire)
            // An insecure upload is the server default and is left unsent.
            .with_form_field("secure", self.secure.then_some(true))
    }
}

/// When an asset should expire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expiry {
    /// Expire after the given duration.
    In(Duration),
    /// Expire at the given time.
    At(DateTime<Utc>),
}

impl Expiry {
    /// The number of seconds from now until expiry.
    ///
    /// Partial seconds round up, so a non-zero [`Expiry::In`] never becomes
    /// an immediate expiry. For [`Expiry::At`] this is computed when called,
    /// against the system clock; times in the past yield zero.
    pub fn seconds(&self) -> u64 {
        match self {
            Expiry::In(duration) if duration.subsec_nanos() > 0 => {
                duration.as_secs().saturating_add(1)
            }
            Expiry::In(duration) => duration.as_secs(),
            Expiry::At(at) => (*at - Utc::now()).num_seconds().max(0) as u64,
        }
    }
}

impl From<Duration> for Expiry {
    fn from(duration: Duration) -> Self {
        Expiry::In(duration)
    }
}

impl From<DateTime<Utc>> for Expiry {
    fn from(at: DateTime<Utc>) -> Self {
        Expiry::At(at)
    }
}

/// The payload of a batch call: one instruction set applied to every uid,
/// or a separate set per uid.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch<T> {
    Shared(T),
    PerUid(BTreeMap<String, T>),
}

impl<T> Batch<T> {
    /// Adds the batch payload under `field`, flagging per-uid payloads with `local`.
    pub(crate) fn apply(
        &self,
        metadata: RequestMetadata,
        field: &str,
        encode: impl Fn(&T) -> Value,
    ) -> Result<RequestMetadata> {
        match self {
            Batch::Shared(set) => metadata.with_json_field(field, &encode(set)),
            Batch::PerUid(sets) => {
                let encoded: Map<String, Value> = sets
                    .iter()
                    .map(|(uid, set)| (uid.clone(), encode(set)))
                    .collect();
                Ok(metadata
                    .with_json_field(field, &encoded)?
                    .with_form_field("local", true))
            }
        }
    }
}

/// Result body of a batch endpoint; `Null` when the server sent none.
pub(crate) fn batch_result(payload: Payload) -> Result<Value> {
    match payload {
        Payload::Empty => Ok(Value::Null),
        other => other.into_json(),
    }
}

fn list_request(filter: &AssetFilter, page: &PageRequest) -> RequestMetadata {
    RequestMetadata::new(Method::GET, "assets")
        .with_query_param("secure", filter.secure)
        .with_query_param("type", filter.asset_type.as_deref())
        .with_query_param("q", filter.q.as_deref())
        .with_query_param("before", page.before.as_deref())
        .with_query_param("after", page.after.as_deref())
        .with_query_param("limit", page.limit)
}

fn batch_request(method: Method, path: &str, uids: &[&str]) -> Result<RequestMetadata> {
    RequestMetadata::new(method, path).with_json_field("uids", uids)
}

/// A row from an asset listing.
///
/// Partial assets never expand their variations. Call
/// [`PartialAsset::expand`] to fetch the full [`Asset`].
#[derive(Debug, Clone)]
pub struct PartialAsset {
    client: Client,
    uid: String,
    document: Document,
}

impl PartialAsset {
    pub(crate) fn from_fields(client: Client, fields: Map<String, Value>) -> Result<Self> {
        let document = Document::new(fields)?;
        let uid = required_uid(&document)?;
        Ok(Self {
            client,
            uid,
            document,
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Fetches the full asset. The partial asset itself is left untouched.
    pub async fn expand(&self) -> Result<Asset> {
        Asset::one(&self.client, &self.uid).await
    }
}

impl Deref for PartialAsset {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.document
    }
}

impl fmt::Display for PartialAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Partial asset: {}", self.uid)
    }
}

/// An asset stored on H51.
///
/// The asset's `variations` are always exposed as a map of [`Variation`]
/// views (empty when the server sent none) through [`Asset::variations`];
/// every other field of the document is readable through [`Document`].
///
/// # Examples
///
/// ```no_run
/// use h51::{Analyzer, Asset, Client, CreateOptions, Upload};
///
/// # async fn example() -> Result<(), h51::Error> {
/// let client = Client::new("my-api-key")?;
///
/// let upload = Upload::from_path("photo.jpg").await?;
/// let mut asset = Asset::create(&client, upload, &CreateOptions::default().name("Holiday")).await?;
///
/// asset.analyze(&[Analyzer::dominant_colors()], None).await?;
/// println!("{:?}", asset.meta());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Asset {
    client: Client,
    uid: String,
    document: Document,
    variations: BTreeMap<String, Variation>,
}

impl Asset {
    pub(crate) fn from_value(client: Client, value: Value) -> Result<Self> {
        let mut document = Document::from_value(value)?;
        let uid = required_uid(&document)?;
        let raw_variations = document.take("variations");

        let mut asset = Self {
            client,
            uid,
            document,
            variations: BTreeMap::new(),
        };
        asset.variations = asset.build_variations(raw_variations)?;
        Ok(asset)
    }

    fn build_variations(&self, raw: Option<Value>) -> Result<BTreeMap<String, Variation>> {
        match raw {
            Some(Value::Object(entries)) => entries
                .into_iter()
                .map(|(name, value)| {
                    let variation =
                        Variation::from_value(self.client.clone(), &self.uid, &name, value)?;
                    Ok((name, variation))
                })
                .collect(),
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Array(items)) if items.is_empty() => Ok(BTreeMap::new()),
            Some(other) => Err(Error::UnexpectedResponse(format!(
                "expected variations to be an object, got {}",
                other
            ))),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Analyzer output, keyed by analyzer name.
    pub fn meta(&self) -> Option<&Value> {
        self.document.get("meta")
    }

    /// The expiry reported by the server, if the asset is set to expire.
    pub fn expires(&self) -> Option<&Value> {
        self.document.get("expires")
    }

    /// The variations of the asset, keyed by name.
    pub fn variations(&self) -> &BTreeMap<String, Variation> {
        &self.variations
    }

    pub fn variation(&self, name: &str) -> Option<&Variation> {
        self.variations.get(name)
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Replaces every variation with those built from `raw`.
    pub(crate) fn replace_variations(&mut self, raw: Value) -> Result<()> {
        self.variations = self.build_variations(Some(raw))?;
        Ok(())
    }

    /// Merges a JSON object response into the document.
    fn merge_response(&mut self, payload: Payload) -> Result<()> {
        let mut patch = match payload {
            Payload::Empty => return Ok(()),
            other => match other.into_json()? {
                Value::Object(patch) => patch,
                value => {
                    return Err(Error::UnexpectedResponse(format!(
                        "expected a JSON object, got {}",
                        value
                    )))
                }
            },
        };

        let raw_variations = patch.remove("variations");
        self.document.apply_patch(patch)?;
        if let Some(raw) = raw_variations {
            self.replace_variations(raw)?;
        }
        Ok(())
    }

    /// Fetches the asset with the given uid.
    pub async fn one(client: &Client, uid: &str) -> Result<Self> {
        let response = client
            .call(RequestMetadata::new(Method::GET, format!("assets/{}", uid)))
            .await?;
        Self::from_value(client.clone(), response.data.into_json()?)
    }

    /// Fetches a single page of assets.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use h51::{Asset, AssetFilter, Client, PageRequest};
    ///
    /// # async fn example() -> Result<(), h51::Error> {
    /// let client = Client::new("my-api-key")?;
    ///
    /// let filter = AssetFilter::default().asset_type("image");
    /// let page = Asset::many(&client, &filter, &PageRequest::default().limit(20)).await?;
    /// println!("{} of {} assets", page.len(), page.result_count());
    ///
    /// if page.has_more() {
    ///     let last = page.results().last().map(|a| a.uid().to_string());
    ///     let next = PageRequest { after: last, ..PageRequest::default() };
    ///     let page = Asset::many(&client, &filter, &next).await?;
    /// #   let _ = page;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn many(client: &Client, filter: &AssetFilter, page: &PageRequest) -> Result<Page> {
        let response = client.call(list_request(filter, page)).await?;
        let list = ListResponse::from_value(response.data.into_json()?)?;
        Page::from_response(client, list)
    }

    /// Fetches every asset matching `filter`, following `after` cursors.
    ///
    /// After each page, if more remain and the client's last recorded
    /// remaining request count is at or below `rate_buffer`, waits until the
    /// recorded reset time before asking for the next page. A `429` response
    /// is not retried.
    pub async fn all(
        client: &Client,
        filter: &AssetFilter,
        rate_buffer: u64,
    ) -> Result<Vec<PartialAsset>> {
        let mut assets = Vec::new();
        let mut page = PageRequest::default().limit(ALL_PAGE_SIZE);

        loop {
            let response = client.call(list_request(filter, &page)).await?;
            let list = ListResponse::from_value(response.data.into_json()?)?;
            let has_more = list.has_more;
            let rows = list.into_rows(client)?;

            tracing::debug!(
                rows = rows.len(),
                fetched = assets.len() + rows.len(),
                has_more = has_more,
                "Fetched page of assets"
            );

            let Some(last) = rows.last() else {
                if has_more {
                    tracing::warn!("Empty page reported more results, stopping");
                }
                break;
            };
            page.after = Some(last.uid().to_string());
            assets.extend(rows);

            if !has_more {
                break;
            }

            if let Some(rate_limit) = client.rate_limit().filter(|r| r.is_below(rate_buffer)) {
                if let Some(delay) = rate_limit.delay_until_reset() {
                    tracing::info!(
                        remaining = ?rate_limit.remaining,
                        rate_buffer = rate_buffer,
                        delay_ms = delay.as_millis(),
                        "Rate limit buffer reached - waiting for reset"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Ok(assets)
    }

    /// Uploads a new asset.
    pub async fn create(client: &Client, file: Upload, options: &CreateOptions) -> Result<Self> {
        let metadata =
            options.apply(RequestMetadata::new(Method::PUT, "assets").with_file("file", file));
        let response = client.call(metadata).await?;
        Self::from_value(client.clone(), response.data.into_json()?)
    }

    /// Creates a new zip asset bundling the assets with the given uids.
    pub async fn zip(client: &Client, uids: &[&str], options: &CreateOptions) -> Result<Self> {
        let metadata = options.apply(batch_request(Method::PUT, "assets/zip", uids)?);
        let response = client.call(metadata).await?;
        Self::from_value(client.clone(), response.data.into_json()?)
    }

    /// Runs analyzers against the asset.
    ///
    /// Without a `notification_url` the analysis runs synchronously and the
    /// asset's `meta` is replaced with the result. With one, the server
    /// reports to that URL when done and the asset is left unchanged.
    pub async fn analyze(
        &mut self,
        analyzers: &[Analyzer],
        notification_url: Option<&str>,
    ) -> Result<()> {
        let metadata = RequestMetadata::new(Method::POST, format!("assets/{}/analyze", self.uid))
            .with_query_param("notification_url", notification_url)
            .with_json_field("analyzers", &encode_all(analyzers))?;

        let response = self.client.call(metadata).await?;

        if notification_url.is_none() {
            let mut result = response.data.into_json()?;
            let meta = result
                .get_mut("meta")
                .map(Value::take)
                .ok_or_else(|| Error::MissingField("meta".to_string()))?;
            self.document.set("meta", meta);
        }

        Ok(())
    }

    /// Runs analyzers against several assets, returning the server's result.
    pub async fn analyze_many(
        client: &Client,
        uids: &[&str],
        analyzers: &Batch<Vec<Analyzer>>,
        notification_url: Option<&str>,
    ) -> Result<Value> {
        let metadata = analyzers.apply(
            batch_request(Method::POST, "assets/analyze", uids)?
                .with_query_param("notification_url", notification_url),
            "analyzers",
            |set| encode_all(set),
        )?;

        batch_result(client.call(metadata).await?.data)
    }

    /// Downloads the asset's file.
    pub async fn download(&self) -> Result<Vec<u8>> {
        let metadata =
            RequestMetadata::new(Method::GET, format!("assets/{}/download", self.uid)).download();
        self.client.call(metadata).await?.data.into_bytes()
    }

    /// Sets the asset to expire.
    pub async fn expire(&mut self, expiry: impl Into<Expiry>) -> Result<()> {
        let seconds = expiry.into().seconds();
        let metadata = RequestMetadata::new(Method::POST, format!("assets/{}/expire", self.uid))
            .with_form_field("seconds", seconds);

        let response = self.client.call(metadata).await?;
        self.merge_response(response.data)
    }

    /// Sets several assets to expire.
    pub async fn expire_many(
        client: &Client,
        uids: &[&str],
        expiry: impl Into<Expiry>,
    ) -> Result<Value> {
        let seconds = expiry.into().seconds();
        let metadata =
            batch_request(Method::POST, "assets/expire", uids)?.with_form_field("seconds", seconds);
        batch_result(client.call(metadata).await?.data)
    }

    /// Removes the asset's expiry.
    pub async fn persist(&mut self) -> Result<()> {
        let metadata = RequestMetadata::new(Method::POST, format!("assets/{}/persist", self.uid));
        let response = self.client.call(metadata).await?;
        self.merge_response(response.data)
    }

    /// Removes the expiry of several assets.
    pub async fn persist_many(client: &Client, uids: &[&str]) -> Result<Value> {
        let metadata = batch_request(Method::POST, "assets/persist", uids)?;
        batch_result(client.call(metadata).await?.data)
    }

    /// Creates a shallow copy of the asset, returned as a new asset.
    pub async fn shallow_copy(&self) -> Result<Asset> {
        let metadata =
            RequestMetadata::new(Method::POST, format!("assets/{}/shallow-copy", self.uid));
        let response = self.client.call(metadata).await?;
        Self::from_value(self.client.clone(), response.data.into_json()?)
    }

    /// Creates shallow copies of several assets.
    pub async fn shallow_copy_many(client: &Client, uids: &[&str]) -> Result<Value> {
        let metadata = batch_request(Method::POST, "assets/shallow-copy", uids)?;
        batch_result(client.call(metadata).await?.data)
    }

    /// Deletes the named variation and removes it from the asset.
    ///
    /// Returns `false` without calling the API if the asset has no such
    /// variation.
    pub async fn delete_variation(&mut self, name: &str) -> Result<bool> {
        let Some(variation) = self.variations.get(name) else {
            return Ok(false);
        };
        let removed = variation.delete().await?;
        Ok(self.forget_variation(&removed))
    }

    /// Applies the result of [`Variation::delete`] to this asset.
    ///
    /// Returns `true` if a variation was removed. Removals for another asset
    /// or for a name already gone are ignored.
    pub fn forget_variation(&mut self, removed: &RemovedVariation) -> bool {
        removed.asset_uid() == self.uid && self.variations.remove(removed.name()).is_some()
    }
}

impl Deref for Asset {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.document
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Asset: {}", self.uid)
    }
}

fn required_uid(document: &Document) -> Result<String> {
    document
        .get_str("uid")
        .map(str::to_string)
        .ok_or_else(|| Error::MissingField("uid".to_string()))
}
