//! Named variations of an asset.
//!
//! A variation is produced by running an ordered list of [`Transform`]s
//! against an asset. Each [`Variation`] refers to its asset by uid; deleting
//! one yields a [`RemovedVariation`] that the owning [`Asset`] applies to its
//! own map of variations.

use crate::{
    asset::{batch_result, Asset, Batch},
    document::Document,
    instructions::{encode_all, Transform},
    metadata::RequestMetadata,
    Client, Error, Result,
};
use http::Method;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

/// Transforms to run, keyed by the name of the variation they produce.
pub type VariationSet = BTreeMap<String, Vec<Transform>>;

fn encode_set(set: &VariationSet) -> Value {
    Value::Object(
        set.iter()
            .map(|(name, transforms)| (name.clone(), encode_all(transforms)))
            .collect::<Map<String, Value>>(),
    )
}

/// A variation of an asset.
#[derive(Debug, Clone)]
pub struct Variation {
    client: Client,
    asset_uid: String,
    name: String,
    document: Document,
}

/// Returned by [`Variation::delete`]; identifies the variation that no
/// longer exists on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedVariation {
    asset_uid: String,
    name: String,
}

impl RemovedVariation {
    pub(crate) fn new(asset_uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            asset_uid: asset_uid.into(),
            name: name.into(),
        }
    }

    pub fn asset_uid(&self) -> &str {
        &self.asset_uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Variation {
    pub(crate) fn from_value(
        client: Client,
        asset_uid: &str,
        name: &str,
        value: Value,
    ) -> Result<Self> {
        Ok(Self {
            client,
            asset_uid: asset_uid.to_string(),
            name: name.to_string(),
            document: Document::from_value(value)?,
        })
    }

    /// The variation's name, unique within its asset.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The uid of the asset this variation belongs to.
    pub fn asset_uid(&self) -> &str {
        &self.asset_uid
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn path(&self) -> String {
        format!("assets/{}/variations/{}", self.asset_uid, self.name)
    }

    /// Downloads the variation's file.
    pub async fn download(&self) -> Result<Vec<u8>> {
        let metadata = RequestMetadata::new(Method::GET, format!("{}/download", self.path()));
        self.client.call(metadata.download()).await?.data.into_bytes()
    }

    /// Deletes the variation on the server.
    ///
    /// The owning asset is not modified; pass the result to
    /// [`Asset::forget_variation`], or use [`Asset::delete_variation`] which
    /// does both.
    pub async fn delete(&self) -> Result<RemovedVariation> {
        self.client
            .call(RequestMetadata::new(Method::DELETE, self.path()))
            .await?;

        tracing::debug!(
            asset = %self.asset_uid,
            variation = %self.name,
            "Deleted variation"
        );

        Ok(RemovedVariation::new(&self.asset_uid, &self.name))
    }

    /// Creates variations of `asset`.
    ///
    /// Without a `notification_url` the variations are generated
    /// synchronously and replace the asset's entire set of variations. With
    /// one, the server reports to that URL when done and the asset is left
    /// unchanged.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use h51::{Asset, Client, Transform, Variation, VariationSet};
    ///
    /// # async fn example() -> Result<(), h51::Error> {
    /// let client = Client::new("my-api-key")?;
    /// let mut asset = Asset::one(&client, "3owuun").await?;
    ///
    /// let mut variations = VariationSet::new();
    /// variations.insert(
    ///     "thumb".to_string(),
    ///     vec![
    ///         Transform::AutoOrient,
    ///         Transform::focal_point_crop(1.0),
    ///         Transform::fit(200, 200),
    ///         Transform::output("WebP"),
    ///     ],
    /// );
    ///
    /// Variation::create(&mut asset, &variations, None).await?;
    /// println!("{:?}", asset.variation("thumb").and_then(|v| v.get_str("url")));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create(
        asset: &mut Asset,
        variations: &VariationSet,
        notification_url: Option<&str>,
    ) -> Result<()> {
        let metadata =
            RequestMetadata::new(Method::PUT, format!("assets/{}/variations", asset.uid()))
                .with_query_param("notification_url", notification_url)
                .with_json_field("variations", &encode_set(variations))?;

        let response = asset.client().call(metadata).await?;

        if notification_url.is_none() {
            let mut result = response.data.into_json()?;
            let raw = result
                .get_mut("variations")
                .map(Value::take)
                .ok_or_else(|| Error::MissingField("variations".to_string()))?;
            asset.replace_variations(raw)?;
        }

        Ok(())
    }

    /// Creates variations for several assets, returning the server's result.
    pub async fn create_many(
        client: &Client,
        uids: &[&str],
        variations: &Batch<VariationSet>,
        notification_url: Option<&str>,
    ) -> Result<Value> {
        let metadata = variations.apply(
            RequestMetadata::new(Method::PUT, "assets/transform")
                .with_json_field("uids", uids)?
                .with_query_param("notification_url", notification_url),
            "variations",
            encode_set,
        )?;

        batch_result(client.call(metadata).await?.data)
    }
}

impl Deref for Variation {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.document
    }
}

impl fmt::Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Variation: {} ({})", self.name, self.asset_uid)
    }
}
