//! A single page of results from a list endpoint.

use crate::{asset::PartialAsset, Client, Error, Result};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::ops::Index;

/// The body of a list endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    pub results: Vec<Map<String, Value>>,
    pub result_count: u64,
    pub has_more: bool,
    pub url: String,
}

impl ListResponse {
    pub(crate) fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| Error::DeserializationFailed {
            raw_response: value.to_string(),
            serde_error: e.to_string(),
            status: StatusCode::OK,
        })
    }

    pub(crate) fn into_rows(self, client: &Client) -> Result<Vec<PartialAsset>> {
        self.results
            .into_iter()
            .map(|row| PartialAsset::from_fields(client.clone(), row))
            .collect()
    }
}

/// One page of partial assets, as returned by [`Asset::many`](crate::Asset::many).
///
/// A page is a snapshot: it never fetches again. Use the `uid` of its first
/// or last row as the `before`/`after` cursor to request neighbouring pages.
#[derive(Debug, Clone)]
pub struct Page {
    results: Vec<PartialAsset>,
    result_count: u64,
    has_more: bool,
    url: String,
}

impl Page {
    pub(crate) fn from_response(client: &Client, response: ListResponse) -> Result<Self> {
        let result_count = response.result_count;
        let has_more = response.has_more;
        let url = response.url.clone();

        Ok(Self {
            results: response.into_rows(client)?,
            result_count,
            has_more,
            url,
        })
    }

    /// The rows in this page, in server order.
    pub fn results(&self) -> &[PartialAsset] {
        &self.results
    }

    /// The total number of results matching the query, across all pages.
    pub fn result_count(&self) -> u64 {
        self.result_count
    }

    /// Whether there are more results after this page.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// The URL used to fetch this page.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The number of rows in this page.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PartialAsset> {
        self.results.iter()
    }

    /// Consumes the page, returning its rows.
    pub fn into_results(self) -> Vec<PartialAsset> {
        self.results
    }
}

impl Index<usize> for Page {
    type Output = PartialAsset;

    fn index(&self, i: usize) -> &PartialAsset {
        &self.results[i]
    }
}

impl<'a> IntoIterator for &'a Page {
    type Item = &'a PartialAsset;
    type IntoIter = std::slice::Iter<'a, PartialAsset>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

impl IntoIterator for Page {
    type Item = PartialAsset;
    type IntoIter = std::vec::IntoIter<PartialAsset>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
