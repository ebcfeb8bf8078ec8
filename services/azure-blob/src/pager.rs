// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::collections::BTreeMap;

use azblob_core::{Error, Result};
use bytes::{Buf, Bytes};
use http::{Method, Uri};
use quick_xml::de;
use serde::Deserialize;

use crate::transport::{BlobRequest, Transport};

/// BlobPager walks the list blobs endpoint one page at a time.
///
/// The pager owns its marker, so it is forward only. Start a new listing to
/// iterate again.
#[derive(Debug)]
pub struct BlobPager {
    transport: Transport,
    url: String,
    prefix: String,
    limit: Option<usize>,
    headers: BTreeMap<String, String>,

    next_marker: String,
    done: bool,
}

impl BlobPager {
    /// Create a pager over the container at `url`.
    pub(crate) fn new(
        transport: Transport,
        url: String,
        prefix: &str,
        limit: Option<usize>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            transport,
            url,
            prefix: prefix.replace('\\', "/"),
            limit,
            headers,

            next_marker: "".to_string(),
            done: false,
        }
    }

    /// Fetch the names on the next page, `None` once the listing is exhausted.
    pub async fn next(&mut self) -> Result<Option<Vec<String>>> {
        if self.done {
            return Ok(None);
        }

        let limit = self.limit.map(|v| v.to_string()).unwrap_or_default();
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("restype", "container")
            .append_pair("comp", "list")
            .append_pair("prefix", &self.prefix);
        for (k, v) in [("maxresults", limit.as_str()), ("marker", self.next_marker.as_str())] {
            if !v.is_empty() {
                query.append_pair(k, v);
            }
        }

        let uri: Uri = format!("{}?{}", self.url, query.finish()).parse()?;
        let resp = self
            .transport
            .send(BlobRequest::new(Method::GET, uri).extra_headers(&self.headers)?)
            .await?;

        let (names, next_marker) = parse_page(resp.into_body())?;
        self.done = next_marker.is_empty();
        self.next_marker = next_marker;

        Ok(Some(names))
    }

    /// Drain every remaining page.
    pub async fn collect(mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        while let Some(page) = self.next().await? {
            names.extend(page);
        }
        Ok(names)
    }
}

fn parse_page(body: Bytes) -> Result<(Vec<String>, String)> {
    let output: Output = de::from_reader(body.reader())
        .map_err(|e| Error::protocol("failed to parse list blobs response").with_source(e))?;

    let names = output.blobs.blob.into_iter().map(|v| v.name).collect();
    Ok((names, output.next_marker.unwrap_or_default()))
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Output {
    blobs: Blobs,
    #[serde(rename = "NextMarker")]
    next_marker: Option<String>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Blobs {
    blob: Vec<Blob>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Blob {
    name: String,
}
