use std::collections::BTreeMap;
use std::sync::Arc;

use azblob_core::time::now;
use azblob_core::{Context, ErrorKind, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode, Uri};
use log::debug;
use percent_encoding::utf8_percent_encode;

use crate::blob::{parse_tags, BlobProperties, ContainerProperties, PublicAccess};
use crate::block::{block_list_body, BlockId, BlockPlan};
use crate::config::check_block_size;
use crate::constants::*;
use crate::pager::BlobPager;
use crate::sign_request::{BearerSigner, SasOptions, SharedKeySigner, Signer};
use crate::token::TokenSource;
use crate::transport::{parse_error, BlobRequest, Transport};
use crate::{Config, Credential};

/// Options of writes creating or committing a blob.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Saved as the blob content type.
    pub content_type: Option<String>,
    /// Saved as the blob content disposition.
    pub content_disposition: Option<String>,
    /// Base64 MD5 of the whole blob.
    ///
    /// Verified by the service on single shot uploads only. A block upload
    /// stores it without checking, pass a checksum per block to
    /// [`Client::put_blob_block`] to have blocks verified.
    pub content_md5: Option<String>,
    /// Custom metadata.
    pub metadata: BTreeMap<String, String>,
    /// Blob index tags.
    pub tags: BTreeMap<String, String>,
    /// Extra `x-ms-*` headers, names given without the prefix.
    pub headers: BTreeMap<String, String>,
    /// Overrides the client block size for this upload.
    pub block_size: Option<usize>,
}

impl PutOptions {
    /// Set the content type.
    pub fn with_content_type(mut self, v: impl Into<String>) -> Self {
        self.content_type = Some(v.into());
        self
    }

    /// Set the content disposition.
    pub fn with_content_disposition(mut self, v: impl Into<String>) -> Self {
        self.content_disposition = Some(v.into());
        self
    }

    /// Set the base64 MD5 checksum.
    pub fn with_content_md5(mut self, v: impl Into<String>) -> Self {
        self.content_md5 = Some(v.into());
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.metadata.insert(k.into(), v.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.tags.insert(k.into(), v.into());
        self
    }

    /// Set the block size.
    pub fn with_block_size(mut self, v: usize) -> Self {
        self.block_size = Some(v);
        self
    }
}

/// Options of put block and append block.
#[derive(Debug, Clone, Default)]
pub struct BlockOptions {
    /// `Content-Type` of the request.
    pub content_type: Option<String>,
    /// Base64 MD5 of this block, verified by the service.
    pub content_md5: Option<String>,
    /// Extra `x-ms-*` headers, names given without the prefix.
    pub headers: BTreeMap<String, String>,
}

/// Options of get blob.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// First byte to read.
    pub start: Option<u64>,
    /// Last byte to read, inclusive. Reads to the end when absent.
    pub end: Option<u64>,
    /// Extra `x-ms-*` headers, names given without the prefix.
    pub headers: BTreeMap<String, String>,
}

/// Options of delete blob.
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// `x-ms-delete-snapshots`, `include` when absent.
    pub delete_snapshots: Option<String>,
    /// Extra `x-ms-*` headers, names given without the prefix.
    pub headers: BTreeMap<String, String>,
}

/// Options of list blobs.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Only list names starting with this prefix.
    pub prefix: String,
    /// Page size hint.
    pub max_results: Option<usize>,
    /// Extra `x-ms-*` headers, names given without the prefix.
    pub headers: BTreeMap<String, String>,
}

/// Client of one container in a storage account.
///
/// The credential is resolved once in [`Client::new`]. Cloning is cheap and
/// clones share the token and delegation key caches.
///
/// ## Example
///
/// ```no_run
/// use azblob::{Client, Config, PutOptions};
/// use azblob_core::Context;
///
/// # async fn example(ctx: Context) -> azblob_core::Result<()> {
/// let config = Config::default().from_env(&ctx);
/// let client = Client::new(ctx, &config)?;
///
/// client
///     .create_block_blob("hello.txt", "hello world!".into(), &PutOptions::default())
///     .await?;
/// let content = client.get_blob("hello.txt", &Default::default()).await?;
/// assert_eq!(content, "hello world!");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    transport: Transport,
    account_name: String,
    container: String,
    host: String,
    block_size: usize,
    headers: BTreeMap<String, String>,
}

impl Client {
    /// Create a client, resolving the credential described by `config`.
    pub fn new(ctx: Context, config: &Config) -> Result<Self> {
        let account_name = config.account_name()?.to_string();
        let container = config.container()?.to_string();
        let host = config.host()?;
        let block_size = config.block_size()?;

        let signer: Arc<dyn Signer> = match config.credential()? {
            Credential::SharedKey {
                account_name,
                account_key,
            } => Arc::new(SharedKeySigner::new(account_name, account_key)),
            cred => Arc::new(BearerSigner::new(
                account_name.as_str(),
                &host,
                TokenSource::new(&cred)?,
            )),
        };
        debug!("azblob client for {account_name}/{container} signs with {signer:?}");

        Ok(Self {
            transport: Transport::new(ctx, signer),
            account_name,
            container,
            host,
            block_size,
            headers: BTreeMap::new(),
        })
    }

    /// Extra `x-ms-*` headers sent with every request, names given without the prefix.
    ///
    /// Per call headers with the same name take precedence.
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Storage account name.
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Container this client works on.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Upload `content` to `key`.
    ///
    /// Payloads up to the block size go out as one put blob, larger ones are
    /// staged block by block and committed in order.
    pub async fn create_block_blob(
        &self,
        key: &str,
        content: Bytes,
        opts: &PutOptions,
    ) -> Result<()> {
        let block_size = match opts.block_size {
            Some(v) => check_block_size(v)?,
            None => self.block_size,
        };

        match BlockPlan::new(content.len(), block_size)? {
            BlockPlan::Single => self.put_blob_single(key, content, opts).await,
            BlockPlan::Blocks(blocks) => {
                debug!("uploading {key} in {} blocks", blocks.len());
                let block_opts = BlockOptions {
                    headers: opts.headers.clone(),
                    ..Default::default()
                };

                let mut ids = Vec::with_capacity(blocks.len());
                for (id, range) in blocks {
                    self.stage_block(key, &id, content.slice(range), &block_opts)
                        .await?;
                    ids.push(id);
                }
                self.commit_blob_blocks(key, &ids, opts).await
            }
        }
    }

    async fn put_blob_single(&self, key: &str, content: Bytes, opts: &PutOptions) -> Result<()> {
        let req = BlobRequest::new(Method::PUT, self.blob_uri(key, None)?)
            .header(X_MS_BLOB_TYPE, "BlockBlob")?
            .header_opt(CONTENT_TYPE.as_str(), opts.content_type.as_deref())?
            .header_opt(X_MS_BLOB_CONTENT_MD5, opts.content_md5.as_deref())?
            .header_opt(
                X_MS_BLOB_CONTENT_DISPOSITION,
                opts.content_disposition.as_deref(),
            )?
            .metadata(&opts.metadata)
            .tags(&opts.tags)
            .body(content);

        self.send(req, &opts.headers).await?;
        Ok(())
    }

    /// Read the blob at `key`, or the byte range given in `opts`.
    pub async fn get_blob(&self, key: &str, opts: &GetOptions) -> Result<Bytes> {
        let range = opts.start.map(|start| match opts.end {
            Some(end) => format!("bytes={start}-{end}"),
            None => format!("bytes={start}-"),
        });
        let req = BlobRequest::new(Method::GET, self.blob_uri(key, None)?)
            .header_opt(X_MS_RANGE, range.as_deref())?;

        let resp = self.send(req, &opts.headers).await?;
        Ok(resp.into_body())
    }

    /// Properties of the blob at `key`, `NotFound` when it does not exist.
    pub async fn get_blob_properties(&self, key: &str) -> Result<BlobProperties> {
        let req = BlobRequest::new(Method::HEAD, self.blob_uri(key, None)?);

        let resp = self.send(req, &BTreeMap::new()).await?;
        Ok(BlobProperties::from_headers(resp.headers()))
    }

    /// Whether a blob exists at `key`.
    pub async fn blob_exists(&self, key: &str) -> Result<bool> {
        match self.get_blob_properties(key).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Tags of the blob at `key`.
    pub async fn get_blob_tags(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let req = BlobRequest::new(Method::GET, self.blob_uri(key, Some("comp=tags"))?);

        let resp = self.send(req, &BTreeMap::new()).await?;
        parse_tags(resp.into_body())
    }

    /// Delete the blob at `key` with its snapshots.
    pub async fn delete_blob(&self, key: &str, opts: &DeleteOptions) -> Result<()> {
        let req = BlobRequest::new(Method::DELETE, self.blob_uri(key, None)?).header(
            X_MS_DELETE_SNAPSHOTS,
            opts.delete_snapshots.as_deref().unwrap_or("include"),
        )?;

        self.send(req, &opts.headers).await?;
        Ok(())
    }

    /// Delete every blob whose name starts with `prefix`.
    pub async fn delete_prefix(&self, prefix: &str, opts: &DeleteOptions) -> Result<()> {
        let keys = self
            .list_blobs(&ListOptions {
                prefix: prefix.to_string(),
                ..Default::default()
            })
            .collect()
            .await?;

        for key in keys {
            self.delete_blob(&key, opts).await?;
        }
        Ok(())
    }

    /// Lazily list blob names, one page per [`BlobPager::next`] call.
    pub fn list_blobs(&self, opts: &ListOptions) -> BlobPager {
        let mut headers = self.headers.clone();
        headers.extend(opts.headers.clone());

        BlobPager::new(
            self.transport.clone(),
            self.generate_url(&self.container),
            &opts.prefix,
            opts.max_results,
            headers,
        )
    }

    /// Url of the blob at `key` carrying a SAS built from `opts`.
    pub async fn signed_uri(&self, key: &str, opts: &SasOptions) -> Result<Uri> {
        let uri = self.blob_uri(key, None)?;
        let query = self
            .transport
            .signer()
            .sas_token(self.transport.context(), &uri, opts)
            .await?;

        Ok(format!("{uri}?{query}").parse()?)
    }

    /// Copy `source_key` to `key` synchronously.
    ///
    /// The source is read through a short lived read only SAS, issued by
    /// `source` when the blob lives in another container or account.
    pub async fn copy_blob(
        &self,
        key: &str,
        source_key: &str,
        source: Option<&Client>,
        opts: &PutOptions,
    ) -> Result<()> {
        let source = source.unwrap_or(self);
        let expiry = now() + chrono::TimeDelta::seconds(300);
        let source_uri = source
            .signed_uri(source_key, &SasOptions::new("r", expiry))
            .await?;

        let req = BlobRequest::new(Method::PUT, self.blob_uri(key, None)?)
            .header(X_MS_COPY_SOURCE, &source_uri.to_string())?
            .header(X_MS_REQUIRES_SYNC, "true")?
            .metadata(&opts.metadata)
            .tags(&opts.tags);

        self.send(req, &opts.headers).await?;
        Ok(())
    }

    /// Create an empty append blob at `key`.
    pub async fn create_append_blob(&self, key: &str, opts: &PutOptions) -> Result<()> {
        let req = BlobRequest::new(Method::PUT, self.blob_uri(key, None)?)
            .header(X_MS_BLOB_TYPE, "AppendBlob")?
            .header_opt(CONTENT_TYPE.as_str(), opts.content_type.as_deref())?
            .header_opt(CONTENT_MD5, opts.content_md5.as_deref())?
            .header_opt(
                X_MS_BLOB_CONTENT_DISPOSITION,
                opts.content_disposition.as_deref(),
            )?
            .metadata(&opts.metadata)
            .tags(&opts.tags);

        self.send(req, &opts.headers).await?;
        Ok(())
    }

    /// Append `content` to the append blob at `key`.
    pub async fn append_blob_block(
        &self,
        key: &str,
        content: Bytes,
        opts: &BlockOptions,
    ) -> Result<()> {
        let req = self
            .block_request(key, "comp=appendblock", opts)?
            .body(content);

        self.send(req, &opts.headers).await?;
        Ok(())
    }

    /// Stage block number `index` of the blob at `key`.
    ///
    /// Returns the id to pass to [`Client::commit_blob_blocks`].
    pub async fn put_blob_block(
        &self,
        key: &str,
        index: usize,
        content: Bytes,
        opts: &BlockOptions,
    ) -> Result<BlockId> {
        let id = BlockId::from_index(index);
        self.stage_block(key, &id, content, opts).await?;
        Ok(id)
    }

    async fn stage_block(
        &self,
        key: &str,
        id: &BlockId,
        content: Bytes,
        opts: &BlockOptions,
    ) -> Result<()> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("comp", "block")
            .append_pair("blockid", id.as_str())
            .finish();
        let req = self.block_request(key, &query, opts)?.body(content);

        self.send(req, &opts.headers).await?;
        Ok(())
    }

    fn block_request(&self, key: &str, query: &str, opts: &BlockOptions) -> Result<BlobRequest> {
        BlobRequest::new(Method::PUT, self.blob_uri(key, Some(query))?)
            .header_opt(CONTENT_TYPE.as_str(), opts.content_type.as_deref())?
            .header_opt(CONTENT_MD5, opts.content_md5.as_deref())
    }

    /// Commit the staged blocks `ids`, in this order, as the content of `key`.
    ///
    /// `opts.content_md5` is stored on the blob but not verified.
    pub async fn commit_blob_blocks(
        &self,
        key: &str,
        ids: &[BlockId],
        opts: &PutOptions,
    ) -> Result<()> {
        let req = BlobRequest::new(Method::PUT, self.blob_uri(key, Some("comp=blocklist"))?)
            .header_opt(X_MS_BLOB_CONTENT_TYPE, opts.content_type.as_deref())?
            .header_opt(X_MS_BLOB_CONTENT_MD5, opts.content_md5.as_deref())?
            .header_opt(
                X_MS_BLOB_CONTENT_DISPOSITION,
                opts.content_disposition.as_deref(),
            )?
            .metadata(&opts.metadata)
            .tags(&opts.tags)
            .body(Bytes::from(block_list_body(ids)?));

        self.send(req, &opts.headers).await?;
        Ok(())
    }

    /// Properties of the container.
    ///
    /// A missing container is reported through `present`, other failures are errors.
    pub async fn get_container_properties(&self) -> Result<ContainerProperties> {
        let req = BlobRequest::new(Method::HEAD, self.container_uri()?)
            .extra_headers(&self.headers)?;

        let resp = self.transport.send_unchecked(req).await?;
        match resp.status() {
            v if v.is_success() || v == StatusCode::NOT_FOUND => Ok(
                ContainerProperties::from_response(resp.status(), resp.headers()),
            ),
            _ => Err(parse_error(resp)),
        }
    }

    /// Whether the container exists.
    pub async fn container_exists(&self) -> Result<bool> {
        Ok(self.get_container_properties().await?.present)
    }

    /// Create the container, optionally readable without credentials.
    pub async fn create_container(&self, public_access: Option<PublicAccess>) -> Result<()> {
        let public_access = public_access.map(|v| v.to_string());
        let req = BlobRequest::new(Method::PUT, self.container_uri()?)
            .header_opt(X_MS_BLOB_PUBLIC_ACCESS, public_access.as_deref())?;

        self.send(req, &BTreeMap::new()).await?;
        Ok(())
    }

    /// Delete the container and everything in it.
    pub async fn delete_container(&self) -> Result<()> {
        let req = BlobRequest::new(Method::DELETE, self.container_uri()?);

        self.send(req, &BTreeMap::new()).await?;
        Ok(())
    }

    async fn send(
        &self,
        req: BlobRequest,
        headers: &BTreeMap<String, String>,
    ) -> Result<http::Response<Bytes>> {
        let req = req.extra_headers(&self.headers)?.extra_headers(headers)?;
        self.transport.send(req).await
    }

    fn blob_uri(&self, key: &str, query: Option<&str>) -> Result<Uri> {
        let url = self.generate_url(&format!("{}/{key}", self.container));
        let url = match query {
            Some(q) => format!("{url}?{q}"),
            None => url,
        };
        Ok(url.parse()?)
    }

    fn container_uri(&self) -> Result<Uri> {
        Ok(format!("{}?restype=container", self.generate_url(&self.container)).parse()?)
    }

    /// Absolute url of `path` with backslashes turned into `/` and reserved characters escaped.
    fn generate_url(&self, path: &str) -> String {
        let path = path.replace('\\', "/");
        format!(
            "{}/{}",
            self.host,
            utf8_percent_encode(&path, &AZURE_PATH_ENCODE_SET)
        )
    }
}
