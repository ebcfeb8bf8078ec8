use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

// Headers used in azure services.
pub const X_MS_VERSION: &str = "x-ms-version";
pub const X_MS_DATE: &str = "x-ms-date";
pub const X_MS_META_PREFIX: &str = "x-ms-meta-";
pub const X_MS_TAGS: &str = "x-ms-tags";
pub const X_MS_BLOB_TYPE: &str = "x-ms-blob-type";
pub const X_MS_BLOB_CONTENT_TYPE: &str = "x-ms-blob-content-type";
pub const X_MS_BLOB_CONTENT_MD5: &str = "x-ms-blob-content-md5";
pub const X_MS_BLOB_CONTENT_DISPOSITION: &str = "x-ms-blob-content-disposition";
pub const X_MS_BLOB_PUBLIC_ACCESS: &str = "x-ms-blob-public-access";
pub const X_MS_RANGE: &str = "x-ms-range";
pub const X_MS_DELETE_SNAPSHOTS: &str = "x-ms-delete-snapshots";
pub const X_MS_COPY_SOURCE: &str = "x-ms-copy-source";
pub const X_MS_REQUIRES_SYNC: &str = "x-ms-requires-sync";
pub const X_MS_ERROR_CODE: &str = "x-ms-error-code";
pub const X_IDENTITY_HEADER: &str = "x-identity-header";
pub const CONTENT_MD5: &str = "content-md5";

/// Storage service version sent on every request and signed into SAS tokens.
pub const API_VERSION: &str = "2024-05-04";

/// Uploads above this size go through put block + put block list.
pub const DEFAULT_BLOCK_SIZE: usize = 128 * 1024 * 1024;
/// Largest body a single put blob accepts.
pub const MAX_UPLOAD_SIZE: usize = 256 * 1024 * 1024;

// Identity endpoints.
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
pub const IMDS_API_VERSION: &str = "2018-02-01";
pub const IDENTITY_ENDPOINT_API_VERSION: &str = "2019-08-01";
pub const STORAGE_RESOURCE: &str = "https://storage.azure.com/";
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

// Cache lifetimes, in seconds.
pub const TOKEN_EXPIRATION_BUFFER: i64 = 600;
pub const DELEGATION_KEY_EXPIRATION: i64 = 25200;
pub const DELEGATION_KEY_EXPIRATION_BUFFER: i64 = 3600;

/// Delay in seconds before the n-th retry of an identity endpoint call.
pub const BACKOFF_SCHEDULE: [u64; 4] = [2, 6, 14, 30];
pub const MAX_TOKEN_ATTEMPTS: usize = 5;

// SAS fields.
pub const SAS_SERVICE_BLOB: &str = "blob";
pub const SAS_RESOURCE_BLOB: &str = "b";

/// Object keys keep unreserved characters and `/`, everything else is escaped.
pub static AZURE_PATH_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');
