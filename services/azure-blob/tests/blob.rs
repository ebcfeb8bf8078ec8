use std::collections::BTreeMap;

use anyhow::Result;
use azblob::{
    BlockOptions, ContainerProperties, DeleteOptions, GetOptions, ListOptions, PublicAccess,
    PutOptions, SasOptions,
};
use azblob_core::hash::base64_md5;
use azblob_core::time::now;
use azblob_core::ErrorKind;
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use pretty_assertions::assert_eq;

use super::fake::{FakeBlobService, CONTAINER};
use super::fake_client;

async fn fetch(service: &FakeBlobService, method: Method, uri: &str) -> Result<StatusCode> {
    use azblob_core::HttpSend;

    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::from("unauthenticated"))?;
    Ok(service.http_send(req).await?.status())
}

#[tokio::test]
async fn test_block_upload_matches_single_upload() -> Result<()> {
    let (client, service) = fake_client();

    client
        .create_block_blob("k", "hello world!".into(), &PutOptions::default().with_block_size(1))
        .await?;
    client
        .create_block_blob("single", "hello world!".into(), &PutOptions::default())
        .await?;

    assert_eq!(client.get_blob("k", &GetOptions::default()).await?, "hello world!");
    assert_eq!(
        client.get_blob("single", &GetOptions::default()).await?,
        client.get_blob("k", &GetOptions::default()).await?
    );

    let requests = service.requests();
    let blocks = requests
        .iter()
        .filter(|v| v.starts_with("PUT") && v.contains("comp=block&"))
        .count();
    assert_eq!(blocks, 12);
    let commit = requests
        .iter()
        .position(|v| v.contains("comp=blocklist"))
        .expect("block list must be committed");
    let last_block = requests
        .iter()
        .rposition(|v| v.contains("comp=block&"))
        .unwrap();
    assert!(commit > last_block);
    Ok(())
}

#[tokio::test]
async fn test_block_upload_keeps_blob_attributes() -> Result<()> {
    let (client, service) = fake_client();

    let opts = PutOptions::default()
        .with_block_size(4)
        .with_content_type("text/plain")
        .with_content_disposition("inline")
        .with_metadata("owner", "me")
        .with_tag("env", "test");
    client
        .create_block_blob("dir/a.txt", Bytes::from(vec![7u8; 10]), &opts)
        .await?;

    let blob = service.blob("dir/a.txt").expect("blob must exist");
    assert_eq!(blob.content, vec![7u8; 10]);

    let props = client.get_blob_properties("dir/a.txt").await?;
    assert_eq!(props.content_type.as_deref(), Some("text/plain"));
    assert_eq!(props.content_disposition.as_deref(), Some("inline"));
    assert_eq!(props.size, Some(10));
    assert_eq!(
        props.metadata,
        BTreeMap::from([("owner".to_string(), "me".to_string())])
    );

    let tags = client.get_blob_tags("dir/a.txt").await?;
    assert_eq!(tags, BTreeMap::from([("env".to_string(), "test".to_string())]));
    Ok(())
}

#[tokio::test]
async fn test_get_blob_range() -> Result<()> {
    let (client, _) = fake_client();
    client
        .create_block_blob("k", "hello world!".into(), &PutOptions::default())
        .await?;

    let opts = GetOptions {
        start: Some(0),
        end: Some(4),
        ..Default::default()
    };
    assert_eq!(client.get_blob("k", &opts).await?, "hello");

    let opts = GetOptions {
        start: Some(6),
        ..Default::default()
    };
    assert_eq!(client.get_blob("k", &opts).await?, "world!");
    Ok(())
}

#[tokio::test]
async fn test_missing_blob_is_not_found() -> Result<()> {
    let (client, _) = fake_client();

    let err = client.get_blob_properties("missing-key").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));

    let err = client
        .get_blob("missing-key", &GetOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(!client.blob_exists("missing-key").await?);
    Ok(())
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_no_blob() -> Result<()> {
    let (client, service) = fake_client();

    let opts = PutOptions::default().with_content_md5(base64_md5(b"something else"));
    let err = client
        .create_block_blob("k", "hello world!".into(), &opts)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(service.blob("k").is_none());
    assert!(!client.blob_exists("k").await?);
    Ok(())
}

#[tokio::test]
async fn test_checksum_match_is_stored() -> Result<()> {
    let (client, _) = fake_client();

    let checksum = base64_md5(b"hello world!");
    let opts = PutOptions::default().with_content_md5(checksum.clone());
    client
        .create_block_blob("k", "hello world!".into(), &opts)
        .await?;

    let props = client.get_blob_properties("k").await?;
    assert_eq!(props.checksum, Some(checksum));
    Ok(())
}

#[tokio::test]
async fn test_block_checksum_is_verified() -> Result<()> {
    let (client, service) = fake_client();

    let good = BlockOptions {
        content_md5: Some(base64_md5(b"hello ")),
        ..Default::default()
    };
    let bad = BlockOptions {
        content_md5: Some(base64_md5(b"nope")),
        ..Default::default()
    };

    let first = client
        .put_blob_block("k", 0, "hello ".into(), &good)
        .await?;
    let err = client
        .put_blob_block("k", 1, "world!".into(), &bad)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);

    let second = client
        .put_blob_block("k", 1, "world!".into(), &BlockOptions::default())
        .await?;
    client
        .commit_blob_blocks("k", &[first, second], &PutOptions::default())
        .await?;

    assert_eq!(service.blob("k").unwrap().content, b"hello world!");
    Ok(())
}

#[tokio::test]
async fn test_signed_url_allows_read_only() -> Result<()> {
    let (client, service) = fake_client();
    client
        .create_block_blob("k", "hello world!".into(), &PutOptions::default())
        .await?;

    let expiry = now() + chrono::TimeDelta::seconds(300);
    let url = client
        .signed_uri("k", &SasOptions::new("r", expiry))
        .await?
        .to_string();

    assert_eq!(fetch(&service, Method::GET, &url).await?, StatusCode::OK);
    assert_eq!(fetch(&service, Method::PUT, &url).await?, StatusCode::FORBIDDEN);

    // A tampered signature is rejected as well.
    let tampered = url.replace("sp=r", "sp=rw");
    assert_eq!(fetch(&service, Method::PUT, &tampered).await?, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_signed_url_with_overrides() -> Result<()> {
    let (client, service) = fake_client();
    client
        .create_block_blob("a b.txt", "hello".into(), &PutOptions::default())
        .await?;

    let expiry = now() + chrono::TimeDelta::seconds(300);
    let opts = SasOptions::new("r", expiry)
        .with_content_type("text/plain")
        .with_content_disposition("attachment; filename=\"a b.txt\"");
    let url = client.signed_uri("a b.txt", &opts).await?;

    let query = url.query().unwrap_or_default();
    assert!(query.contains("rsct=text%2Fplain"));
    assert!(query.contains("rscd="));
    assert_eq!(
        fetch(&service, Method::GET, &url.to_string()).await?,
        StatusCode::OK
    );
    Ok(())
}

#[tokio::test]
async fn test_unsigned_request_is_forbidden() -> Result<()> {
    let (_, service) = fake_client();

    let status = fetch(
        &service,
        Method::GET,
        "http://127.0.0.1:10000/devstoreaccount1/test-container/k",
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_list_blobs_is_complete() -> Result<()> {
    let (client, _) = fake_client();

    let mut expected = Vec::new();
    for i in 0..7 {
        let key = format!("list/{i:02}");
        client
            .create_block_blob(&key, Bytes::from(key.clone()), &PutOptions::default())
            .await?;
        expected.push(key);
    }
    client
        .create_block_blob("other", "x".into(), &PutOptions::default())
        .await?;

    let mut pager = client.list_blobs(&ListOptions {
        prefix: "list/".to_string(),
        max_results: Some(3),
        ..Default::default()
    });
    let mut pages = Vec::new();
    while let Some(page) = pager.next().await? {
        pages.push(page);
    }

    assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 1]);
    assert_eq!(pages.concat(), expected);
    assert!(pager.next().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_delete_blob_and_prefix() -> Result<()> {
    let (client, _) = fake_client();
    for key in ["tmp/a", "tmp/b", "tmp/c", "keep"] {
        client
            .create_block_blob(key, "x".into(), &PutOptions::default())
            .await?;
    }

    client.delete_blob("tmp/a", &DeleteOptions::default()).await?;
    assert!(!client.blob_exists("tmp/a").await?);

    let err = client
        .delete_blob("tmp/a", &DeleteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    client.delete_prefix("tmp/", &DeleteOptions::default()).await?;
    let remaining = client.list_blobs(&ListOptions::default()).collect().await?;
    assert_eq!(remaining, vec!["keep".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_append_blob() -> Result<()> {
    let (client, _) = fake_client();

    client
        .create_append_blob(
            "log",
            &PutOptions::default().with_content_type("text/plain"),
        )
        .await?;
    for line in ["one\n", "two\n"] {
        client
            .append_blob_block("log", line.into(), &BlockOptions::default())
            .await?;
    }

    assert_eq!(
        client.get_blob("log", &GetOptions::default()).await?,
        "one\ntwo\n"
    );
    Ok(())
}

#[tokio::test]
async fn test_copy_blob() -> Result<()> {
    let (client, _) = fake_client();
    client
        .create_block_blob("source", "copied".into(), &PutOptions::default())
        .await?;

    client
        .copy_blob(
            "target",
            "source",
            None,
            &PutOptions::default().with_metadata("copied", "yes"),
        )
        .await?;

    assert_eq!(
        client.get_blob("target", &GetOptions::default()).await?,
        "copied"
    );
    let props = client.get_blob_properties("target").await?;
    assert_eq!(props.metadata.get("copied").map(String::as_str), Some("yes"));
    Ok(())
}

#[tokio::test]
async fn test_container_lifecycle() -> Result<()> {
    let (client, _) = fake_client();

    let props = client.get_container_properties().await?;
    assert_eq!(
        props,
        ContainerProperties {
            present: true,
            metadata: BTreeMap::from([("owner".to_string(), "tests".to_string())]),
        }
    );

    client.delete_container().await?;
    assert!(!client.container_exists().await?);

    let err = client
        .get_blob_properties("anything")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    client.create_container(Some(PublicAccess::Blob)).await?;
    assert!(client.container_exists().await?);

    let err = client.create_container(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    assert_eq!(client.container(), CONTAINER);
    Ok(())
}

#[tokio::test]
async fn test_extra_headers_are_prefixed() -> Result<()> {
    let (client, service) = fake_client();

    let opts = PutOptions {
        headers: BTreeMap::from([("client-request-id".to_string(), "abc".to_string())]),
        ..Default::default()
    };
    client.create_block_blob("k", "x".into(), &opts).await?;

    assert!(service.blob("k").is_some());
    Ok(())
}
