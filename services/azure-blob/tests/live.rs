use std::env;

use anyhow::Result;
use azblob::{Client, Config, DeleteOptions, GetOptions, PutOptions, SasOptions};
use azblob_core::{Context, ErrorKind, OsEnv};
use azblob_file_read_tokio::TokioFileRead;
use azblob_http_send_reqwest::ReqwestHttpSend;
use azblob_sleep_tokio::TokioSleep;
use http::StatusCode;
use log::{debug, warn};
use pretty_assertions::assert_eq;

fn init_client() -> Option<Client> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = dotenv::dotenv();

    if env::var("AZBLOB_TEST").is_err() || env::var("AZBLOB_TEST").unwrap() != "on" {
        return None;
    }

    let ctx = Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(ReqwestHttpSend::default())
        .with_sleep(TokioSleep)
        .with_env(OsEnv);
    let config = Config::default().from_env(&ctx);

    Some(Client::new(ctx, &config).expect("AZBLOB_* env must describe a valid client"))
}

#[tokio::test]
async fn test_live_blob_round_trip() -> Result<()> {
    let Some(client) = init_client() else {
        warn!("AZBLOB_TEST is not set, skipped");
        return Ok(());
    };

    let key = format!("azblob-test/{}", uuid_like());
    let content = "hello from azblob";

    client
        .create_block_blob(
            &key,
            content.into(),
            &PutOptions::default().with_content_type("text/plain"),
        )
        .await?;

    assert_eq!(client.get_blob(&key, &GetOptions::default()).await?, content);

    let props = client.get_blob_properties(&key).await?;
    debug!("blob properties: {props:?}");
    assert_eq!(props.size, Some(content.len() as u64));
    assert_eq!(props.content_type.as_deref(), Some("text/plain"));

    let expiry = chrono::Utc::now() + chrono::TimeDelta::seconds(300);
    let url = client.signed_uri(&key, &SasOptions::new("r", expiry)).await?;
    let resp = reqwest::get(url.to_string()).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await?, content);

    client.delete_blob(&key, &DeleteOptions::default()).await?;
    let err = client.get_blob_properties(&key).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn test_live_container_exists() -> Result<()> {
    let Some(client) = init_client() else {
        warn!("AZBLOB_TEST is not set, skipped");
        return Ok(());
    };

    assert!(client.container_exists().await?);
    Ok(())
}

fn uuid_like() -> String {
    format!("{:x}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}
