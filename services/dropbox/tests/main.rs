use std::collections::HashMap;
use std::env;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};

use dropsign_core::{Context, ErrorKind, HttpSend, OsEnv, Result};
use dropsign_dropbox::{
    Client, Config, Credential, DropboxFile, EnvCredentialProvider, Event, OpenMode,
};
use dropsign_http_send_reqwest::ReqwestHttpSend;

async fn init_client() -> Option<Client> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = dotenv::dotenv();
    if env::var("DROPSIGN_DROPBOX_TEST").is_err()
        || env::var("DROPSIGN_DROPBOX_TEST").unwrap() != "on"
    {
        return None;
    }

    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let config = Config::new().from_env(&ctx);
    let client = Client::from_provider(ctx, &config, &EnvCredentialProvider::new())
        .await
        .expect("env DROPBOX_CONSUMER_KEY and DROPBOX_CONSUMER_SECRET must set");

    Some(client)
}

#[tokio::test]
async fn test_request_token() -> Result<()> {
    let Some(mut client) = init_client().await else {
        warn!("DROPSIGN_DROPBOX_TEST is not set, skipped");
        return Ok(());
    };

    client.set_token("", "");
    let ticket = client.request_token()?;
    client.wait(ticket).await?;

    assert!(!client.token().is_empty());
    debug!("authorize link: {}", client.authorize_link());
    Ok(())
}

#[tokio::test]
async fn test_account_info() -> Result<()> {
    let Some(mut client) = init_client().await else {
        warn!("DROPSIGN_DROPBOX_TEST is not set, skipped");
        return Ok(());
    };
    if !client.credential().has_token() {
        warn!("DROPBOX_TOKEN is not set, skipped");
        return Ok(());
    }

    let mut events = client.subscribe();
    let ticket = client.request_account_info()?;
    client.wait(ticket).await?;

    let event = events.try_recv().expect("account info must be emitted");
    assert!(matches!(event, Event::AccountInfo(_)));
    Ok(())
}

#[tokio::test]
async fn test_read_not_exist_file() -> Result<()> {
    let Some(mut client) = init_client().await else {
        warn!("DROPSIGN_DROPBOX_TEST is not set, skipped");
        return Ok(());
    };
    if !client.credential().has_token() {
        warn!("DROPBOX_TOKEN is not set, skipped");
        return Ok(());
    }

    let mut file = DropboxFile::new("dropbox/dropsign/not_exist_file");
    let err = file.open(&mut client, OpenMode::Read).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileNotFound);
    Ok(())
}

/// Answers like the remote API, from memory.
#[derive(Debug, Default, Clone)]
struct FakeDropbox {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
}

#[async_trait]
impl HttpSend for FakeDropbox {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or_default().to_string();
        let has_signature = query.contains("oauth_signature=")
            || String::from_utf8_lossy(req.body()).contains("oauth_signature=");

        let (status, body) = if !has_signature && !path.ends_with("/authorize") {
            (403, Bytes::from(r#"{"error": "Unsigned request"}"#))
        } else if path == "/1/oauth/request_token" {
            (200, Bytes::from("oauth_token_secret=rs&oauth_token=rt"))
        } else if path == "/1/oauth/access_token" {
            (200, Bytes::from("oauth_token_secret=as&oauth_token=at&uid=1"))
        } else if path == "/1/account/info" {
            (200, Bytes::from(r#"{"uid": 1, "display_name": "dropsign"}"#))
        } else if let Some(name) = path.strip_prefix("/1/files_put/") {
            self.files
                .lock()
                .unwrap()
                .insert(name.to_string(), req.body().clone());
            (200, Bytes::from(r#"{"bytes": 0}"#))
        } else if let Some(name) = path.strip_prefix("/1/files/") {
            match self.files.lock().unwrap().get(name) {
                Some(content) => (200, content.clone()),
                None => (404, Bytes::from(r#"{"error": "File not found"}"#)),
            }
        } else {
            (400, Bytes::new())
        };

        Ok(http::Response::builder().status(status).body(body)?)
    }
}

#[tokio::test]
async fn test_full_flow_over_http_transport() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let ctx = Context::new().with_http_send(FakeDropbox::default());
    let config = Config::new().with_signature_method("HMAC-SHA1");
    let mut client = Client::new(ctx, &config, Credential::new("key", "secret"))?;
    let mut events = client.subscribe();

    let ticket = client.request_token()?;
    client.wait(ticket).await?;
    assert_eq!((client.token(), client.token_secret()), ("rt", "rs"));
    assert_eq!(
        client.authorize_link(),
        "https://www.dropbox.com/1/oauth/authorize?oauth_token=rt"
    );

    let ticket = client.request_access_token()?;
    client.wait(ticket).await?;
    assert_eq!((client.token(), client.token_secret()), ("at", "as"));

    let ticket = client.request_account_info()?;
    client.wait(ticket).await?;

    let mut file = DropboxFile::new("dropbox/notes.txt");
    file.open(&mut client, OpenMode::Truncate).await?;
    file.write_all(b"hello dropsign").expect("write to buffer");
    file.commit(&mut client).await?;

    let mut file = DropboxFile::new("dropbox/notes.txt");
    file.open(&mut client, OpenMode::Read).await?;
    let mut content = String::new();
    file.read_to_string(&mut content).expect("read from buffer");
    assert_eq!(content, "hello dropsign");

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&Event::AccessTokenFinished {
        token: "at".to_string(),
        token_secret: "as".to_string()
    }));
    assert!(seen.iter().any(|e| matches!(e, Event::AccountInfo(_))));
    assert!(client.registry().is_empty());
    assert!(client.error().is_none());
    Ok(())
}

#[tokio::test]
async fn test_missing_file_over_http_transport() -> Result<()> {
    let ctx = Context::new().with_http_send(FakeDropbox::default());
    let mut client = Client::new(
        ctx,
        &Config::new(),
        Credential::new("key", "secret").with_token("at", "as"),
    )?;

    let mut file = DropboxFile::new("dropbox/missing.txt");
    let err = file.open(&mut client, OpenMode::Read).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FileNotFound);
    assert_eq!(client.error().unwrap().message, "File not found");
    Ok(())
}
