use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use dropsign_core::Context;
use dropsign_http_send_reqwest::ReqwestHttpSend;
use reqwest::{redirect, Client};

#[tokio::main]
async fn main() -> Result<()> {
    // Redirects must stay visible to the caller, they are signed again there.
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .user_agent("dropsign-example/0.1")
        .redirect(redirect::Policy::none())
        .build()?;

    let ctx = Context::new().with_http_send(ReqwestHttpSend::new(client));

    let url = "https://api.dropbox.com/1/oauth/request_token";
    println!("GET {url} without signature");

    let req = http::Request::builder()
        .method("GET")
        .uri(url)
        .body(Bytes::new())?;

    match ctx.http_send(req).await {
        Ok(resp) => {
            // An unsigned request is answered with an error status.
            println!("status: {}", resp.status());
            if let Ok(text) = String::from_utf8(resp.body().to_vec()) {
                println!("body: {text}");
            }
        }
        Err(e) => eprintln!("request failed: {e}"),
    }

    Ok(())
}
