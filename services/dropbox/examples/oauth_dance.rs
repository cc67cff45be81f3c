use std::io::{self, BufRead};

use anyhow::Result;
use dropsign_core::{Context, OsEnv};
use dropsign_dropbox::{Client, Config, EnvCredentialProvider, Event};
use dropsign_http_send_reqwest::ReqwestHttpSend;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // DROPBOX_CONSUMER_KEY and DROPBOX_CONSUMER_SECRET must be set.
    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let config = Config::new().from_env(&ctx);
    let mut client = Client::from_provider(ctx, &config, &EnvCredentialProvider::new()).await?;
    let mut events = client.subscribe();

    let ticket = client.request_token()?;
    client.wait(ticket).await?;

    println!("Open this link, allow access, then press enter:");
    println!("  {}", client.authorize_link());
    io::stdin().lock().read_line(&mut String::new())?;

    let ticket = client.request_access_token()?;
    client.wait(ticket).await?;
    println!("DROPBOX_TOKEN={}", client.token());
    println!("DROPBOX_TOKEN_SECRET={}", client.token_secret());

    let ticket = client.request_account_info()?;
    client.wait(ticket).await?;

    while let Ok(event) = events.try_recv() {
        if let Event::AccountInfo(info) = event {
            println!("{info:#}");
        }
    }

    Ok(())
}
