use crate::auth::{AuthConfig, OAuthCredentials};
use crate::cli::actions::Action;
use crate::hush;
use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

/// Everything the server action needs, assembled by dispatch.
#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub callback_base_url: String,
    pub google: Option<OAuthCredentials>,
    pub facebook: Option<OAuthCredentials>,
}

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => {
            // Fail fast on unparsable connection strings and callback URLs.
            Url::parse(&args.dsn).context("invalid database connection string")?;
            Url::parse(&args.callback_base_url).context("invalid callback base URL")?;

            let config = AuthConfig::new(args.callback_base_url, args.session_secret)
                .with_session_ttl_seconds(args.session_ttl_seconds);

            hush::new(args.port, args.dsn, config, args.google, args.facebook).await?;
        }
    }

    Ok(())
}
