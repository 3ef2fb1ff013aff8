//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary executes, bundling
//! the server configuration along the way.

use anyhow::{Context, Result};
use secrecy::SecretString;

use crate::auth::OAuthCredentials;
use crate::cli::actions::{server::Args, Action};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(3000);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let session_secret = matches
        .get_one::<String>("session-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --session-secret")?;
    let session_ttl_seconds = matches
        .get_one::<i64>("session-ttl-seconds")
        .copied()
        .unwrap_or(604_800);
    let callback_base_url = matches
        .get_one::<String>("callback-base-url")
        .cloned()
        .unwrap_or_else(|| "http://localhost:3000".to_string());

    Ok(Action::Server(Args {
        port,
        dsn,
        session_secret,
        session_ttl_seconds,
        callback_base_url,
        google: oauth_credentials(matches, "google-client-id", "google-client-secret"),
        facebook: oauth_credentials(matches, "facebook-client-id", "facebook-client-secret"),
    }))
}

/// Both halves of a client credential pair, or nothing. `clap` enforces that
/// the halves only arrive together.
fn oauth_credentials(
    matches: &clap::ArgMatches,
    id_arg: &str,
    secret_arg: &str,
) -> Option<OAuthCredentials> {
    let client_id = matches.get_one::<String>(id_arg)?.clone();
    let client_secret = matches.get_one::<String>(secret_arg)?.clone();
    Some(OAuthCredentials {
        client_id,
        client_secret: SecretString::from(client_secret),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn server_action_carries_the_full_configuration() {
        temp_env::with_vars(
            [
                ("HUSH_PORT", Some("8080")),
                ("HUSH_DSN", Some("postgres://localhost:5432/hush")),
                ("HUSH_SESSION_SECRET", Some("a-long-session-secret")),
                ("HUSH_SESSION_TTL_SECONDS", Some("3600")),
                ("HUSH_CALLBACK_BASE_URL", Some("https://hush.dev")),
                ("HUSH_GOOGLE_CLIENT_ID", Some("client-123")),
                ("HUSH_GOOGLE_CLIENT_SECRET", Some("shh")),
                ("HUSH_FACEBOOK_CLIENT_ID", None),
                ("HUSH_FACEBOOK_CLIENT_SECRET", None),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["hush"]);
                let Action::Server(args) = handler(&matches).expect("handler succeeds");

                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://localhost:5432/hush");
                assert_eq!(args.session_secret.expose_secret(), "a-long-session-secret");
                assert_eq!(args.session_ttl_seconds, 3600);
                assert_eq!(args.callback_base_url, "https://hush.dev");

                let google = args.google.expect("google credentials parsed");
                assert_eq!(google.client_id, "client-123");
                assert_eq!(google.client_secret.expose_secret(), "shh");
                assert!(args.facebook.is_none());
            },
        );
    }

    #[test]
    fn defaults_apply_without_optional_arguments() {
        temp_env::with_vars(
            [
                ("HUSH_PORT", None),
                ("HUSH_SESSION_TTL_SECONDS", None),
                ("HUSH_CALLBACK_BASE_URL", None),
                ("HUSH_GOOGLE_CLIENT_ID", None),
                ("HUSH_GOOGLE_CLIENT_SECRET", None),
                ("HUSH_FACEBOOK_CLIENT_ID", None),
                ("HUSH_FACEBOOK_CLIENT_SECRET", None),
                ("HUSH_DSN", Some("postgres://localhost:5432/hush")),
                ("HUSH_SESSION_SECRET", Some("a-long-session-secret")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["hush"]);
                let Action::Server(args) = handler(&matches).expect("handler succeeds");

                assert_eq!(args.port, 3000);
                assert_eq!(args.session_ttl_seconds, 604_800);
                assert_eq!(args.callback_base_url, "http://localhost:3000");
                assert!(args.google.is_none());
                assert!(args.facebook.is_none());
            },
        );
    }
}
