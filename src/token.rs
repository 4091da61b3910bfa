use eyre::{
    bail,
    eyre,
    Context as _,
    Result,
};
use load_metrics_collector::TokenRequestLookup;
use std::path::Path;
use tokio::process::Command;

/// Uses the configured token or asks `oc` for the one of the current login.
pub async fn resolve_token(configured: Option<String>, token_lookup: Option<&dyn TokenRequestLookup>) -> Result<String> {
    if let Some(token) = configured.filter(|token| !token.trim().is_empty()) {
        return Ok(token);
    }

    match token_from_oc().await {
        Ok(token) => {
            debug!("using token of the current oc login");
            Ok(token)
        }
        Err(err) => Err(missing_token(err, token_lookup).await),
    }
}

async fn token_from_oc() -> Result<String> {
    let oc = which::which("oc").context("oc not found")?;
    token_from_command(&oc, &["whoami", "-t"]).await
}

async fn token_from_command(program: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .wrap_err_with(|| format!("Failed to run {}", program.display()))?;
    if !output.status.success() {
        bail!(
            "{} {} failed: {}",
            program.display(),
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    parse_token(&output.stdout)
}

fn parse_token(stdout: &[u8]) -> Result<String> {
    let token = String::from_utf8_lossy(stdout).trim().to_string();
    if token.is_empty() {
        bail!("oc whoami -t printed no token");
    }
    Ok(token)
}

async fn missing_token(cause: eyre::Report, token_lookup: Option<&dyn TokenRequestLookup>) -> eyre::Report {
    let url = match token_lookup {
        Some(lookup) => lookup.token_request_url().await.ok(),
        None => None,
    };
    match url {
        Some(url) => eyre!(
            "a token is required to capture metrics, use oc login to log into the cluster. \
             alternatively request a token from {url} and pass it with --token: {cause:#}"
        ),
        None => eyre!("a token is required to capture metrics, use oc login to log into the cluster: {cause:#}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        future::Future,
        pin::Pin,
    };
    use url::Url;

    struct FixedLookup;

    impl TokenRequestLookup for FixedLookup {
        fn token_request_url(&self) -> Pin<Box<dyn Future<Output = Result<Url>> + Send + '_>> {
            Box::pin(async { Ok(Url::parse("https://oauth.example.com/oauth/token/request")?) })
        }
    }

    #[test]
    fn trims_oc_output() {
        assert_eq!(parse_token(b"sha256~abc\n").unwrap(), "sha256~abc");
        assert!(parse_token(b"  \n").is_err());
    }

    #[tokio::test]
    async fn reads_token_from_command_output() {
        let sh = which::which("sh").unwrap();
        let token = token_from_command(&sh, &["-c", "printf 'sha256~abc\\n'"]).await.unwrap();
        assert_eq!(token, "sha256~abc");

        let err = token_from_command(&sh, &["-c", "echo 'must be logged in' >&2; exit 1"])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be logged in"));
    }

    #[tokio::test]
    async fn configured_token_wins() {
        let token = resolve_token(Some("secret".to_string()), None).await.unwrap();
        assert_eq!(token, "secret");
    }

    #[tokio::test]
    async fn missing_token_points_to_request_page() {
        let err = missing_token(eyre!("oc not found"), Some(&FixedLookup)).await;
        let message = err.to_string();
        assert!(message.contains("https://oauth.example.com/oauth/token/request"));
        assert!(message.contains("oc not found"));

        let err = missing_token(eyre!("oc not found"), None).await;
        assert!(!err.to_string().contains("https://"));
    }
}
