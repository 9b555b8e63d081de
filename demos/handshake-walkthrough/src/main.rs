//! Handshake Walkthrough Demo
//!
//! Drives a simulated browser through sign-in and sign-out against an
//! in-process stand-in for the authentication gateway. Every page load
//! builds a fresh coordinator; only session storage survives, as it would
//! across real full-page navigations.
//!
//! Run with:
//!   cargo run -p handshake-walkthrough -- --provider github --return-url /counter
//!   cargo run -p handshake-walkthrough -- --mode app-service
//!   cargo run -p handshake-walkthrough -- --return-url https://evil.example/phish

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use console::style;
use easyauth_handshake::{
    AuthMode, AuthOptions, AuthenticationDataCache, Authenticator, FlowOutcome,
    HandshakeCoordinator, HistoryNavigator, IdentityFetcher, MemorySessionStorage, ReturnState,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Simulated EasyAuth handshake
#[derive(Parser, Debug)]
#[command(name = "handshake-walkthrough")]
#[command(about = "Walk through the EasyAuth redirect handshake with a simulated gateway")]
struct Args {
    /// Identity provider to sign in with
    #[arg(long, short = 'p', default_value = "github")]
    provider: String,

    /// Return URL placed on the login route (relative to the base URI or absolute)
    #[arg(long, short = 'r', default_value = "counter")]
    return_url: String,

    /// Application base URI
    #[arg(long, default_value = "https://app.example/")]
    base: String,

    /// Deployment mode
    #[arg(long, value_enum, default_value = "easy-auth")]
    mode: ModeArg,

    /// User name the simulated gateway reports
    #[arg(long, default_value = "alice")]
    user: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    EasyAuth,
    AppService,
}

impl From<ModeArg> for AuthMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::EasyAuth => AuthMode::EasyAuth,
            ModeArg::AppService => AuthMode::AppService,
        }
    }
}

// ============================================================================
// Simulated gateway
// ============================================================================

/// Answers `/.auth/me` depending on whether the browser signed in
struct Gateway {
    provider: String,
    user: String,
    signed_in: AtomicBool,
}

impl Gateway {
    /// Follow a gateway redirect and return the URI the browser lands on
    fn visit(&self, base: &str, url: &str) -> anyhow::Result<String> {
        let (param, signed_in) = if url.contains("/.auth/logout") {
            ("post_logout_redirect_uri=", false)
        } else {
            ("post_login_redirect_uri=", true)
        };
        let (_, redirect) = url
            .split_once(param)
            .ok_or_else(|| anyhow::anyhow!("gateway URL without {param}: {url}"))?;
        self.signed_in.store(signed_in, Ordering::SeqCst);

        if redirect.contains("://") {
            Ok(redirect.to_string())
        } else {
            Ok(format!("{}/{}", base.trim_end_matches('/'), redirect.trim_start_matches('/')))
        }
    }
}

#[async_trait]
impl IdentityFetcher for Gateway {
    async fn fetch(&self, url: &str) -> easyauth_handshake::Result<String> {
        tracing::debug!(url = %url, "Gateway serving identity");
        if !self.signed_in.load(Ordering::SeqCst) {
            return Ok(r#"{"clientPrincipal":null}"#.to_string());
        }
        Ok(format!(
            r#"{{"clientPrincipal":{{"identityProvider":"{}","userId":"{}-id","userDetails":"{}","userRoles":["anonymous","authenticated"]}}}}"#,
            self.provider, self.user, self.user
        ))
    }
}

// ============================================================================
// Browser
// ============================================================================

struct Browser {
    base: String,
    options: AuthOptions,
    storage: Arc<MemorySessionStorage>,
    gateway: Arc<Gateway>,
}

struct Page {
    navigator: Arc<HistoryNavigator>,
    authenticator: Authenticator<ReturnState>,
}

impl Browser {
    fn load(&self, uri: &str) -> anyhow::Result<Page> {
        println!("  {} {}", style("load").dim(), uri);
        let navigator = Arc::new(HistoryNavigator::new(self.base.clone(), uri));
        let cache = Arc::new(AuthenticationDataCache::from_options(
            self.gateway.clone(),
            &self.options,
        ));
        let coordinator = HandshakeCoordinator::<ReturnState>::builder()
            .options(self.options.clone())
            .storage(self.storage.clone())
            .navigator(navigator.clone())
            .cache(cache)
            .build()?;
        Ok(Page {
            navigator,
            authenticator: Authenticator::new(Arc::new(coordinator)),
        })
    }

    /// Run the page's authentication route and follow any gateway redirect
    async fn run(&self, page: &Page, provider: Option<&str>) -> anyhow::Result<Option<String>> {
        let outcome = page.authenticator.handle_current(provider).await?;
        match outcome {
            Some(FlowOutcome::Redirected) => {
                let (url, _) = page
                    .navigator
                    .last()
                    .ok_or_else(|| anyhow::anyhow!("redirect without navigation"))?;
                println!("  {} {}", style("gateway").yellow(), url);
                Ok(Some(self.gateway.visit(&self.base, &url)?))
            }
            Some(FlowOutcome::Navigated(target)) => {
                println!("  {} {}", style("navigate").green(), target);
                Ok(None)
            }
            Some(other) => {
                println!("  {} {:?}", style("render").cyan(), other);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

async fn show_identity(page: &Page) {
    let identity = page
        .authenticator
        .coordinator()
        .get_authentication_state()
        .await;
    if !identity.is_authenticated {
        println!("  {} anonymous", style("identity").magenta());
        return;
    }
    println!(
        "  {} {} via {}",
        style("identity").magenta(),
        identity.display_name,
        identity.authentication_type().unwrap_or("unknown")
    );
    for claim in identity.claims() {
        println!("    {:?} = {}", claim.claim_type, claim.value);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mode = AuthMode::from(args.mode);
    let browser = Browser {
        base: args.base.clone(),
        options: AuthOptions::for_mode(mode),
        storage: Arc::new(MemorySessionStorage::new()),
        gateway: Arc::new(Gateway {
            provider: args.provider.clone(),
            user: args.user.clone(),
            signed_in: AtomicBool::new(false),
        }),
    };
    let paths = browser.options.paths.clone();
    let base = args.base.trim_end_matches('/');

    println!("{}", style(format!("Sign-in ({mode:?})")).bold());
    let return_url = if args.return_url.contains("://") {
        args.return_url.clone()
    } else {
        format!("{base}/{}", args.return_url.trim_start_matches('/'))
    };
    let login = format!("{base}/{}?returnUrl={return_url}", paths.log_in_path);
    let page = browser.load(&login)?;
    let callback = match browser.run(&page, Some(&args.provider)).await {
        Ok(Some(callback)) => callback,
        Ok(None) => anyhow::bail!("sign-in did not reach the gateway"),
        Err(e) => {
            println!("  {} {e}", style("refused").red().bold());
            return Ok(());
        }
    };
    println!(
        "  {} {} pending handshake(s)",
        style("storage").dim(),
        browser.storage.len().await
    );

    let page = browser.load(&callback)?;
    browser.run(&page, None).await?;
    show_identity(&page).await;

    println!();
    println!("{}", style("Sign-out").bold());
    let page = browser.load(&format!("{base}/{}", paths.log_out_path))?;
    if let Some(callback) = browser.run(&page, None).await? {
        let page = browser.load(&callback)?;
        browser.run(&page, None).await?;
        show_identity(&page).await;
    }
    println!(
        "  {} {} pending handshake(s)",
        style("storage").dim(),
        browser.storage.len().await
    );

    Ok(())
}
