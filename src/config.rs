use clap::Parser;
use url::Url;

/// Offline cache and match notification worker for the cricket streaming page
#[derive(Parser, Debug, Clone)]
#[command(name = "matchday-worker", version, about)]
pub struct Config {
    /// Address the host-page surface listens on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Origin of the host page; relative asset paths resolve against it and
    /// cache misses are forwarded to it
    #[arg(long, env = "ORIGIN", default_value = "https://cricstreamzone.netlify.app")]
    pub origin: String,

    /// Release version baked into the cache bucket name. Bump it to invalidate
    /// previously cached assets.
    #[arg(long, env = "CACHE_VERSION", default_value = "v1.0.0")]
    pub cache_version: String,

    /// Assets stored at install time (comma separated)
    #[arg(
        long,
        env = "ASSETS",
        value_delimiter = ',',
        default_values = [
            "/",
            "/index.html",
            "https://cdnjs.cloudflare.com/ajax/libs/bodymovin/5.7.4/lottie.min.js",
            "https://i.postimg.cc/3rPWWckN/icon-192.png",
        ]
    )]
    pub assets: Vec<String>,

    /// Remote endpoint returning `{ "matches": [...] }`
    #[arg(
        long,
        env = "MATCHES_URL",
        default_value = "https://script.google.com/macros/s/AKfycbxzx4xcwEGidoxEd7BQshkR9FKHjK5o0p8ukNY4NsKNR0EsShY7eV3MUxA2iXz1V8bmHg/exec"
    )]
    pub matches_url: String,

    /// Match feed polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "1800")]
    pub poll_interval_secs: u64,

    /// Icon and badge shown on match notifications
    #[arg(
        long,
        env = "ICON_URL",
        default_value = "https://i.postimg.cc/3rPWWckN/icon-192.png"
    )]
    pub icon_url: String,

    /// Stay in the waiting state after install until a SKIP_WAITING message
    #[arg(long, env = "DEFER_ACTIVATION", default_value = "false")]
    pub defer_activation: bool,
}

impl Config {
    /// Name of the cache bucket owned by this release.
    pub fn cache_name(&self) -> String {
        format!("cricstreamzone-{}", self.cache_version)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let origin = Url::parse(&self.origin)
            .map_err(|e| anyhow::anyhow!("origin '{}' is not a valid URL: {}", self.origin, e))?;
        if origin.cannot_be_a_base() {
            anyhow::bail!("origin '{}' cannot be used as a base URL", self.origin);
        }
        if self.cache_version.trim().is_empty() {
            anyhow::bail!("cache_version must not be empty");
        }
        if self.assets.iter().any(|a| a.trim().is_empty()) {
            anyhow::bail!("assets must not contain empty entries");
        }
        Url::parse(&self.matches_url)
            .map_err(|e| anyhow::anyhow!("matches_url is not a valid URL: {}", e))?;
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        Ok(())
    }
}
