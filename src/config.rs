#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum CargoEnv {
    Development,
    Production,
}

#[derive(clap::Parser, Debug)]
pub struct AppConfig {
    // production or development
    #[clap(long, env, value_enum)]
    pub cargo_env: CargoEnv,

    // port that the app will bind to
    #[clap(long, env, default_value = "5000")]
    pub port: u16,

    // either * for allowing everything, or a comma seperated list of domains like
    // example.com,something.com. only applies to /sources and /health, /hls is always open
    #[clap(long, env, default_value = "*")]
    pub cors_origin: String,

    // upstream requests (pages, playlists, segments) give up after this many seconds without
    // connecting or without receiving data, a slow but steady stream is never cut off
    #[clap(long, env, default_value = "30")]
    pub upstream_timeout_secs: u64,

    // user agent baked into tokens handed out by /sources, some cdns block anything that doesn't
    // look like a browser
    #[clap(
        long,
        env,
        default_value = "Mozilla/5.0 (X11; Linux x86_64; rv:141.0) Gecko/20100101 Firefox/141.0"
    )]
    pub user_agent: String,

    // where the daily log files go in production
    #[clap(long, env, default_value = "logs")]
    pub log_dir: String,

    // optional sentry integration
    #[clap(long, env)]
    pub sentry_dsn: Option<String>,
}

impl Default for AppConfig {
    // mirrors the clap defaults, used by tests and anything embedding the router
    fn default() -> Self {
        Self {
            cargo_env: CargoEnv::Development,
            port: 5000,
            cors_origin: "*".to_string(),
            upstream_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:141.0) Gecko/20100101 Firefox/141.0"
                .to_string(),
            log_dir: "logs".to_string(),
            sentry_dsn: None,
        }
    }
}
