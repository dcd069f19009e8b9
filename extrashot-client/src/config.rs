use crate::cli::Args;
use anyhow::{Context, Result, bail};
use extrashot_core::ControllerOptions;
use extrashot_core::ptz::SpeedFactor;
use reqwest::Url;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Target {
    api_base: Url,
    username: Option<String>,
    password: Option<String>,
    insecure: bool,
    timeout: Duration,
    poll_interval: Duration,
    refresh_timeout_secs: u64,
    speed: SpeedFactor,
    log_level: String,
}

impl Target {
    pub fn from_args(args: &Args) -> Result<Self> {
        let url = args.url.trim();
        if url.is_empty() {
            bail!("url is required");
        }
        let root = Url::parse(url).with_context(|| format!("invalid url {url}"))?;
        if !matches!(root.scheme(), "http" | "https") {
            bail!("unsupported url scheme {}", root.scheme());
        }
        // trailing slash so that `join` appends below the prefix
        let api_base = root
            .join(&format!("{}/", normalize_path(&args.api_path).trim_end_matches('/')))
            .context("invalid api path")?;
        if args.poll_interval_ms == 0 {
            bail!("poll interval must be positive");
        }
        Ok(Self {
            api_base,
            username: args.username.clone().filter(|name| !name.trim().is_empty()),
            password: args.password.clone(),
            insecure: args.insecure,
            timeout: Duration::from_millis(args.timeout_ms),
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            refresh_timeout_secs: args.refresh_timeout_secs,
            speed: SpeedFactor::new(args.speed),
            log_level: args.log_level.clone(),
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn insecure(&self) -> bool {
        self.insecure
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            poll_interval: self.poll_interval,
            refresh_timeout_secs: self.refresh_timeout_secs,
            speed_factor: self.speed,
            ..ControllerOptions::default()
        }
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    mod success {
        use super::super::*;
        use clap::Parser;

        fn parse(extra: &[&str]) -> Args {
            let mut argv = vec!["extrashot"];
            argv.extend_from_slice(extra);
            Args::parse_from(argv)
        }

        #[test]
        fn api_base_keeps_prefix_for_relative_joins() {
            let target = Target::from_args(&parse(&["--url", "http://ndi-box:5000", "--api-path", "api"]))
                .unwrap();

            assert_eq!(target.api_base().as_str(), "http://ndi-box:5000/api/");
            assert_eq!(
                target.api_base().join("viewer/status").unwrap().as_str(),
                "http://ndi-box:5000/api/viewer/status"
            );
        }

        #[test]
        fn controller_options_follow_arguments() {
            let target = Target::from_args(&parse(&[
                "--poll-interval-ms",
                "2000",
                "--refresh-timeout-secs",
                "3",
                "--speed",
                "4.0",
            ]))
            .unwrap();

            let options = target.controller_options();
            assert_eq!(options.poll_interval, Duration::from_millis(2000));
            assert_eq!(options.refresh_timeout_secs, 3);
            assert_eq!(options.speed_factor.value(), 1.0);
            assert_eq!(options.motion_tick, Duration::from_millis(100));
        }

        #[test]
        fn credentials_need_both_parts() {
            let target = Target::from_args(&parse(&["--username", "admin"])).unwrap();
            assert_eq!(target.credentials(), None);

            let target =
                Target::from_args(&parse(&["--username", "admin", "--password", "admin"])).unwrap();
            assert_eq!(target.credentials(), Some(("admin", "admin")));
        }
    }

    mod failure {
        use super::super::*;
        use clap::Parser;

        #[test]
        fn rejects_non_http_scheme() {
            let args = Args::parse_from(["extrashot", "--url", "ftp://ndi-box"]);
            assert!(Target::from_args(&args).is_err());
        }

        #[test]
        fn rejects_zero_poll_interval() {
            let args = Args::parse_from(["extrashot", "--poll-interval-ms", "0"]);
            assert!(Target::from_args(&args).is_err());
        }
    }
}
