use std::collections::HashMap;
use std::io::Read;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use texting_robots::Robot;
use thiserror::Error;

use super::politeness::Throttle;
use crate::config::CrawlConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("disallowed by robots.txt")]
    Disallowed,
    #[error("blocked path")]
    Blocked,
    #[error("http status {0}")]
    Status(u16),
    #[error("not html: {0:?}")]
    ContentType(Option<String>),
    #[error("body larger than {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Server errors and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status(code) => (500..600).contains(code),
            FetchError::Transport(_) => true,
            _ => false,
        }
    }

    /// Filtered by policy rather than failed.
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            FetchError::Disallowed
                | FetchError::Blocked
                | FetchError::ContentType(_) | FetchError::TooLarge { .. }
        )
    }
}

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

/// One GET per call; implementations own politeness and retries.
pub trait PageFetcher {
    fn fetch(&mut self, url: &Url) -> Result<Page, FetchError>;
}

enum RobotsPolicy {
    AllowAll,
    Rules(Box<Robot>),
}

pub struct Fetcher {
    client: Client,
    throttle: Throttle,
    agent: String,
    max_retries: u32,
    backoff: Duration,
    max_body_bytes: u64,
    blocked_paths: Vec<String>,
    robots: HashMap<String, RobotsPolicy>,
}

impl Fetcher {
    pub fn new(config: &CrawlConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&config.accept_language)?);
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            throttle: Throttle::new(config.min_delay(), config.max_delay()),
            agent: robots_agent(&config.user_agent),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
            max_body_bytes: config.max_body_bytes,
            blocked_paths: config.blocked_paths.clone(),
            robots: HashMap::new(),
        })
    }

    /// Whether the site's robots policy lets our client fetch `url`.
    pub fn allowed(&mut self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        if !self.robots.contains_key(&origin) {
            let policy = self.load_robots(url);
            self.robots.insert(origin.clone(), policy);
        }
        match self.robots.get(&origin) {
            Some(RobotsPolicy::Rules(robot)) => robot.allowed(url.as_str()),
            _ => true,
        }
    }

    fn load_robots(&mut self, url: &Url) -> RobotsPolicy {
        let Ok(robots_url) = url.join("/robots.txt") else {
            return RobotsPolicy::AllowAll;
        };
        self.throttle.wait();
        let response = match self.client.get(robots_url.clone()).send() {
            Ok(response) => response,
            Err(err) => {
                log::warn!("robots.txt unavailable at {robots_url}: {err}");
                return RobotsPolicy::AllowAll;
            }
        };
        if response.status() != StatusCode::OK {
            log::info!("no robots.txt at {robots_url} ({}), allowing all", response.status());
            return RobotsPolicy::AllowAll;
        }
        let body = match self.read_body(response) {
            Ok(body) => body,
            Err(err) => {
                log::warn!("unreadable robots.txt at {robots_url}: {err}");
                return RobotsPolicy::AllowAll;
            }
        };
        match Robot::new(&self.agent, &body) {
            Ok(robot) => {
                match robot.delay.map(Duration::try_from_secs_f32) {
                    Some(Ok(delay)) if delay > self.throttle.min() => {
                        log::info!("robots.txt asks for {delay:?} between requests");
                        self.throttle.raise_floor(delay);
                    }
                    Some(Err(err)) => {
                        log::warn!("ignoring crawl-delay in {robots_url}: {err}");
                    }
                    _ => {}
                }
                RobotsPolicy::Rules(Box::new(robot))
            }
            Err(err) => {
                log::warn!("unparsable robots.txt at {robots_url}: {err}");
                RobotsPolicy::AllowAll
            }
        }
    }

    fn request_once(&mut self, url: &Url) -> Result<Page, FetchError> {
        self.throttle.wait();
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !content_type.as_deref().is_some_and(is_html) {
            return Err(FetchError::ContentType(content_type));
        }
        if response.content_length().is_some_and(|len| len > self.max_body_bytes) {
            return Err(FetchError::TooLarge {
                limit: self.max_body_bytes,
            });
        }
        let final_url = response.url().clone();
        let body = self.read_body(response)?;
        Ok(Page {
            url: final_url,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    /// Reads at most one byte past the limit so oversized bodies are caught without buffering them.
    fn read_body(&self, response: Response) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::new();
        response
            .take(self.max_body_bytes + 1)
            .read_to_end(&mut body)
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        if body.len() as u64 > self.max_body_bytes {
            return Err(FetchError::TooLarge {
                limit: self.max_body_bytes,
            });
        }
        Ok(body)
    }
}

impl PageFetcher for Fetcher {
    fn fetch(&mut self, url: &Url) -> Result<Page, FetchError> {
        if self.blocked_paths.iter().any(|b| url.path().contains(b.as_str())) {
            return Err(FetchError::Blocked);
        }
        if !self.allowed(url) {
            return Err(FetchError::Disallowed);
        }
        let mut attempt = 0;
        loop {
            match self.request_once(url) {
                Ok(page) => return Ok(page),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let pause = self.backoff * attempt;
                    log::warn!(
                        "{url}: {err}, retry {attempt}/{} in {:.1}s",
                        self.max_retries,
                        pause.as_secs_f64()
                    );
                    thread::sleep(pause);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_html(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml+xml")
}

/// Product token of a user agent string, as robots.txt groups name it.
fn robots_agent(user_agent: &str) -> String {
    user_agent
        .split(['/', ' '])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(user_agent)
        .to_string()
}
