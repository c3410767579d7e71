//! Reddit API client: app-only OAuth, thread fetch, and "more" expansion.
//!
//! ## Retry Strategy
//!
//! 429, 5xx, timeouts, and connection failures are retried with exponential
//! backoff (`retry_backoff_ms * 2^(attempt-1)`). A `Retry-After` header on a
//! 429 raises the wait to what Reddit asked for. Other statuses fail
//! immediately.
//!
//! ## Expansion
//!
//! Placeholders are resolved one at a time in pre-order so the finished tree
//! keeps Reddit's ordering. `more` objects carrying more than
//! [`MORECHILDREN_BATCH`] ids are split; the remainder goes back in the tree
//! as a new placeholder and is picked up on the next pass.

use crate::config::{ExportConfig, RedditCredentials};
use crate::error::ExportError;
use crate::model::Thread;
use crate::pipeline::listing::{
    parse_continue_listing, parse_more_children, parse_thread_listing, CommentArena, MoreStub, Thing,
};
use crate::pipeline::url::ThreadUrl;
use crate::progress::{ExportStage, ProgressCallback};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Most ids `/api/morechildren` accepts per call.
pub const MORECHILDREN_BATCH: usize = 100;

/// Comments requested with the initial thread listing.
const THREAD_LIMIT: &str = "500";

/// A fetched thread plus what it took to resolve it.
#[derive(Debug, Clone)]
pub struct FetchedThread {
    pub thread: Thread,
    pub expansion_requests: usize,
    /// Placeholders dropped because `more_comments_limit` was reached.
    pub unresolved_placeholders: usize,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Thin client over the Reddit JSON API.
pub struct RedditClient {
    http: reqwest::Client,
    credentials: Option<RedditCredentials>,
    auth_url: String,
    api_base: String,
    sort: &'static str,
    max_retries: u32,
    retry_backoff_ms: u64,
    more_comments_limit: Option<usize>,
    progress: Option<ProgressCallback>,
    token: Option<String>,
}

impl RedditClient {
    pub fn new(config: &ExportConfig) -> Result<Self, ExportError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ExportError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            credentials: config.credentials.clone(),
            auth_url: config.auth_url.clone(),
            api_base: config.api_base().to_string(),
            sort: config.comment_sort.as_str(),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            more_comments_limit: config.more_comments_limit,
            progress: config.progress_callback.clone(),
            token: None,
        })
    }

    fn stage(&self, stage: ExportStage) {
        if let Some(cb) = &self.progress {
            cb.on_stage(stage);
        }
    }

    /// Obtain an app-only bearer token. A no-op without credentials.
    pub async fn authenticate(&mut self) -> Result<(), ExportError> {
        let Some(creds) = self.credentials.clone() else {
            debug!("No Reddit credentials; using public endpoints");
            return Ok(());
        };
        if self.token.is_some() {
            return Ok(());
        }
        self.stage(ExportStage::Authenticating);

        let response = self
            .http
            .post(&self.auth_url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| unreachable(&self.auth_url, &e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ExportError::AuthFailed {
                detail: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(ExportError::RedditUnreachable {
                url: self.auth_url.clone(),
                reason: format!("HTTP {status}"),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| ExportError::MalformedResponse {
            detail: format!("token response: {e}"),
        })?;
        match body.access_token {
            Some(token) if !token.is_empty() => {
                info!("Authenticated with Reddit (app-only)");
                self.token = Some(token);
                Ok(())
            }
            _ => Err(ExportError::AuthFailed {
                detail: body.error.unwrap_or_else(|| "no access token in response".into()),
            }),
        }
    }

    /// Fetch a thread and resolve every "more" placeholder the limit allows.
    pub async fn fetch_thread(&mut self, url: &ThreadUrl) -> Result<FetchedThread, ExportError> {
        self.authenticate().await?;

        self.stage(ExportStage::FetchingThread);
        let endpoint = self.endpoint(&format!("/comments/{}", url.submission_id));
        let body = self
            .get_text(
                &endpoint,
                &[("raw_json", "1"), ("limit", THREAD_LIMIT), ("sort", self.sort)],
                &url.submission_id,
            )
            .await?;
        let (submission, things) = parse_thread_listing(&body)?;
        info!(
            "Fetched '{}' (r/{}, {} comments reported)",
            submission.title, submission.subreddit, submission.num_comments
        );

        let mut arena = CommentArena::from_things(things);
        let (expansion_requests, skipped) = self.expand(url, &mut arena).await?;

        let unresolved_placeholders = arena.drop_pending() + skipped;
        if unresolved_placeholders > 0 {
            warn!(
                "{} placeholder(s) left unresolved ({} unreachable)",
                unresolved_placeholders, skipped
            );
        }

        let thread = Thread {
            submission,
            comments: arena.into_comments(),
        };
        debug!("Resolved tree holds {} comments", thread.comment_count());

        Ok(FetchedThread {
            thread,
            expansion_requests,
            unresolved_placeholders,
        })
    }

    /// Resolve placeholders until none are left or the limit is hit.
    /// Returns the number of requests made and the placeholders that could
    /// not be requested at all.
    async fn expand(
        &self,
        url: &ThreadUrl,
        arena: &mut CommentArena,
    ) -> Result<(usize, usize), ExportError> {
        if arena.pending_count() == 0 {
            return Ok((0, 0));
        }
        self.stage(ExportStage::ExpandingComments);

        let mut requests = 0;
        let mut skipped = 0;
        loop {
            if self.more_comments_limit.is_some_and(|limit| requests >= limit) {
                break;
            }
            let Some((container, index, stub)) = arena.take_first_pending() else {
                break;
            };

            let added = if stub.is_continue_thread() {
                let Some(parent) = stub.parent.clone() else {
                    debug!("Skipping top-level continue placeholder {}", stub.id);
                    skipped += 1;
                    continue;
                };
                let things = self.continue_thread(url, &parent).await?;
                arena.graft(&container, index, things)
            } else {
                let (batch, rest) = split_batch(stub);
                if let Some(rest) = rest {
                    arena.reinsert(&container, index, rest);
                }
                let things = self.more_children(url, &batch.children).await?;
                arena.graft(&container, index, things)
            };
            requests += 1;

            let pending = arena.pending_count();
            debug!(
                "Expansion {}: +{} comments, {} placeholder(s) pending",
                requests, added, pending
            );
            if let Some(cb) = &self.progress {
                cb.on_comments_expanded(requests, pending);
            }
        }
        Ok((requests, skipped))
    }

    async fn more_children(
        &self,
        url: &ThreadUrl,
        children: &[String],
    ) -> Result<Vec<Thing>, ExportError> {
        let endpoint = self.endpoint("/api/morechildren");
        let link_id = url.link_fullname();
        let ids = children.join(",");
        let body = self
            .get_text(
                &endpoint,
                &[
                    ("api_type", "json"),
                    ("link_id", link_id.as_str()),
                    ("children", ids.as_str()),
                    ("sort", self.sort),
                    ("raw_json", "1"),
                ],
                &url.submission_id,
            )
            .await?;
        parse_more_children(&body)
    }

    async fn continue_thread(
        &self,
        url: &ThreadUrl,
        parent: &str,
    ) -> Result<Vec<Thing>, ExportError> {
        let endpoint = self.endpoint(&format!("/comments/{}/_/{}", url.submission_id, parent));
        let body = self
            .get_text(
                &endpoint,
                &[("raw_json", "1"), ("sort", self.sort)],
                &url.submission_id,
            )
            .await?;
        parse_continue_listing(&body, parent)
    }

    /// Public endpoints need the `.json` suffix; OAuth ones must not have it.
    fn endpoint(&self, path: &str) -> String {
        if self.token.is_some() {
            format!("{}{}", self.api_base, path)
        } else {
            format!("{}{}.json", self.api_base, path)
        }
    }

    async fn get_text(
        &self,
        url: &str,
        query: &[(&str, &str)],
        thread: &str,
    ) -> Result<String, ExportError> {
        let mut last_err: Option<ExportError> = None;
        let mut retry_after: Option<u64> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let mut backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                if let Some(secs) = retry_after.take() {
                    backoff = backoff.max(secs * 1000);
                }
                warn!(
                    "GET {}: retry {}/{} after {}ms",
                    url, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let mut request = self.http.get(url).query(query);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }
            debug!("GET {} {:?}", url, query);

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!("GET {}: attempt {} failed: {}", url, attempt + 1, e);
                    last_err = Some(unreachable(url, &e));
                    continue;
                }
            };

            let status = response.status();
            retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());

            if let Some(err) = classify_status(status, url, thread, retry_after) {
                if err.is_transient() {
                    warn!("GET {}: attempt {} got HTTP {}", url, attempt + 1, status);
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }

            return response.text().await.map_err(|e| unreachable(url, &e));
        }

        Err(last_err.unwrap_or_else(|| ExportError::Internal(format!("no attempt made for {url}"))))
    }
}

/// Split a `more` stub into the batch to request now and the remainder.
pub fn split_batch(mut stub: MoreStub) -> (MoreStub, Option<MoreStub>) {
    if stub.children.len() <= MORECHILDREN_BATCH {
        return (stub, None);
    }
    let rest_children = stub.children.split_off(MORECHILDREN_BATCH);
    let rest = MoreStub {
        children: rest_children,
        ..stub.clone()
    };
    (stub, Some(rest))
}

/// Map a non-success HTTP status to an error. `None` means success.
pub fn classify_status(
    status: StatusCode,
    url: &str,
    thread: &str,
    retry_after_secs: Option<u64>,
) -> Option<ExportError> {
    if status.is_success() {
        return None;
    }
    let err = match status.as_u16() {
        401 => ExportError::AuthFailed {
            detail: format!("HTTP {status} from {url}"),
        },
        403 | 404 | 410 | 451 => ExportError::ThreadUnavailable {
            thread: thread.to_string(),
            reason: format!("HTTP {status}"),
        },
        429 => ExportError::RateLimited { retry_after_secs },
        500..=599 | 408 => ExportError::RedditUnreachable {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        },
        _ => ExportError::MalformedResponse {
            detail: format!("unexpected HTTP {status} from {url}"),
        },
    };
    Some(err)
}

fn unreachable(url: &str, e: &reqwest::Error) -> ExportError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    ExportError::RedditUnreachable {
        url: url.to_string(),
        reason,
    }
}
