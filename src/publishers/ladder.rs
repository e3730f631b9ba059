use futures_util::future::BoxFuture;
use tracing::{info, warn};

use crate::error::BoxError;
use crate::models::platform::{Platform, PublicationShape};
use crate::models::publication::PublishedPost;

type Attempt<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<PublishedPost, BoxError>> + Send + 'a>;

/// One shape and the call sequence that produces it.
pub struct Rung<'a> {
    pub shape: PublicationShape,
    attempt: Attempt<'a>,
}

impl<'a> Rung<'a> {
    pub fn new<F>(shape: PublicationShape, attempt: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, Result<PublishedPost, BoxError>> + Send + 'a,
    {
        Self { shape, attempt: Box::new(attempt) }
    }
}

/// Record of one tried shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeAttempt {
    pub shape: PublicationShape,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct LadderOutcome {
    pub attempts: Vec<ShapeAttempt>,
    pub result: Result<PublishedPost, BoxError>,
}

/// Tries rungs in order, each at most once, stopping at the first success.
/// On exhaustion the last rung's error is returned.
pub async fn climb(platform: Platform, rungs: Vec<Rung<'_>>) -> LadderOutcome {
    let mut attempts = Vec::with_capacity(rungs.len());
    let mut last_error: Option<BoxError> = None;
    for rung in rungs {
        info!(platform = %platform, shape = %rung.shape, "ladder: trying shape");
        match (rung.attempt)().await {
            Ok(post) => {
                info!(platform = %platform, shape = %rung.shape, url = %post.post_url, "ladder: shape published");
                attempts.push(ShapeAttempt { shape: rung.shape, error: None });
                return LadderOutcome { attempts, result: Ok(post) };
            }
            Err(e) => {
                warn!(platform = %platform, shape = %rung.shape, error = %e, "ladder: shape failed");
                attempts.push(ShapeAttempt { shape: rung.shape, error: Some(e.to_string()) });
                last_error = Some(e);
            }
        }
    }
    let error = last_error.unwrap_or_else(|| format!("{}: no publication shape applies", platform).into());
    LadderOutcome { attempts, result: Err(error) }
}
