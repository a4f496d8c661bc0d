//! Sequential, short-circuiting validation-and-mutation pipeline.
//!
//! Every mutating operation follows the same shape: an ordered list of named
//! precondition checks runs against the in-flight request, the first failing
//! check rejects the request with its typed error, and only when every check
//! passes does the mutation run, followed by the post-mutation side effects.
//!
//! The stage list makes ordering and short-circuit semantics an explicit,
//! testable contract: check *i* is evaluated only if checks `0..i` all
//! passed, the mutation runs only after all checks pass, and side effects
//! run only after the mutation has been applied.

use std::future::Future;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use super::error::Error;

/// Outcome of one pipeline run: the mutated entity or the first typed
/// rejection.
pub type PipelineResult<T> = Result<T, Error>;

type CheckPredicate<Req> = Box<dyn Fn(&Req) -> BoxFuture<'static, Result<bool, Error>> + Send + Sync>;

/// A named predicate gating a mutation, paired with the error it produces
/// when it fails.
///
/// The predicate returns `Ok(false)` when the precondition is violated and
/// `Err` when evaluating it failed outright (for example a lost database
/// connection); the two are reported differently.
pub struct PreconditionCheck<Req> {
    name: &'static str,
    on_failure: Error,
    predicate: CheckPredicate<Req>,
}

impl<Req> PreconditionCheck<Req> {
    /// Build a check from an async predicate.
    ///
    /// The predicate closure is handed the borrowed request and must clone
    /// whatever it needs before returning its future.
    pub fn new<P>(name: &'static str, on_failure: Error, predicate: P) -> Self
    where
        P: Fn(&Req) -> BoxFuture<'static, Result<bool, Error>> + Send + Sync + 'static,
    {
        Self {
            name,
            on_failure,
            predicate: Box::new(predicate),
        }
    }

    /// Build a check from a synchronous predicate.
    ///
    /// # Examples
    /// ```
    /// use accounts_backend::domain::{Error, PreconditionCheck};
    ///
    /// let check: PreconditionCheck<String> = PreconditionCheck::sync(
    ///     "not empty",
    ///     Error::invalid_argument("value must not be empty"),
    ///     |value: &String| !value.is_empty(),
    /// );
    /// assert_eq!(check.name(), "not empty");
    /// ```
    pub fn sync<P>(name: &'static str, on_failure: Error, predicate: P) -> Self
    where
        P: Fn(&Req) -> bool + Send + Sync + 'static,
    {
        Self::new(name, on_failure, move |request| {
            std::future::ready(Ok(predicate(request))).boxed()
        })
    }

    /// Name of the check, echoed into the rejection details.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Run `request` through `checks` in declared order, then mutate and fire
/// side effects.
///
/// - Checks run strictly sequentially; the first failure short-circuits with
///   that check's error, carrying the check name in the error details, and
///   `mutate` never runs.
/// - A check whose evaluation errors aborts the pipeline with that error.
/// - `on_success` runs only after `mutate` returned `Ok`; its outcome does
///   not change the reported result.
pub async fn run_pipeline<Req, T, M, MFut, S, SFut>(
    request: Req,
    checks: Vec<PreconditionCheck<Req>>,
    mutate: M,
    on_success: S,
) -> PipelineResult<T>
where
    M: FnOnce(Req) -> MFut,
    MFut: Future<Output = Result<T, Error>>,
    S: FnOnce(&T) -> SFut,
    SFut: Future<Output = ()>,
{
    for check in &checks {
        let passed = (check.predicate)(&request).await?;
        if !passed {
            debug!(check = check.name, "precondition rejected request");
            return Err(check
                .on_failure
                .clone()
                .with_details(json!({ "check": check.name })));
        }
    }

    let outcome = mutate(request).await?;
    on_success(&outcome).await;
    Ok(outcome)
}
