//! Deferred Values
//!
//! An [`Output`] is a value that may only become known once the declaration
//! producing it has been materialized (an instance's private IP, a connector's
//! assigned name, minted tokens). Consumers chain callbacks with
//! [`Output::apply`] instead of reading the value directly.
//!
//! Every output remembers which declarations it was derived from, so reading
//! another declaration's output is what creates a dependency edge.

use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Why a deferred value could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The producing declaration failed or was skipped
    #[error("{0} was never materialized")]
    Abandoned(String),

    /// The producing declaration has no such output
    #[error("{urn} has no output named '{key}'")]
    MissingOutput { urn: String, key: String },

    /// A chained callback failed
    #[error("{0}")]
    Callback(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

type SharedValue<T> = Shared<BoxFuture<'static, ResolveResult<T>>>;

/// A value that may not be known until apply time
pub struct Output<T> {
    value: SharedValue<T>,
    dependencies: BTreeSet<String>,
    secret: bool,
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            dependencies: self.dependencies.clone(),
            secret: self.secret,
        }
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An output whose value is already known
    pub fn known(value: T) -> Self {
        Self {
            value: future::ready(Ok(value)).boxed().shared(),
            dependencies: BTreeSet::new(),
            secret: false,
        }
    }

    pub(crate) fn deferred<F>(value: F, dependencies: BTreeSet<String>) -> Self
    where
        F: Future<Output = ResolveResult<T>> + Send + 'static,
    {
        Self {
            value: value.boxed().shared(),
            dependencies,
            secret: false,
        }
    }

    /// Mark this output (and everything derived from it) as secret
    pub fn mark_secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// URNs of the declarations this value is derived from
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// Chain a transformation onto the eventual value
    pub fn apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let value = self.value.clone();
        Output {
            value: async move { value.await.map(f) }.boxed().shared(),
            dependencies: self.dependencies.clone(),
            secret: self.secret,
        }
    }

    /// Chain a fallible transformation; a failure resolves to [`ResolveError::Callback`]
    pub fn try_apply<U, E, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        E: fmt::Display,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        let value = self.value.clone();
        Output {
            value: async move {
                let resolved = value.await?;
                f(resolved).map_err(|e| ResolveError::Callback(e.to_string()))
            }
            .boxed()
            .shared(),
            dependencies: self.dependencies.clone(),
            secret: self.secret,
        }
    }

    /// Combine outputs into one that resolves once all of them have
    pub fn all<I>(outputs: I) -> Output<Vec<T>>
    where
        I: IntoIterator<Item = Output<T>>,
    {
        let outputs: Vec<Output<T>> = outputs.into_iter().collect();
        let dependencies = outputs
            .iter()
            .flat_map(|o| o.dependencies.iter().cloned())
            .collect();
        let secret = outputs.iter().any(|o| o.secret);
        let values: Vec<SharedValue<T>> = outputs.into_iter().map(|o| o.value).collect();

        Output {
            value: async move {
                future::join_all(values)
                    .await
                    .into_iter()
                    .collect::<ResolveResult<Vec<T>>>()
            }
            .boxed()
            .shared(),
            dependencies,
            secret,
        }
    }

    /// Pair this output with another
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let (left, right) = (self.value.clone(), other.value.clone());
        Output {
            value: async move {
                let (left, right) = future::join(left, right).await;
                Ok((left?, right?))
            }
            .boxed()
            .shared(),
            dependencies: self
                .dependencies
                .union(&other.dependencies)
                .cloned()
                .collect(),
            secret: self.secret || other.secret,
        }
    }

    /// The value, if it has already been resolved. Never blocks.
    pub fn try_get(&self) -> Option<ResolveResult<T>> {
        self.value.clone().now_or_never()
    }

    /// Wait for the value
    pub async fn resolve(&self) -> ResolveResult<T> {
        self.value.clone().await
    }
}

impl<T> fmt::Debug for Output<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secret {
            return f.write_str("Output([secret])");
        }
        match self.try_get() {
            Some(Ok(value)) => write!(f, "Output({:?})", value),
            Some(Err(error)) => write!(f, "Output(<{}>)", error),
            None => f.write_str("Output(<computed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn pending(urn: &str) -> (oneshot::Sender<String>, Output<String>) {
        let (tx, rx) = oneshot::channel::<String>();
        let owner = urn.to_string();
        let output = Output::deferred(
            async move { rx.await.map_err(|_| ResolveError::Abandoned(owner)) },
            BTreeSet::from([urn.to_string()]),
        );
        (tx, output)
    }

    #[test]
    fn test_known_value_is_available_immediately() {
        let out = Output::known(42u32).apply(|v| v + 1);
        assert_eq!(out.try_get(), Some(Ok(43)));
        assert!(out.dependencies().is_empty());
    }

    #[tokio::test]
    async fn test_deferred_value_resolves_after_send() {
        let (tx, out) = pending("aws:ec2/instance:Instance::ca");
        let upper = out.apply(|v| v.to_uppercase());

        assert!(upper.try_get().is_none());
        tx.send("10.0.1.10".to_string()).unwrap();

        assert_eq!(upper.resolve().await, Ok("10.0.1.10".to_string()));
        assert_eq!(upper.try_get(), Some(Ok("10.0.1.10".to_string())));
    }

    #[tokio::test]
    async fn test_dropped_sender_abandons_dependents() {
        let (tx, out) = pending("twingate::conn");
        drop(tx);

        let err = out.apply(|v| v.len()).resolve().await.unwrap_err();
        assert_eq!(err, ResolveError::Abandoned("twingate::conn".to_string()));
    }

    #[test]
    fn test_all_unions_dependencies_and_secrecy() {
        let (_a_tx, a) = pending("a");
        let (_b_tx, b) = pending("b");
        let combined = Output::all([a.mark_secret(), b, Output::known("x".to_string())]);

        assert!(combined.is_secret());
        let deps: Vec<&str> = combined.dependencies().iter().map(String::as_str).collect();
        assert_eq!(deps, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_all_preserves_order() {
        let (a_tx, a) = pending("a");
        let (b_tx, b) = pending("b");
        let combined = Output::all([a, b]);

        b_tx.send("second".to_string()).unwrap();
        a_tx.send("first".to_string()).unwrap();

        assert_eq!(
            combined.resolve().await,
            Ok(vec!["first".to_string(), "second".to_string()])
        );
    }

    #[test]
    fn test_zip_and_try_apply() {
        let zipped = Output::known(2u32).zip(&Output::known("x".to_string()).mark_secret());
        assert!(zipped.is_secret());
        assert_eq!(zipped.try_get(), Some(Ok((2, "x".to_string()))));

        let failed = Output::known(0u32).try_apply(|v| {
            if v == 0 {
                Err("zero connectors")
            } else {
                Ok(v)
            }
        });
        assert_eq!(
            failed.try_get(),
            Some(Err(ResolveError::Callback("zero connectors".to_string())))
        );
    }

    #[test]
    fn test_debug_never_prints_secret() {
        let out = Output::known("hunter2".to_string()).mark_secret();
        let rendered = format!("{:?}", out.apply(|v| format!("password={v}")));
        assert_eq!(rendered, "Output([secret])");
        assert!(!rendered.contains("hunter2"));
    }
}
