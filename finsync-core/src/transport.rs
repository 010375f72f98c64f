//! Transport boundary.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::OpError;
use crate::models::Operation;

/// Performs an operation against the backing service.
///
/// Implementations are opaque to the engine: any failure is reported as
/// an [`OpError`] so the classifier can decide whether it is worth
/// retrying. Boxed futures keep the trait object-safe.
pub trait Transport: Send + Sync {
    fn perform<'a>(&'a self, operation: &'a Operation) -> BoxFuture<'a, Result<Value, OpError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn perform<'a>(&'a self, operation: &'a Operation) -> BoxFuture<'a, Result<Value, OpError>> {
        (**self).perform(operation)
    }
}
