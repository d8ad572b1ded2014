//! Mapping of AWS SDK failures onto [`ProviderError`] kinds.
//!
//! Every service crate re-exports the same smithy `SdkError`, so one helper
//! serves SSM, STS and Organizations alike.

use std::error::Error;
use std::fmt;

use aws_sdk_ssm::error::{DisplayErrorContext, SdkError};
use param_share_core::ProviderError;

/// Convert an SDK failure. `known` picks out the modeled service errors the
/// engine reacts to; anything else becomes `Unexpected` carrying the full
/// error chain.
pub(crate) fn provider_error<E, R>(
    context: impl fmt::Display,
    err: SdkError<E, R>,
    known: impl FnOnce(&E) -> Option<ProviderError>,
) -> ProviderError
where
    E: Error + 'static,
    R: fmt::Debug,
{
    if let SdkError::ServiceError(service) = &err {
        if let Some(kind) = known(service.err()) {
            return kind;
        }
    }
    ProviderError::Unexpected(format!("{context}: {}", DisplayErrorContext(err)))
}
