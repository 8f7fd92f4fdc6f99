//! Pre-write rules
//!
//! Run once per write request, after the payload has been turned into a draft
//! and before the draft reaches a repository:
//!
//! - author assignment: on POST, drafts with the [`AuthoredEntity`]
//!   capability get the authenticated principal as author
//! - publication date: on POST, drafts with the [`PublishedDateEntity`]
//!   capability get the current time
//!
//! Other methods and drafts without the capability are left alone, and the
//! principal is not even looked up for them.
//!
//! [`AuthoredEntity`]: crate::models::AuthoredEntity
//! [`PublishedDateEntity`]: crate::models::PublishedDateEntity

use axum::http::Method;
use chrono::Utc;

use crate::models::{PendingWrite, User};

/// Access to the principal of the current request.
pub trait AuthContext {
    fn authenticated_principal(&self) -> Option<&User>;
}

impl AuthContext for User {
    fn authenticated_principal(&self) -> Option<&User> {
        Some(self)
    }
}

impl AuthContext for Option<User> {
    fn authenticated_principal(&self) -> Option<&User> {
        self.as_ref()
    }
}

/// Context of an unauthenticated request.
pub struct Anonymous;

impl AuthContext for Anonymous {
    fn authenticated_principal(&self) -> Option<&User> {
        None
    }
}

/// Errors raised by the pre-write rules
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// A POST reached the author rule without an authenticated principal.
    /// Access control should have rejected the request earlier.
    #[error("No authenticated principal available to author a {kind}")]
    MissingPrincipal { kind: &'static str },
}

/// Apply the pre-write rules to a draft.
pub fn pre_write<A>(method: &Method, mut write: PendingWrite<'_>, auth: &A) -> Result<(), LifecycleError>
where
    A: AuthContext + ?Sized,
{
    if *method != Method::POST {
        return Ok(());
    }

    let kind = write.kind();

    if let Some(entity) = write.authored() {
        let principal = auth
            .authenticated_principal()
            .ok_or(LifecycleError::MissingPrincipal { kind })?;
        entity.assign_author(principal);
        tracing::debug!("Assigned author {} to new {}", principal.id, kind);
    }

    if let Some(entity) = write.dated() {
        entity.assign_published(Utc::now());
    }

    Ok(())
}
