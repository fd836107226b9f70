//! Enrollment queries: who is enrolled in a course, with which role.
//!
//! The service depends only on three narrow contracts: an
//! [`EnrollmentStore`] to query, an authorization checker for capabilities,
//! and (at the RPC edge) a parameter validator that produces an
//! [`EnrollmentQuery`].

mod error;
mod format;
mod model;
mod service;
mod store;

pub use error::ServiceError;
pub use format::{FullnameFormat, digits_only};
pub use model::{Course, CourseContext, EnrolledUser, EnrolledUserRow, EnrollmentQuery, KeyedRow};
pub use service::{EnrollmentService, ServiceSettings};
pub use store::{EnrollmentStore, StoreFuture, group_by_key};
