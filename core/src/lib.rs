//! Async client core for the pet/tutor registry API.
//!
//! # Overview
//! Logs in, keeps the token pair in a session store, sends every request with
//! a bearer token and refreshes it once, for all concurrent callers, when the
//! API answers 401. Pets and tutors are exposed through facades that publish
//! the current page, a loading flag and pagination as replay-latest
//! observables.
//!
//! # Design
//! - `RegistryClient` is a stateless codec: `build_*` produces an
//!   `HttpRequest`, `parse_*` consumes an `HttpResponse`.
//! - `Transport` executes requests; `ReqwestTransport` is the network one.
//! - `AuthenticatedClient` sits between codec and transport and owns the
//!   refresh coordination.
//! - Services implement the `PetBackend` / `TutorBackend` traits the facades
//!   depend on, so facades can be tested without a network.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod facade;
pub mod http;
pub mod observable;
pub mod registry;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;
pub mod validation;

pub use auth::{AuthState, AuthenticatedClient};
pub use client::RegistryClient;
pub use config::RegistryConfig;
pub use error::{ApiError, SessionError};
pub use facade::{Pagination, PetEntry, PetFacade, TutorFacade};
pub use http::{Body, HttpMethod, HttpRequest, HttpResponse};
pub use observable::{Observable, Subscription};
pub use registry::Registry;
pub use service::{AuthService, PetBackend, PetService, TutorBackend, TutorService};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    Attachment, AuthResponse, Credentials, Page, Pet, PetDetail, PetQuery, PetRequest, Tutor,
    TutorDetail, TutorQuery, TutorRequest, Upload,
};
pub use validation::{ContactKind, PetForm, TutorForm, ValidationErrors};
