//! axum / tower integration.
//!
//! - [`AuthzLayer`] runs the gate in front of a route and either forwards
//!   the request or answers with the rejection response.
//! - [`PermissionsLayer`] (or [`permissions`]) declares the permissions a
//!   route requires so they reach the policy in the query document.
//! - [`snapshot_from_parts`] maps request parts to a [`RequestSnapshot`].
//!
//! Connection addresses are read from request extensions: the remote peer from
//! axum's `ConnectInfo<SocketAddr>` (serve with
//! `into_make_service_with_connect_info`) and the local one from [`LocalAddr`].
//!
//! [`RequestSnapshot`]: crate::RequestSnapshot

mod adapter;
mod middleware;
mod permissions;

pub use adapter::{snapshot_from_parts, LocalAddr};
pub use middleware::{rejection, AuthzLayer, AuthzService, DEFAULT_MAX_BODY_BYTES};
pub use permissions::{permissions, PermissionsLayer, PermissionsService};
