//! The `Command` marker trait.
//!
//! A command is opaque to the runtime except for its kind (used as the
//! routing key) and whatever the registered [`crate::identity::IdentityRule`]
//! extracts from it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A dispatchable command.
///
/// `KIND` is the routing key a [`crate::Router`] registers handlers under;
/// it must be unique per router (enforced at registration time).
pub trait Command: Debug + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: &'static str;
}
