pub mod connection;
pub mod identity;
pub mod leads;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_from_config, connect_with_settings, DbPool, PoolSettings};
pub use identity::{IdentityEngine, IdentityError, Resolution};
pub use leads::{LeadError, LeadManager, MergeReport};
pub use repositories::{
    ClientStore, LeadStore, RepositoryError, SessionStore, SqlClientStore, SqlLeadStore,
    SqlSessionStore,
};
