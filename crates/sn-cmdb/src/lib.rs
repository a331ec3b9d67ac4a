//! # sn-cmdb
//!
//! Configuration-item management for a ServiceNow CMDB.
//!
//! [`CiManager`] validates CI payloads, performs CRUD through any
//! [`sn_connectors::RecordClient`], reports duplicate CIs, maintains
//! `cmdb_rel_ci` relationship edges, merges enrichment data, and writes an
//! audit entry for every mutation.

pub mod dedup;
pub mod enrichment;
pub mod error;
pub mod manager;
pub mod models;
pub mod validation;

pub use dedup::{find_duplicates, DuplicateKey};
pub use enrichment::merge_enrichment;
pub use error::{CmdbError, CmdbResult};
pub use manager::{CiManager, DEFAULT_DEDUP_SCAN_LIMIT};
pub use models::{
    ConfigurationItem, Relationship, CI_TABLE, DEFAULT_RELATIONSHIP_TYPE, RELATIONSHIP_TABLE,
};
pub use validation::validate_ci;
