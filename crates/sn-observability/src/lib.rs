//! # sn-observability
//!
//! Structured logging setup and the CMDB audit trail.

pub mod audit;
pub mod logging;

pub use audit::{mask_sensitive_fields, AuditAction, AuditEntry, AuditLog};
pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
