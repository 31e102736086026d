//! Collaborators of the synchronization loop
//!
//! - [`source`]: where decisions come from (CrowdSec local API)
//! - [`sink`]: where the ban list is enforced (Galle control endpoint)

pub mod sink;
pub mod source;
