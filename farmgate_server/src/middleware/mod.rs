pub mod acl;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
