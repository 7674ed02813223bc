use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("label {label} is too big, should be less than 255")]
    LabelOutOfRange { label: u32 },

    #[error("adjacency {adj} exceeds the bounded adjacency space")]
    AdjacencyOutOfRange { adj: u32 },

    #[error("link on interface {sw_if_index} exists")]
    LinkExists { sw_if_index: u32 },

    #[error("link on interface {sw_if_index} not found")]
    LinkNotFound { sw_if_index: u32 },

    #[error("policy {policy_id} exists")]
    PolicyExists { policy_id: u32 },

    #[error("policy {policy_id} not found")]
    PolicyNotFound { policy_id: u32 },

    #[error("policy {policy_id} is referenced by attachments")]
    PolicyInUse { policy_id: u32 },

    #[error("policy {policy_id} already attached to interface {sw_if_index}")]
    AttachmentExists { policy_id: u32, sw_if_index: u32 },

    #[error("policy {policy_id} is not attached to interface {sw_if_index}")]
    AttachmentNotFound { policy_id: u32, sw_if_index: u32 },

    #[error("acl {acl_id} not found")]
    AclNotFound { acl_id: u32 },

    #[error("default route action exists")]
    DefaultRouteActionExists,
}

/// Wire-level result codes for the control-plane operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Code {
    Ok = 0,
    Exists = 1,
    NotFound = 2,
    InUse = 3,
    InvalidArgument = 4,
}

impl Error {
    /// The wire code this error maps to.
    pub fn code(&self) -> Code {
        match self {
            Error::LinkExists { .. }
            | Error::PolicyExists { .. }
            | Error::AttachmentExists { .. }
            | Error::DefaultRouteActionExists => Code::Exists,
            Error::LinkNotFound { .. }
            | Error::PolicyNotFound { .. }
            | Error::AttachmentNotFound { .. }
            | Error::AclNotFound { .. } => Code::NotFound,
            Error::PolicyInUse { .. } => Code::InUse,
            _ => Code::InvalidArgument,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::LinkExists { sw_if_index: 1 }.code(), Code::Exists);
        assert_eq!(
            Error::PolicyNotFound { policy_id: 9 }.code(),
            Code::NotFound
        );
        assert_eq!(Error::PolicyInUse { policy_id: 9 }.code(), Code::InUse);
        assert_eq!(
            Error::LabelOutOfRange { label: 255 }.code(),
            Code::InvalidArgument
        );
        assert_eq!(Code::Ok as u32, 0);
    }
}
