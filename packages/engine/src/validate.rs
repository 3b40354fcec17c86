//! Allow-list validation for identifiers used in request paths and bodies.

use crate::error::{EngineError, IdentifierKind};

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

impl IdentifierKind {
    /// Check a value against this kind's allow-list.
    pub fn accepts(self, value: &str) -> bool {
        match self {
            IdentifierKind::ContainerId | IdentifierKind::ExecId => {
                !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
            }
            IdentifierKind::ImageName => {
                !value.is_empty()
                    && value
                        .chars()
                        .all(|c| is_name_char(c) || c == '/')
            }
            IdentifierKind::ContainerName
            | IdentifierKind::VolumeName
            | IdentifierKind::NetworkName => {
                let mut chars = value.chars();
                match chars.next() {
                    Some(first) if first.is_ascii_alphanumeric() => {
                        let rest = chars.as_str();
                        !rest.is_empty() && rest.chars().all(is_name_char)
                    }
                    _ => false,
                }
            }
            IdentifierKind::JoinToken => {
                !value.is_empty()
                    && value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-')
            }
            IdentifierKind::ManagerAddress => match value.rsplit_once(':') {
                Some((host, port)) => {
                    !host.is_empty()
                        && host
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.'))
                        && !port.is_empty()
                        && port.chars().all(|c| c.is_ascii_digit())
                }
                None => false,
            },
        }
    }
}

/// Validate `value` as `kind`, returning it unchanged on success.
pub fn validate(kind: IdentifierKind, value: &str) -> Result<&str, EngineError> {
    if kind.accepts(value) {
        Ok(value)
    } else {
        Err(EngineError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}
