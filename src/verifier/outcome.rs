use std::fmt;

use crate::error::VerifyError;
use crate::roots::RootEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// `name` verified through both proofs; `root` is the window entry matched
    Accepted { name: String, root: RootEntry },
    /// Every name failed, in the order they were tried
    Rejected { reasons: Vec<(String, VerifyError)> },
}

impl VerificationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn reasons(&self) -> &[(String, VerifyError)] {
        match self {
            Self::Accepted { .. } => &[],
            Self::Rejected { reasons } => reasons,
        }
    }

    /// Convert into a result, folding the reasons into one error
    pub fn into_result(self) -> Result<(String, RootEntry), VerifyError> {
        match self {
            Self::Accepted { name, root } => Ok((name, root)),
            Self::Rejected { mut reasons } => Err(match reasons.len() {
                0 => VerifyError::NoDnsNames,
                _ => reasons.swap_remove(0).1,
            }),
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { name, root } => write!(
                f,
                "accepted {} (tree root {} at height {})",
                name, root.tree_root, root.height
            ),
            Self::Rejected { reasons } => {
                write!(f, "rejected")?;
                for (i, (name, reason)) in reasons.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { "; " };
                    write!(f, "{}{}: {} [{}]", sep, name, reason, reason.category())?;
                }
                Ok(())
            }
        }
    }
}
