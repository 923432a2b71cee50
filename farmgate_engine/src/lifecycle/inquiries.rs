use crate::{db_types::InquiryStatusType, lifecycle::InvalidTransition};

/// A validated inquiry status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InquiryTransition {
    pub from: InquiryStatusType,
    pub to: InquiryStatusType,
}

impl InquiryStatusType {
    /// Validates the move from `self` to `target`.
    ///
    /// ```text
    /// PENDING -> NEGOTIATING -> ACCEPTED -> CONVERTED
    ///    \            |
    ///     +-----> REJECTED | EXPIRED
    /// ```
    pub fn transition_to(self, target: InquiryStatusType) -> Result<InquiryTransition, InvalidTransition> {
        use InquiryStatusType::*;
        match (self, target) {
            (Pending, Negotiating | Accepted | Rejected | Expired) |
            (Negotiating, Accepted | Rejected | Expired) |
            (Accepted, Converted) => Ok(InquiryTransition { from: self, to: target }),
            (Pending | Negotiating | Accepted, _) => Err(InvalidTransition::new("Inquiry", self, target)),
            (Converted | Rejected | Expired, _) => Err(InvalidTransition::new("Inquiry", self, target)),
        }
    }
}
