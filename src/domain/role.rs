//! Administrative roles carried as JWT claims.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    KycAdmin,
    DepositAdmin,
    WithdrawalAdmin,
    MatchAdmin,
    SuperAdmin,
    None,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::KycAdmin => "kycAdmin",
            Role::DepositAdmin => "depositAdmin",
            Role::WithdrawalAdmin => "withdrawalAdmin",
            Role::MatchAdmin => "matchAdmin",
            Role::SuperAdmin => "superAdmin",
            Role::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "kycAdmin" => Some(Role::KycAdmin),
            "depositAdmin" => Some(Role::DepositAdmin),
            "withdrawalAdmin" => Some(Role::WithdrawalAdmin),
            "matchAdmin" => Some(Role::MatchAdmin),
            "superAdmin" => Some(Role::SuperAdmin),
            "none" => Some(Role::None),
            _ => None,
        }
    }

    /// Super admin passes every role gate.
    pub fn can_settle_matches(&self) -> bool {
        matches!(self, Role::MatchAdmin | Role::SuperAdmin)
    }

    pub fn can_approve_deposits(&self) -> bool {
        matches!(self, Role::DepositAdmin | Role::SuperAdmin)
    }

    pub fn can_approve_withdrawals(&self) -> bool {
        matches!(self, Role::WithdrawalAdmin | Role::SuperAdmin)
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::None
    }
}
