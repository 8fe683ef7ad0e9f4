//! Authorization policy.
//!
//! Every handler describes what it is about to do as an [`Action`] and asks
//! [`authorize`] once. The decision depends only on the caller's role, the
//! caller's company and the tenant named by the action.

use huddle_types::models::{Role, User};

use crate::error::AppError;

/// The authenticated caller, as far as policy is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
    pub company_id: Option<i64>,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            company_id: user.company_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateCompany,
    UpdateCompany { company_id: i64 },
    DeleteCompany,
    ViewCompanies,
    CreateUser { role: Role, company_id: Option<i64> },
    /// `target_company` is `None` when the target does not exist or has no company.
    BlockUser { target_company: Option<i64> },
    ListUsers,
    CreateMeeting { company_id: Option<i64> },
    ViewMeeting,
    SendMessage,
    ListMessages,
    MarkMessageRead { company_id: i64, receiver_id: i64 },
    RunQuery,
    ViewStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    Forbidden(&'static str),
    CrossTenant(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

const INSUFFICIENT: &str = "Insufficient permissions";

pub fn authorize(caller: Option<&Identity>, action: &Action) -> Decision {
    use Decision::{Allow, Deny};
    use Role::{CompanyAdmin, Employee, SuperAdmin};

    let Some(caller) = caller else {
        // Anonymous callers may only sign themselves up as employees.
        return match action {
            Action::CreateUser { role: Employee, .. } => Allow,
            Action::CreateUser { role: CompanyAdmin, .. } => Deny(Denial::Forbidden(
                "Only super admin can create company admin accounts",
            )),
            Action::CreateUser { role: SuperAdmin, .. } => Deny(Denial::Forbidden(
                "Only super admin can create super admin accounts",
            )),
            _ => Deny(Denial::Unauthenticated),
        };
    };

    let forbidden = |msg| Deny(Denial::Forbidden(msg));
    let own_tenant = |company: Option<i64>| company.is_some() && company == caller.company_id;

    match (caller.role, action) {
        (SuperAdmin, Action::MarkMessageRead { .. }) => Allow,
        (SuperAdmin, Action::CreateMeeting { .. }) => forbidden(INSUFFICIENT),
        (SuperAdmin, Action::SendMessage) => forbidden(INSUFFICIENT),
        (SuperAdmin, _) => Allow,

        (_, Action::ViewCompanies | Action::ListMessages | Action::ViewMeeting) => Allow,

        (CompanyAdmin, Action::UpdateCompany { company_id }) if own_tenant(Some(*company_id)) => Allow,
        (CompanyAdmin, Action::CreateUser { role: Employee, company_id }) => {
            if own_tenant(*company_id) {
                Allow
            } else {
                Deny(Denial::CrossTenant("Can only create employees for your company"))
            }
        }
        (CompanyAdmin, Action::BlockUser { target_company }) => {
            if own_tenant(*target_company) {
                Allow
            } else {
                Deny(Denial::CrossTenant("Can only manage users in your company"))
            }
        }
        (CompanyAdmin, Action::ListUsers) => Allow,
        (CompanyAdmin, Action::CreateMeeting { company_id }) if own_tenant(*company_id) => Allow,
        (CompanyAdmin, Action::MarkMessageRead { company_id, .. }) => {
            if own_tenant(Some(*company_id)) {
                Allow
            } else {
                Deny(Denial::CrossTenant("Can only manage messages in your company"))
            }
        }

        (Employee, Action::SendMessage) => Allow,
        (Employee, Action::MarkMessageRead { receiver_id, .. }) => {
            if *receiver_id == caller.user_id {
                Allow
            } else {
                forbidden("Can only mark your own messages as read")
            }
        }
        (Employee, Action::CreateUser { role: Employee, .. }) => {
            forbidden("Insufficient permissions to create employee accounts")
        }

        (_, Action::CreateUser { role: CompanyAdmin, .. }) => {
            forbidden("Only super admin can create company admin accounts")
        }
        (_, Action::CreateUser { role: SuperAdmin, .. }) => {
            forbidden("Only super admin can create super admin accounts")
        }

        _ => forbidden(INSUFFICIENT),
    }
}

/// [`authorize`], as a `Result` handlers can `?`.
pub fn require(caller: Option<&Identity>, action: &Action) -> Result<(), AppError> {
    match authorize(caller, action) {
        Decision::Allow => Ok(()),
        Decision::Deny(denial) => Err(denial.into()),
    }
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => AppError::Unauthenticated,
            Denial::Forbidden(msg) | Denial::CrossTenant(msg) => AppError::Forbidden(msg.to_string()),
        }
    }
}
