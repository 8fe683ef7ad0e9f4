//! Demo tenant for local development.

use anyhow::Result;
use tracing::info;

use huddle_crypto::CredentialStore;
use huddle_db::Database;
use huddle_db::models::{NewCompany, NewUser};
use huddle_types::models::Role;

pub const SUPER_ADMIN_EMAIL: &str = "superadmin@system.com";

struct DemoUser {
    email: &'static str,
    password: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    role: Role,
}

const ADMIN: DemoUser = DemoUser {
    email: "admin@techsolutions.com",
    password: "admin123",
    first_name: "Company",
    last_name: "Admin",
    role: Role::CompanyAdmin,
};

const EMPLOYEES: &[DemoUser] = &[
    DemoUser {
        email: "john.doe@techsolutions.com",
        password: "employee123",
        first_name: "John",
        last_name: "Doe",
        role: Role::Employee,
    },
    DemoUser {
        email: "jane.smith@techsolutions.com",
        password: "employee123",
        first_name: "Jane",
        last_name: "Smith",
        role: Role::Employee,
    },
];

fn create(
    db: &Database,
    credentials: &CredentialStore,
    user: &DemoUser,
    company_id: Option<i64>,
    created_by: Option<i64>,
) -> Result<i64> {
    let row = db.create_user(&NewUser {
        email: user.email.into(),
        password_hash: credentials.hash(user.password)?,
        role: user.role,
        company_id,
        first_name: user.first_name.into(),
        last_name: user.last_name.into(),
        is_active: true,
        created_by,
    })?;
    info!("Seeded {} {}", row.role, row.email);
    Ok(row.id)
}

/// Create the demo company, its admin, two employees and the super admin.
/// Returns `false` without touching anything if the super admin exists.
pub fn seed_demo(db: &Database, credentials: &CredentialStore) -> Result<bool> {
    if db.get_user_by_email(SUPER_ADMIN_EMAIL)?.is_some() {
        info!("Seed data already present, skipping");
        return Ok(false);
    }

    let company = db.create_company(&NewCompany {
        name: "Tech Solutions Inc.".into(),
        description: Some("Technology consulting company".into()),
        is_active: true,
        created_by: None,
    })?;
    info!("Seeded company {} '{}'", company.id, company.name);

    let super_admin = create(
        db,
        credentials,
        &DemoUser {
            email: SUPER_ADMIN_EMAIL,
            password: "admin123",
            first_name: "Super",
            last_name: "Admin",
            role: Role::SuperAdmin,
        },
        None,
        None,
    )?;
    let admin = create(db, credentials, &ADMIN, Some(company.id), Some(super_admin))?;
    for employee in EMPLOYEES {
        create(db, credentials, employee, Some(company.id), Some(admin))?;
    }

    Ok(true)
}
