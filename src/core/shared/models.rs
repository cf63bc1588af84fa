use diesel::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::enums::{AssessmentStatus, AssessorType, CafProfile, ReviewStatus, Role};
pub use super::schema;

use super::schema::{assessors, organisations, systems, user_profiles, users};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = organisations)]
pub struct Organisation {
    pub id: i64,
    pub name: String,
    pub reference: Option<String>,
    pub organisation_type: Option<String>,
    pub parent_organisation_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = systems)]
pub struct System {
    pub id: i64,
    pub organisation_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub last_assessed: Option<String>,
    pub hosting_type: Vec<String>,
    pub corporate_services: Vec<String>,
}

/// Local record of an SSO identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = user_profiles)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    pub organisation_id: i64,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = assessors)]
pub struct DbAssessor {
    pub id: i64,
    pub organisation_id: i64,
    pub name: String,
    pub email: String,
    pub contact_name: String,
    pub address: String,
    pub phone_number: String,
    pub assessor_type: AssessorType,
    pub is_active: bool,
}

/// An assessing body together with the profiles that act for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessor {
    pub id: i64,
    pub organisation_id: i64,
    pub name: String,
    pub email: String,
    pub contact_name: String,
    pub address: String,
    pub phone_number: String,
    pub assessor_type: AssessorType,
    pub is_active: bool,
    pub members: Vec<i64>,
}

impl Assessor {
    pub fn from_db(db: DbAssessor, members: Vec<i64>) -> Self {
        Self {
            id: db.id,
            organisation_id: db.organisation_id,
            name: db.name,
            email: db.email,
            contact_name: db.contact_name,
            address: db.address,
            phone_number: db.phone_number,
            assessor_type: db.assessor_type,
            is_active: db.is_active,
            members,
        }
    }

    pub fn has_member(&self, profile_id: i64) -> bool {
        self.members.contains(&profile_id)
    }

    /// Multi-line contact block copied into review snapshots.
    pub fn contact_block(&self) -> String {
        [
            self.name.as_str(),
            self.contact_name.as_str(),
            self.address.as_str(),
            self.phone_number.as_str(),
            self.email.as_str(),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assessor_contact_block() {
        let assessor = Assessor {
            id: 1,
            organisation_id: 1,
            name: "Acme Assurance Ltd".into(),
            email: "assessor@example.com".into(),
            contact_name: "Jane Doe".into(),
            address: "1 High St, London".into(),
            phone_number: "0123456789".into(),
            assessor_type: AssessorType::Independent,
            is_active: true,
            members: vec![3, 4],
        };

        let block = assessor.contact_block();
        assert!(block.starts_with("Acme Assurance Ltd\nJane Doe"));
        assert!(block.ends_with("assessor@example.com"));
        assert!(assessor.has_member(4));
        assert!(!assessor.has_member(5));
    }
}
