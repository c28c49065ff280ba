//! Record storage behind the HDB operations
//!
//! Operations talk to two traits, one for device records and one for the
//! company/user directory. `MemoryStore` backs dev mode and tests,
//! `MongoStore` backs production.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use serde::Serialize;

use crate::db::schemas::{
    CompanyDoc, CompanyGroupDoc, DeviceDoc, DeviceErrorDoc, DeviceEventDoc, OwnerType,
    ShareGroupDoc, UserDoc,
};
use crate::types::Result;

/// A company group as seen from one of its members
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserGroup {
    /// Group identifier
    pub name: String,
    /// The member's role inside the group
    pub role: Option<String>,
    pub group_name: String,
    /// Company the group belongs to
    #[serde(skip)]
    pub company: String,
}

impl UserGroup {
    pub fn for_member(group: &CompanyGroupDoc, user: &str) -> Option<Self> {
        group.member(user).map(|m| Self {
            name: group.name.clone(),
            role: m.role.clone(),
            group_name: group.group_name.clone(),
            company: group.company.clone(),
        })
    }
}

/// Device records, their parents, licenses, errors and events
#[async_trait::async_trait]
pub trait DeviceStore: Send + Sync {
    async fn get_device(&self, sn: &str) -> Result<Option<DeviceDoc>>;

    async fn sn_exists(&self, sn: &str) -> Result<bool> {
        Ok(self.get_device(sn).await?.is_some())
    }

    /// Insert a new device; fails when the serial number is taken
    async fn insert_device(&self, device: DeviceDoc) -> Result<DeviceDoc>;

    /// Persist changes to an existing device
    async fn save_device(&self, device: &DeviceDoc) -> Result<()>;

    /// Serial numbers of devices held by an owner
    async fn devices_owned_by(&self, owner_type: OwnerType, owner_id: &str) -> Result<Vec<String>>;

    /// Gateway device a child device reports through
    async fn device_parent(&self, sn: &str) -> Result<Option<String>>;

    async fn insert_error(&self, error: DeviceErrorDoc) -> Result<DeviceErrorDoc>;

    async fn insert_event(&self, event: DeviceEventDoc) -> Result<DeviceEventDoc>;

    /// License payload of an enabled license for `sn`
    async fn license_data(&self, sn: &str) -> Result<Option<String>>;
}

/// Companies, groups, roles and users
#[async_trait::async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn list_companies(&self) -> Result<Vec<CompanyDoc>>;

    async fn get_company(&self, name: &str) -> Result<Option<CompanyDoc>>;

    async fn list_company_groups(&self, company: &str) -> Result<Vec<CompanyGroupDoc>>;

    async fn get_company_group(&self, name: &str) -> Result<Option<CompanyGroupDoc>>;

    /// Company groups `user` is a member of
    async fn list_user_groups(&self, user: &str) -> Result<Vec<UserGroup>>;

    /// Companies `user` administers or belongs to through a group,
    /// sorted and without duplicates
    async fn list_user_companies(&self, user: &str) -> Result<Vec<String>>;

    async fn list_roles(&self) -> Result<Vec<String>>;

    async fn list_role_permissions(&self, role: &str) -> Result<Vec<String>>;

    /// Share groups listing `user` as a member
    async fn share_groups_for_user(&self, user: &str) -> Result<Vec<ShareGroupDoc>>;

    async fn get_user(&self, name: &str) -> Result<Option<UserDoc>>;
}

/// Merge group companies and administered companies into a sorted set
pub(crate) fn collect_companies(
    groups: &[UserGroup],
    administered: impl IntoIterator<Item = String>,
) -> Vec<String> {
    let mut companies: Vec<String> = groups
        .iter()
        .map(|g| g.company.clone())
        .chain(administered)
        .collect();
    companies.sort();
    companies.dedup();
    companies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_group_for_member() {
        let group = CompanyGroupDoc::new("G-1", "Operators", "ACME").with_member("alice", Some("Admin"));

        let ug = UserGroup::for_member(&group, "alice").unwrap();
        assert_eq!(ug.name, "G-1");
        assert_eq!(ug.role.as_deref(), Some("Admin"));
        assert_eq!(ug.company, "ACME");
        assert!(UserGroup::for_member(&group, "bob").is_none());
    }

    #[test]
    fn test_collect_companies_sorted_unique() {
        let g = |company: &str| UserGroup {
            name: "g".into(),
            role: None,
            group_name: "g".into(),
            company: company.into(),
        };
        let companies = collect_companies(&[g("Zeta"), g("ACME"), g("Zeta")], vec!["ACME".to_string(), "Beta".to_string()]);
        assert_eq!(companies, vec!["ACME", "Beta", "Zeta"]);
    }

    #[test]
    fn test_user_group_json_hides_company() {
        let group = CompanyGroupDoc::new("G-1", "Operators", "ACME").with_member("alice", None);
        let json = serde_json::to_value(UserGroup::for_member(&group, "alice").unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "G-1", "role": null, "group_name": "Operators"})
        );
    }
}
