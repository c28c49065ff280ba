//! In-memory record store
//!
//! Used in dev mode when MongoDB is not reachable, and as the store behind
//! unit and integration tests. Can be seeded from a JSON file.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::auth::hash_password;
use crate::db::schemas::{
    CompanyDoc, CompanyGroupDoc, DeviceDoc, DeviceErrorDoc, DeviceEventDoc, LicenseDoc, Metadata,
    OwnerType, RoleDoc, ShareGroupDoc, UserDoc,
};
use crate::store::{collect_companies, DeviceStore, DirectoryStore, UserGroup};
use crate::types::{HdbError, Result};

/// Seed file contents for dev mode
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub companies: Vec<CompanyDoc>,
    pub company_groups: Vec<CompanyGroupDoc>,
    pub share_groups: Vec<ShareGroupDoc>,
    pub roles: Vec<RoleDoc>,
    /// Username -> plain-text password, hashed on load
    pub users: HashMap<String, String>,
    pub devices: Vec<DeviceDoc>,
    /// Child sn -> gateway sn
    pub device_parents: HashMap<String, String>,
    pub licenses: Vec<LicenseDoc>,
}

/// Store holding every record in concurrent maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: DashMap<String, DeviceDoc>,
    parents: DashMap<String, String>,
    licenses: DashMap<String, LicenseDoc>,
    errors: DashMap<String, DeviceErrorDoc>,
    events: DashMap<String, DeviceEventDoc>,
    companies: DashMap<String, CompanyDoc>,
    groups: DashMap<String, CompanyGroupDoc>,
    share_groups: DashMap<String, ShareGroupDoc>,
    roles: DashMap<String, RoleDoc>,
    users: DashMap<String, UserDoc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Result<Self> {
        let store = Self::new();
        for company in seed.companies {
            store.put_company(company);
        }
        for group in seed.company_groups {
            store.put_company_group(group);
        }
        for group in seed.share_groups {
            store.put_share_group(group);
        }
        for role in seed.roles {
            store.put_role(role);
        }
        for (name, password) in seed.users {
            store.put_user(UserDoc::new(name, hash_password(&password)?));
        }
        for device in seed.devices {
            store.put_device(device);
        }
        for (sn, parent) in seed.device_parents {
            store.set_parent(&sn, &parent);
        }
        for license in seed.licenses {
            store.put_license(license);
        }
        Ok(store)
    }

    /// Load a JSON seed file
    pub fn from_seed_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let seed: SeedData = serde_json::from_str(&raw)
            .map_err(|e| HdbError::Config(format!("Invalid seed file {}: {}", path.display(), e)))?;
        let store = Self::from_seed(seed)?;
        info!(
            "Seeded memory store from {}: {} companies, {} devices",
            path.display(),
            store.companies.len(),
            store.devices.len()
        );
        Ok(store)
    }

    pub fn put_company(&self, company: CompanyDoc) {
        self.companies.insert(company.name.clone(), company);
    }

    pub fn put_company_group(&self, group: CompanyGroupDoc) {
        self.groups.insert(group.name.clone(), group);
    }

    pub fn put_share_group(&self, group: ShareGroupDoc) {
        self.share_groups.insert(group.name.clone(), group);
    }

    pub fn put_role(&self, role: RoleDoc) {
        self.roles.insert(role.name.clone(), role);
    }

    pub fn put_user(&self, user: UserDoc) {
        self.users.insert(user.name.clone(), user);
    }

    pub fn put_device(&self, device: DeviceDoc) {
        self.devices.insert(device.sn.clone(), device);
    }

    pub fn set_parent(&self, sn: &str, parent: &str) {
        self.parents.insert(sn.to_string(), parent.to_string());
    }

    pub fn put_license(&self, license: LicenseDoc) {
        self.licenses.insert(license.name.clone(), license);
    }

    /// Stored error reports for a device
    pub fn errors_for(&self, device: &str) -> Vec<DeviceErrorDoc> {
        self.errors
            .iter()
            .filter(|e| e.device == device)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Stored events for a device
    pub fn events_for(&self, device: &str) -> Vec<DeviceEventDoc> {
        self.events
            .iter()
            .filter(|e| e.device == device)
            .map(|e| e.value().clone())
            .collect()
    }
}

fn sorted_by_name<T>(mut items: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| name(a).cmp(name(b)));
    items
}

#[async_trait::async_trait]
impl DeviceStore for MemoryStore {
    async fn get_device(&self, sn: &str) -> Result<Option<DeviceDoc>> {
        Ok(self.devices.get(sn).map(|d| d.value().clone()))
    }

    async fn insert_device(&self, mut device: DeviceDoc) -> Result<DeviceDoc> {
        match self.devices.entry(device.sn.clone()) {
            Entry::Occupied(_) => Err(HdbError::BadRequest(format!(
                "Device {} already exists",
                device.sn
            ))),
            Entry::Vacant(slot) => {
                device.metadata = Metadata::new();
                slot.insert(device.clone());
                Ok(device)
            }
        }
    }

    async fn save_device(&self, device: &DeviceDoc) -> Result<()> {
        match self.devices.get_mut(&device.sn) {
            Some(mut stored) => {
                let mut updated = device.clone();
                updated.metadata.touch();
                *stored = updated;
                Ok(())
            }
            None => Err(HdbError::device_not_found(&device.sn)),
        }
    }

    async fn devices_owned_by(&self, owner_type: OwnerType, owner_id: &str) -> Result<Vec<String>> {
        let mut sns: Vec<String> = self
            .devices
            .iter()
            .filter(|d| d.is_owned_by(owner_type, owner_id))
            .map(|d| d.sn.clone())
            .collect();
        sns.sort();
        Ok(sns)
    }

    async fn device_parent(&self, sn: &str) -> Result<Option<String>> {
        Ok(self.parents.get(sn).map(|p| p.value().clone()))
    }

    async fn insert_error(&self, mut error: DeviceErrorDoc) -> Result<DeviceErrorDoc> {
        error.metadata = Metadata::new();
        self.errors.insert(error.name.clone(), error.clone());
        Ok(error)
    }

    async fn insert_event(&self, mut event: DeviceEventDoc) -> Result<DeviceEventDoc> {
        event.metadata = Metadata::new();
        self.events.insert(event.name.clone(), event.clone());
        Ok(event)
    }

    async fn license_data(&self, sn: &str) -> Result<Option<String>> {
        Ok(self
            .licenses
            .get(sn)
            .filter(|l| l.enabled)
            .and_then(|l| l.license_data.clone()))
    }
}

#[async_trait::async_trait]
impl DirectoryStore for MemoryStore {
    async fn list_companies(&self) -> Result<Vec<CompanyDoc>> {
        let all = self.companies.iter().map(|c| c.value().clone()).collect();
        Ok(sorted_by_name(all, |c: &CompanyDoc| &c.name))
    }

    async fn get_company(&self, name: &str) -> Result<Option<CompanyDoc>> {
        Ok(self.companies.get(name).map(|c| c.value().clone()))
    }

    async fn list_company_groups(&self, company: &str) -> Result<Vec<CompanyGroupDoc>> {
        let groups = self
            .groups
            .iter()
            .filter(|g| g.company == company)
            .map(|g| g.value().clone())
            .collect();
        Ok(sorted_by_name(groups, |g: &CompanyGroupDoc| &g.name))
    }

    async fn get_company_group(&self, name: &str) -> Result<Option<CompanyGroupDoc>> {
        Ok(self.groups.get(name).map(|g| g.value().clone()))
    }

    async fn list_user_groups(&self, user: &str) -> Result<Vec<UserGroup>> {
        let groups = self
            .groups
            .iter()
            .filter_map(|g| UserGroup::for_member(g.value(), user))
            .collect();
        Ok(sorted_by_name(groups, |g: &UserGroup| &g.name))
    }

    async fn list_user_companies(&self, user: &str) -> Result<Vec<String>> {
        let groups = self.list_user_groups(user).await?;
        let administered: Vec<String> = self
            .companies
            .iter()
            .filter(|c| c.admin.as_deref() == Some(user))
            .map(|c| c.name.clone())
            .collect();
        Ok(collect_companies(&groups, administered))
    }

    async fn list_roles(&self) -> Result<Vec<String>> {
        let mut roles: Vec<String> = self.roles.iter().map(|r| r.name.clone()).collect();
        roles.sort();
        Ok(roles)
    }

    async fn list_role_permissions(&self, role: &str) -> Result<Vec<String>> {
        Ok(self
            .roles
            .get(role)
            .map(|r| r.permissions.clone())
            .unwrap_or_default())
    }

    async fn share_groups_for_user(&self, user: &str) -> Result<Vec<ShareGroupDoc>> {
        let groups = self
            .share_groups
            .iter()
            .filter(|g| g.users.iter().any(|u| u == user))
            .map(|g| g.value().clone())
            .collect();
        Ok(sorted_by_name(groups, |g: &ShareGroupDoc| &g.name))
    }

    async fn get_user(&self, name: &str) -> Result<Option<UserDoc>> {
        Ok(self.users.get(name).map(|u| u.value().clone()))
    }
}
