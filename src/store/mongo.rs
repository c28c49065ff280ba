//! MongoDB-backed record store

use bson::doc;
use tracing::debug;

use crate::db::schemas::{
    CompanyDoc, CompanyGroupDoc, DeviceDoc, DeviceErrorDoc, DeviceEventDoc, DeviceParentDoc,
    LicenseDoc, OwnerType, RoleDoc, ShareGroupDoc, UserDoc, COMPANY_COLLECTION,
    COMPANY_GROUP_COLLECTION, DEVICE_COLLECTION, DEVICE_ERROR_COLLECTION, DEVICE_EVENT_COLLECTION,
    DEVICE_PARENT_COLLECTION, LICENSE_COLLECTION, ROLE_COLLECTION, SHARE_GROUP_COLLECTION,
    USER_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::store::{collect_companies, DeviceStore, DirectoryStore, UserGroup};
use crate::types::{HdbError, Result};

#[derive(Clone)]
pub struct MongoStore {
    devices: MongoCollection<DeviceDoc>,
    parents: MongoCollection<DeviceParentDoc>,
    licenses: MongoCollection<LicenseDoc>,
    errors: MongoCollection<DeviceErrorDoc>,
    events: MongoCollection<DeviceEventDoc>,
    companies: MongoCollection<CompanyDoc>,
    groups: MongoCollection<CompanyGroupDoc>,
    share_groups: MongoCollection<ShareGroupDoc>,
    roles: MongoCollection<RoleDoc>,
    users: MongoCollection<UserDoc>,
}

impl MongoStore {
    /// Open every collection, creating indexes as needed
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            devices: client.collection(DEVICE_COLLECTION).await?,
            parents: client.collection(DEVICE_PARENT_COLLECTION).await?,
            licenses: client.collection(LICENSE_COLLECTION).await?,
            errors: client.collection(DEVICE_ERROR_COLLECTION).await?,
            events: client.collection(DEVICE_EVENT_COLLECTION).await?,
            companies: client.collection(COMPANY_COLLECTION).await?,
            groups: client.collection(COMPANY_GROUP_COLLECTION).await?,
            share_groups: client.collection(SHARE_GROUP_COLLECTION).await?,
            roles: client.collection(ROLE_COLLECTION).await?,
            users: client.collection(USER_COLLECTION).await?,
        })
    }
}

#[async_trait::async_trait]
impl DeviceStore for MongoStore {
    async fn get_device(&self, sn: &str) -> Result<Option<DeviceDoc>> {
        self.devices.find_one(doc! { "sn": sn }).await
    }

    async fn insert_device(&self, mut device: DeviceDoc) -> Result<DeviceDoc> {
        if self.sn_exists(&device.sn).await? {
            return Err(HdbError::BadRequest(format!(
                "Device {} already exists",
                device.sn
            )));
        }
        let id = self.devices.insert_one(device.clone()).await?;
        debug!("Inserted device {} as {}", device.sn, id);
        device._id = Some(id);
        Ok(device)
    }

    async fn save_device(&self, device: &DeviceDoc) -> Result<()> {
        let matched = self
            .devices
            .replace_one(doc! { "sn": &device.sn }, device.clone())
            .await?;
        if matched {
            Ok(())
        } else {
            Err(HdbError::device_not_found(&device.sn))
        }
    }

    async fn devices_owned_by(&self, owner_type: OwnerType, owner_id: &str) -> Result<Vec<String>> {
        let devices = self
            .devices
            .find_many(
                doc! { "owner_type": owner_type.as_str(), "owner_id": owner_id },
                doc! { "sn": 1 },
            )
            .await?;
        Ok(devices.into_iter().map(|d| d.sn).collect())
    }

    async fn device_parent(&self, sn: &str) -> Result<Option<String>> {
        Ok(self
            .parents
            .find_one(doc! { "sn": sn })
            .await?
            .map(|p| p.parent))
    }

    async fn insert_error(&self, mut error: DeviceErrorDoc) -> Result<DeviceErrorDoc> {
        error._id = Some(self.errors.insert_one(error.clone()).await?);
        Ok(error)
    }

    async fn insert_event(&self, mut event: DeviceEventDoc) -> Result<DeviceEventDoc> {
        event._id = Some(self.events.insert_one(event.clone()).await?);
        Ok(event)
    }

    async fn license_data(&self, sn: &str) -> Result<Option<String>> {
        Ok(self
            .licenses
            .find_one(doc! { "name": sn, "enabled": true })
            .await?
            .and_then(|l| l.license_data))
    }
}

#[async_trait::async_trait]
impl DirectoryStore for MongoStore {
    async fn list_companies(&self) -> Result<Vec<CompanyDoc>> {
        self.companies.find_many(doc! {}, doc! { "name": 1 }).await
    }

    async fn get_company(&self, name: &str) -> Result<Option<CompanyDoc>> {
        self.companies.find_one(doc! { "name": name }).await
    }

    async fn list_company_groups(&self, company: &str) -> Result<Vec<CompanyGroupDoc>> {
        self.groups
            .find_many(doc! { "company": company }, doc! { "name": 1 })
            .await
    }

    async fn get_company_group(&self, name: &str) -> Result<Option<CompanyGroupDoc>> {
        self.groups.find_one(doc! { "name": name }).await
    }

    async fn list_user_groups(&self, user: &str) -> Result<Vec<UserGroup>> {
        let groups = self
            .groups
            .find_many(doc! { "users.user": user }, doc! { "name": 1 })
            .await?;
        Ok(groups
            .iter()
            .filter_map(|g| UserGroup::for_member(g, user))
            .collect())
    }

    async fn list_user_companies(&self, user: &str) -> Result<Vec<String>> {
        let groups = self.list_user_groups(user).await?;
        let administered = self
            .companies
            .find_many(doc! { "admin": user }, doc! { "name": 1 })
            .await?
            .into_iter()
            .map(|c| c.name);
        Ok(collect_companies(&groups, administered))
    }

    async fn list_roles(&self) -> Result<Vec<String>> {
        let roles = self.roles.find_many(doc! {}, doc! { "name": 1 }).await?;
        Ok(roles.into_iter().map(|r| r.name).collect())
    }

    async fn list_role_permissions(&self, role: &str) -> Result<Vec<String>> {
        Ok(self
            .roles
            .find_one(doc! { "name": role })
            .await?
            .map(|r| r.permissions)
            .unwrap_or_default())
    }

    async fn share_groups_for_user(&self, user: &str) -> Result<Vec<ShareGroupDoc>> {
        self.share_groups
            .find_many(doc! { "users": user }, doc! { "name": 1 })
            .await
    }

    async fn get_user(&self, name: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "name": name }).await
    }
}
