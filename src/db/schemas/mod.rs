//! Database schemas for the HDB gateway
//!
//! MongoDB document structures for devices, companies, users and settings.

mod company;
mod device;
mod device_log;
mod license;
mod metadata;
mod settings;
mod user;

pub use company::{
    CompanyDoc, CompanyGroupDoc, GroupMember, RoleDoc, ShareGroupDoc, COMPANY_COLLECTION,
    COMPANY_GROUP_COLLECTION, ROLE_COLLECTION, SHARE_GROUP_COLLECTION,
};
pub use device::{
    DeviceDoc, DeviceParentDoc, OwnerType, DEVICE_COLLECTION, DEVICE_PARENT_COLLECTION,
};
pub use device_log::{
    DeviceErrorDoc, DeviceEventDoc, DEVICE_ERROR_COLLECTION, DEVICE_EVENT_COLLECTION,
};
pub use license::{LicenseDoc, LICENSE_COLLECTION};
pub use metadata::{Metadata, TIMESTAMP_FORMAT};
pub use settings::{HdbSettingsDoc, OnBehalfDoc, HDB_SETTINGS_COLLECTION, ON_BEHALF_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};
