//! Companies, company groups, share groups and roles

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

pub const COMPANY_COLLECTION: &str = "cloud_companies";
pub const COMPANY_GROUP_COLLECTION: &str = "cloud_company_groups";
pub const SHARE_GROUP_COLLECTION: &str = "iot_share_groups";
pub const ROLE_COLLECTION: &str = "cloud_user_roles";

fn name_index(index_name: &str) -> Vec<(Document, Option<IndexOptions>)> {
    vec![(
        doc! { "name": 1 },
        Some(
            IndexOptions::builder()
                .unique(true)
                .name(index_name.to_string())
                .build(),
        ),
    )]
}

fn default_true() -> bool {
    true
}

/// Company document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CompanyDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    #[serde(default)]
    pub comp_name: String,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Administrator username
    #[serde(default)]
    pub admin: Option<String>,

    /// Domain used as the root of device HDB paths
    #[serde(default)]
    pub domain: Option<String>,
}

impl CompanyDoc {
    pub fn new(name: &str, admin: Option<&str>, domain: Option<&str>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name: name.to_string(),
            comp_name: name.to_string(),
            full_name: None,
            enabled: true,
            admin: admin.map(str::to_string),
            domain: domain.map(str::to_string),
        }
    }
}

impl IntoIndexes for CompanyDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        let mut indices = name_index("company_name_unique");
        indices.push((
            doc! { "admin": 1 },
            Some(
                IndexOptions::builder()
                    .name("company_admin_index".to_string())
                    .build(),
            ),
        ));
        indices
    }
}

impl MutMetadata for CompanyDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Membership of a user in a company group
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GroupMember {
    pub user: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Company group document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CompanyGroupDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    #[serde(default)]
    pub group_name: String,

    pub company: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub users: Vec<GroupMember>,
}

impl CompanyGroupDoc {
    pub fn new(name: &str, group_name: &str, company: &str) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name: name.to_string(),
            group_name: group_name.to_string(),
            company: company.to_string(),
            enabled: true,
            description: None,
            users: Vec::new(),
        }
    }

    pub fn with_member(mut self, user: &str, role: Option<&str>) -> Self {
        self.users.push(GroupMember {
            user: user.to_string(),
            role: role.map(str::to_string),
        });
        self
    }

    pub fn member(&self, user: &str) -> Option<&GroupMember> {
        self.users.iter().find(|m| m.user == user)
    }
}

impl IntoIndexes for CompanyGroupDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        let mut indices = name_index("group_name_unique");
        indices.push((
            doc! { "company": 1 },
            Some(
                IndexOptions::builder()
                    .name("group_company_index".to_string())
                    .build(),
            ),
        ));
        indices.push((
            doc! { "users.user": 1 },
            Some(
                IndexOptions::builder()
                    .name("group_member_index".to_string())
                    .build(),
            ),
        ));
        indices
    }
}

impl MutMetadata for CompanyGroupDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Devices shared with a set of users outside the owning company
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ShareGroupDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    /// Company that shares the devices
    #[serde(default)]
    pub company: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub users: Vec<String>,

    #[serde(default)]
    pub devices: Vec<String>,
}

impl IntoIndexes for ShareGroupDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        let mut indices = name_index("share_group_name_unique");
        indices.push((
            doc! { "users": 1 },
            Some(
                IndexOptions::builder()
                    .name("share_group_user_index".to_string())
                    .build(),
            ),
        ));
        indices
    }
}

impl MutMetadata for ShareGroupDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// User role with its permission names
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RoleDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    #[serde(default)]
    pub permissions: Vec<String>,
}

impl IntoIndexes for RoleDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        name_index("role_name_unique")
    }
}

impl MutMetadata for RoleDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
