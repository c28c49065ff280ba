//! Companies, groups, roles and HDB login

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{password_matches, AuthorizedSession, JwtValidator};
use crate::db::schemas::{CompanyDoc, CompanyGroupDoc};
use crate::store::{DirectoryStore, UserGroup};
use crate::types::{HdbError, Result};

const LOGIN_MISMATCH: &str = "Username password is not matched!";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyInfo {
    pub name: String,
    pub comp_name: String,
    pub full_name: Option<String>,
    pub enabled: bool,
    pub admin: Option<String>,
    pub domain: Option<String>,
    pub creation: Option<String>,
    pub modified: Option<String>,
}

impl From<CompanyDoc> for CompanyInfo {
    fn from(doc: CompanyDoc) -> Self {
        Self {
            creation: doc.metadata.creation(),
            modified: doc.metadata.modified(),
            name: doc.name,
            comp_name: doc.comp_name,
            full_name: doc.full_name,
            enabled: doc.enabled,
            admin: doc.admin,
            domain: doc.domain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyGroupInfo {
    pub name: String,
    pub group_name: String,
    pub enabled: bool,
    pub description: Option<String>,
    pub creation: Option<String>,
    pub modified: Option<String>,
}

impl From<CompanyGroupDoc> for CompanyGroupInfo {
    fn from(doc: CompanyGroupDoc) -> Self {
        Self {
            creation: doc.metadata.creation(),
            modified: doc.metadata.modified(),
            name: doc.name,
            group_name: doc.group_name,
            enabled: doc.enabled,
            description: doc.description,
        }
    }
}

/// Result of a successful HDB login
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginResponse {
    pub user: String,
    pub companies: Vec<String>,
    /// Bearer token for follow-up requests as `user`
    pub token: String,
}

pub struct DirectoryService {
    store: Arc<dyn DirectoryStore>,
    jwt: Arc<JwtValidator>,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn DirectoryStore>, jwt: Arc<JwtValidator>) -> Self {
        Self { store, jwt }
    }

    pub async fn list_companies(&self, _session: &AuthorizedSession) -> Result<Vec<CompanyInfo>> {
        let companies = self.store.list_companies().await?;
        Ok(companies.into_iter().map(CompanyInfo::from).collect())
    }

    pub async fn list_company_groups(
        &self,
        _session: &AuthorizedSession,
        company: &str,
    ) -> Result<Vec<CompanyGroupInfo>> {
        let groups = self.store.list_company_groups(company).await?;
        Ok(groups.into_iter().map(CompanyGroupInfo::from).collect())
    }

    pub async fn list_user_groups(
        &self,
        _session: &AuthorizedSession,
        user: &str,
    ) -> Result<Vec<UserGroup>> {
        self.store.list_user_groups(user).await
    }

    pub async fn list_roles(&self, _session: &AuthorizedSession) -> Result<Vec<String>> {
        self.store.list_roles().await
    }

    pub async fn list_role_permissions(
        &self,
        _session: &AuthorizedSession,
        role: &str,
    ) -> Result<Vec<String>> {
        self.store.list_role_permissions(role).await
    }

    /// Check a username and password on behalf of an HDB application.
    ///
    /// When either argument is missing both are taken from the request
    /// parameters `user` and `passwd`.
    pub async fn login(
        &self,
        session: &AuthorizedSession,
        user: Option<&str>,
        passwd: Option<&str>,
    ) -> Result<LoginResponse> {
        let (user, passwd) = match (user.filter(|u| !u.is_empty()), passwd.filter(|p| !p.is_empty())) {
            (Some(user), Some(passwd)) => (Some(user), Some(passwd)),
            _ => (session.param_str("user"), session.param_str("passwd")),
        };
        let (user, passwd) = match (user, passwd) {
            (Some(user), Some(passwd)) => (user, passwd),
            _ => return Err(HdbError::Unauthorized(LOGIN_MISMATCH.into())),
        };
        debug!("HDB checking login for user {}", user);

        let matched = match self.store.get_user(user).await? {
            Some(record) => password_matches(&record, passwd),
            None => false,
        };
        if !matched {
            return Err(HdbError::Unauthorized(LOGIN_MISMATCH.into()));
        }

        let companies = self.store.list_user_companies(user).await?;
        let token = self.jwt.generate_token(user)?;
        info!(user = %user, "HDB login succeeded");

        Ok(LoginResponse {
            user: user.to_string(),
            companies,
            token,
        })
    }
}
