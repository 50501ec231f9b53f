//! User role extension CRUD.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::EntityError;
use crate::filter::{EntityTypeFilter, FindOptions, RoleFilter};
use crate::ports::{EntityTypeStore, Result, UserRoleStore};
use crate::principal::UserDetails;
use crate::proto::CreateRoleRequest;
use crate::types::{NewUserRoleExtension, RoleEntityType, UserRoleExtension, UserRoleExtensionPatch};

#[derive(Clone)]
pub struct RoleService {
    roles: Arc<dyn UserRoleStore>,
    entity_types: Arc<dyn EntityTypeStore>,
}

impl RoleService {
    pub fn new(roles: Arc<dyn UserRoleStore>, entity_types: Arc<dyn EntityTypeStore>) -> Self {
        Self { roles, entity_types }
    }

    pub async fn create(&self, user: &UserDetails, req: CreateRoleRequest) -> Result<UserRoleExtension> {
        if req.title.trim().is_empty() {
            return Err(EntityError::BadRequest("title is required".into()));
        }
        self.check_entity_types(user, &req.entity_types).await?;
        let role = self
            .roles
            .create(NewUserRoleExtension {
                user_role_id: req.user_role_id,
                title: req.title,
                code: req.code,
                user_type: req.user_type,
                status: req.status.unwrap_or_default(),
                entity_types: req.entity_types,
                tenant_id: user.tenant_id.clone(),
                org_id: user.org_id.clone(),
                created_by: user.user_id.clone(),
            })
            .await?;
        tracing::info!(tenant = %user.tenant_id, role = %role.title, "user role extension created");
        Ok(role)
    }

    pub async fn update(&self, user: &UserDetails, id: Uuid, patch: UserRoleExtensionPatch) -> Result<UserRoleExtension> {
        if let Some(types) = &patch.entity_types {
            self.check_entity_types(user, types).await?;
        }
        self.roles.update(&user.tenant_id, id, &patch, &user.user_id).await
    }

    /// `NotFound` when nothing matches.
    pub async fn find(&self, user: &UserDetails, mut filter: RoleFilter) -> Result<Vec<UserRoleExtension>> {
        filter.tenant_id = Some(user.tenant_id.clone());
        let roles = self.roles.find(&filter, &FindOptions::default()).await?;
        if roles.is_empty() {
            return Err(EntityError::NotFound("no user role extensions matched".into()));
        }
        Ok(roles)
    }

    pub async fn delete(&self, user: &UserDetails, id: Uuid) -> Result<()> {
        self.roles.delete(&user.tenant_id, id).await
    }

    /// Each `{entityType, entityTypeId}` must name one live type.
    async fn check_entity_types(&self, user: &UserDetails, types: &[RoleEntityType]) -> Result<()> {
        for t in types {
            let filter = EntityTypeFilter::tenant(user.tenant_id.as_str())
                .with_ids(vec![t.entity_type_id])
                .with_names(vec![t.entity_type.clone()]);
            match self.entity_types.find_one(&filter).await {
                Ok(_) => {}
                Err(EntityError::NotFound(_)) => {
                    return Err(EntityError::BadRequest(format!(
                        "EntityType '{}' with ID '{}' does not exist.",
                        t.entity_type, t.entity_type_id
                    )));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{user, Fixture};
    use crate::types::RoleStatus;

    fn service(f: &Fixture) -> RoleService {
        RoleService::new(f.stores.roles.clone(), f.stores.entity_types.clone())
    }

    fn request(types: Vec<RoleEntityType>) -> CreateRoleRequest {
        CreateRoleRequest {
            user_role_id: 7,
            title: "district_education_officer".into(),
            code: Some("DEO".into()),
            user_type: Some(1),
            status: None,
            entity_types: types,
        }
    }

    #[tokio::test]
    async fn create_validates_entity_types() {
        let f = Fixture::new();
        let district = f.entity_type("district", &[], false).await;
        let svc = service(&f);

        let ok = svc
            .create(
                &user(),
                request(vec![RoleEntityType {
                    entity_type: "district".into(),
                    entity_type_id: district.id,
                }]),
            )
            .await
            .unwrap();
        assert_eq!(ok.status, RoleStatus::Active);

        let err = svc
            .create(
                &user(),
                request(vec![RoleEntityType {
                    entity_type: "state".into(),
                    entity_type_id: district.id,
                }]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::BadRequest(m) if m.contains("'state'")));
    }

    #[tokio::test]
    async fn find_update_delete() {
        let f = Fixture::new();
        let svc = service(&f);
        let role = svc.create(&user(), request(vec![])).await.unwrap();

        let updated = svc
            .update(
                &user(),
                role.id,
                UserRoleExtensionPatch {
                    status: Some(RoleStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, RoleStatus::Inactive);

        let found = svc
            .find(
                &user(),
                RoleFilter {
                    user_role_ids: Some(vec![7]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        svc.delete(&user(), role.id).await.unwrap();
        assert!(matches!(
            svc.find(&user(), RoleFilter::default()).await,
            Err(EntityError::NotFound(_))
        ));
        assert!(matches!(
            svc.delete(&user(), role.id).await,
            Err(EntityError::NotFound(_))
        ));
    }
}
