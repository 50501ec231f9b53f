//! Store tests against a live database.
//!
//! Run with: DATABASE_URL="postgresql:///entity_registry_test" cargo test -p entity_postgres -- --ignored

use entity_core::error::EntityError;
use entity_core::filter::{EntityFilter, EntityTypeFilter, EntityUpdate, FindOptions};
use entity_core::ports::{EntityStore, EntityTypeStore, UserRoleStore};
use entity_core::search::{Page, SearchQuery};
use entity_core::types::{MetaInformation, NewEntity, NewEntityType, NewUserRoleExtension, RoleStatus};
use entity_postgres::{migrate, PgStores};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn stores() -> PgStores {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("failed to connect to test database");
    migrate(&pool).await.expect("migration failed");
    PgStores::new(pool)
}

/// Fresh tenant per test so runs never collide.
fn tenant() -> String {
    format!("test-{}", Uuid::new_v4())
}

fn new_entity(tenant: &str, ty: &str, ext: &str, name: &str) -> NewEntity {
    NewEntity {
        entity_type: Some(ty.into()),
        entity_type_id: None,
        meta_information: MetaInformation::new(ext, name),
        registry_details: Default::default(),
        tenant_id: tenant.into(),
        org_id: "o1".into(),
        created_by: "tester".into(),
    }
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn duplicate_external_id_is_conflict_and_rolls_back() {
    let s = stores().await;
    let t = tenant();
    let err = s
        .entities
        .create(vec![
            new_entity(&t, "school", "S1", "One"),
            new_entity(&t, "school", "S1", "Again"),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, EntityError::Conflict(_)));

    let found = s
        .entities
        .find(&EntityFilter::tenant(&t), &FindOptions::default())
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn group_member_filter_uses_jsonb_containment() {
    let s = stores().await;
    let t = tenant();
    let created = s
        .entities
        .create(vec![
            new_entity(&t, "state", "ST", "State"),
            new_entity(&t, "district", "D1", "District"),
        ])
        .await
        .unwrap();
    let (state, district) = (&created[0], &created[1]);

    let mut update = EntityUpdate::default();
    update.add_to_group("district", &[district.id]);
    update.add_to_path(&["district".to_string()]);
    s.entities
        .update_one(&EntityFilter::by_id(&t, state.id), &update)
        .await
        .unwrap();

    let any = EntityFilter::tenant(&t).with_group_member(district.id, None);
    let found = s.entities.find(&any, &FindOptions::default()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, state.id);
    assert_eq!(found[0].group("district"), &[district.id]);

    let wrong_key = EntityFilter::tenant(&t).with_group_member(district.id, Some("school".into()));
    let found = s.entities.find(&wrong_key, &FindOptions::default()).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn update_many_unions_into_every_match() {
    let s = stores().await;
    let t = tenant();
    let created = s
        .entities
        .create(vec![
            new_entity(&t, "district", "D1", "One"),
            new_entity(&t, "district", "D2", "Two"),
            new_entity(&t, "district", "D3", "Three"),
        ])
        .await
        .unwrap();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let mut first = EntityUpdate::default();
    first.add_to_group("block", &[a]);
    s.entities
        .update_one(&EntityFilter::by_id(&t, created[0].id), &first)
        .await
        .unwrap();

    let mut update = EntityUpdate::default();
    update.add_to_group("block", &[a, b]);
    update.add_to_path(&["block".to_string()]);
    let filter = EntityFilter::tenant(&t).with_external_ids(vec!["D1".into(), "D2".into()]);
    assert_eq!(s.entities.update_many(&filter, &update).await.unwrap(), 2);
    assert_eq!(s.entities.update_many(&filter, &update).await.unwrap(), 2);

    let rows = s
        .entities
        .find(&EntityFilter::tenant(&t), &FindOptions::default())
        .await
        .unwrap();
    for row in &rows {
        if row.external_id() == "D3" {
            assert!(row.groups.is_empty());
        } else {
            assert_eq!(row.group("block"), &[a, b]);
            assert_eq!(row.child_hierarchy_path, vec!["block".to_string()]);
        }
    }
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn update_to_taken_external_id_is_conflict() {
    let s = stores().await;
    let t = tenant();
    let created = s
        .entities
        .create(vec![
            new_entity(&t, "school", "S1", "One"),
            new_entity(&t, "school", "S2", "Two"),
        ])
        .await
        .unwrap();
    let mut update = EntityUpdate::default();
    update.set_meta.insert("externalId".into(), "S1".into());
    let err = s
        .entities
        .update_one(&EntityFilter::by_id(&t, created[1].id), &update)
        .await
        .unwrap_err();
    assert!(matches!(err, EntityError::Conflict(_)));
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn search_counts_beyond_the_page() {
    let s = stores().await;
    let t = tenant();
    s.entities
        .create(vec![
            new_entity(&t, "school", "GHS-1", "Govt High School"),
            new_entity(&t, "school", "GHS-2", "Govt Girls School"),
            new_entity(&t, "school", "X-3", "Another"),
        ])
        .await
        .unwrap();

    let q = SearchQuery::new(&t, Page::new(1, 1).unwrap()).text("govt");
    let page = s.entities.search(&q).await.unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.count, 2);

    let q = SearchQuery::new(&t, Page::new(10, 1).unwrap()).text("X-");
    assert_eq!(s.entities.search(&q).await.unwrap().count, 1);

    let q = SearchQuery::new(&t, Page::new(1, 5).unwrap()).text("govt");
    let past_end = s.entities.search(&q).await.unwrap();
    assert!(past_end.data.is_empty());
    assert_eq!(past_end.count, 2);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn entity_type_name_is_unique_per_tenant() {
    let s = stores().await;
    let t = tenant();
    let ty = NewEntityType::new("school", &t, "o1");
    s.entity_types.create(ty.clone()).await.unwrap();
    let err = s.entity_types.create(ty).await.unwrap_err();
    assert!(matches!(err, EntityError::Conflict(_)));

    let found = s
        .entity_types
        .find(&EntityTypeFilter {
            tenant_id: Some(t.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn role_delete_then_delete_again_is_not_found() {
    let s = stores().await;
    let t = tenant();
    let role = s
        .roles
        .create(NewUserRoleExtension {
            user_role_id: 7,
            title: "head_master".into(),
            code: None,
            user_type: None,
            status: RoleStatus::Active,
            entity_types: vec![],
            tenant_id: t.clone(),
            org_id: "o1".into(),
            created_by: "tester".into(),
        })
        .await
        .unwrap();
    s.roles.delete(&t, role.id).await.unwrap();
    let err = s.roles.delete(&t, role.id).await.unwrap_err();
    assert!(matches!(err, EntityError::NotFound(_)));
}
