//! End-to-end properties of the hierarchy engines over the in-memory stores.

use entity_core::bulk::{parse_csv, MappingBuilder};
use entity_core::catalog::Catalog;
use entity_core::error::EntityError;
use entity_core::filter::{EntityFilter, FindOptions};
use entity_core::hierarchy::{AttachOutcome, HierarchyMutator, HierarchyQuery};
use entity_core::memory::InMemoryStores;
use entity_core::ports::{EntityStore, EntityTypeStore};
use entity_core::search::Page;
use entity_core::types::{Entity, EntityType, MetaInformation, NewEntity, NewEntityType};
use entity_core::UserDetails;
use serde_json::Map;

const TENANT: &str = "shikshalokam";

struct Registry {
    stores: InMemoryStores,
    mutator: HierarchyMutator,
    query: HierarchyQuery,
    mapping: MappingBuilder,
}

impl Registry {
    fn new() -> Self {
        let stores = InMemoryStores::new();
        let catalog = Catalog::new(stores.entity_types.clone());
        let mutator = HierarchyMutator::new(stores.entities.clone(), catalog.clone());
        let query = HierarchyQuery::new(stores.entities.clone(), stores.roles.clone(), catalog);
        let mapping = MappingBuilder::new(stores.entities.clone(), mutator.clone()).with_concurrency(8);
        Self {
            stores,
            mutator,
            query,
            mapping,
        }
    }

    async fn ty(&self, name: &str, children: &[&str], propagate: bool) -> EntityType {
        let mut t = NewEntityType::new(name, TENANT, "1");
        t.immediate_children_entity_type = children.iter().map(|s| s.to_string()).collect();
        t.to_be_mapped_to_parent_entities = propagate;
        self.stores.entity_types.create(t).await.unwrap()
    }

    async fn node(&self, ty: &EntityType, ext: &str) -> Entity {
        self.stores
            .entities
            .create(vec![NewEntity {
                entity_type: Some(ty.name.clone()),
                entity_type_id: Some(ty.id),
                meta_information: MetaInformation::new(ext, format!("{ext} name")),
                registry_details: Map::new(),
                tenant_id: TENANT.into(),
                org_id: "1".into(),
                created_by: "admin".into(),
            }])
            .await
            .unwrap()
            .remove(0)
    }

    async fn get(&self, e: &Entity) -> Entity {
        self.stores
            .entities
            .find_one(&EntityFilter::by_id(TENANT, e.id))
            .await
            .unwrap()
    }

    async fn all(&self) -> Vec<Entity> {
        self.stores
            .entities
            .find(&EntityFilter::tenant(TENANT), &FindOptions::default())
            .await
            .unwrap()
    }
}

fn admin() -> UserDetails {
    UserDetails {
        user_id: "admin".into(),
        tenant_id: TENANT.into(),
        org_id: "1".into(),
        roles: vec!["admin".into()],
    }
}

#[tokio::test]
async fn attach_is_idempotent() {
    let r = Registry::new();
    let state = r.ty("state", &["district"], false).await;
    let district = r.ty("district", &[], false).await;
    let mh = r.node(&state, "MH").await;
    let pune = r.node(&district, "PUNE").await;

    r.mutator.attach_child(&admin(), mh.id, pune.id, None).await.unwrap();
    let once = r.get(&mh).await;
    r.mutator.attach_child(&admin(), mh.id, pune.id, None).await.unwrap();
    let twice = r.get(&mh).await;

    assert_eq!(once.groups, twice.groups);
    assert_eq!(once.child_hierarchy_path, twice.child_hierarchy_path);
    assert_eq!(twice.group("district"), &[pune.id]);
}

#[tokio::test]
async fn bottom_up_chain_is_transitive() {
    let r = Registry::new();
    let state = r.ty("state", &["district"], true).await;
    let district = r.ty("district", &["block"], true).await;
    let block = r.ty("block", &[], true).await;
    let mh = r.node(&state, "MH").await;
    let pune = r.node(&district, "PUNE").await;
    let haveli = r.node(&block, "HAVELI").await;

    r.mutator.attach_child(&admin(), pune.id, haveli.id, None).await.unwrap();
    r.mutator.attach_child(&admin(), mh.id, pune.id, None).await.unwrap();

    let mh = r.get(&mh).await;
    assert_eq!(mh.group("district"), &[pune.id]);
    assert_eq!(mh.group("block"), &[haveli.id]);
    assert_eq!(mh.child_hierarchy_path, vec!["district", "block"]);
    // Path lists exactly the group keys.
    for key in mh.groups.keys() {
        assert!(mh.child_hierarchy_path.contains(key));
    }
}

#[tokio::test]
async fn top_down_chain_propagates_one_hop() {
    let r = Registry::new();
    let state = r.ty("state", &["district"], false).await;
    let district = r.ty("district", &["block"], true).await;
    let block = r.ty("block", &[], false).await;
    let mh = r.node(&state, "MH").await;
    let pune = r.node(&district, "PUNE").await;
    let haveli = r.node(&block, "HAVELI").await;

    r.mutator.attach_child(&admin(), mh.id, pune.id, None).await.unwrap();
    let outcome = r.mutator.attach_child(&admin(), pune.id, haveli.id, None).await.unwrap();

    let AttachOutcome::Attached { propagated_to, .. } = outcome else {
        panic!("expected attach");
    };
    assert_eq!(propagated_to, vec![mh.id]);
    assert_eq!(r.get(&mh).await.group("block"), &[haveli.id]);
}

#[tokio::test]
async fn flag_off_leaves_ancestors_untouched() {
    let r = Registry::new();
    let state = r.ty("state", &["district"], false).await;
    let district = r.ty("district", &["block"], false).await;
    let block = r.ty("block", &[], false).await;
    let mh = r.node(&state, "MH").await;
    let pune = r.node(&district, "PUNE").await;
    let haveli = r.node(&block, "HAVELI").await;

    r.mutator.attach_child(&admin(), mh.id, pune.id, None).await.unwrap();
    let before = r.get(&mh).await;
    r.mutator.attach_child(&admin(), pune.id, haveli.id, None).await.unwrap();
    let after = r.get(&mh).await;

    assert_eq!(before.groups, after.groups);
    assert_eq!(before.child_hierarchy_path, after.child_hierarchy_path);
}

#[tokio::test]
async fn search_is_scoped_to_ids() {
    let r = Registry::new();
    let school = r.ty("school", &[], false).await;
    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(r.node(&school, &format!("S{i}")).await.id);
    }

    let page = r
        .query
        .search(TENANT, "", Page::new(2, 1).unwrap(), Some(ids[..3].to_vec()))
        .await
        .unwrap();
    assert_eq!(page.count, 3);
    assert!(page.data.len() <= 2);
    assert!(page.data.iter().all(|e| ids[..3].contains(&e.id)));
}

#[tokio::test]
async fn related_entities_skip_own_type_id() {
    let r = Registry::new();
    let state = r.ty("state", &["district"], true).await;
    let district = r.ty("district", &["school"], true).await;
    let school = r.ty("school", &[], false).await;
    let mh = r.node(&state, "MH").await;
    let pune = r.node(&district, "PUNE").await;
    let s1 = r.node(&school, "S1").await;

    r.mutator.attach_child(&admin(), mh.id, pune.id, None).await.unwrap();
    r.mutator.attach_child(&admin(), pune.id, s1.id, None).await.unwrap();

    let related = r
        .query
        .related_entities(TENANT, Some(s1.id), Some(school.id), Some("school"))
        .await
        .unwrap();
    assert_eq!(related.len(), 2);
    assert!(related.iter().all(|e| e.entity_type_id != Some(school.id)));

    let excluding_district = r
        .query
        .related_entities(TENANT, Some(s1.id), Some(district.id), Some("school"))
        .await
        .unwrap();
    assert_eq!(excluding_district.len(), 1);
    assert_eq!(excluding_district[0].id, mh.id);
}

#[tokio::test]
async fn mapping_csv_chains_rows() {
    let r = Registry::new();
    let state = r.ty("state", &["district"], false).await;
    let district = r.ty("district", &[], false).await;
    let mh = r.node(&state, "MH").await;
    let d1 = r.node(&district, "D1").await;
    let d2 = r.node(&district, "D2").await;

    let rows = parse_csv(b"state,district\nMH,D1\nMH,D2\n").unwrap();
    let out = r.mapping.create_mapping_csv(TENANT, rows).await.unwrap();
    assert_eq!(out.parent_entity_ids, vec![mh.id, mh.id]);
    assert_eq!(out.child_entity_ids, vec![d1.id, d2.id]);
}

#[tokio::test]
async fn bulk_upload_partial_failure() {
    let r = Registry::new();
    let state = r.ty("state", &["district"], false).await;
    let district = r.ty("district", &[], false).await;
    let mh = r.node(&state, "MH").await;
    for d in ["D1", "D2", "D3"] {
        r.node(&district, d).await;
    }

    let ghost = uuid::Uuid::new_v4();
    let csv = format!("parentEntityId,childEntityId\nMH,D1\nMH,D2\nMH,D3\nMH,MISSING\n{ghost},D1\n");
    let rows = parse_csv(csv.as_bytes()).unwrap();
    let report = r
        .mapping
        .process_entity_mapping_upload_data(&admin(), rows)
        .await
        .unwrap();
    assert_eq!(report.attached, 3);
    assert_eq!(report.failed, 2);
    assert!(!report.success);
    let statuses: Vec<&str> = report.rows.iter().filter_map(|r| r.get("status")).collect();
    assert_eq!(&statuses[..3], &["SUCCESS", "SUCCESS", "SUCCESS"]);
    assert!(statuses[3].contains("MISSING"), "{}", statuses[3]);
    assert!(statuses[4].contains(&ghost.to_string()), "{}", statuses[4]);
    assert_eq!(r.get(&mh).await.group("district").len(), 3);
}

#[tokio::test]
async fn attach_rejects_cycles() {
    let r = Registry::new();
    let state = r.ty("state", &["district"], false).await;
    let district = r.ty("district", &["block"], false).await;
    let block = r.ty("block", &[], false).await;
    let mh = r.node(&state, "MH").await;
    let pune = r.node(&district, "PUNE").await;
    let haveli = r.node(&block, "HAVELI").await;
    r.mutator.attach_child(&admin(), pune.id, haveli.id, None).await.unwrap();
    r.mutator.attach_child(&admin(), mh.id, pune.id, None).await.unwrap();

    for (parent, child) in [(haveli.id, mh.id), (haveli.id, pune.id), (pune.id, pune.id)] {
        let err = r.mutator.attach_child(&admin(), parent, child, None).await.unwrap_err();
        assert!(matches!(err, EntityError::BadRequest(_)), "{parent} -> {child}");
    }
    assert!(r.get(&haveli).await.groups.is_empty());
}

#[tokio::test]
async fn concurrent_rows_keep_every_id() {
    let r = Registry::new();
    let state = r.ty("state", &["district"], false).await;
    let district = r.ty("district", &["school"], true).await;
    let school = r.ty("school", &[], false).await;
    let mh = r.node(&state, "MH").await;
    let pune = r.node(&district, "PUNE").await;
    r.mutator.attach_child(&admin(), mh.id, pune.id, None).await.unwrap();

    let mut csv = String::from("parentEntityId,childEntityId\n");
    let mut schools = Vec::new();
    for i in 0..40 {
        let s = r.node(&school, &format!("SCH{i}")).await;
        csv.push_str(&format!("PUNE,{}\n", s.id));
        schools.push(s.id);
    }
    let report = r
        .mapping
        .process_entity_mapping_upload_data(&admin(), parse_csv(csv.as_bytes()).unwrap())
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(report.ancestors_updated, 1);

    let mh = r.get(&mh).await;
    let pune = r.get(&pune).await;
    assert_eq!(mh.group("school").len(), 40);
    assert_eq!(pune.group("school").len(), 40);
    for id in &schools {
        assert!(mh.group("school").contains(id));
    }
    assert_eq!(mh.child_hierarchy_path, vec!["district", "school"]);
    assert_eq!(r.all().await.len(), 42);
}
