//! Renders core filters into `QueryBuilder` predicates.
//!
//! Every function appends ` AND ...` clauses, so callers start the WHERE
//! clause with `WHERE TRUE`.

use sqlx::{Postgres, QueryBuilder};

use entity_core::filter::{EntityFilter, EntityTypeFilter, RoleFilter};
use entity_core::search::{SearchQuery, PREFIX_FIELD, TEXT_FIELDS};

pub(crate) fn push_entity_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &EntityFilter) {
    if let Some(tenant) = &f.tenant_id {
        qb.push(" AND tenant_id = ").push_bind(tenant.clone());
    }
    if let Some(ids) = &f.ids {
        qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
    }
    if let Some(name) = &f.entity_type {
        qb.push(" AND entity_type = ").push_bind(name.clone());
    }
    if let Some(type_id) = f.entity_type_id {
        qb.push(" AND entity_type_id = ").push_bind(type_id);
    }
    if let Some(ext) = &f.external_ids {
        qb.push(" AND external_id = ANY(").push_bind(ext.clone()).push(")");
    }
    if let Some(locs) = &f.location_ids {
        qb.push(" AND registry_details->>'locationId' = ANY(")
            .push_bind(locs.clone())
            .push(")");
    }
    if let Some(gm) = &f.group_member {
        match &gm.group {
            Some(key) => {
                // groups @> {"<key>": ["<id>"]}
                qb.push(" AND groups @> jsonb_build_object(")
                    .push_bind(key.clone())
                    .push("::text, jsonb_build_array(")
                    .push_bind(gm.entity_id.to_string())
                    .push("::text))");
            }
            None => {
                qb.push(" AND groups @? ")
                    .push_bind(format!("$.*[*] ? (@ == \"{}\")", gm.entity_id))
                    .push("::jsonpath");
            }
        }
    }
    if let Some(excluded) = f.exclude_entity_type_id {
        qb.push(" AND entity_type_id IS DISTINCT FROM ").push_bind(excluded);
    }
}

pub(crate) fn push_search_filter(qb: &mut QueryBuilder<'_, Postgres>, q: &SearchQuery) {
    qb.push(" AND tenant_id = ").push_bind(q.tenant_id.clone());
    if let Some(ids) = &q.entity_ids {
        qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
    }
    if let Some(t) = &q.entity_type {
        qb.push(" AND entity_type = ").push_bind(t.clone());
    }
    if q.has_text() {
        let pattern = q.escaped_text();
        qb.push(" AND (");
        for (i, field) in TEXT_FIELDS.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("meta_information->>")
                .push_bind(field.to_string())
                .push(" ~* ")
                .push_bind(pattern.clone());
        }
        qb.push(" OR meta_information->>")
            .push_bind(PREFIX_FIELD.to_string())
            .push(" ~* ")
            .push_bind(format!("^{pattern}"))
            .push(")");
    }
}

pub(crate) fn push_entity_type_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &EntityTypeFilter) {
    if !f.include_deleted {
        qb.push(" AND NOT is_deleted");
    }
    if let Some(tenant) = &f.tenant_id {
        qb.push(" AND tenant_id = ").push_bind(tenant.clone());
    }
    if let Some(ids) = &f.ids {
        qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
    }
    if let Some(names) = &f.names {
        qb.push(" AND name = ANY(").push_bind(names.clone()).push(")");
    }
    if let Some(flag) = f.is_observable {
        qb.push(" AND is_observable = ").push_bind(flag);
    }
    if let Some(flag) = f.to_be_mapped_to_parent_entities {
        qb.push(" AND to_be_mapped_to_parent_entities = ").push_bind(flag);
    }
}

pub(crate) fn push_role_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &RoleFilter) {
    if let Some(tenant) = &f.tenant_id {
        qb.push(" AND tenant_id = ").push_bind(tenant.clone());
    }
    if let Some(ids) = &f.ids {
        qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
    }
    if let Some(role_ids) = &f.user_role_ids {
        qb.push(" AND user_role_id = ANY(").push_bind(role_ids.clone()).push(")");
    }
    if let Some(title) = &f.title {
        qb.push(" AND title = ").push_bind(title.clone());
    }
    if let Some(status) = f.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(type_ids) = &f.entity_type_ids {
        qb.push(
            " AND EXISTS (SELECT 1 FROM jsonb_array_elements(entity_types) et \
             WHERE (et->>'entityTypeId')::uuid = ANY(",
        )
        .push_bind(type_ids.clone())
        .push("))");
    }
}
