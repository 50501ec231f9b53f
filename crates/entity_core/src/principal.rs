use serde::Deserialize;
use serde_json::Value;

use crate::error::EntityError;
use crate::types::SYSTEM_ACTOR;

/// Caller identity attached to every registry operation.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDetails {
    pub user_id: String,
    pub tenant_id: String,
    pub org_id: String,
    pub roles: Vec<String>,
}

impl UserDetails {
    /// Construct from validated JWT claims at the server boundary.
    /// The server middleware calls this; core logic never reads raw tokens.
    pub fn from_jwt_claims(claims: &JwtClaims) -> Result<Self, EntityError> {
        let data = claims
            .data
            .as_ref()
            .ok_or_else(|| EntityError::Unauthorized("missing data claim".into()))?;
        let user_id = match &data.id {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(EntityError::Unauthorized("missing user id claim".into())),
        };
        let tenant_id = data
            .tenant_code
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EntityError::Unauthorized("missing tenant_code claim".into()))?;
        let org_id = match &data.organization_id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Ok(Self {
            user_id,
            tenant_id,
            org_id,
            roles: data.roles.iter().map(|r| r.title.clone()).collect(),
        })
    }

    /// Identity for calls authorised only by the internal access token.
    pub fn internal(tenant_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            user_id: SYSTEM_ACTOR.to_string(),
            tenant_id: tenant_id.into(),
            org_id: org_id.into(),
            roles: Vec::new(),
        }
    }
}

/// Token payload issued by the user service.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    pub data: Option<ClaimsData>,
    pub exp: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimsData {
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tenant_code: Option<String>,
    #[serde(default)]
    pub organization_id: Option<Value>,
    #[serde(default)]
    pub roles: Vec<ClaimRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRole {
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(v: Value) -> JwtClaims {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn from_jwt_claims_happy_path() {
        let c = claims(json!({
            "data": {
                "id": 17,
                "name": "Asha",
                "tenant_code": "shikshalokam",
                "organization_id": 1,
                "roles": [{"title": "state_manager"}, {"title": "admin"}]
            },
            "exp": 4_000_000_000u64
        }));
        let u = UserDetails::from_jwt_claims(&c).unwrap();
        assert_eq!(u.user_id, "17");
        assert_eq!(u.tenant_id, "shikshalokam");
        assert_eq!(u.org_id, "1");
        assert_eq!(u.roles, vec!["state_manager", "admin"]);
    }

    #[test]
    fn missing_data_is_unauthorized() {
        let err = UserDetails::from_jwt_claims(&claims(json!({"exp": 1}))).unwrap_err();
        assert!(matches!(err, EntityError::Unauthorized(_)));
    }

    #[test]
    fn missing_tenant_is_unauthorized() {
        let c = claims(json!({"data": {"id": "u1", "roles": []}}));
        assert!(matches!(
            UserDetails::from_jwt_claims(&c),
            Err(EntityError::Unauthorized(_))
        ));
    }

    #[test]
    fn internal_identity_is_system() {
        let u = UserDetails::internal("t1", "o1");
        assert_eq!(u.user_id, SYSTEM_ACTOR);
        assert!(u.roles.is_empty());
    }
}
