//! Operator accounts and role permissions

use serde::{Deserialize, Serialize};

/// Operator role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "operator" => Some(Role::Operator),
            _ => None,
        }
    }
}

/// A permission granting access to a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
}

/// Resources that can be accessed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Client,
    Product,
    Stock,
    Sale,
    RentalOrder,
    Printer,
    Supplier,
    PurchaseOrder,
    Contract,
    Finance,
    Report,
    Settings,
    User,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Client => "client",
            Resource::Product => "product",
            Resource::Stock => "stock",
            Resource::Sale => "sale",
            Resource::RentalOrder => "rental_order",
            Resource::Printer => "printer",
            Resource::Supplier => "supplier",
            Resource::PurchaseOrder => "purchase_order",
            Resource::Contract => "contract",
            Resource::Finance => "finance",
            Resource::Report => "report",
            Resource::Settings => "settings",
            Resource::User => "user",
        }
    }

    pub fn all() -> [Resource; 13] {
        [
            Resource::Client,
            Resource::Product,
            Resource::Stock,
            Resource::Sale,
            Resource::RentalOrder,
            Resource::Printer,
            Resource::Supplier,
            Resource::PurchaseOrder,
            Resource::Contract,
            Resource::Finance,
            Resource::Report,
            Resource::Settings,
            Resource::User,
        ]
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Export,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Export => "export",
        }
    }

    pub fn all() -> [Action; 5] {
        [
            Action::View,
            Action::Create,
            Action::Edit,
            Action::Delete,
            Action::Export,
        ]
    }
}

/// Permissions granted by a role
pub fn permissions_for(role: Role) -> Vec<Permission> {
    Resource::all()
        .into_iter()
        .filter_map(|resource| {
            let actions: Vec<Action> = match (role, resource) {
                (Role::Admin, _) => Action::all().to_vec(),
                (Role::Operator, Resource::User) => return None,
                (Role::Operator, Resource::Settings) => vec![Action::View],
                (Role::Operator, _) => Action::all().to_vec(),
            };
            Some(Permission { resource, actions })
        })
        .collect()
}

/// Flattened `resource:action` strings carried in access tokens
pub fn permission_strings(role: Role) -> Vec<String> {
    permissions_for(role)
        .iter()
        .flat_map(|p| {
            p.actions
                .iter()
                .map(move |a| format!("{}:{}", p.resource.as_str(), a.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_has_everything() {
        let perms = permission_strings(Role::Admin);
        assert!(perms.contains(&"user:create".to_string()));
        assert!(perms.contains(&"settings:edit".to_string()));
        assert_eq!(perms.len(), 13 * 5);
    }

    #[test]
    fn test_operator_cannot_manage_users_or_settings() {
        let perms = permission_strings(Role::Operator);
        assert!(!perms.iter().any(|p| p.starts_with("user:")));
        assert!(perms.contains(&"settings:view".to_string()));
        assert!(!perms.contains(&"settings:edit".to_string()));
        assert!(perms.contains(&"sale:delete".to_string()));
    }
}
