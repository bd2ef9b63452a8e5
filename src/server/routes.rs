//! Route table: which CRUD operations an entity kind exposes, and where

use super::handlers::{self, CrudHandler};
use crate::core::operation::Operation;
use axum::Router;
use axum::routing::MethodRouter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A set of CRUD operations
///
/// # Example
///
/// ```
/// use crud::server::Routes;
///
/// let routes = Routes::READ | Routes::LIST;
/// assert!(routes.contains(Routes::LIST));
/// assert!(!routes.contains(Routes::DELETE));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Routes(u8);

impl Routes {
    pub const NONE: Routes = Routes(0);
    pub const CREATE: Routes = Routes(1);
    pub const READ: Routes = Routes(1 << 1);
    pub const UPDATE: Routes = Routes(1 << 2);
    pub const DELETE: Routes = Routes(1 << 3);
    pub const LIST: Routes = Routes(1 << 4);
    pub const ALL: Routes = Routes(0b1_1111);

    /// Whether every operation of `other` is in the set
    pub const fn contains(self, other: Routes) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the sets share an operation
    pub const fn intersects(self, other: Routes) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Operations in the set, in canonical order
    pub fn operations(self) -> impl Iterator<Item = Operation> {
        Operation::ALL
            .into_iter()
            .filter(move |op| self.contains(Routes::from(*op)))
    }

    /// Parse a list of operation names such as `["read", "list"]`
    pub fn from_names<I, S>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Routes::NONE, |routes, name| {
            Ok(routes | Routes::from(name.as_ref().parse::<Operation>()?))
        })
    }
}

impl Default for Routes {
    fn default() -> Self {
        Routes::ALL
    }
}

impl From<Operation> for Routes {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Create => Routes::CREATE,
            Operation::Read => Routes::READ,
            Operation::Update => Routes::UPDATE,
            Operation::Delete => Routes::DELETE,
            Operation::List => Routes::LIST,
        }
    }
}

impl BitOr for Routes {
    type Output = Routes;

    fn bitor(self, rhs: Routes) -> Routes {
        Routes(self.0 | rhs.0)
    }
}

impl BitOrAssign for Routes {
    fn bitor_assign(&mut self, rhs: Routes) {
        self.0 |= rhs.0;
    }
}

impl TryFrom<Vec<String>> for Routes {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Routes::from_names(names)
    }
}

impl From<Routes> for Vec<String> {
    fn from(routes: Routes) -> Self {
        routes.operations().map(|op| op.as_str().to_string()).collect()
    }
}

impl fmt::Debug for Routes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.operations().map(|op| op.as_str()).collect();
        write!(f, "Routes({})", names.join(" | "))
    }
}

/// Normalise a mount prefix to `/segment` form, or empty for the root
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Build the router of one entity kind with only the selected operations
///
/// | Method | Path           | Operation |
/// |--------|----------------|-----------|
/// | POST   | `{prefix}`      | Create    |
/// | GET    | `{prefix}/{id}` | Read      |
/// | PATCH  | `{prefix}/{id}` | Update    |
/// | DELETE | `{prefix}/{id}` | Delete    |
/// | GET    | `{prefix}`      | List      |
///
/// A path with no selected operation is not routed at all (404); a path
/// with some of its methods selected answers 405 for the others.
pub fn mount(prefix: &str, routes: Routes, handler: CrudHandler) -> Router {
    let prefix = normalize_prefix(prefix);
    let collection_path = if prefix.is_empty() {
        "/".to_string()
    } else {
        prefix.clone()
    };
    let member_path = format!("{}/{{id}}", prefix);

    let mut router: Router<CrudHandler> = Router::new();

    if routes.intersects(Routes::CREATE | Routes::LIST) {
        let mut collection: MethodRouter<CrudHandler> = MethodRouter::new();
        if routes.contains(Routes::CREATE) {
            collection = collection.post(handlers::create_entity);
        }
        if routes.contains(Routes::LIST) {
            collection = collection.get(handlers::list_entities);
        }
        router = router.route(&collection_path, collection);
    }

    if routes.intersects(Routes::READ | Routes::UPDATE | Routes::DELETE) {
        let mut member: MethodRouter<CrudHandler> = MethodRouter::new();
        if routes.contains(Routes::READ) {
            member = member.get(handlers::read_entity);
        }
        if routes.contains(Routes::UPDATE) {
            member = member.patch(handlers::update_entity);
        }
        if routes.contains(Routes::DELETE) {
            member = member.delete(handlers::delete_entity);
        }
        router = router.route(&member_path, member);
    }

    router.with_state(handler)
}
