use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use ulid::Ulid;

use crate::observability;

/// Who is on the other end of a connection, taken from the login user name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin,
    /// Front-desk staff, limited to one branch.
    Staff { branch_id: Ulid },
    Guest { guest_id: Ulid },
}

impl Actor {
    /// `admin`, `staff:<branch-ulid>` or `guest:<guest-ulid>`.
    pub fn parse(user: &str) -> Option<Actor> {
        let user = user.trim();
        if user.eq_ignore_ascii_case("admin") {
            return Some(Actor::Admin);
        }
        let (role, id) = user.split_once(':')?;
        let id = Ulid::from_string(id.trim()).ok()?;
        match role.to_ascii_lowercase().as_str() {
            "staff" => Some(Actor::Staff { branch_id: id }),
            "guest" => Some(Actor::Guest { guest_id: id }),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct HoteldAuthSource {
    password: String,
}

impl HoteldAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for HoteldAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        let user = login.user().unwrap_or_default();
        if Actor::parse(user).is_none() {
            metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
            tracing::warn!(user, "rejected login with unrecognised user");
            return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                "FATAL".into(),
                "28000".into(),
                format!("unknown user {user:?}: expected admin, staff:<branch-id> or guest:<guest-id>"),
            ))));
        }
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}
