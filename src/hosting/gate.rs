use crate::gameplay::Role;
use crate::gameroom::Identity;

/// Authorization boundary. The real token service lives outside this
/// crate; the core only ever sees the resolved `{login, role}` and
/// never parses credentials itself.
#[async_trait::async_trait]
pub trait Gate: Send + Sync {
    async fn authorize(&self, token: Option<&str>) -> anyhow::Result<Identity>;
}

/// Development stand-in: tokens are `login` or `login:role`, no
/// crypto. Absent tokens authorize an anonymous spectator, which the
/// floor will refuse to let mutate anything.
pub struct DevGate;

#[async_trait::async_trait]
impl Gate for DevGate {
    async fn authorize(&self, token: Option<&str>) -> anyhow::Result<Identity> {
        let Some(token) = token else {
            return Ok(Identity::new("", Role::Player));
        };
        let (login, role) = match token.split_once(':') {
            Some((login, role)) => (login, role),
            None => (token, "player"),
        };
        let login = crate::gameroom::channel::normalize(login)
            .ok_or_else(|| anyhow::anyhow!("malformed login"))?;
        let role = match role {
            "player" => Role::Player,
            "ai" => Role::Ai,
            "streamer" => Role::Streamer,
            "admin" => Role::Admin,
            "premier" => Role::Premier,
            other => anyhow::bail!("unknown role {}", other),
        };
        Ok(Identity::new(&login, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_login_and_role() {
        let identity = DevGate.authorize(Some("Alice:admin")).await.unwrap();
        assert_eq!(identity.login, "alice");
        assert!(identity.is_admin());
    }

    #[tokio::test]
    async fn defaults_to_player() {
        let identity = DevGate.authorize(Some("bob")).await.unwrap();
        assert_eq!(identity.role, Role::Player);
    }

    #[tokio::test]
    async fn anonymous_spectator() {
        let identity = DevGate.authorize(None).await.unwrap();
        assert!(identity.login.is_empty());
    }

    #[tokio::test]
    async fn rejects_garbage() {
        assert!(DevGate.authorize(Some("a b:player")).await.is_err());
        assert!(DevGate.authorize(Some("alice:wizard")).await.is_err());
    }
}
