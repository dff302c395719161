use serde::Deserialize;

/// Default token lifetime: 30 days.
pub const DEFAULT_TTL_MINUTES: i64 = 60 * 24 * 30;
/// Upper bound on token lifetime: 10 years.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.secret.trim().is_empty(), "JWT_SECRET must not be empty");
        anyhow::ensure!(
            (1..=MAX_TTL_MINUTES).contains(&self.ttl_minutes),
            "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {}",
            self.ttl_minutes
        );
        Ok(())
    }
}

/// Argon2 cost parameters. Existing hashes carry their own parameters,
/// so changing these only affects newly registered users.
#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub hashing: HashingConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "userauth".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "userauth-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(DEFAULT_TTL_MINUTES),
        };
        jwt.validate()?;

        let defaults = HashingConfig::default();
        let hashing = HashingConfig {
            memory_kib: env_parse("ARGON2_MEMORY_KIB").unwrap_or(defaults.memory_kib),
            iterations: env_parse("ARGON2_ITERATIONS").unwrap_or(defaults.iterations),
            parallelism: env_parse("ARGON2_PARALLELISM").unwrap_or(defaults.parallelism),
        };

        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT").unwrap_or(8080),
            jwt,
            hashing,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_defaults_follow_argon2() {
        let cfg = HashingConfig::default();
        assert_eq!(cfg.memory_kib, 19 * 1024);
        assert_eq!(cfg.iterations, 2);
        assert_eq!(cfg.parallelism, 1);
    }

    #[test]
    fn default_ttl_is_thirty_days() {
        assert_eq!(DEFAULT_TTL_MINUTES * 60, 30 * 24 * 60 * 60);
    }

    fn jwt(secret: &str, ttl_minutes: i64) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes,
        }
    }

    #[test]
    fn jwt_config_accepts_default_and_max_ttl() {
        assert!(jwt("s", DEFAULT_TTL_MINUTES).validate().is_ok());
        assert!(jwt("s", MAX_TTL_MINUTES).validate().is_ok());
    }

    #[test]
    fn jwt_config_rejects_out_of_range_ttl() {
        for ttl in [0, -5, MAX_TTL_MINUTES + 1, 10_000_000_000, i64::MAX] {
            let err = jwt("s", ttl).validate().unwrap_err();
            assert!(err.to_string().contains("JWT_TTL_MINUTES"), "{ttl}: {err}");
        }
    }

    #[test]
    fn jwt_config_rejects_blank_secret() {
        assert!(jwt("  ", DEFAULT_TTL_MINUTES).validate().is_err());
    }

    #[test]
    fn env_parse_ignores_garbage() {
        std::env::set_var("USERAUTH_TEST_NUMBER", "not-a-number");
        assert_eq!(env_parse::<u32>("USERAUTH_TEST_NUMBER"), None);
        std::env::set_var("USERAUTH_TEST_NUMBER", " 42 ");
        assert_eq!(env_parse::<u32>("USERAUTH_TEST_NUMBER"), Some(42));
        std::env::remove_var("USERAUTH_TEST_NUMBER");
    }
}
