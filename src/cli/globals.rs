use secrecy::SecretString;

use crate::api::handlers::auth::TokenConfig;

/// Cross-cutting flags shared by actions.
#[derive(Clone)]
pub struct GlobalArgs {
    pub production: bool,
    pub token_secret: Option<SecretString>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(production: bool, token_secret: Option<SecretString>) -> Self {
        Self {
            production,
            token_secret,
        }
    }

    #[must_use]
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new(self.token_secret.clone(), self.production)
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("production", &self.production)
            .field("token_secret", &self.token_secret.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_the_secret() {
        let args = GlobalArgs::new(true, Some(SecretString::from("hunter2")));
        let debug = format!("{args:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn empty_secret_is_representable() {
        let args = GlobalArgs::new(false, None);
        assert!(!args.production);
        assert!(args.token_secret.is_none());
    }
}
