use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Variable naming the environment whose configuration file is layered over `base`.
pub const ENVIRONMENT_VAR: &str = "BQORM_ENVIRONMENT";

/// Deployment environment selecting `dev.*` or `prod.*` configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

/// Raised for environment names other than `dev` and `prod`.
#[derive(Debug, Error)]
#[error("unknown environment `{0}`, expected `dev` or `prod`")]
pub struct UnknownEnvironment(pub String);

impl Environment {
    /// Reads [`ENVIRONMENT_VAR`]. Unset means [`Environment::Dev`].
    pub fn load() -> Result<Environment, UnknownEnvironment> {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(name) => name.parse(),
            Err(_) => Ok(Environment::default()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();

        [Environment::Dev, Environment::Prod]
            .into_iter()
            .find(|environment| environment.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownEnvironment(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_ignoring_case_and_whitespace() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!(" dev ".parse::<Environment>().unwrap(), Environment::Dev);

        let err = "staging".parse::<Environment>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown environment `staging`, expected `dev` or `prod`"
        );
    }

    #[test]
    fn display_matches_the_file_stem() {
        assert_eq!(Environment::Prod.to_string(), "prod");
        assert_eq!(Environment::default().as_str(), "dev");
    }
}
