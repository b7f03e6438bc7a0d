//! Router configuration.
//!
//! Built once, handed to [`Router::new`](crate::Router::new), read-only from
//! then on. Nothing here is process-global.
//!
//! ## Environment variables
//!
//! ### `GANTRY_MODE`
//!
//! `debug`, `release` or `test`. Unset or empty means `debug`. Only
//! [`Config::from_env`] reads it.
//!
//! ```bash
//! GANTRY_MODE=release ./my-service
//! ```

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Environment variable read by [`Config::from_env`].
pub const ENV_MODE: &str = "GANTRY_MODE";

/// How chatty the router is.
///
/// Debug logs every registered route at `DEBUG`. Release and test stay quiet.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Mode {
    #[default]
    Debug,
    Release,
    Test,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug   => "debug",
            Self::Release => "release",
            Self::Test    => "test",
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "debug" => Ok(Self::Debug),
            "release"    => Ok(Self::Release),
            "test"       => Ok(Self::Test),
            other        => Err(Error::UnknownMode(other.to_owned())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Router behaviour switches.
///
/// ```rust
/// use gantry::{Config, Mode};
///
/// let config = Config::default()
///     .mode(Mode::Release)
///     .redirect_fixed_path(true)
///     .handle_method_not_allowed(true);
/// assert!(config.redirect_trailing_slash);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub mode: Mode,

    /// Redirect `/foo/` to `/foo` (or the reverse) when only the other form
    /// is registered. 301 for GET, 307 for every other method.
    pub redirect_trailing_slash: bool,

    /// On a miss, clean the path (`..`, `//`) and retry case-insensitively;
    /// redirect to the registered spelling if that matches.
    pub redirect_fixed_path: bool,

    /// Collapse repeated slashes in the request path before lookup.
    pub remove_extra_slash: bool,

    /// Percent-decode parameter values.
    pub unescape_path_values: bool,

    /// Answer 405 with an `Allow` header when another method has the path.
    pub handle_method_not_allowed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Debug,
            redirect_trailing_slash: true,
            redirect_fixed_path: false,
            remove_extra_slash: false,
            unescape_path_values: true,
            handle_method_not_allowed: false,
        }
    }
}

impl Config {
    /// Defaults, with the mode taken from `GANTRY_MODE`.
    pub fn from_env() -> Result<Self, Error> {
        let mode = match env::var(ENV_MODE) {
            Ok(val) => val.trim().parse()?,
            Err(_) => Mode::default(),
        };
        Ok(Self::default().mode(mode))
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn redirect_trailing_slash(mut self, on: bool) -> Self {
        self.redirect_trailing_slash = on;
        self
    }

    pub fn redirect_fixed_path(mut self, on: bool) -> Self {
        self.redirect_fixed_path = on;
        self
    }

    pub fn remove_extra_slash(mut self, on: bool) -> Self {
        self.remove_extra_slash = on;
        self
    }

    pub fn unescape_path_values(mut self, on: bool) -> Self {
        self.unescape_path_values = on;
        self
    }

    pub fn handle_method_not_allowed(mut self, on: bool) -> Self {
        self.handle_method_not_allowed = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_known_names() {
        assert_eq!("".parse::<Mode>().unwrap(), Mode::Debug);
        assert_eq!("debug".parse::<Mode>().unwrap(), Mode::Debug);
        assert_eq!("release".parse::<Mode>().unwrap(), Mode::Release);
        assert_eq!("test".parse::<Mode>().unwrap(), Mode::Test);
    }

    #[test]
    fn unknown_mode_is_an_error() {
        let err = "prod".parse::<Mode>().unwrap_err();
        assert!(matches!(err, Error::UnknownMode(ref m) if m == "prod"));
        assert!(err.to_string().contains("prod"));
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Debug);
        assert!(config.redirect_trailing_slash);
        assert!(!config.redirect_fixed_path);
        assert!(!config.remove_extra_slash);
        assert!(config.unescape_path_values);
        assert!(!config.handle_method_not_allowed);
    }

    #[test]
    fn builder_setters() {
        let config = Config::default()
            .mode(Mode::Test)
            .redirect_trailing_slash(false)
            .remove_extra_slash(true);
        assert_eq!(config.mode, Mode::Test);
        assert!(!config.redirect_trailing_slash);
        assert!(config.remove_extra_slash);
    }
}
