//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot determine the software root directory: {0}")]
    SwRootUnavailable(std::io::Error),

    #[error("Cannot load the parameter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file {0:?}: {1}")]
    DeserialiseError(PathBuf, toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the `params` directory under the software root (see
/// [`crate::host::get_nav_sw_root`]).
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    let mut path = crate::host::get_nav_sw_root()
        .map_err(LoadError::SwRootUnavailable)?;
    path.push("params");
    path.push(param_file_path);

    load_path(&path)
}

/// Load a parameter file from an explicit path.
pub fn load_path<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>
{
    let path = path.as_ref();

    let params_str = read_to_string(path)
        .map_err(|e| LoadError::FileLoadError(path.to_path_buf(), e))?;

    from_toml_str(&params_str)
        .map_err(|e| LoadError::DeserialiseError(path.to_path_buf(), e))
}

/// Parse a parameter struct from a TOML string.
pub fn from_toml_str<P>(params_str: &str) -> Result<P, toml::de::Error>
where
    P: DeserializeOwned
{
    toml::from_str(params_str)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Example {
        period_s: f64,
        #[serde(default)]
        name: String
    }

    #[test]
    fn test_from_toml_str() {
        let e: Example = from_toml_str("period_s = 0.02").unwrap();
        assert_eq!(e, Example { period_s: 0.02, name: String::new() });

        assert!(from_toml_str::<Example>("name = \"x\"").is_err());
    }

    #[test]
    fn test_load_path_missing_file() {
        match load_path::<Example, _>("/definitely/not/here.toml") {
            Err(LoadError::FileLoadError(p, _)) =>
                assert_eq!(p, PathBuf::from("/definitely/not/here.toml")),
            other => panic!("Unexpected result: {:?}", other)
        }
    }
}
