//! Submitted dependency manifests

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Rejected submission, phrased for the submitter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("\"{field}\" is required")]
    Missing { field: &'static str },

    #[error("\"{field}\" must be of type object")]
    NotAnObjectField { field: &'static str },

    #[error("\"dependencies.{name}\" must be a string")]
    ConstraintNotString { name: String },
}

impl ManifestError {
    /// The offending field path
    pub fn field(&self) -> Option<String> {
        match self {
            Self::NotAnObject => None,
            Self::Missing { field } | Self::NotAnObjectField { field } => Some(field.to_string()),
            Self::ConstraintNotString { name } => Some(format!("dependencies.{}", name)),
        }
    }
}

/// A validated submission: package descriptor plus dependency constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub package_json: Map<String, Value>,
    pub dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// Validate a raw submission body.
    ///
    /// `package_json` is checked before `dependencies`; the first problem found
    /// is reported. An empty dependency mapping is accepted; an explicit
    /// `null` is a type error, not a missing field.
    pub fn from_submission(body: &Value) -> Result<Self, ManifestError> {
        let object = body.as_object().ok_or(ManifestError::NotAnObject)?;

        let package_json = match object.get("package_json") {
            None => {
                return Err(ManifestError::Missing {
                    field: "package_json",
                });
            }
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(ManifestError::NotAnObjectField {
                    field: "package_json",
                });
            }
        };

        let dependencies = match object.get("dependencies") {
            None => {
                return Err(ManifestError::Missing {
                    field: "dependencies",
                });
            }
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, constraint)| match constraint {
                    Value::String(c) => Ok((name.clone(), c.clone())),
                    _ => Err(ManifestError::ConstraintNotString { name: name.clone() }),
                })
                .collect::<Result<BTreeMap<_, _>, _>>()?,
            Some(_) => {
                return Err(ManifestError::NotAnObjectField {
                    field: "dependencies",
                });
            }
        };

        Ok(Self {
            package_json,
            dependencies,
        })
    }

    /// The package descriptor as it will be written into the workspace
    pub fn package_descriptor(&self) -> Value {
        Value::Object(self.package_json.clone())
    }
}
