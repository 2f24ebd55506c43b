use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;

use super::UserId;

/// Column names of the profile part of a flattened user, in output order.
pub const PROFILE_COLUMNS: [&str; 13] = [
    "wl_id",
    "user_uid",
    "email",
    "phone",
    "country",
    "registration_date",
    "registration_platform",
    "language",
    "first_name",
    "last_name",
    "patronymic",
    "address",
    "date_of_birth",
];

/// Column suffixes emitted for every identity document, in output order.
pub const DOCUMENT_COLUMNS: [&str; 13] = [
    "country",
    "first_name",
    "first_name_en",
    "middle_name",
    "middle_name_en",
    "last_name",
    "last_name_en",
    "issued_date",
    "issue_authority",
    "valid_until",
    "number",
    "dob",
    "place_of_birth",
];

/// Reads an optional text field that upstream may send as a string, a number
/// or a bool. Arrays and objects are still a decoding error.
pub fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    const EXPECTED: &str = "a string, number or bool";
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Bool(flag) => Ok(Some(flag.to_string())),
        Value::Array(_) => Err(D::Error::invalid_type(Unexpected::Seq, &EXPECTED)),
        Value::Object(_) => Err(D::Error::invalid_type(Unexpected::Map, &EXPECTED)),
    }
}

/// A verified identity document as reported by the identity service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityDocument {
    #[serde(rename = "idDocType", deserialize_with = "scalar_text")]
    pub document_type: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub country: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub first_name_en: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub middle_name: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub middle_name_en: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub last_name_en: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub issued_date: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub issue_authority: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub valid_until: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub number: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub dob: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub place_of_birth: Option<String>,
}

impl IdentityDocument {
    /// Lower-cased document type used as the column prefix.
    #[must_use]
    pub fn column_prefix(&self) -> String {
        self.document_type
            .as_deref()
            .map_or_else(|| "unknown".to_string(), str::to_lowercase)
    }

    fn values(&self) -> [Option<&str>; 13] {
        [
            self.country.as_deref(),
            self.first_name.as_deref(),
            self.first_name_en.as_deref(),
            self.middle_name.as_deref(),
            self.middle_name_en.as_deref(),
            self.last_name.as_deref(),
            self.last_name_en.as_deref(),
            self.issued_date.as_deref(),
            self.issue_authority.as_deref(),
            self.valid_until.as_deref(),
            self.number.as_deref(),
            self.dob.as_deref(),
            self.place_of_birth.as_deref(),
        ]
    }
}

/// Everything known about one user after enrichment.
///
/// Fields that could not be fetched are empty strings; `documents` holds at
/// most one entry per document type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub user_uid: UserId,
    pub wl_id: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub registration_date: String,
    pub registration_platform: String,
    pub language: String,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: String,
    pub address: String,
    pub date_of_birth: String,
    pub documents: Vec<IdentityDocument>,
}

impl UserRecord {
    /// A record carrying nothing but the identifier.
    #[must_use]
    pub fn empty(user_uid: UserId) -> Self {
        Self {
            user_uid,
            ..Self::default()
        }
    }

    /// Flattens the record into scalar columns.
    ///
    /// Profile fields keep their names. Each document contributes its fields
    /// prefixed by the lower-cased document type (`passport_number`, ...).
    #[must_use]
    pub fn flatten(&self) -> FlatRecord {
        let profile = [
            self.wl_id.as_str(),
            self.user_uid.as_str(),
            self.email.as_str(),
            self.phone.as_str(),
            self.country.as_str(),
            self.registration_date.as_str(),
            self.registration_platform.as_str(),
            self.language.as_str(),
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.patronymic.as_str(),
            self.address.as_str(),
            self.date_of_birth.as_str(),
        ];

        let mut fields: Vec<(String, String)> = PROFILE_COLUMNS
            .iter()
            .zip(profile)
            .map(|(name, value)| ((*name).to_string(), value.to_string()))
            .collect();

        let mut seen_prefixes = HashSet::new();
        for document in &self.documents {
            let prefix = document.column_prefix();
            if !seen_prefixes.insert(prefix.clone()) {
                continue;
            }
            for (suffix, value) in DOCUMENT_COLUMNS.iter().zip(document.values()) {
                fields.push((
                    format!("{prefix}_{suffix}"),
                    value.unwrap_or_default().to_string(),
                ));
            }
        }

        FlatRecord { fields }
    }
}

/// Ordered column/value pairs for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRecord {
    fields: Vec<(String, String)>,
}

impl FlatRecord {
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn into_fields(self) -> Vec<(String, String)> {
        self.fields
    }
}
