//! Mapping between directory attributes and user profile fields.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use uuid::Uuid;

use super::directory::{DirectoryAttribute, DirectoryEntry};
use crate::backends::{BackendUser, Claims, IDENTIFIED_USER_ID_CLAIM};

/// Profile fields a directory entry can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserAttribute {
    Login,
    Email,
    Name,
    FamilyName,
    GivenName,
    Uuid,
}

impl UserAttribute {
    pub const ALL: [UserAttribute; 6] = [
        UserAttribute::Login,
        UserAttribute::Email,
        UserAttribute::Name,
        UserAttribute::FamilyName,
        UserAttribute::GivenName,
        UserAttribute::Uuid,
    ];

    /// inetOrgPerson attribute used when no override is configured.
    pub fn default_wire_name(self) -> &'static str {
        match self {
            UserAttribute::Login => "uid",
            UserAttribute::Email => "mail",
            UserAttribute::Name => "cn",
            UserAttribute::FamilyName => "sn",
            UserAttribute::GivenName => "givenName",
            UserAttribute::Uuid => "uuid",
        }
    }
}

/// How raw attribute values are turned into strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    #[default]
    Text,
    /// Standard base64 of the first value.
    Binary,
    /// First value parsed as 16 raw UUID bytes.
    Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValueType(pub String);

impl fmt::Display for UnknownValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown attribute value type {:?}, must be one of text, binary or uuid",
            self.0
        )
    }
}

impl std::error::Error for UnknownValueType {}

impl FromStr for ValueType {
    type Err = UnknownValueType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(ValueType::Text),
            "binary" => Ok(ValueType::Binary),
            "uuid" => Ok(ValueType::Uuid),
            _ => Err(UnknownValueType(s.to_string())),
        }
    }
}

impl ValueType {
    fn convert(self, attribute: &DirectoryAttribute) -> Option<String> {
        let first = attribute.values.first()?;
        match self {
            ValueType::Text => String::from_utf8(first.clone()).ok(),
            ValueType::Binary => Some(STANDARD.encode(first)),
            ValueType::Uuid => Uuid::from_slice(first).ok().map(|u| u.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedAttribute {
    pub wire_name: String,
    pub value_type: ValueType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMapping {
    entries: BTreeMap<UserAttribute, MappedAttribute>,
}

impl Default for AttributeMapping {
    fn default() -> Self {
        let entries = UserAttribute::ALL
            .into_iter()
            .map(|attr| {
                (
                    attr,
                    MappedAttribute {
                        wire_name: attr.default_wire_name().to_string(),
                        value_type: ValueType::Text,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl AttributeMapping {
    /// Replace the wire name of `attr`. Empty overrides keep the default.
    pub fn with_override(mut self, attr: UserAttribute, wire_name: &str) -> Self {
        let wire_name = wire_name.trim();
        if !wire_name.is_empty() {
            if let Some(mapped) = self.entries.get_mut(&attr) {
                mapped.wire_name = wire_name.to_string();
            }
        }
        self
    }

    pub fn with_value_type(mut self, attr: UserAttribute, value_type: ValueType) -> Self {
        if let Some(mapped) = self.entries.get_mut(&attr) {
            mapped.value_type = value_type;
        }
        self
    }

    pub fn wire_name(&self, attr: UserAttribute) -> Option<&str> {
        self.entries
            .get(&attr)
            .map(|m| m.wire_name.as_str())
            .filter(|name| !name.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (UserAttribute, &MappedAttribute)> {
        self.entries.iter().map(|(attr, mapped)| (*attr, mapped))
    }
}

/// Directory entry reduced to the mapped profile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    entry_id: String,
    data: BTreeMap<UserAttribute, String>,
}

impl DirectoryUser {
    pub fn from_entry(entry_id: String, mapping: &AttributeMapping, entry: &DirectoryEntry) -> Self {
        let mut data = BTreeMap::new();
        for attribute in &entry.attributes {
            if attribute.values.is_empty() {
                continue;
            }
            for (attr, mapped) in mapping.iter() {
                if !attribute.name.eq_ignore_ascii_case(&mapped.wire_name) {
                    continue;
                }
                // Values that fail conversion are dropped.
                if let Some(value) = mapped.value_type.convert(attribute) {
                    data.insert(attr, value);
                }
            }
        }

        Self { entry_id, data }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn get(&self, attr: UserAttribute) -> Option<&str> {
        self.data.get(&attr).map(String::as_str)
    }

    pub fn backend_claims(&self) -> Claims {
        let mut claims = Claims::new();
        claims.insert(
            IDENTIFIED_USER_ID_CLAIM.to_string(),
            Value::String(self.entry_id.clone()),
        );
        claims
    }

    pub fn into_backend_user(self) -> BackendUser {
        let claims = self.backend_claims();
        let owned = |attr| self.get(attr).map(str::to_string);

        BackendUser {
            subject: self.entry_id.clone(),
            username: owned(UserAttribute::Login).unwrap_or_default(),
            name: owned(UserAttribute::Name),
            email: owned(UserAttribute::Email),
            email_verified: false,
            family_name: owned(UserAttribute::FamilyName),
            given_name: owned(UserAttribute::GivenName),
            unique_id: owned(UserAttribute::Uuid),
            claims,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> DirectoryEntry {
        DirectoryEntry::new("uid=alice,ou=people,dc=example,dc=org")
            .with_text("UID", &["alice"])
            .with_text("mail", &["alice@example.org", "a@example.org"])
            .with_text("cn", &["Alice Liddell"])
            .with_text("description", &["ignored"])
    }

    #[test]
    fn wire_attributes_match_case_insensitively() {
        let user = DirectoryUser::from_entry("id".into(), &AttributeMapping::default(), &entry());
        assert_eq!(user.get(UserAttribute::Login), Some("alice"));
        assert_eq!(user.get(UserAttribute::Name), Some("Alice Liddell"));
    }

    #[test]
    fn first_value_wins() {
        let user = DirectoryUser::from_entry("id".into(), &AttributeMapping::default(), &entry());
        assert_eq!(user.get(UserAttribute::Email), Some("alice@example.org"));
    }

    #[test]
    fn overrides_replace_wire_names() {
        let mapping = AttributeMapping::default().with_override(UserAttribute::Login, "mail");
        let user = DirectoryUser::from_entry("id".into(), &mapping, &entry());
        assert_eq!(user.get(UserAttribute::Login), Some("alice@example.org"));
        assert_eq!(mapping.wire_name(UserAttribute::Login), Some("mail"));
    }

    #[test]
    fn empty_override_keeps_default() {
        let mapping = AttributeMapping::default().with_override(UserAttribute::Email, "  ");
        assert_eq!(mapping.wire_name(UserAttribute::Email), Some("mail"));
    }

    #[test]
    fn binary_values_are_base64_encoded() {
        let mapping = AttributeMapping::default()
            .with_override(UserAttribute::Uuid, "objectGUID")
            .with_value_type(UserAttribute::Uuid, ValueType::Binary);
        let entry = DirectoryEntry::new("cn=x").with_binary("objectGUID", vec![0xff, 0x00, 0x10]);
        let user = DirectoryUser::from_entry("id".into(), &mapping, &entry);
        assert_eq!(user.get(UserAttribute::Uuid), Some("/wAQ"));
    }

    #[test]
    fn uuid_values_are_stringified() {
        let raw = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let mapping = AttributeMapping::default()
            .with_override(UserAttribute::Uuid, "objectGUID")
            .with_value_type(UserAttribute::Uuid, ValueType::Uuid);
        let entry = DirectoryEntry::new("cn=x").with_binary("objectGUID", raw.as_bytes().to_vec());
        let user = DirectoryUser::from_entry("id".into(), &mapping, &entry);
        assert_eq!(
            user.get(UserAttribute::Uuid),
            Some("67e55044-10b1-426f-9247-bb680e5fe0c8")
        );
    }

    #[test]
    fn malformed_uuid_drops_attribute() {
        let mapping = AttributeMapping::default().with_value_type(UserAttribute::Uuid, ValueType::Uuid);
        let entry = DirectoryEntry::new("cn=x").with_binary("uuid", vec![1, 2, 3]);
        let user = DirectoryUser::from_entry("id".into(), &mapping, &entry);
        assert_eq!(user.get(UserAttribute::Uuid), None);
    }

    #[test]
    fn value_type_parses_known_names() {
        assert_eq!("".parse::<ValueType>(), Ok(ValueType::Text));
        assert_eq!("UUID".parse::<ValueType>(), Ok(ValueType::Uuid));
        assert!("blob".parse::<ValueType>().is_err());
    }

    #[test]
    fn backend_user_carries_entry_id_claim() {
        let user = DirectoryUser::from_entry("sub-1".into(), &AttributeMapping::default(), &entry())
            .into_backend_user();
        assert_eq!(user.subject, "sub-1");
        assert_eq!(user.username, "alice");
        assert_eq!(
            user.claims.get(IDENTIFIED_USER_ID_CLAIM),
            Some(&Value::String("sub-1".into()))
        );
    }
}
