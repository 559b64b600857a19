//! External subject encoding for directory entries.
//!
//! Without sub-attributes the subject is the entry DN. With sub-attributes it
//! is a URL query (`uidNumber=1000&uid=alice`) built from those attributes'
//! values, sorted by attribute name, which decodes back into a search filter.
use std::collections::BTreeMap;

use ldap3::ldap_escape;
use url::form_urlencoded;

use super::directory::{DirectoryEntry, SearchScope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryIdScheme {
    DistinguishedName,
    Attributes(Vec<String>),
}

/// Where and how to search for the entry behind a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLocation {
    pub base: String,
    pub scope: SearchScope,
    pub filter: String,
}

impl EntryIdScheme {
    pub fn from_sub_attributes(sub_attributes: &[String]) -> Self {
        let attributes: Vec<String> = sub_attributes
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if attributes.is_empty() {
            EntryIdScheme::DistinguishedName
        } else {
            EntryIdScheme::Attributes(attributes)
        }
    }

    /// Attributes that must be fetched to compute the entry ID.
    pub fn attributes(&self) -> &[String] {
        match self {
            EntryIdScheme::DistinguishedName => &[],
            EntryIdScheme::Attributes(attributes) => attributes,
        }
    }

    /// Entry ID for `entry`. Empty when none of the sub-attributes are present.
    pub fn encode(&self, entry: &DirectoryEntry) -> String {
        let EntryIdScheme::Attributes(attributes) = self else {
            return entry.dn.clone();
        };

        let mut values: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for name in attributes {
            let found = entry.text_values(name);
            if !found.is_empty() {
                values.insert(name.as_str(), found);
            }
        }

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, found) in &values {
            for value in found {
                serializer.append_pair(name, value);
            }
        }
        serializer.finish()
    }

    /// Turn an entry ID back into a search. `None` means the ID is not one we
    /// could have issued.
    pub fn locate(
        &self,
        entry_id: &str,
        base_dn: &str,
        scope: SearchScope,
        get_filter: &str,
    ) -> Option<EntryLocation> {
        if entry_id.is_empty() {
            return None;
        }

        let EntryIdScheme::Attributes(attributes) = self else {
            if !looks_like_dn(entry_id) {
                return None;
            }
            return Some(EntryLocation {
                base: entry_id.to_string(),
                scope: SearchScope::Base,
                filter: get_filter.to_string(),
            });
        };

        let mut filter = String::new();
        for (name, value) in form_urlencoded::parse(entry_id.as_bytes()) {
            // Only attributes we encode ourselves may end up in the filter.
            let known = attributes.iter().find(|a| a.eq_ignore_ascii_case(&name))?;
            filter.push_str(&format!("({}={})", known, ldap_escape(value.as_ref())));
        }
        if filter.is_empty() {
            return None;
        }

        Some(EntryLocation {
            base: base_dn.to_string(),
            scope,
            filter: format!("(&{get_filter}{filter})"),
        })
    }
}

/// Cheap structural DN check: every RDN has a type and a value.
fn looks_like_dn(value: &str) -> bool {
    let mut escaped = false;
    let mut current = String::new();
    for c in value.chars() {
        if escaped {
            escaped = false;
            current.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                current.push(c);
            }
            ',' | ';' => {
                if !valid_rdn(&current) {
                    return false;
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    !escaped && valid_rdn(&current)
}

fn valid_rdn(rdn: &str) -> bool {
    rdn.split('+').all(|ava| {
        ava.split_once('=')
            .is_some_and(|(kind, _)| !kind.trim().is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> EntryIdScheme {
        EntryIdScheme::from_sub_attributes(&["uidNumber".to_string(), "mail".to_string()])
    }

    #[test]
    fn blank_sub_attributes_fall_back_to_dn() {
        assert_eq!(
            EntryIdScheme::from_sub_attributes(&[" ".to_string()]),
            EntryIdScheme::DistinguishedName
        );
    }

    #[test]
    fn dn_scheme_uses_the_dn() {
        let entry = DirectoryEntry::new("uid=alice,dc=example,dc=org");
        assert_eq!(
            EntryIdScheme::DistinguishedName.encode(&entry),
            "uid=alice,dc=example,dc=org"
        );
    }

    #[test]
    fn attributes_are_sorted_by_name_and_keep_value_order() {
        let entry = DirectoryEntry::new("uid=alice,dc=example,dc=org")
            .with_text("uidNumber", &["1000"])
            .with_text("mail", &["b@example.org", "a@example.org"]);
        assert_eq!(
            scheme().encode(&entry),
            "mail=b%40example.org&mail=a%40example.org&uidNumber=1000"
        );
    }

    #[test]
    fn missing_sub_attributes_encode_empty() {
        let entry = DirectoryEntry::new("uid=alice,dc=example,dc=org");
        assert_eq!(scheme().encode(&entry), "");
    }

    #[test]
    fn locate_builds_filter_from_encoded_values() {
        let location = scheme()
            .locate(
                "mail=a%40example.org&uidNumber=1000",
                "dc=example,dc=org",
                SearchScope::Subtree,
                "(objectClass=inetOrgPerson)",
            )
            .unwrap();
        assert_eq!(location.base, "dc=example,dc=org");
        assert_eq!(location.scope, SearchScope::Subtree);
        assert_eq!(
            location.filter,
            "(&(objectClass=inetOrgPerson)(mail=a@example.org)(uidNumber=1000))"
        );
    }

    #[test]
    fn locate_escapes_filter_values() {
        let location = scheme()
            .locate(
                "uidNumber=%2A%29",
                "dc=example,dc=org",
                SearchScope::Subtree,
                "(objectClass=*)",
            )
            .unwrap();
        assert_eq!(
            location.filter.to_ascii_lowercase(),
            "(&(objectclass=*)(uidnumber=\\2a\\29))"
        );
    }

    #[test]
    fn locate_rejects_unknown_attributes() {
        assert!(
            scheme()
                .locate("objectClass=*", "dc=example,dc=org", SearchScope::Subtree, "(x=y)")
                .is_none()
        );
    }

    #[test]
    fn dn_scheme_locates_with_base_scope() {
        let location = EntryIdScheme::DistinguishedName
            .locate(
                "uid=alice,dc=example,dc=org",
                "dc=example,dc=org",
                SearchScope::Subtree,
                "(objectClass=inetOrgPerson)",
            )
            .unwrap();
        assert_eq!(location.base, "uid=alice,dc=example,dc=org");
        assert_eq!(location.scope, SearchScope::Base);
    }

    #[test]
    fn dn_scheme_rejects_garbage() {
        for id in ["", "alice", "uid=alice,dc", "=x"] {
            assert!(
                EntryIdScheme::DistinguishedName
                    .locate(id, "dc=example", SearchScope::Subtree, "(x=y)")
                    .is_none(),
                "{id}"
            );
        }
    }
}
