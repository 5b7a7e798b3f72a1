use crate::kernel::Document;

/// Normalized owner field written by the `normalize_owner_principal` migration
pub const OWNER_PRINCIPAL_FIELD: &str = "ownerPrincipal";

/// Field names older tenant documents used for the owner marker, in match order
pub const LEGACY_OWNER_FIELDS: [&str; 6] = [
    "userId",
    "userEmail",
    "email",
    "ownerEmail",
    "user_id",
    "owner_id",
];

/// One restaurant's record. Owned by onboarding; read-only here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub id: String,
    pub display_name: String,
    /// First owner field present on the document, if any
    pub owner_principal_marker: Option<String>,
}

impl Tenant {
    pub fn from_document(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            display_name: document
                .str_field("restaurantName")
                .unwrap_or_default()
                .to_string(),
            owner_principal_marker: owner_fields(document)
                .next()
                .map(|(_, value)| value.to_string()),
        }
    }
}

/// Owner field candidates present on a tenant document: the normalized field
/// first, then the legacy names. Non-string values are ignored.
pub fn owner_fields(document: &Document) -> impl Iterator<Item = (&'static str, &str)> + '_ {
    std::iter::once(OWNER_PRINCIPAL_FIELD)
        .chain(LEGACY_OWNER_FIELDS)
        .filter_map(move |field| document.str_field(field).map(|value| (field, value)))
}

/// The identity a tenant-access check is keyed on
#[derive(Debug, Clone, Copy)]
pub enum AccessKey<'a> {
    /// Email-like identifier, compared case-insensitively
    Email(&'a str),
    /// Raw principal id from the identity provider, compared exactly
    PrincipalId(&'a str),
}

impl AccessKey<'_> {
    pub fn matches(&self, stored: &str) -> bool {
        match self {
            AccessKey::Email(email) => stored.trim().to_lowercase() == email.trim().to_lowercase(),
            AccessKey::PrincipalId(id) => stored == *id,
        }
    }
}
