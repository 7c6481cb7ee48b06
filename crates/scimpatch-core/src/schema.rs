//! SCIM schema definitions (RFC 7643).
//!
//! Only the parts of a schema the patch engine needs are modelled: attribute
//! names, types, multi-valuedness, case sensitivity, mutability and
//! sub-attributes. Lookups are case-insensitive.

use serde::{Deserialize, Serialize};

/// Core User schema URN.
pub const CORE_USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";

/// Enterprise User extension schema URN.
pub const ENTERPRISE_USER_SCHEMA: &str =
    "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    String,
    Boolean,
    Decimal,
    Integer,
    DateTime,
    Binary,
    Reference,
    Complex,
}

impl AttributeType {
    /// Whether values of this type support ordering and substring operators.
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            Self::String | Self::Decimal | Self::Integer | Self::DateTime | Self::Reference
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    ReadOnly,
    #[default]
    ReadWrite,
    Immutable,
    WriteOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    #[serde(default)]
    pub multi_valued: bool,
    #[serde(default)]
    pub case_exact: bool,
    #[serde(default)]
    pub mutability: Mutability,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_attributes: Vec<AttributeDefinition>,
}

impl AttributeDefinition {
    fn new(name: &str, kind: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            multi_valued: false,
            case_exact: false,
            mutability: Mutability::ReadWrite,
            sub_attributes: Vec::new(),
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, AttributeType::String)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, AttributeType::Boolean)
    }

    pub fn date_time(name: &str) -> Self {
        Self::new(name, AttributeType::DateTime)
    }

    pub fn reference(name: &str) -> Self {
        Self::new(name, AttributeType::Reference).case_exact()
    }

    pub fn complex(name: &str, sub_attributes: Vec<AttributeDefinition>) -> Self {
        Self {
            sub_attributes,
            ..Self::new(name, AttributeType::Complex)
        }
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    pub fn case_exact(mut self) -> Self {
        self.case_exact = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.mutability = Mutability::ReadOnly;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.mutability = Mutability::WriteOnly;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.mutability == Mutability::ReadOnly
    }

    pub fn sub_attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.sub_attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: String,
    pub name: String,
    pub attributes: Vec<AttributeDefinition>,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// RFC 7643 §4.1 User schema, including the common attributes
    /// (`id`, `externalId`, `meta`).
    pub fn core_user() -> Self {
        use AttributeDefinition as A;

        let multi_valued_complex = |name: &str| {
            A::complex(
                name,
                vec![
                    A::string("value"),
                    A::string("display"),
                    A::string("type"),
                    A::boolean("primary"),
                ],
            )
            .multi_valued()
        };

        Self {
            id: CORE_USER_SCHEMA.to_string(),
            name: "User".to_string(),
            attributes: vec![
                A::string("id").case_exact().read_only(),
                A::string("externalId").case_exact(),
                A::complex(
                    "meta",
                    vec![
                        A::string("resourceType").case_exact().read_only(),
                        A::date_time("created").read_only(),
                        A::date_time("lastModified").read_only(),
                        A::reference("location").read_only(),
                        A::string("version").case_exact().read_only(),
                    ],
                )
                .read_only(),
                A::string("userName"),
                A::complex(
                    "name",
                    vec![
                        A::string("formatted"),
                        A::string("familyName"),
                        A::string("givenName"),
                        A::string("middleName"),
                        A::string("honorificPrefix"),
                        A::string("honorificSuffix"),
                    ],
                ),
                A::string("displayName"),
                A::string("nickName"),
                A::reference("profileUrl"),
                A::string("title"),
                A::string("userType"),
                A::string("preferredLanguage"),
                A::string("locale"),
                A::string("timezone"),
                A::boolean("active"),
                A::string("password").case_exact().write_only(),
                multi_valued_complex("emails"),
                multi_valued_complex("phoneNumbers"),
                multi_valued_complex("ims"),
                multi_valued_complex("photos"),
                A::complex(
                    "addresses",
                    vec![
                        A::string("formatted"),
                        A::string("streetAddress"),
                        A::string("locality"),
                        A::string("region"),
                        A::string("postalCode"),
                        A::string("country"),
                        A::string("type"),
                        A::boolean("primary"),
                    ],
                )
                .multi_valued(),
                A::complex(
                    "groups",
                    vec![
                        A::string("value").read_only(),
                        A::reference("$ref").read_only(),
                        A::string("display").read_only(),
                        A::string("type").read_only(),
                    ],
                )
                .multi_valued()
                .read_only(),
                multi_valued_complex("entitlements"),
                multi_valued_complex("roles"),
                multi_valued_complex("x509Certificates"),
            ],
        }
    }

    /// RFC 7643 §4.3 Enterprise User extension.
    pub fn enterprise_user() -> Self {
        use AttributeDefinition as A;

        Self {
            id: ENTERPRISE_USER_SCHEMA.to_string(),
            name: "EnterpriseUser".to_string(),
            attributes: vec![
                A::string("employeeNumber"),
                A::string("costCenter"),
                A::string("organization"),
                A::string("division"),
                A::string("department"),
                A::complex(
                    "manager",
                    vec![
                        A::string("value"),
                        A::reference("$ref"),
                        A::string("displayName").read_only(),
                    ],
                ),
            ],
        }
    }
}

/// A resource's core schema together with its schema extensions.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSet {
    pub core: Schema,
    pub extensions: Vec<Schema>,
}

impl SchemaSet {
    pub fn new(core: Schema, extensions: Vec<Schema>) -> Self {
        Self { core, extensions }
    }

    /// Core User schema with the Enterprise User extension.
    pub fn user() -> Self {
        Self::new(Schema::core_user(), vec![Schema::enterprise_user()])
    }

    pub fn schema(&self, uri: &str) -> Option<&Schema> {
        std::iter::once(&self.core)
            .chain(self.extensions.iter())
            .find(|s| s.id.eq_ignore_ascii_case(uri))
    }

    /// Whether `uri` names one of the extension schemas. Extension attributes
    /// live in a nested object keyed by the extension URN.
    pub fn is_extension(&self, uri: &str) -> bool {
        self.extensions
            .iter()
            .any(|s| s.id.eq_ignore_ascii_case(uri))
    }

    /// Looks up a top-level attribute. Without a URI only the core schema is
    /// searched.
    pub fn attribute(&self, uri: Option<&str>, name: &str) -> Option<&AttributeDefinition> {
        match uri {
            Some(uri) => self.schema(uri)?.attribute(name),
            None => self.core.attribute(name),
        }
    }

    /// All schema URNs, core first.
    pub fn schema_ids(&self) -> Vec<&str> {
        std::iter::once(self.core.id.as_str())
            .chain(self.extensions.iter().map(|s| s.id.as_str()))
            .collect()
    }
}

impl Default for SchemaSet {
    fn default() -> Self {
        Self::user()
    }
}
