//! Typed partial views of the OSF JSON:API documents the importer reads.
//!
//! Only the fields the importer uses are declared. Optional fields stay `Option` so a
//! missing value is decided on by the normalizer instead of failing deserialization.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct Collection<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub links: Option<PageLinks>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageLinks {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Single<T> {
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct Href {
    pub href: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RelationshipLinks {
    pub related: Option<Href>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceIdentifier {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Relationship {
    pub links: Option<RelationshipLinks>,
    pub data: Option<ResourceIdentifier>,
}

impl Relationship {
    pub fn related_href(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|links| links.related.as_ref())
            .map(|related| related.href.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct PreprintResource {
    pub id: String,
    pub attributes: PreprintAttributes,
    #[serde(default)]
    pub relationships: PreprintRelationships,
    #[serde(default)]
    pub links: Option<PreprintLinks>,
}

#[derive(Debug, Deserialize)]
pub struct SubjectSegment {
    pub id: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreprintAttributes {
    pub title: String,
    pub description: Option<String>,
    pub date_created: Option<String>,
    pub date_modified: Option<String>,
    pub date_published: Option<String>,
    pub preprint_doi_created: Option<String>,
    pub reviews_state: Option<String>,
    pub doi: Option<String>,
    pub data_links: Option<Vec<String>>,
    pub why_no_data: Option<String>,
    pub conflict_of_interest_statement: Option<String>,
    pub subjects: Option<Vec<Vec<SubjectSegment>>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreprintRelationships {
    pub license: Option<Relationship>,
    pub contributors: Option<Relationship>,
    pub files: Option<Relationship>,
    pub node: Option<Relationship>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreprintLinks {
    pub preprint_doi: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LicenceResource {
    pub id: String,
    pub attributes: LicenceAttributes,
}

#[derive(Debug, Deserialize)]
pub struct LicenceAttributes {
    pub name: String,
    pub text: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContributorResource {
    pub id: Option<String>,
    pub attributes: ContributorAttributes,
    pub embeds: Option<ContributorEmbeds>,
}

#[derive(Debug, Deserialize)]
pub struct ContributorAttributes {
    pub index: i32,
}

#[derive(Debug, Deserialize)]
pub struct ContributorEmbeds {
    pub users: Option<Single<UserResource>>,
}

#[derive(Debug, Deserialize)]
pub struct UserResource {
    pub id: String,
    pub attributes: UserAttributes,
}

#[derive(Debug, Deserialize)]
pub struct UserAttributes {
    pub full_name: Option<String>,
    pub given_name: Option<String>,
    pub middle_names: Option<String>,
    pub family_name: Option<String>,
    #[serde(default)]
    pub active: bool,
    pub social: Option<UserSocial>,
}

#[derive(Debug, Deserialize)]
pub struct UserSocial {
    pub orcid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StorageProviderResource {
    pub id: String,
    pub relationships: StorageProviderRelationships,
}

#[derive(Debug, Deserialize)]
pub struct StorageProviderRelationships {
    pub files: Relationship,
}

#[derive(Debug, Deserialize)]
pub struct FileResource {
    pub id: String,
    pub attributes: FileAttributes,
    pub relationships: FileRelationships,
}

#[derive(Debug, Deserialize)]
pub struct FileAttributes {
    pub name: String,
    /// OSF sends this as a number, older payloads as a string.
    pub current_version: Option<Value>,
    pub extra: Option<FileExtra>,
}

impl FileAttributes {
    pub fn current_version_id(&self) -> Option<String> {
        match self.current_version.as_ref()? {
            Value::String(version) => Some(version.clone()),
            Value::Number(version) => Some(version.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FileExtra {
    pub downloads: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FileRelationships {
    pub versions: Relationship,
}

#[derive(Debug, Deserialize)]
pub struct FileVersionResource {
    pub id: String,
    pub attributes: FileVersionAttributes,
    pub links: FileVersionLinks,
}

#[derive(Debug, Deserialize)]
pub struct FileVersionAttributes {
    pub name: Option<String>,
    pub size: Option<i64>,
    pub date_created: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileVersionLinks {
    pub download: String,
}
