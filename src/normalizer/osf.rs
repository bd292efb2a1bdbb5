//! Maps OSF JSON:API documents onto the normalized value objects.
//!
//! Every function here is pure: the orchestrator fetches the documents, these only read them.

use crate::errors::RecordNormalizationError;
use crate::models::common::{
    file_extension, mime_type_for, normalize_orcid, parse_source_date, strip_quotes,
};
use crate::models::osf::{
    Collection, ContributorResource, FileResource, FileVersionResource, LicenceResource,
    PreprintResource, Single, StorageProviderResource,
};
use crate::models::records::{
    NormalizedAuthor, NormalizedLicence, NormalizedPreprint, NormalizedVersion, RecordDates,
    StorageFile, SupplementaryLink,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Relationship links this short are placeholders, not real endpoints.
const MIN_RELATED_HREF_LEN: usize = 10;
const MIN_DOI_LEN: usize = 10;

pub const SUPPLEMENTARY_LABEL: &str = "Supplementary material";
pub const PUBLIC_DATA_LABEL: &str = "Public data";

fn decode<T: DeserializeOwned>(
    source_id: &str,
    what: &str,
    document: Value,
) -> Result<T, RecordNormalizationError> {
    serde_json::from_value(document)
        .map_err(|err| RecordNormalizationError::new(source_id, format!("{what}: {err}")))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Source id of a raw record, for logging before the record has been decoded.
pub fn source_id_of(raw: &Value) -> String {
    raw.get("id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string()
}

/// The part of an OSF DOI link after `doi.org/`, or the OSF id when that is missing or too short.
pub fn working_identifier(source_id: &str, preprint_doi_link: Option<&str>) -> String {
    preprint_doi_link
        .map(|link| link.split_once("doi.org/").map_or(link, |(_, doi)| doi))
        .map(str::trim)
        .filter(|doi| doi.len() >= MIN_DOI_LEN)
        .unwrap_or(source_id)
        .to_string()
}

pub fn normalize_preprint(raw: Value) -> Result<NormalizedPreprint, RecordNormalizationError> {
    let source_id = source_id_of(&raw);
    let resource: PreprintResource = decode(&source_id, "preprint", raw)?;
    let attributes = resource.attributes;
    let relationships = resource.relationships;
    let date = |value: Option<&str>| {
        parse_source_date(value).map_err(|reason| RecordNormalizationError::new(&source_id, reason))
    };
    let dates = RecordDates {
        created: date(attributes.date_created.as_deref())?,
        modified: date(attributes.date_modified.as_deref())?,
        published: date(attributes.date_published.as_deref())?,
        doi_created: date(attributes.preprint_doi_created.as_deref())?,
    };

    let preprint_doi_link = resource.links.as_ref().and_then(|links| links.preprint_doi.as_deref());
    let working_identifier = working_identifier(&resource.id, preprint_doi_link);

    let licence_url = relationships
        .license
        .as_ref()
        .and_then(|licence| licence.related_href())
        .filter(|href| href.len() > MIN_RELATED_HREF_LEN)
        .map(str::to_string);
    let contributors_url = relationships
        .contributors
        .as_ref()
        .and_then(|contributors| contributors.related_href())
        .map(str::to_string);
    let files_url = relationships
        .files
        .as_ref()
        .and_then(|files| files.related_href())
        .map(str::to_string);

    let subject_branches = attributes
        .subjects
        .unwrap_or_default()
        .into_iter()
        .map(|branch| {
            branch
                .into_iter()
                .filter_map(|segment| non_empty(segment.text.as_deref()))
                .collect::<Vec<_>>()
        })
        .filter(|branch| !branch.is_empty())
        .collect();

    let tags = attributes
        .tags
        .unwrap_or_default()
        .iter()
        .filter_map(|tag| non_empty(Some(tag.as_str())))
        .collect();

    let mut supplementary_links = Vec::new();
    if let Some(node) = relationships
        .node
        .as_ref()
        .and_then(|node| node.data.as_ref())
        .filter(|node| node.kind == "nodes")
    {
        supplementary_links.push((format!("https://osf.io/{}", node.id), SUPPLEMENTARY_LABEL));
    }
    for link in attributes.data_links.unwrap_or_default() {
        if let Some(link) = non_empty(Some(link.as_str())) {
            supplementary_links.push((link, PUBLIC_DATA_LABEL));
        }
    }
    let supplementary_links = supplementary_links
        .into_iter()
        .zip(1..)
        .map(|((url, label), order)| SupplementaryLink {
            url,
            label: label.to_string(),
            order,
        })
        .collect();

    Ok(NormalizedPreprint {
        source_id: resource.id,
        working_identifier,
        review_state: attributes.reviews_state.unwrap_or_default(),
        title: strip_quotes(&attributes.title),
        abstract_text: strip_quotes(attributes.description.as_deref().unwrap_or_default()),
        dates,
        published_doi: non_empty(attributes.doi.as_deref())
            .map(|doi| format!("https://doi.org/{doi}")),
        licence_url,
        contributors_url,
        files_url,
        subject_branches,
        tags,
        supplementary_links,
        conflict_of_interest: non_empty(attributes.conflict_of_interest_statement.as_deref()),
        why_no_data: non_empty(attributes.why_no_data.as_deref()),
    })
}

/// Returns `None` when the licence relationship resolves to nothing.
pub fn normalize_licence(
    source_id: &str,
    source_url: &str,
    document: Value,
) -> Result<Option<NormalizedLicence>, RecordNormalizationError> {
    let licence: Single<LicenceResource> = decode(source_id, "licence", document)?;
    Ok(licence.data.map(|licence| NormalizedLicence {
        source_url: source_url.to_string(),
        name: licence.attributes.name,
        url: licence.attributes.url.unwrap_or_default(),
        text: licence.attributes.text.unwrap_or_default(),
    }))
}

/// Contributors whose user document is not embedded are skipped.
pub fn normalize_contributors(
    source_id: &str,
    document: Value,
    email_domain: &str,
) -> Result<Vec<NormalizedAuthor>, RecordNormalizationError> {
    let contributors: Collection<ContributorResource> =
        decode(source_id, "contributors", document)?;
    let mut authors = Vec::with_capacity(contributors.data.len());
    for contributor in contributors.data {
        let Some(user) = contributor
            .embeds
            .and_then(|embeds| embeds.users)
            .and_then(|users| users.data)
        else {
            warn!(
                source_id,
                contributor = contributor.id.as_deref().unwrap_or_default(),
                "Skipping contributor without an embedded user"
            );
            continue;
        };
        let attributes = user.attributes;
        let last_name = non_empty(attributes.family_name.as_deref());
        let first_name = non_empty(attributes.given_name.as_deref())
            .or_else(|| non_empty(attributes.full_name.as_deref()).filter(|_| last_name.is_none()));
        authors.push(NormalizedAuthor {
            email: format!("{}@{}", user.id, email_domain),
            first_name,
            middle_name: non_empty(attributes.middle_names.as_deref()),
            last_name,
            orcid: attributes
                .social
                .and_then(|social| social.orcid)
                .and_then(|orcid| normalize_orcid(&orcid)),
            affiliation: None,
            order: contributor.attributes.index,
            active: attributes.active,
            corresponding: false,
        });
    }
    Ok(authors)
}

/// URL of the file listing of the first storage provider.
pub fn storage_listing_url(
    source_id: &str,
    document: Value,
) -> Result<Option<String>, RecordNormalizationError> {
    let providers: Collection<StorageProviderResource> =
        decode(source_id, "storage providers", document)?;
    Ok(providers
        .data
        .first()
        .and_then(|provider| provider.relationships.files.related_href())
        .map(str::to_string))
}

pub fn normalize_storage_file(
    source_id: &str,
    document: Value,
) -> Result<Option<StorageFile>, RecordNormalizationError> {
    let files: Collection<FileResource> = decode(source_id, "storage listing", document)?;
    let Some(file) = files.data.into_iter().next() else {
        return Ok(None);
    };
    let versions_url = file
        .relationships
        .versions
        .related_href()
        .ok_or_else(|| RecordNormalizationError::new(source_id, "file has no versions link"))?
        .to_string();
    Ok(Some(StorageFile {
        current_version: file.attributes.current_version_id(),
        downloads: file.attributes.extra.and_then(|extra| extra.downloads),
        file_id: file.id,
        name: file.attributes.name,
        versions_url,
    }))
}

pub fn normalize_versions(
    source_id: &str,
    file: &StorageFile,
    document: Value,
) -> Result<Vec<NormalizedVersion>, RecordNormalizationError> {
    let versions: Collection<FileVersionResource> = decode(source_id, "file versions", document)?;
    let extension = file_extension(&file.name);
    versions
        .data
        .into_iter()
        .map(|version| {
            let created = parse_source_date(version.attributes.date_created.as_deref())
                .map_err(|reason| RecordNormalizationError::new(source_id, reason))?;
            Ok(NormalizedVersion {
                stored_filename: format!("{}_{}{}", file.file_id, version.id, extension),
                legacy_filename: format!("{}{}", file.file_id, extension),
                original_filename: version
                    .attributes
                    .name
                    .unwrap_or_else(|| file.name.clone()),
                mime_type: mime_type_for(&file.name).to_string(),
                size: version.attributes.size.unwrap_or_default(),
                created,
                download_url: version.links.download,
                is_current: file.current_version.as_deref() == Some(version.id.as_str()),
                version_id: version.id,
            })
        })
        .collect()
}
