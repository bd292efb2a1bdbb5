//! Parses PLOS submission packages: the `.go.xml` delivery manifest and the JATS metadata file.

use crate::errors::RecordNormalizationError;
use crate::models::common::normalize_orcid;
use crate::models::records::{NormalizedAuthor, NormalizedSubmission, SubjectPath};
use quick_xml::de::from_str;
use serde::Deserialize;

const EXPECTED_INGEST_TYPE: &str = "eartharxiv";
const EXPECTED_VENDOR: &str = "plos";
const EXPECTED_PUBLISHER: &str = "PLOS";
const REQUIRED_LICENCE: &str = "cc_by";

#[derive(Debug, Deserialize)]
struct GoFile {
    #[serde(rename = "@type")]
    ingest_type: Option<String>,
    #[serde(rename = "metadata-filename")]
    metadata_filename: NamedFile,
    #[serde(rename = "pdf-filename")]
    pdf_filename: NamedFile,
    #[serde(rename = "vendor-id")]
    vendor_id: String,
    #[serde(rename = "reference-id")]
    reference_id: String,
}

#[derive(Debug, Deserialize)]
struct NamedFile {
    #[serde(rename = "@name")]
    name: String,
}

/// The files a `.go.xml` manifest announces.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub reference_id: String,
    pub metadata_filename: String,
    pub pdf_filename: String,
}

#[derive(Debug, Deserialize)]
struct JatsArticle {
    front: JatsFront,
}

#[derive(Debug, Deserialize)]
struct JatsFront {
    #[serde(rename = "journal-meta")]
    journal_meta: JournalMeta,
    #[serde(rename = "article-meta")]
    article_meta: ArticleMeta,
}

#[derive(Debug, Deserialize)]
struct JournalMeta {
    #[serde(rename = "journal-id", default)]
    journal_ids: Vec<JournalId>,
}

#[derive(Debug, Deserialize)]
struct JournalId {
    #[serde(rename = "@journal-id-type")]
    id_type: String,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct ArticleMeta {
    #[serde(rename = "article-categories")]
    categories: Option<ArticleCategories>,
    #[serde(rename = "title-group")]
    title_group: TitleGroup,
    #[serde(rename = "contrib-group", default)]
    contrib_groups: Vec<ContribGroup>,
    #[serde(rename = "abstract")]
    abstract_section: Option<AbstractSection>,
    #[serde(rename = "kwd-group", default)]
    keyword_groups: Vec<KeywordGroup>,
    permissions: Option<Permissions>,
    #[serde(rename = "custom-meta-group")]
    custom_meta_group: Option<CustomMetaGroup>,
}

#[derive(Debug, Deserialize)]
struct ArticleCategories {
    #[serde(rename = "subj-group", default)]
    groups: Vec<SubjectGroup>,
}

#[derive(Debug, Deserialize)]
struct SubjectGroup {
    #[serde(rename = "subject", default)]
    subjects: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TitleGroup {
    #[serde(rename = "article-title")]
    article_title: String,
}

#[derive(Debug, Deserialize)]
struct ContribGroup {
    #[serde(rename = "contrib", default)]
    contribs: Vec<Contrib>,
}

#[derive(Debug, Deserialize)]
struct Contrib {
    #[serde(rename = "@contrib-type")]
    contrib_type: Option<String>,
    #[serde(rename = "@corresp")]
    corresp: Option<String>,
    name: Option<PersonName>,
    collab: Option<String>,
    address: Option<Address>,
    #[serde(rename = "contrib-id", default)]
    contrib_ids: Vec<ContribId>,
}

#[derive(Debug, Deserialize)]
struct PersonName {
    surname: Option<String>,
    #[serde(rename = "given-names")]
    given_names: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Address {
    email: Option<String>,
    institution: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContribId {
    #[serde(rename = "@contrib-id-type")]
    id_type: Option<String>,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AbstractSection {
    #[serde(rename = "p", default)]
    paragraphs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KeywordGroup {
    #[serde(rename = "kwd", default)]
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Permissions {
    license: Option<Licence>,
}

#[derive(Debug, Deserialize)]
struct Licence {
    #[serde(rename = "license-p")]
    licence_p: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomMetaGroup {
    #[serde(rename = "custom-meta", default)]
    entries: Vec<CustomMeta>,
}

#[derive(Debug, Deserialize)]
struct CustomMeta {
    #[serde(rename = "meta-name")]
    name: String,
    #[serde(rename = "meta-value", default)]
    value: Option<String>,
}

fn clean(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| clean(&v)).filter(|v| !v.is_empty())
}

pub fn parse_go_file(label: &str, xml: &str) -> Result<Manifest, RecordNormalizationError> {
    let go: GoFile = from_str(xml)
        .map_err(|err| RecordNormalizationError::new(label, format!("invalid go file: {err}")))?;
    if go.ingest_type.as_deref() != Some(EXPECTED_INGEST_TYPE) {
        return Err(RecordNormalizationError::new(
            label,
            format!("unexpected ingest type {:?}", go.ingest_type),
        ));
    }
    if go.vendor_id.trim() != EXPECTED_VENDOR {
        return Err(RecordNormalizationError::new(
            label,
            format!("unexpected vendor {}", go.vendor_id.trim()),
        ));
    }
    let reference_id = go.reference_id.trim().to_string();
    let metadata_filename = go.metadata_filename.name.trim().to_string();
    let pdf_filename = go.pdf_filename.name.trim().to_string();
    if reference_id.is_empty()
        || !metadata_filename.contains(&reference_id)
        || !pdf_filename.contains(&reference_id)
    {
        return Err(RecordNormalizationError::new(
            label,
            format!("filenames do not match reference id {reference_id}"),
        ));
    }
    Ok(Manifest {
        reference_id,
        metadata_filename,
        pdf_filename,
    })
}

/// Parses and verifies the JATS metadata of one package.
pub fn parse_submission(
    manifest: &Manifest,
    xml: &str,
) -> Result<NormalizedSubmission, RecordNormalizationError> {
    let reference_id = manifest.reference_id.as_str();
    let fail = |reason: String| RecordNormalizationError::new(reference_id, reason);
    let article: JatsArticle =
        from_str(xml).map_err(|err| fail(format!("invalid JATS metadata: {err}")))?;

    let mut journal_code = String::new();
    for journal_id in &article.front.journal_meta.journal_ids {
        let value = journal_id.value.trim();
        match journal_id.id_type.as_str() {
            "delivering-vendor-id" if value != EXPECTED_VENDOR => {
                return Err(fail(format!("unexpected delivering vendor {value}")));
            }
            "delivering-publisher-id" if value != EXPECTED_PUBLISHER => {
                return Err(fail(format!("unexpected delivering publisher {value}")));
            }
            "destination-journal-code" if value != EXPECTED_INGEST_TYPE => {
                return Err(fail(format!("unexpected destination journal {value}")));
            }
            "delivering-journal-code" => journal_code = value.to_string(),
            _ => {}
        }
    }

    let meta = article.front.article_meta;
    let custom_meta: Vec<(String, String)> = meta
        .custom_meta_group
        .map(|group| group.entries)
        .unwrap_or_default()
        .into_iter()
        .map(|entry| (entry.name.trim().to_string(), entry.value.unwrap_or_default().trim().to_string()))
        .collect();
    let custom_value = |name: &str| {
        custom_meta
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty())
    };
    if custom_value("author_approval").as_deref() != Some("true") {
        return Err(fail("authors have not approved the submission".to_string()));
    }
    let licence = meta
        .permissions
        .and_then(|permissions| permissions.license)
        .and_then(|licence| licence.licence_p)
        .map(|licence| licence.trim().to_string());
    if licence.as_deref() != Some(REQUIRED_LICENCE) {
        return Err(fail(format!("unsupported licence {licence:?}")));
    }

    let mut authors = Vec::new();
    for contrib in meta.contrib_groups.into_iter().flat_map(|group| group.contribs) {
        if contrib.contrib_type.as_deref() != Some("author") || contrib.collab.is_some() {
            continue;
        }
        let Some(name) = contrib.name else {
            continue;
        };
        let (email, institution) = contrib
            .address
            .map(|address| (clean_optional(address.email), clean_optional(address.institution)))
            .unwrap_or_default();
        let orcid = contrib
            .contrib_ids
            .iter()
            .find(|id| id.id_type.as_deref() == Some("orcid"))
            .and_then(|id| normalize_orcid(&id.value));
        authors.push(NormalizedAuthor {
            email: email.unwrap_or_default(),
            first_name: clean_optional(name.given_names),
            middle_name: None,
            last_name: clean_optional(name.surname),
            orcid,
            affiliation: institution,
            order: authors.len() as i32 + 1,
            active: false,
            corresponding: contrib.corresp.as_deref() == Some("yes"),
        });
    }
    if !authors
        .iter()
        .any(|author| author.corresponding && !author.email.is_empty())
    {
        return Err(fail("no corresponding author with an email".to_string()));
    }
    // Authors without an address cannot be deduplicated by email.
    authors.retain(|author| !author.email.is_empty());

    let subjects = meta
        .categories
        .map(|categories| categories.groups)
        .unwrap_or_default()
        .into_iter()
        .flat_map(|group| group.subjects)
        .filter_map(|subject| {
            let mut parts = subject.split(':').map(clean).filter(|part| !part.is_empty());
            let parent = parts.next()?;
            Some(SubjectPath {
                parent,
                child: parts.next(),
            })
        })
        .collect();

    let keywords = meta
        .keyword_groups
        .into_iter()
        .flat_map(|group| group.keywords)
        .flat_map(|keyword| {
            keyword
                .split(',')
                .map(clean)
                .filter(|word| !word.is_empty())
                .collect::<Vec<_>>()
        })
        .collect();

    let data_links = custom_meta
        .iter()
        .filter(|(key, value)| key == "data_availability_link" && !value.is_empty())
        .map(|(_, value)| value.clone())
        .collect();

    Ok(NormalizedSubmission {
        reference_id: reference_id.to_string(),
        journal_code,
        metadata_filename: manifest.metadata_filename.clone(),
        pdf_filename: manifest.pdf_filename.clone(),
        title: clean(&meta.title_group.article_title),
        abstract_text: meta
            .abstract_section
            .map(|section| {
                section
                    .paragraphs
                    .iter()
                    .map(|paragraph| clean(paragraph))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            })
            .unwrap_or_default(),
        authors,
        subjects,
        keywords,
        conflict_of_interest: custom_value("coi_stmt"),
        data_availability: custom_value("data_availability"),
        data_links,
    })
}
