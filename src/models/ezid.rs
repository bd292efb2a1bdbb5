//! EZID wire format: the Crossref posted-content and journal-article payloads, the ANVL
//! envelope around them, and the single-line text response.

use crate::errors::PreconditionError;
use crate::models::common::normalize_orcid;
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use regex::Regex;
use validator::ValidateUrl;

static DOI_IN_RESPONSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"doi:([0-9A-Z./]+)").expect("valid EZID response regex"));

const CROSSREF_NS: &str = "http://www.crossref.org/schema/4.4.2";
const JATS_NS: &str = "http://www.ncbi.nlm.nih.gov/JATS1";
const RELATIONS_NS: &str = "http://www.crossref.org/relations.xsd";

/// Parsed EZID response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Success { identifier: String },
    Failure { message: String },
}

impl RegistrationOutcome {
    pub fn parse(body: &str) -> Self {
        let body = body.trim();
        if !body.starts_with("success:") {
            return RegistrationOutcome::Failure {
                message: body.to_string(),
            };
        }
        match DOI_IN_RESPONSE_RE.captures(body).and_then(|caps| caps.get(1)) {
            Some(identifier) => RegistrationOutcome::Success {
                identifier: identifier.as_str().to_string(),
            },
            None => RegistrationOutcome::Failure {
                message: format!("no DOI in success response: {body}"),
            },
        }
    }
}

/// Lifecycle of one preprint's DOI as seen by the registration commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierState {
    Unregistered,
    MintRequested,
    Registered(String),
    MintFailed(String),
    UpdateRequested(String),
    UpdateFailed { identifier: String, message: String },
}

impl IdentifierState {
    pub fn from_preprint_doi(preprint_doi: Option<&str>) -> Self {
        match preprint_doi.map(str::trim).filter(|doi| !doi.is_empty()) {
            Some(doi) => IdentifierState::Registered(doi.to_string()),
            None => IdentifierState::Unregistered,
        }
    }

    pub fn request_mint(self) -> Result<Self, PreconditionError> {
        match self {
            IdentifierState::Unregistered | IdentifierState::MintFailed(_) => {
                Ok(IdentifierState::MintRequested)
            }
            other => Err(PreconditionError::InvalidState(format!(
                "cannot mint a DOI for a preprint in state {other:?}"
            ))),
        }
    }

    pub fn request_update(self) -> Result<Self, PreconditionError> {
        match self {
            IdentifierState::Registered(identifier)
            | IdentifierState::UpdateFailed { identifier, .. } => {
                Ok(IdentifierState::UpdateRequested(identifier))
            }
            other => Err(PreconditionError::InvalidState(format!(
                "cannot update the DOI of a preprint in state {other:?}"
            ))),
        }
    }

    /// Applies the registration response to a pending request.
    pub fn complete(self, outcome: &RegistrationOutcome) -> Self {
        match (self, outcome) {
            (IdentifierState::MintRequested, RegistrationOutcome::Success { identifier }) => {
                IdentifierState::Registered(identifier.clone())
            }
            (IdentifierState::MintRequested, RegistrationOutcome::Failure { message }) => {
                IdentifierState::MintFailed(message.clone())
            }
            (IdentifierState::UpdateRequested(_), RegistrationOutcome::Success { identifier }) => {
                IdentifierState::Registered(identifier.clone())
            }
            (IdentifierState::UpdateRequested(identifier), RegistrationOutcome::Failure { message }) => {
                IdentifierState::UpdateFailed {
                    identifier,
                    message: message.clone(),
                }
            }
            (state, _) => state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl From<NaiveDateTime> for DateParts {
    fn from(value: NaiveDateTime) -> Self {
        DateParts {
            year: value.year(),
            month: value.month(),
            day: value.day(),
        }
    }
}

impl DateParts {
    fn render(&self, tag: &str) -> String {
        format!(
            "<{tag}><month>{:02}</month><day>{:02}</day><year>{}</year></{tag}>",
            self.month, self.day, self.year
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contributor {
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub orcid: Option<String>,
}

impl Contributor {
    fn render(&self, first: bool) -> String {
        let given = self
            .given_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let surname = self
            .surname
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or(given)
            .unwrap_or_default();
        let sequence = if first { "first" } else { "additional" };
        let mut xml = format!(r#"<person_name contributor_role="author" sequence="{sequence}">"#);
        if let Some(given) = given {
            xml.push_str(&format!("<given_name>{}</given_name>", escape(given)));
        }
        xml.push_str(&format!("<surname>{}</surname>", escape(surname)));
        if let Some(orcid) = self.orcid.as_deref().and_then(normalize_orcid) {
            xml.push_str(&format!("<ORCID>{}</ORCID>", escape(&orcid)));
        }
        xml.push_str("</person_name>");
        xml
    }
}

/// Crossref posted-content metadata for one preprint.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedContent {
    pub group_title: String,
    pub contributors: Vec<Contributor>,
    pub title: String,
    pub abstract_text: String,
    pub posted_date: DateParts,
    pub acceptance_date: DateParts,
    pub published_doi: Option<String>,
    pub target_url: String,
    pub timestamp: DateTime<Utc>,
}

fn escape_percent(value: &str) -> String {
    value.replace('%', "%25")
}

fn render_contributors(contributors: &[Contributor]) -> String {
    contributors
        .iter()
        .enumerate()
        .map(|(index, contributor)| contributor.render(index == 0))
        .collect()
}

fn envelope(xml: String, target_url: &str, owner: &str) -> String {
    format!(
        "crossref: {xml}\n_crossref: yes\n_profile: crossref\n_target: {target_url}\n_owner: {owner}"
    )
}

impl PostedContent {
    /// The Crossref XML on a single line.
    pub fn render_xml(&self) -> String {
        let contributors = render_contributors(&self.contributors);
        let relation = self
            .published_doi
            .as_deref()
            .filter(|doi| doi.validate_url())
            .map(|doi| {
                format!(
                    r#"<program xmlns="{RELATIONS_NS}"><related_item><intra_work_relation relationship-type="isPreprintOf" identifier-type="doi">{}</intra_work_relation></related_item></program>"#,
                    escape(doi)
                )
            })
            .unwrap_or_default();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<posted_content xmlns="{CROSSREF_NS}" xmlns:jats="{JATS_NS}" type="preprint">
<group_title>{group_title}</group_title>
<contributors>{contributors}</contributors>
<titles><title>{title}</title></titles>
{posted}
{accepted}
<jats:abstract><jats:p>{abstract_text}</jats:p></jats:abstract>
{relation}
<doi_data><timestamp>{timestamp}</timestamp><resource>{target}</resource></doi_data>
</posted_content>"#,
            group_title = escape(self.group_title.as_str()),
            title = escape(escape_percent(&self.title).as_str()),
            posted = self.posted_date.render("posted_date"),
            accepted = self.acceptance_date.render("acceptance_date"),
            abstract_text = escape(escape_percent(&self.abstract_text).as_str()),
            timestamp = self.timestamp.format("%Y%m%d%H%M%S"),
            target = escape(self.target_url.as_str()),
        );
        xml.replace('\n', "")
    }

    /// The ANVL body EZID expects.
    pub fn envelope(&self, owner: &str) -> String {
        envelope(self.render_xml(), &self.target_url, owner)
    }
}

/// Crossref journal-article metadata for an article whose DOI the journal assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalArticle {
    pub journal_title: String,
    pub issn: Option<String>,
    pub contributors: Vec<Contributor>,
    pub title: String,
    pub abstract_text: Option<String>,
    pub publication_date: DateParts,
    pub doi: String,
    pub target_url: String,
    pub timestamp: DateTime<Utc>,
}

impl JournalArticle {
    pub fn render_xml(&self) -> String {
        let issn = self
            .issn
            .as_deref()
            .map(|issn| format!(r#"<issn media_type="electronic">{}</issn>"#, escape(issn)))
            .unwrap_or_default();
        let abstract_text = self
            .abstract_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(|text| {
                format!(
                    "<jats:abstract><jats:p>{}</jats:p></jats:abstract>",
                    escape(escape_percent(text).as_str())
                )
            })
            .unwrap_or_default();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<journal xmlns="{CROSSREF_NS}" xmlns:jats="{JATS_NS}">
<journal_metadata language="en"><full_title>{journal_title}</full_title>{issn}</journal_metadata>
<journal_article publication_type="full_text">
<titles><title>{title}</title></titles>
<contributors>{contributors}</contributors>
{abstract_text}
{published}
<doi_data><doi>{doi}</doi><timestamp>{timestamp}</timestamp><resource>{target}</resource></doi_data>
</journal_article>
</journal>"#,
            journal_title = escape(self.journal_title.as_str()),
            title = escape(escape_percent(&self.title).as_str()),
            contributors = render_contributors(&self.contributors),
            published = self.publication_date.render("publication_date"),
            doi = escape(self.doi.as_str()),
            timestamp = self.timestamp.format("%Y%m%d%H%M%S"),
            target = escape(self.target_url.as_str()),
        );
        xml.replace('\n', "")
    }

    /// The ANVL body EZID expects, owned by the journal's Crossref registrant.
    pub fn envelope(&self, registrant: &str) -> String {
        envelope(self.render_xml(), &self.target_url, registrant)
    }
}
