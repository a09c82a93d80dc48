use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Older education records folded the grade into the degree string.
const LEGACY_CGPA_SEPARATOR: &str = "; CGPA: ";

/// A user's resume as the editor sees it: plain text with rich-text HTML in
/// free-form fields. Compiler-bound encoding happens only when staging a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredResume {
    #[serde(default, deserialize_with = "personal_from_any_shape")]
    pub personal: PersonalInfo,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// A field edited with the rich-text editor: HTML with bold spans and line
/// breaks. Every other string in a resume is plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RichText(pub String);

impl RichText {
    pub fn map(&self, f: impl Fn(&str) -> String) -> Self {
        Self(f(&self.0))
    }
}

impl Deref for RichText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RichText {
    fn from(html: &str) -> Self {
        Self(html.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RichText>,
    /// Skill, language, technology, certification and achievement lists,
    /// plus anything else the editor stores. Kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cgpa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_period: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_duration: Option<String>,
    #[serde(default)]
    pub details: Vec<ExperienceDetail>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<RichText>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<RichText>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StructuredResume {
    /// Applies `f` to the rich-text fields only: `personal.summary`, experience
    /// detail descriptions and project descriptions.
    pub fn map_rich_text<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String,
    {
        map_field(&mut self.personal.summary, &f);
        for detail in self.experience.iter_mut().flat_map(|e| e.details.iter_mut()) {
            map_field(&mut detail.description, &f);
        }
        for project in &mut self.projects {
            map_field(&mut project.description, &f);
        }
        self
    }

    /// Splits legacy `"<degree>; CGPA: <grade>"` values into `degree` and `cgpa`.
    /// An explicit `cgpa` always wins.
    pub fn normalize_legacy(mut self) -> Self {
        for edu in &mut self.education {
            if edu.cgpa.as_deref().is_some_and(|c| !c.is_empty()) {
                continue;
            }
            let Some(degree) = edu.degree.as_deref() else {
                continue;
            };
            if let Some((clean, grade)) = degree.split_once(LEGACY_CGPA_SEPARATOR) {
                let (clean, grade) = (clean.to_string(), grade.to_string());
                edu.degree = Some(clean);
                edu.cgpa = Some(grade);
            }
        }
        self
    }
}

fn map_field<F>(field: &mut Option<RichText>, f: &F)
where
    F: Fn(&str) -> String,
{
    if let Some(text) = field {
        *text = text.map(f);
    }
}

/// `personal` was historically stored as a one-element array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PersonalShape {
    Wrapped(Vec<PersonalInfo>),
    Single(PersonalInfo),
    Missing(()),
}

fn personal_from_any_shape<'de, D>(deserializer: D) -> Result<PersonalInfo, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match PersonalShape::deserialize(deserializer)? {
        PersonalShape::Wrapped(list) => list.into_iter().next().unwrap_or_default(),
        PersonalShape::Single(info) => info,
        PersonalShape::Missing(()) => PersonalInfo::default(),
    })
}
