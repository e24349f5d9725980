use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resume document as the editing core sees it: an opaque, deep-comparable
/// JSON value. Cloning is a deep copy.
pub type Document = Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub website: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experience {
    pub company: String,
    pub position: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Vec<String>,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub field_of_study: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub gpa: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Certification {
    pub name: String,
    pub issuing_organization: String,
    pub issue_date: Option<String>,
    pub expiration_date: Option<String>,
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    pub name: String,
    pub category: String,
    pub level: SkillLevel,
}

/// Typed view of a resume. Used to seed new sessions; the history and
/// version ledgers only ever handle the untyped `Document`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Resume {
    pub personal_info: PersonalInfo,
    pub professional_summary: String,
    pub skills: Vec<Skill>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub projects: Vec<Project>,
    pub certifications: Vec<Certification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_order: Option<Vec<String>>,
}

impl Resume {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn into_document(self) -> Document {
        // A struct of strings and vectors always serializes.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
