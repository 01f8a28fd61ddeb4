//! Expert personas the analysis runs through

use serde::{Deserialize, Serialize};
use std::fmt;

/// A viewpoint the model is asked to adopt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub role: String,
    pub expertise: String,
    pub focus: String,
}

impl Persona {
    pub fn new(role: impl Into<String>, expertise: impl Into<String>, focus: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            expertise: expertise.into(),
            focus: focus.into(),
        }
    }
}

/// The built-in personas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaKind {
    BusinessAnalyst,
    Architect,
    Developer,
    Qa,
}

impl PersonaKind {
    pub const ALL: [PersonaKind; 4] = [
        PersonaKind::BusinessAnalyst,
        PersonaKind::Architect,
        PersonaKind::Developer,
        PersonaKind::Qa,
    ];

    /// Key used in configuration files and branch names
    pub fn key(&self) -> &'static str {
        match self {
            PersonaKind::BusinessAnalyst => "business_analyst",
            PersonaKind::Architect => "architect",
            PersonaKind::Developer => "developer",
            PersonaKind::Qa => "qa",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    pub fn builtin(&self) -> Persona {
        match self {
            PersonaKind::BusinessAnalyst => Persona::new(
                "Business Analyst",
                "Requirements analysis, process optimization, stakeholder communication",
                "Business value, user needs, process improvements",
            ),
            PersonaKind::Architect => Persona::new(
                "Solution Architect",
                "System design, technical standards, integration patterns",
                "Architecture, scalability, security, maintainability",
            ),
            PersonaKind::Developer => Persona::new(
                "Senior Developer",
                "Code quality, implementation patterns, technical debt",
                "Code structure, performance, testing, maintainability",
            ),
            PersonaKind::Qa => Persona::new(
                "QA Engineer",
                "Test planning, test automation, acceptance criteria",
                "Testability, user acceptance testing, regression risks",
            ),
        }
    }
}

impl fmt::Display for PersonaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// One persona per kind, possibly overridden by configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaSet {
    pub business_analyst: Persona,
    pub architect: Persona,
    pub developer: Persona,
    pub qa: Persona,
}

impl Default for PersonaSet {
    fn default() -> Self {
        Self {
            business_analyst: PersonaKind::BusinessAnalyst.builtin(),
            architect: PersonaKind::Architect.builtin(),
            developer: PersonaKind::Developer.builtin(),
            qa: PersonaKind::Qa.builtin(),
        }
    }
}

impl PersonaSet {
    pub fn get(&self, kind: PersonaKind) -> &Persona {
        match kind {
            PersonaKind::BusinessAnalyst => &self.business_analyst,
            PersonaKind::Architect => &self.architect,
            PersonaKind::Developer => &self.developer,
            PersonaKind::Qa => &self.qa,
        }
    }

    pub fn set(&mut self, kind: PersonaKind, persona: Persona) {
        match kind {
            PersonaKind::BusinessAnalyst => self.business_analyst = persona,
            PersonaKind::Architect => self.architect = persona,
            PersonaKind::Developer => self.developer = persona,
            PersonaKind::Qa => self.qa = persona,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PersonaKind, &Persona)> {
        PersonaKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}
