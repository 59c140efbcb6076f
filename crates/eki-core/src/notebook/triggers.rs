//! Ordered trigger table for notebook cell replacement
//!
//! Each trigger is a category plus a list of predicates; a trigger fires when
//! any of its predicates holds. Triggers are tried in table order and the
//! first one that fires decides the cell's replacement template.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCategory {
    PublicDatasetSetup,
    CredentialSetup,
    DeprecatedAiCall,
    SampleDataCreation,
    DemoAnalysis,
    ContentAnalysis,
}

impl TriggerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicDatasetSetup => "public_dataset_setup",
            Self::CredentialSetup => "credential_setup",
            Self::DeprecatedAiCall => "deprecated_ai_call",
            Self::SampleDataCreation => "sample_data_creation",
            Self::DemoAnalysis => "demo_analysis",
            Self::ContentAnalysis => "content_analysis",
        }
    }
}

impl std::fmt::Display for TriggerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Textual test applied to a cell's joined source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Source contains the literal
    Contains(&'static str),
    /// Source contains every literal
    AllOf(&'static [&'static str]),
}

impl Predicate {
    pub fn matches(&self, source: &str) -> bool {
        match self {
            Predicate::Contains(needle) => source.contains(needle),
            Predicate::AllOf(needles) => needles.iter().all(|n| source.contains(n)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Predicate::Contains(needle) => format!("contains {:?}", needle),
            Predicate::AllOf(needles) => {
                let parts: Vec<String> = needles.iter().map(|n| format!("{:?}", n)).collect();
                format!("contains all of {}", parts.join(" + "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    pub category: TriggerCategory,
    pub predicates: &'static [Predicate],
}

impl Trigger {
    pub fn matches(&self, source: &str) -> bool {
        self.predicates.iter().any(|p| p.matches(source))
    }
}

/// Trigger table in priority order
///
/// A setup cell naming the private `enterprise_knowledge_ai` dataset is
/// checked before the generic credential rule, which also matches most setup
/// cells. Demo-query cells come after the deprecated-call rule so a
/// `generate_insights_query` still calling `AI.GENERATE` gets the simulated
/// query first.
pub const TRIGGERS: &[Trigger] = &[
    Trigger {
        category: TriggerCategory::PublicDatasetSetup,
        predicates: &[Predicate::AllOf(&["dataset_id = ", "enterprise_knowledge_ai"])],
    },
    Trigger {
        category: TriggerCategory::CredentialSetup,
        predicates: &[
            Predicate::Contains("client = bigquery.Client()"),
            Predicate::Contains("your-bigquery-project-id"),
            Predicate::Contains("import pandas as pd"),
        ],
    },
    Trigger {
        category: TriggerCategory::DeprecatedAiCall,
        predicates: &[
            Predicate::Contains("bigquery-public-data.ml_datasets.gemini_pro"),
            Predicate::Contains("AI.GENERATE("),
            Predicate::Contains("ML.GENERATE_EMBEDDING("),
            Predicate::AllOf(&["generate_insights_query", "AI.GENERATE"]),
        ],
    },
    Trigger {
        category: TriggerCategory::SampleDataCreation,
        predicates: &[Predicate::AllOf(&[
            "CREATE OR REPLACE TABLE",
            "enterprise_documents",
        ])],
    },
    Trigger {
        category: TriggerCategory::DemoAnalysis,
        predicates: &[
            Predicate::Contains("demo_query"),
            Predicate::Contains("generate_insights_query"),
        ],
    },
    Trigger {
        category: TriggerCategory::ContentAnalysis,
        predicates: &[Predicate::Contains("def analyze_content_patterns")],
    },
];

/// First trigger category matching `source`, if any
pub fn match_trigger(source: &str) -> Option<TriggerCategory> {
    TRIGGERS
        .iter()
        .find(|t| t.matches(source))
        .map(|t| t.category)
}

fn model_reference_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"AI\.GENERATE(_DOUBLE|_BOOL)?\(\s*MODEL `([^`]+)`"))
        .as_ref()
        .map_err(|e| Error::Regex(e.clone()))
}

/// Drop the `MODEL` keyword and backquotes from `AI.GENERATE*` model arguments
pub fn rewrite_model_references(source: &str) -> Result<Cow<'_, str>> {
    Ok(model_reference_pattern()?.replace_all(source, "AI.GENERATE${1}(${2}"))
}
