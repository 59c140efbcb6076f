//! Content classification for community posts
//!
//! The keyword table is evaluated in order; the first category with a
//! whole-word match in the lowercased title wins. The same table feeds the
//! SQL `CASE` built in [`crate::sql::content_analysis`], so local and
//! warehouse classification agree.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentCategory {
    AiTech,
    Startup,
    Security,
    Crypto,
    BigTech,
    Programming,
    General,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiTech => "AI_TECH",
            Self::Startup => "STARTUP",
            Self::Security => "SECURITY",
            Self::Crypto => "CRYPTO",
            Self::BigTech => "BIG_TECH",
            Self::Programming => "PROGRAMMING",
            Self::General => "GENERAL",
        }
    }
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered keyword table (General is the fallback and has no keywords)
pub const CATEGORIES: &[(ContentCategory, &[&str])] = &[
    (
        ContentCategory::AiTech,
        &["ai", "artificial intelligence", "machine learning", "ml", "gpt", "chatgpt"],
    ),
    (
        ContentCategory::Startup,
        &["startup", "funding", "investment", "vc", "venture"],
    ),
    (
        ContentCategory::Security,
        &["security", "privacy", "hack", "breach", "cyber"],
    ),
    (
        ContentCategory::Crypto,
        &["crypto", "bitcoin", "blockchain", "ethereum"],
    ),
    (
        ContentCategory::BigTech,
        &["google", "apple", "microsoft", "amazon", "meta", "tesla"],
    ),
    (
        ContentCategory::Programming,
        &["programming", "code", "developer", "software"],
    ),
];

fn compiled() -> &'static [(ContentCategory, Regex)] {
    static PATTERNS: OnceLock<Vec<(ContentCategory, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        CATEGORIES
            .iter()
            .filter_map(|(category, keywords)| {
                let pattern = format!(r"\b({})\b", keywords.join("|"));
                Regex::new(&pattern).ok().map(|re| (*category, re))
            })
            .collect()
    })
}

/// Assign a title to its content category
pub fn classify_title(title: &str) -> ContentCategory {
    let lowered = title.to_lowercase();
    compiled()
        .iter()
        .find(|(_, re)| re.is_match(&lowered))
        .map(|(category, _)| *category)
        .unwrap_or(ContentCategory::General)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceTier {
    HighPerformance,
    MediumPerformance,
    LowPerformance,
}

impl PerformanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighPerformance => "HIGH_PERFORMANCE",
            Self::MediumPerformance => "MEDIUM_PERFORMANCE",
            Self::LowPerformance => "LOW_PERFORMANCE",
        }
    }
}

pub fn performance_tier(avg_score: f64) -> PerformanceTier {
    if avg_score > 20.0 {
        PerformanceTier::HighPerformance
    } else if avg_score > 10.0 {
        PerformanceTier::MediumPerformance
    } else {
        PerformanceTier::LowPerformance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketPotential {
    HighPotential,
    MediumPotential,
    LowPotential,
}

impl MarketPotential {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighPotential => "HIGH_POTENTIAL",
            Self::MediumPotential => "MEDIUM_POTENTIAL",
            Self::LowPotential => "LOW_POTENTIAL",
        }
    }
}

pub fn market_potential(post_count: u64, avg_score: f64) -> MarketPotential {
    if post_count > 100 && avg_score > 15.0 {
        MarketPotential::HighPotential
    } else if post_count > 50 && avg_score > 8.0 {
        MarketPotential::MediumPotential
    } else {
        MarketPotential::LowPotential
    }
}
