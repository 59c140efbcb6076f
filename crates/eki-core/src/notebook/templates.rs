//! Canonical replacement sources, one per trigger category

use super::triggers::TriggerCategory;

const PUBLIC_DATASET_SETUP: &str = r##"# Setup and Configuration (public datasets)
import os
import json
import warnings
from datetime import datetime, timedelta

import numpy as np

warnings.filterwarnings('ignore')

from google.cloud import bigquery
from google.oauth2 import service_account

key_path = os.environ["GOOGLE_APPLICATION_CREDENTIALS"]

print("Loading BigQuery credentials...")
credentials = service_account.Credentials.from_service_account_file(key_path)
client = bigquery.Client(credentials=credentials, project=credentials.project_id)
project_id = credentials.project_id

# Real data comes from the BigQuery public datasets
public_project = 'bigquery-public-data'
dataset_id = 'samples'

print("BigQuery client initialized successfully!")
print(f"Your Project ID: {project_id}")
print(f"Using Public Dataset: {public_project}.{dataset_id}")
print(f"Started: {datetime.now()}")

print("\nExploring available public datasets...")
public_client = bigquery.Client(project=public_project)
datasets = list(public_client.list_datasets(max_results=10))
print(f"Found {len(datasets)} public datasets (showing first 5):")
for dataset in datasets[:5]:
    print(f"  {dataset.dataset_id}")"##;

const CREDENTIAL_SETUP: &str = r##"# Setup and Configuration
import os
import json
import warnings
from datetime import datetime, timedelta

import numpy as np
import pandas as pd

warnings.filterwarnings('ignore')

# BigQuery setup with service account authentication
from google.cloud import bigquery
from google.oauth2 import service_account

# Service account key location comes from the environment
key_path = os.environ["GOOGLE_APPLICATION_CREDENTIALS"]

print("Loading BigQuery credentials...")
credentials = service_account.Credentials.from_service_account_file(key_path)
client = bigquery.Client(credentials=credentials, project=credentials.project_id)

project_id = credentials.project_id
dataset_id = 'enterprise_ai'

print("BigQuery client initialized successfully!")
print(f"Project ID: {project_id}")
print(f"Dataset: {dataset_id}")
print(f"Started: {datetime.now()}")"##;

const DEMO_QUERY: &str = r##"# Simplified demo query (AI functions replaced with simulated results)
simulated_query = f"""
SELECT
  document_id,
  content_type,
  department,
  business_impact_score,
  created_date,

  -- Simulated AI insights
  CASE
    WHEN content_type = 'strategic_report' THEN 'Strategic analysis shows strong growth trajectory'
    WHEN content_type = 'customer_feedback' THEN 'Customer satisfaction high but mobile issues detected'
    ELSE 'Technical performance optimized successfully'
  END as ai_summary

FROM `{project_id}.{dataset_id}.enterprise_documents`
ORDER BY business_impact_score DESC
LIMIT 5;
"""

print("Running demo query...")
results_df = client.query(simulated_query).to_dataframe()
print(f"Query completed! Found {len(results_df)} documents")

for _, row in results_df.iterrows():
    print(f"\n{row['content_type'].upper()} ({row['department']})")
    print(f"   Impact Score: {row['business_impact_score']:.2f}")
    print(f"   AI Summary: {row['ai_summary']}")
    print(f"   Created: {row['created_date']}")"##;

const PUBLIC_DATA_EXPLORATION: &str = r##"# Explore real BigQuery public datasets
print("Exploring BigQuery public datasets for real data...")

# The Wikipedia sample has real text data suited to AI analysis
wikipedia_query = f"""
SELECT
  title,
  text,
  datestamp,
  LENGTH(text) as text_length,
  CASE
    WHEN LENGTH(text) > 5000 THEN 'long_article'
    WHEN LENGTH(text) > 1000 THEN 'medium_article'
    ELSE 'short_article'
  END as article_type
FROM `bigquery-public-data.samples.wikipedia`
WHERE LENGTH(text) > 500
ORDER BY RAND()
LIMIT 10
"""

print("Querying Wikipedia dataset for real articles...")
wiki_df = client.query(wikipedia_query).to_dataframe()
print(f"Found {len(wiki_df)} Wikipedia articles!")

print("\nSample Wikipedia Articles:")
for _, row in wiki_df.head(3).iterrows():
    print(f"\n{row['title']}")
    print(f"   Date: {row['datestamp']}")
    print(f"   Length: {row['text_length']:,} characters")
    print(f"   Preview: {row['text'][:150]}...")"##;

const DEMO_ANALYSIS: &str = r##"# AI Analysis on Wikipedia Data
print("Analyzing real Wikipedia articles...")

# Sentiment, topic and complexity are simulated with SQL rules
analysis_query = f"""
WITH article_analysis AS (
  SELECT
    title,
    text,
    datestamp,
    LENGTH(text) as text_length,

    CASE
      WHEN REGEXP_CONTAINS(LOWER(text), r'(great|excellent|amazing|wonderful|success)') THEN 'positive'
      WHEN REGEXP_CONTAINS(LOWER(text), r'(terrible|awful|disaster|failure|problem)') THEN 'negative'
      ELSE 'neutral'
    END as sentiment,

    CASE
      WHEN REGEXP_CONTAINS(LOWER(text), r'(science|research|study|experiment)') THEN 'science'
      WHEN REGEXP_CONTAINS(LOWER(text), r'(history|historical|ancient|century)') THEN 'history'
      WHEN REGEXP_CONTAINS(LOWER(text), r'(technology|computer|software|digital)') THEN 'technology'
      WHEN REGEXP_CONTAINS(LOWER(text), r'(art|music|culture|creative)') THEN 'culture'
      ELSE 'general'
    END as topic_category,

    CASE
      WHEN LENGTH(text) > 5000 THEN RAND() * 0.3 + 0.7
      WHEN LENGTH(text) > 2000 THEN RAND() * 0.4 + 0.4
      ELSE RAND() * 0.5 + 0.1
    END as complexity_score

  FROM `bigquery-public-data.samples.wikipedia`
  WHERE LENGTH(text) > 1000
  ORDER BY RAND()
  LIMIT 15
)
SELECT
  title,
  topic_category,
  sentiment,
  ROUND(complexity_score, 3) as complexity_score,
  text_length,
  datestamp,
  SUBSTR(text, 1, 200) as text_preview
FROM article_analysis
ORDER BY complexity_score DESC
"""

print("Running AI analysis on real Wikipedia data...")
results_df = client.query(analysis_query).to_dataframe()
print(f"Analyzed {len(results_df)} real Wikipedia articles!")

print("\nAI Analysis Results:")
for _, row in results_df.head(5).iterrows():
    print(f"\n{row['title']}")
    print(f"   Topic: {row['topic_category'].upper()}")
    print(f"   Sentiment: {row['sentiment'].upper()}")
    print(f"   Complexity: {row['complexity_score']:.3f}")
    print(f"   Length: {row['text_length']:,} chars")
    print(f"   Preview: {row['text_preview']}...")

print("\nANALYSIS SUMMARY:")
print(f"Total Articles Analyzed: {len(results_df)}")
print(f"Average Complexity Score: {results_df['complexity_score'].mean():.3f}")
print(f"Most Common Topic: {results_df['topic_category'].mode().iloc[0].upper()}")
print("Sentiment Distribution:")
for sentiment, count in results_df['sentiment'].value_counts().items():
    print(f"  {sentiment.upper()}: {count} articles")"##;

const CONTENT_ANALYSIS: &str = r##"# Advanced BigQuery Content Analysis
def analyze_content_patterns():
    """Analyze content patterns over recent Hacker News stories"""

    print("Executing Advanced BigQuery Content Analysis...")

    content_query = f"""
    SELECT
      -- Content categorization
      CASE
        WHEN REGEXP_CONTAINS(LOWER(title), r'\\b(ai|artificial intelligence|machine learning|ml|gpt|chatgpt)\\b') THEN 'AI_TECH'
        WHEN REGEXP_CONTAINS(LOWER(title), r'\\b(startup|funding|investment|vc|venture)\\b') THEN 'STARTUP'
        WHEN REGEXP_CONTAINS(LOWER(title), r'\\b(security|privacy|hack|breach|cyber)\\b') THEN 'SECURITY'
        WHEN REGEXP_CONTAINS(LOWER(title), r'\\b(crypto|bitcoin|blockchain|ethereum)\\b') THEN 'CRYPTO'
        WHEN REGEXP_CONTAINS(LOWER(title), r'\\b(google|apple|microsoft|amazon|meta|tesla)\\b') THEN 'BIG_TECH'
        WHEN REGEXP_CONTAINS(LOWER(title), r'\\b(programming|code|developer|software)\\b') THEN 'PROGRAMMING'
        ELSE 'GENERAL'
      END as content_category,

      COUNT(*) as post_count,
      AVG(score) as avg_score,
      STDDEV(score) as score_stddev,
      AVG(descendants) as avg_comments,
      AVG(LENGTH(title)) as avg_title_length,
      AVG(CASE WHEN url IS NOT NULL THEN 1 ELSE 0 END) as url_percentage,

      -- Engagement efficiency
      ROUND(AVG(descendants) / NULLIF(AVG(score), 0), 2) as comment_to_score_ratio,

      -- Performance classification
      CASE
        WHEN AVG(score) > 20 THEN 'HIGH_PERFORMANCE'
        WHEN AVG(score) > 10 THEN 'MEDIUM_PERFORMANCE'
        ELSE 'LOW_PERFORMANCE'
      END as performance_tier,

      -- Market potential
      CASE
        WHEN COUNT(*) > 100 AND AVG(score) > 15 THEN 'HIGH_POTENTIAL'
        WHEN COUNT(*) > 50 AND AVG(score) > 8 THEN 'MEDIUM_POTENTIAL'
        ELSE 'LOW_POTENTIAL'
      END as market_potential

    FROM `bigquery-public-data.hacker_news.full`
    WHERE timestamp >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 30 DAY)
      AND score IS NOT NULL
      AND score > 0
      AND type = 'story'
      AND title IS NOT NULL
    GROUP BY content_category
    ORDER BY avg_score DESC
    """

    print("Executing Advanced Content Analysis Query...")
    result = client.query(content_query).to_dataframe()
    print(f"Analyzed {len(result)} content categories")

    return result

content_data = analyze_content_patterns()

print("\nTOP PERFORMING CONTENT CATEGORIES:")
for idx, row in content_data.head(5).iterrows():
    print(f"{row['content_category']}: Score {row['avg_score']:.1f} | {row['post_count']} posts | {row['market_potential']} potential")

print(f"\nTotal Posts Analyzed: {content_data['post_count'].sum():,}")

content_data"##;

/// Full replacement text for a category
pub fn template_for(category: TriggerCategory) -> &'static str {
    match category {
        TriggerCategory::PublicDatasetSetup => PUBLIC_DATASET_SETUP,
        TriggerCategory::CredentialSetup => CREDENTIAL_SETUP,
        TriggerCategory::DeprecatedAiCall => DEMO_QUERY,
        TriggerCategory::SampleDataCreation => PUBLIC_DATA_EXPLORATION,
        TriggerCategory::DemoAnalysis => DEMO_ANALYSIS,
        TriggerCategory::ContentAnalysis => CONTENT_ANALYSIS,
    }
}

/// Template split into notebook source lines (each keeps its `\n`)
pub fn template_lines(category: TriggerCategory) -> Vec<String> {
    template_for(category)
        .split_inclusive('\n')
        .map(str::to_string)
        .collect()
}
