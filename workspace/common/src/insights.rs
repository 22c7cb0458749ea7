use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

// ===================== AI insights =====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Pie,
    Line,
    Doughnut,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// A chart the client can render next to an insight.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Insight {
    pub insight: String,
    pub chart: Option<ChartSpec>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Canned analyses computed locally, without the hosted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InsightPreset {
    Overview,
    Spending,
    Trends,
}

impl FromStr for InsightPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overview" => Ok(InsightPreset::Overview),
            "spending" => Ok(InsightPreset::Spending),
            "trends" => Ok(InsightPreset::Trends),
            other => Err(format!("unknown insight preset: {other}")),
        }
    }
}

/// A query the client can offer the user, with the preset that answers it
/// locally when there is one.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct QuerySuggestion {
    pub query: String,
    pub preset: Option<InsightPreset>,
}
