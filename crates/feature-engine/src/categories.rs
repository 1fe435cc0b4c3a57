//! Categorical simplification rules

use serde::{Deserialize, Serialize};

/// Coarse age band used by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    Young,
    MiddleAged,
    Senior,
    /// Age not supplied
    Other,
}

impl AgeGroup {
    const YOUNG: [&'static str; 5] = ["[0-10)", "[10-20)", "[20-30)", "[30-40)", "[40-50)"];
    const MIDDLE_AGED: [&'static str; 3] = ["[50-60)", "[60-70)", "[70-80)"];

    /// Bucket a decade label. Unrecognised labels fall into `Senior`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            None => AgeGroup::Other,
            Some(l) if Self::YOUNG.contains(&l) => AgeGroup::Young,
            Some(l) if Self::MIDDLE_AGED.contains(&l) => AgeGroup::MiddleAged,
            Some(_) => AgeGroup::Senior,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Young => "Young",
            AgeGroup::MiddleAged => "Middle-aged",
            AgeGroup::Senior => "Senior",
            AgeGroup::Other => "Other",
        }
    }
}

/// Canonical diagnosis group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosisGroup {
    Respiratory,
    Circulatory,
    Diabetes,
    Digestive,
    Other,
    Injury,
    Musculoskeletal,
    Missing,
}

impl DiagnosisGroup {
    /// All groups in flag-column order
    pub const ALL: [DiagnosisGroup; 8] = [
        DiagnosisGroup::Respiratory,
        DiagnosisGroup::Circulatory,
        DiagnosisGroup::Diabetes,
        DiagnosisGroup::Digestive,
        DiagnosisGroup::Other,
        DiagnosisGroup::Injury,
        DiagnosisGroup::Musculoskeletal,
        DiagnosisGroup::Missing,
    ];

    /// Keyword checks, first match wins
    const KEYWORDS: [(&'static str, DiagnosisGroup); 6] = [
        ("diabetes", DiagnosisGroup::Diabetes),
        ("circulatory", DiagnosisGroup::Circulatory),
        ("respiratory", DiagnosisGroup::Respiratory),
        ("digestive", DiagnosisGroup::Digestive),
        ("injury", DiagnosisGroup::Injury),
        ("musculoskeletal", DiagnosisGroup::Musculoskeletal),
    ];

    /// Simplify a free-text diagnosis description
    pub fn from_description(description: Option<&str>) -> Self {
        let Some(text) = description else {
            return DiagnosisGroup::Other;
        };
        let lowered = text.to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, group)| *group)
            .unwrap_or(DiagnosisGroup::Other)
    }

    /// Parse an already-simplified group label
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.as_str() == label)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosisGroup::Respiratory => "Respiratory",
            DiagnosisGroup::Circulatory => "Circulatory",
            DiagnosisGroup::Diabetes => "Diabetes",
            DiagnosisGroup::Digestive => "Digestive",
            DiagnosisGroup::Other => "Other",
            DiagnosisGroup::Injury => "Injury",
            DiagnosisGroup::Musculoskeletal => "Musculoskeletal",
            DiagnosisGroup::Missing => "Missing",
        }
    }

    /// Lowercase form used in derived column names
    pub fn slug(&self) -> &'static str {
        match self {
            DiagnosisGroup::Respiratory => "respiratory",
            DiagnosisGroup::Circulatory => "circulatory",
            DiagnosisGroup::Diabetes => "diabetes",
            DiagnosisGroup::Digestive => "digestive",
            DiagnosisGroup::Other => "other",
            DiagnosisGroup::Injury => "injury",
            DiagnosisGroup::Musculoskeletal => "musculoskeletal",
            DiagnosisGroup::Missing => "missing",
        }
    }

    /// Fixed severity score
    pub fn severity(&self) -> u8 {
        match self {
            DiagnosisGroup::Respiratory => 7,
            DiagnosisGroup::Circulatory => 6,
            DiagnosisGroup::Diabetes => 5,
            DiagnosisGroup::Digestive => 4,
            DiagnosisGroup::Other => 3,
            DiagnosisGroup::Injury => 2,
            DiagnosisGroup::Musculoskeletal => 1,
            DiagnosisGroup::Missing => 0,
        }
    }

    pub fn flag_column(&self) -> String {
        format!("has_{}_diag", self.slug())
    }

    pub fn interaction_column(&self) -> String {
        format!("{}_procedures_interaction", self.slug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_buckets() {
        assert_eq!(AgeGroup::from_label(Some("[30-40)")), AgeGroup::Young);
        assert_eq!(AgeGroup::from_label(Some("[60-70)")), AgeGroup::MiddleAged);
        assert_eq!(AgeGroup::from_label(None), AgeGroup::Other);
        assert_eq!(AgeGroup::from_label(Some("[90-100)")), AgeGroup::Senior);
        assert_eq!(AgeGroup::from_label(Some("garbage")), AgeGroup::Senior);
    }

    #[test]
    fn test_diagnosis_priority() {
        let group = DiagnosisGroup::from_description(Some("Circulatory issue with Diabetes"));
        assert_eq!(group, DiagnosisGroup::Diabetes);
    }

    #[test]
    fn test_diagnosis_fallbacks() {
        assert_eq!(DiagnosisGroup::from_description(None), DiagnosisGroup::Other);
        assert_eq!(DiagnosisGroup::from_description(Some("")), DiagnosisGroup::Other);
        assert_eq!(
            DiagnosisGroup::from_description(Some("RESPIRATORY failure")),
            DiagnosisGroup::Respiratory
        );
        assert_eq!(
            DiagnosisGroup::from_description(Some("Musculoskeletal")),
            DiagnosisGroup::Musculoskeletal
        );
    }

    #[test]
    fn test_severity_round_trips_labels() {
        for group in DiagnosisGroup::ALL {
            assert_eq!(DiagnosisGroup::from_label(group.as_str()), Some(group));
        }
        assert_eq!(DiagnosisGroup::Respiratory.severity(), 7);
        assert_eq!(DiagnosisGroup::Missing.severity(), 0);
    }
}
