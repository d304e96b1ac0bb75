use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TONE_MAX: u8 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    #[serde(rename = "Lawful Good")]
    LawfulGood,
    #[serde(rename = "Neutral Good")]
    NeutralGood,
    #[serde(rename = "Chaotic Good")]
    ChaoticGood,
    #[serde(rename = "Lawful Neutral")]
    LawfulNeutral,
    #[default]
    #[serde(rename = "True Neutral")]
    TrueNeutral,
    #[serde(rename = "Chaotic Neutral")]
    ChaoticNeutral,
    #[serde(rename = "Lawful Evil")]
    LawfulEvil,
    #[serde(rename = "Neutral Evil")]
    NeutralEvil,
    #[serde(rename = "Chaotic Evil")]
    ChaoticEvil,
}

/// Six personality sliders, each 0-100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tone {
    pub playful: u8,
    pub serious: u8,
    pub creative: u8,
    pub analytical: u8,
    pub empathetic: u8,
    pub assertive: u8,
}

impl Tone {
    pub fn sliders(&self) -> [(&'static str, u8); 6] {
        [
            ("playful", self.playful),
            ("serious", self.serious),
            ("creative", self.creative),
            ("analytical", self.analytical),
            ("empathetic", self.empathetic),
            ("assertive", self.assertive),
        ]
    }

    /// Name of the first slider above 100, if any
    pub fn out_of_range(&self) -> Option<&'static str> {
        self.sliders()
            .into_iter()
            .find(|(_, v)| *v > TONE_MAX)
            .map(|(name, _)| name)
    }
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            playful: 50,
            serious: 50,
            creative: 50,
            analytical: 50,
            empathetic: 50,
            assertive: 50,
        }
    }
}

/// Character profile (CMP) overlay for one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmpProfile {
    #[serde(default)]
    pub custom_name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default = "default_archetype")]
    pub archetype: String,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub lore: String,
    #[serde(default)]
    pub memory_log: Vec<String>,
}

fn default_archetype() -> String {
    "creator".to_string()
}

impl Default for CmpProfile {
    fn default() -> Self {
        Self {
            custom_name: String::new(),
            tagline: "Digital dreamweaver with a sweet tooth for chaos".to_string(),
            archetype: default_archetype(),
            alignment: Alignment::ChaoticGood,
            tone: Tone {
                playful: 75,
                serious: 25,
                creative: 90,
                analytical: 40,
                empathetic: 60,
                assertive: 55,
            },
            lore: "Born in the candy-coated streets of Sugartown, this Ora discovered their \
                   ability to weave digital dreams from crystallized sugar pixels."
                .to_string(),
            memory_log: Vec::new(),
        }
    }
}

/// One element of the profile export file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileExportEntry {
    pub token_id: String,
    pub image: String,
    pub traits: BTreeMap<String, String>,
    pub overlay: CmpProfile,
}

/// Outcome of a profile import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Elements attached to an already-fetched Ora
    pub matched_count: usize,
    /// Elements that created a new imported (unfetched) Ora
    pub new_records_count: usize,
    pub skipped_count: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alignment_serializes_display_names() {
        assert_eq!(
            serde_json::to_value(Alignment::ChaoticGood).unwrap(),
            json!("Chaotic Good")
        );
        let parsed: Alignment = serde_json::from_value(json!("Lawful Evil")).unwrap();
        assert_eq!(parsed, Alignment::LawfulEvil);
        assert!(serde_json::from_value::<Alignment>(json!("Mostly Harmless")).is_err());
    }

    #[test]
    fn test_partial_profile_fills_defaults() {
        let profile: CmpProfile = serde_json::from_value(json!({ "lore": "hi" })).unwrap();
        assert_eq!(profile.lore, "hi");
        assert_eq!(profile.archetype, "creator");
        assert_eq!(profile.alignment, Alignment::TrueNeutral);
        assert_eq!(profile.tone, Tone::default());
    }

    #[test]
    fn test_tone_out_of_range() {
        let mut tone = Tone::default();
        assert!(tone.out_of_range().is_none());
        tone.empathetic = 101;
        assert_eq!(tone.out_of_range(), Some("empathetic"));
    }

    #[test]
    fn test_tone_rejects_fractional_and_negative() {
        assert!(serde_json::from_value::<Tone>(json!({
            "playful": 50.5, "serious": 1, "creative": 1,
            "analytical": 1, "empathetic": 1, "assertive": 1
        }))
        .is_err());
        assert!(serde_json::from_value::<Tone>(json!({
            "playful": -1, "serious": 1, "creative": 1,
            "analytical": 1, "empathetic": 1, "assertive": 1
        }))
        .is_err());
    }
}
