//! Request/response shapes for the SafeRx drug safety API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on drugs per screening request.
pub const MAX_DRUGS: usize = 20;

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }
    };
}

wire_enum! {
    /// Patient populations for personalized alerts.
    Population {
        Pediatric => "pediatric",
        Geriatric => "geriatric",
        Cardiac => "cardiac",
        Hepatic => "hepatic",
        Renal => "renal",
    }
}

wire_enum! {
    /// Patient comorbidities.
    Condition {
        Diabetes => "diabetes",
        Hypertension => "hypertension",
        Epilepsy => "epilepsy",
        HeartFailure => "heart_failure",
        Asthma => "asthma",
        LiverDisease => "liver_disease",
        KidneyDisease => "kidney_disease",
        Thyroid => "thyroid",
        Depression => "depression",
        BloodDisorders => "blood_disorders",
        IschemicHeart => "ischemic_heart",
        Arrhythmia => "arrhythmia",
        Gout => "gout",
        Osteoporosis => "osteoporosis",
    }
}

wire_enum! {
    /// Safety domains the backend can screen.
    SafetyDomain {
        AdverseEffects => "ae",
        DrugInteractions => "ddi",
        PregnancyLactation => "pllr",
        Food => "food",
        Clinical => "clinical",
        Dose => "dose",
    }
}

wire_enum! {
    /// Response language.
    Lang {
        En => "en",
        Ar => "ar",
    }
}

impl Default for Lang {
    fn default() -> Self {
        Self::En
    }
}

/// Patient context for personalized screening.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub populations: Option<Vec<Population>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

/// Body of `POST /api/drug_safety/check`.
///
/// Doubles as the typed arguments of the `check_drug_safety` tool: optional fields the caller
/// did not supply stay `None` and are left out of the serialized body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugSafetyRequest {
    pub drugs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_profile: Option<PatientProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<SafetyDomain>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<Lang>,
}

impl DrugSafetyRequest {
    #[must_use]
    pub fn new(drugs: Vec<String>) -> Self {
        Self {
            drugs,
            patient_profile: None,
            include: None,
            lang: None,
        }
    }

    /// Language the backend will answer in.
    #[must_use]
    pub fn effective_lang(&self) -> Lang {
        self.lang.unwrap_or_default()
    }
}

/// A single alert from a screening response.
///
/// Backends are not strict about field types, so alerts are read leniently from the raw JSON:
/// a missing or null field is empty, a non-string field is its JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyAlert {
    pub severity: String,
    pub kind: String,
    pub message: String,
}

impl SafetyAlert {
    fn from_value(v: &Value) -> Self {
        Self {
            severity: field_text(v, "severity"),
            kind: field_text(v, "type"),
            message: field_text(v, "message"),
        }
    }

    /// Alerts carried by a screening response, in backend order.
    ///
    /// A missing or non-array `alerts` field yields no alerts.
    #[must_use]
    pub fn extract(response: &Value) -> Vec<Self> {
        response
            .get("alerts")
            .and_then(Value::as_array)
            .map(|alerts| alerts.iter().map(Self::from_value).collect())
            .unwrap_or_default()
    }
}

fn field_text(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}
