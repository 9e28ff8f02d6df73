use std::collections::BTreeMap;

use serde_json::Value;

/// One step of the fixed intake form, with the field keys the applicant must
/// supply before the application can be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeStep {
    pub key: &'static str,
    pub name: &'static str,
    pub required_fields: &'static [&'static str],
}

/// The fixed multi-step intake form. The applicant moves forward and backward
/// through these steps; autosave clamps step indices to this blueprint.
#[derive(Debug, Clone)]
pub struct IntakeBlueprint {
    steps: Vec<IntakeStep>,
}

impl IntakeBlueprint {
    pub fn standard() -> Self {
        Self {
            steps: standard_steps(),
        }
    }

    /// Number of steps, also the upper bound for `current_step` (1-based).
    pub fn step_count(&self) -> u16 {
        self.steps.len() as u16
    }

    /// Clamp a client-supplied step index into the valid 1-based range.
    pub fn clamp_step(&self, step: u16) -> u16 {
        step.clamp(1, self.step_count())
    }

    pub fn step(&self, index: u16) -> Option<&IntakeStep> {
        index
            .checked_sub(1)
            .and_then(|zero_based| self.steps.get(zero_based as usize))
    }

    pub fn steps(&self) -> &[IntakeStep] {
        &self.steps
    }

    /// Validate a submission-ready field map: every required field of every
    /// step must be present and non-null. Returns the missing keys.
    pub fn missing_fields(&self, fields: &BTreeMap<String, Value>) -> Vec<&'static str> {
        self.steps
            .iter()
            .flat_map(|step| step.required_fields.iter().copied())
            .filter(|key| match fields.get(*key) {
                None | Some(Value::Null) => true,
                Some(Value::String(text)) => text.trim().is_empty(),
                Some(_) => false,
            })
            .collect()
    }
}

impl Default for IntakeBlueprint {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_steps() -> Vec<IntakeStep> {
    vec![
        IntakeStep {
            key: "personal",
            name: "Personal Details",
            required_fields: &["first_name", "last_name", "email", "phone"],
        },
        IntakeStep {
            key: "residence",
            name: "Residence History",
            required_fields: &["current_address", "current_landlord_name"],
        },
        IntakeStep {
            key: "employment",
            name: "Employment & Income",
            required_fields: &["employer_name", "monthly_income_cents"],
        },
        IntakeStep {
            key: "review",
            name: "Review & Consent",
            required_fields: &["background_check_consent", "signature"],
        },
    ]
}
