//! Expense categories used to select VAT rate sets.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Expense category of a document.
///
/// Deserialization never fails on a string: unknown tags map to
/// [`ExpenseCategory::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExpenseCategory {
    /// Hotels, restaurants, cafés and catering.
    Horeca,
    /// Overnight stays.
    Accommodation,
    /// Flights, trains and other long-distance travel.
    Travel,
    /// Local transport, taxis and parking.
    Transport,
    /// Office supplies and furniture.
    Office,
    /// Energy and water.
    Utilities,
    /// Software licences and subscriptions.
    Software,
    /// Accountants, lawyers and consultants.
    ProfessionalServices,
    /// Fuel, maintenance and leasing.
    Vehicle,
    /// Phone and internet.
    Telecom,
    /// Insurance premiums.
    Insurance,
    /// Anything else.
    Other,
}

impl ExpenseCategory {
    /// All categories, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Horeca,
        Self::Accommodation,
        Self::Travel,
        Self::Transport,
        Self::Office,
        Self::Utilities,
        Self::Software,
        Self::ProfessionalServices,
        Self::Vehicle,
        Self::Telecom,
        Self::Insurance,
        Self::Other,
    ];

    /// Snake-case tag used in JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Horeca => "horeca",
            Self::Accommodation => "accommodation",
            Self::Travel => "travel",
            Self::Transport => "transport",
            Self::Office => "office",
            Self::Utilities => "utilities",
            Self::Software => "software",
            Self::ProfessionalServices => "professional_services",
            Self::Vehicle => "vehicle",
            Self::Telecom => "telecom",
            Self::Insurance => "insurance",
            Self::Other => "other",
        }
    }

    /// Maps a free-form tag to a category, falling back to `Other`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let normalized: String = tag
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "hospitality" | "restaurant" | "catering" | "food_and_drink" => Self::Horeca,
            "hotel" | "lodging" => Self::Accommodation,
            "professional" | "consulting" => Self::ProfessionalServices,
            "fuel" | "car" => Self::Vehicle,
            other => Self::ALL
                .into_iter()
                .find(|c| c.as_str() == other)
                .unwrap_or(Self::Other),
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ExpenseCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ExpenseCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

impl schemars::JsonSchema for ExpenseCategory {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "ExpenseCategory".into()
    }

    fn json_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        let tags: Vec<&str> = Self::ALL.iter().map(|c| c.as_str()).collect();
        schemars::json_schema!({
            "description": "Expense category tag",
            "type": "string",
            "examples": tags
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_aliased_tags() {
        assert_eq!(ExpenseCategory::from_tag("horeca"), ExpenseCategory::Horeca);
        assert_eq!(ExpenseCategory::from_tag("Restaurant"), ExpenseCategory::Horeca);
        assert_eq!(
            ExpenseCategory::from_tag("Professional Services"),
            ExpenseCategory::ProfessionalServices
        );
        assert_eq!(ExpenseCategory::from_tag("spaceflight"), ExpenseCategory::Other);
    }

    #[test]
    fn serde_uses_snake_case_and_tolerates_unknown_tags() {
        let json = serde_json::to_string(&ExpenseCategory::ProfessionalServices).unwrap();
        assert_eq!(json, "\"professional_services\"");
        let unknown: ExpenseCategory = serde_json::from_str("\"gardening\"").unwrap();
        assert_eq!(unknown, ExpenseCategory::Other);
    }
}
