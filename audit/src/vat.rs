//! Jurisdiction-aware VAT rate checks.
//!
//! The rate table is plain configuration ([`VatRuleSet`]) so alternative
//! jurisdictions and cutover dates can be substituted without code changes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::category::ExpenseCategory;
use crate::error::ConfigError;
use crate::money::Money;
use crate::report::{AuditCheck, CheckType};

/// Field name used by [`VatRateValidator::verify`].
pub const VAT_FIELD: &str = "vat_amount";

/// Rates that replace the base table for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRates {
    /// Category the override applies to.
    pub category: ExpenseCategory,
    /// Valid rates in percent.
    pub rates: Vec<f64>,
}

/// A rate that becomes valid for one category from a given date on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBoundary {
    /// Category that gains the rate.
    pub category: ExpenseCategory,
    /// Additional rate in percent.
    pub added_rate: f64,
    /// First document date (inclusive) on which the rate is valid.
    pub effective_from: NaiveDate,
}

/// VAT rate table of one jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VatRuleSet {
    /// Display name, e.g. `BE`.
    pub jurisdiction: String,
    /// Rates valid for every category without an override.
    pub base_rates: Vec<f64>,
    /// Per-category replacements of `base_rates`.
    pub category_rates: Vec<CategoryRates>,
    /// Time-bounded additions.
    pub boundary_rules: Vec<RateBoundary>,
    /// Allowed distance, in percentage points, between implied and valid rate.
    pub rate_tolerance_pct: f64,
    /// Allowed distance, in minor units, between the VAT amount and
    /// `round(subtotal × rate)`. Absorbs cent rounding on small amounts.
    pub amount_tolerance_minor: i64,
}

impl Default for VatRuleSet {
    fn default() -> Self {
        Self::belgium()
    }
}

impl VatRuleSet {
    /// Belgian rates: 0, 6, 12 and 21%. Horeca is limited to 0, 6 and 21%
    /// and gains 12% for documents dated on or after 2026-03-01.
    #[must_use]
    pub fn belgium() -> Self {
        Self {
            jurisdiction: "BE".to_string(),
            base_rates: vec![0.0, 6.0, 12.0, 21.0],
            category_rates: vec![CategoryRates {
                category: ExpenseCategory::Horeca,
                rates: vec![0.0, 6.0, 21.0],
            }],
            boundary_rules: vec![RateBoundary {
                category: ExpenseCategory::Horeca,
                added_rate: 12.0,
                effective_from: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or(NaiveDate::MIN),
            }],
            rate_tolerance_pct: 0.5,
            amount_tolerance_minor: 1,
        }
    }

    /// Rejects empty tables, rates outside `0..=100` and negative tolerances.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_rates.is_empty() {
            return Err(ConfigError::EmptyRateTable(self.jurisdiction.clone()));
        }
        if !self.rate_tolerance_pct.is_finite() || self.rate_tolerance_pct < 0.0 {
            return Err(ConfigError::InvalidRateTolerance(self.rate_tolerance_pct));
        }
        if self.amount_tolerance_minor < 0 {
            return Err(ConfigError::NegativeTolerance {
                name: "amount_tolerance_minor",
                value: self.amount_tolerance_minor,
            });
        }
        let all_rates = self
            .base_rates
            .iter()
            .chain(self.category_rates.iter().flat_map(|c| c.rates.iter()))
            .chain(self.boundary_rules.iter().map(|b| &b.added_rate));
        for &rate in all_rates {
            if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
                return Err(ConfigError::InvalidRate(rate));
            }
        }
        if let Some(empty) = self.category_rates.iter().find(|c| c.rates.is_empty()) {
            return Err(ConfigError::EmptyRateTable(format!(
                "{}/{}",
                self.jurisdiction, empty.category
            )));
        }
        Ok(())
    }

    /// Rates valid for `category` before any boundary rule.
    #[must_use]
    pub fn rates_for(&self, category: Option<ExpenseCategory>) -> &[f64] {
        category
            .and_then(|cat| self.category_rates.iter().find(|c| c.category == cat))
            .map_or(self.base_rates.as_slice(), |c| c.rates.as_slice())
    }

    /// Every rate valid for a document of `category` dated `date`.
    #[must_use]
    pub fn applicable_rates(
        &self,
        date: Option<NaiveDate>,
        category: Option<ExpenseCategory>,
    ) -> Vec<f64> {
        let mut rates = self.rates_for(category).to_vec();
        rates.extend(
            self.boundaries_for(category)
                .filter(|b| date.is_some_and(|d| d >= b.effective_from))
                .map(|b| b.added_rate),
        );
        rates
    }

    fn boundaries_for(
        &self,
        category: Option<ExpenseCategory>,
    ) -> impl Iterator<Item = &RateBoundary> {
        self.boundary_rules
            .iter()
            .filter(move |b| category == Some(b.category))
    }
}

/// One band of a VAT breakdown table as printed on a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VatBreakdownEntry {
    /// Declared rate in percent.
    #[serde(default, deserialize_with = "crate::lenient::quantity")]
    #[schemars(with = "crate::lenient::LenientScalar")]
    pub rate: Option<f64>,
    /// Taxable base of the band.
    #[serde(default, deserialize_with = "crate::lenient::money")]
    pub base: Option<Money>,
    /// VAT amount of the band.
    #[serde(default, deserialize_with = "crate::lenient::money")]
    pub amount: Option<Money>,
}

enum RateMatch {
    Valid(f64),
    PendingBoundary(RateBoundary),
    Invalid { nearest: Option<f64> },
}

/// Checks VAT amounts against a [`VatRuleSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct VatRateValidator {
    rules: VatRuleSet,
}

impl Default for VatRateValidator {
    fn default() -> Self {
        Self {
            rules: VatRuleSet::belgium(),
        }
    }
}

impl VatRateValidator {
    /// Creates a validator after checking the rule set.
    pub fn new(rules: VatRuleSet) -> Result<Self, ConfigError> {
        rules.validate()?;
        Ok(Self { rules })
    }

    /// The Belgian rule set.
    #[must_use]
    pub fn belgium() -> Self {
        Self::default()
    }

    /// The active rule set.
    #[must_use]
    pub const fn rules(&self) -> &VatRuleSet {
        &self.rules
    }

    /// Checks that `vat_amount / subtotal` is a valid rate.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use ledgerlens_audit::category::ExpenseCategory;
    /// use ledgerlens_audit::money::Money;
    /// use ledgerlens_audit::report::CheckStatus;
    /// use ledgerlens_audit::vat::VatRateValidator;
    ///
    /// let validator = VatRateValidator::belgium();
    /// let check = validator.verify(
    ///     Some(Money::from_minor(10_000)),
    ///     Some(Money::from_minor(1_200)),
    ///     NaiveDate::from_ymd_opt(2026, 2, 28),
    ///     Some(ExpenseCategory::Horeca),
    /// );
    /// assert_eq!(check.status, CheckStatus::Failed);
    /// ```
    #[must_use]
    pub fn verify(
        &self,
        subtotal: Option<Money>,
        vat_amount: Option<Money>,
        document_date: Option<NaiveDate>,
        category: Option<ExpenseCategory>,
    ) -> AuditCheck {
        self.check_implied(VAT_FIELD, subtotal, vat_amount, document_date, category)
    }

    /// Checks every band of a declared VAT breakdown separately.
    ///
    /// Bands with a declared rate are checked for a legal rate and for
    /// `amount == round(base × rate)`; bands without one fall back to the
    /// implied-rate check.
    #[must_use]
    pub fn verify_breakdown(
        &self,
        entries: &[VatBreakdownEntry],
        document_date: Option<NaiveDate>,
        category: Option<ExpenseCategory>,
    ) -> Vec<AuditCheck> {
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let field = format!("vat_breakdown[{}]", index + 1);
                match entry.rate {
                    Some(rate) => self.check_declared_band(
                        &field,
                        rate,
                        entry.base,
                        entry.amount,
                        document_date,
                        category,
                    ),
                    None => self.check_implied(
                        &field,
                        entry.base,
                        entry.amount,
                        document_date,
                        category,
                    ),
                }
            })
            .collect()
    }

    fn check_implied(
        &self,
        field: &str,
        subtotal: Option<Money>,
        vat_amount: Option<Money>,
        document_date: Option<NaiveDate>,
        category: Option<ExpenseCategory>,
    ) -> AuditCheck {
        let (Some(subtotal), Some(vat)) = (subtotal, vat_amount) else {
            let missing = match (subtotal, vat_amount) {
                (None, None) => "subtotal and VAT amount",
                (None, Some(_)) => "subtotal",
                _ => "VAT amount",
            };
            return AuditCheck::incomplete(
                CheckType::VatRate,
                field,
                format!("cannot verify VAT rate, missing {missing}"),
            );
        };
        if subtotal.is_zero() {
            return AuditCheck::incomplete(
                CheckType::VatRate,
                field,
                "cannot verify VAT rate on a zero subtotal",
            );
        }
        if !vat.is_zero() && subtotal.is_negative() != vat.is_negative() {
            return AuditCheck::failed(
                CheckType::VatRate,
                field,
                format!("VAT {vat} and subtotal {subtotal} have opposite signs"),
            );
        }

        let (base, vat) = (subtotal.abs(), vat.abs());
        let implied = vat.minor_units() as f64 / base.minor_units() as f64 * 100.0;
        let amount_fits = |rate: f64| {
            base.scaled(rate / 100.0).is_some_and(|expected| {
                expected.equals_within_tolerance(&vat, self.rules.amount_tolerance_minor)
            })
        };
        // Half a minor unit of VAT rounding moves the implied rate by this much.
        let rounding_pct = 50.0 / base.minor_units() as f64;
        let rate_undecidable = rounding_pct > self.rules.rate_tolerance_pct;
        let fits = |rate: f64| {
            (implied - rate).abs() <= self.rules.rate_tolerance_pct
                || (rate_undecidable && amount_fits(rate))
        };

        match self.match_rate(implied, fits, document_date, category) {
            RateMatch::Valid(rate) => AuditCheck::passed(
                CheckType::VatRate,
                field,
                format!("implied VAT rate {implied:.2}% matches {rate}%"),
            ),
            RateMatch::PendingBoundary(boundary) => AuditCheck::warning(
                CheckType::VatRate,
                field,
                pending_message(&format!("implied VAT rate {implied:.2}%"), &boundary),
            ),
            RateMatch::Invalid { nearest } => AuditCheck::failed(
                CheckType::VatRate,
                field,
                invalid_message(
                    &format!("implied VAT rate {implied:.2}%"),
                    &self.rules.jurisdiction,
                    category,
                    nearest,
                ),
            ),
        }
    }

    fn check_declared_band(
        &self,
        field: &str,
        declared: f64,
        base: Option<Money>,
        amount: Option<Money>,
        document_date: Option<NaiveDate>,
        category: Option<ExpenseCategory>,
    ) -> AuditCheck {
        let (Some(base), Some(amount)) = (base, amount) else {
            return AuditCheck::incomplete(
                CheckType::VatRate,
                field,
                format!("{declared}% band is missing its base or amount"),
            );
        };

        let tolerance = self.rules.rate_tolerance_pct;
        let rate_match = self.match_rate(
            declared,
            |rate| (declared - rate).abs() <= tolerance,
            document_date,
            category,
        );
        if let RateMatch::Invalid { nearest } = rate_match {
            return AuditCheck::failed(
                CheckType::VatRate,
                field,
                invalid_message(
                    &format!("declared rate {declared}%"),
                    &self.rules.jurisdiction,
                    category,
                    nearest,
                ),
            );
        }

        let Some(expected) = base.scaled(declared / 100.0) else {
            return AuditCheck::failed(
                CheckType::VatRate,
                field,
                format!("{declared}% of {base} cannot be computed"),
            );
        };
        if !expected.equals_within_tolerance(&amount, self.rules.amount_tolerance_minor) {
            return AuditCheck::failed(
                CheckType::VatRate,
                field,
                format!("{declared}% of {base} is {expected}, but the band declares {amount}"),
            );
        }

        match rate_match {
            RateMatch::PendingBoundary(boundary) => AuditCheck::warning(
                CheckType::VatRate,
                field,
                pending_message(&format!("declared rate {declared}%"), &boundary),
            ),
            _ => AuditCheck::passed(
                CheckType::VatRate,
                field,
                format!("{declared}% of {base} = {amount}"),
            ),
        }
    }

    fn match_rate(
        &self,
        observed: f64,
        fits: impl Fn(f64) -> bool,
        document_date: Option<NaiveDate>,
        category: Option<ExpenseCategory>,
    ) -> RateMatch {
        let applicable = self.rules.applicable_rates(document_date, category);
        if let Some(&rate) = applicable.iter().find(|&&r| fits(r)) {
            return RateMatch::Valid(rate);
        }
        if document_date.is_none() {
            if let Some(boundary) = self
                .rules
                .boundaries_for(category)
                .find(|b| fits(b.added_rate))
            {
                return RateMatch::PendingBoundary(boundary.clone());
            }
        }
        let nearest = applicable
            .iter()
            .copied()
            .min_by(|a, b| (a - observed).abs().total_cmp(&(b - observed).abs()));
        RateMatch::Invalid { nearest }
    }
}

fn pending_message(subject: &str, boundary: &RateBoundary) -> String {
    format!(
        "{subject} matches {}% which applies to {} only from {}; document date unknown",
        boundary.added_rate, boundary.category, boundary.effective_from
    )
}

fn invalid_message(
    subject: &str,
    jurisdiction: &str,
    category: Option<ExpenseCategory>,
    nearest: Option<f64>,
) -> String {
    let scope = category.map_or_else(String::new, |c| format!(" ({c})"));
    let nearest = nearest.map_or_else(String::new, |n| format!("; nearest valid rate is {n}%"));
    format!("{subject} is not a valid {jurisdiction} rate{scope}{nearest}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CheckStatus;

    fn m(minor: i64) -> Option<Money> {
        Some(Money::from_minor(minor))
    }

    fn date(y: i32, mo: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, mo, d)
    }

    const HORECA: Option<ExpenseCategory> = Some(ExpenseCategory::Horeca);

    #[test]
    fn standard_rates_pass() {
        let v = VatRateValidator::belgium();
        for (vat, rate) in [(0, "0%"), (600, "6%"), (1_200, "12%"), (2_100, "21%")] {
            let check = v.verify(m(10_000), m(vat), None, Some(ExpenseCategory::Office));
            assert_eq!(check.status, CheckStatus::Passed, "{rate}: {}", check.message);
        }
    }

    #[test]
    fn off_table_rate_names_nearest_valid_rate() {
        let check = VatRateValidator::belgium().verify(m(10_000), m(1_900), None, None);
        assert_eq!(check.status, CheckStatus::Failed);
        assert!(check.message.contains("19.00%"), "{}", check.message);
        assert!(check.message.contains("nearest valid rate is 21%"), "{}", check.message);
    }

    #[test]
    fn horeca_twelve_percent_respects_cutover() {
        let v = VatRateValidator::belgium();
        let before = v.verify(m(10_000), m(1_200), date(2026, 2, 28), HORECA);
        let on = v.verify(m(10_000), m(1_200), date(2026, 3, 1), HORECA);
        let after = v.verify(m(10_000), m(1_200), date(2026, 3, 2), HORECA);
        assert_eq!(before.status, CheckStatus::Failed);
        assert_eq!(on.status, CheckStatus::Passed);
        assert_eq!(after.status, CheckStatus::Passed);

        for d in [date(2026, 2, 28), date(2026, 3, 2)] {
            assert_eq!(v.verify(m(10_000), m(2_100), d, HORECA).status, CheckStatus::Passed);
        }
    }

    #[test]
    fn horeca_boundary_rate_without_date_is_a_warning() {
        let check = VatRateValidator::belgium().verify(m(10_000), m(1_200), None, HORECA);
        assert_eq!(check.status, CheckStatus::Warning);
        assert!(check.message.contains("2026-03-01"));
    }

    #[test]
    fn tolerance_absorbs_rounding() {
        let v = VatRateValidator::belgium();
        // 21% of 0.95 is 0.1995, printed as 0.20
        assert_eq!(v.verify(m(95), m(20), None, None).status, CheckStatus::Passed);
        // 6.4% is within half a point of 6%
        assert_eq!(v.verify(m(10_000), m(640), None, None).status, CheckStatus::Passed);
    }

    #[test]
    fn small_bases_do_not_hide_a_stray_cent() {
        let v = VatRateValidator::belgium();
        // 1 cent on 1.50 is 0.67%, outside half a point of 0%
        assert_eq!(v.verify(m(150), m(1), None, None).status, CheckStatus::Failed);
        assert_eq!(v.verify(m(199), m(1), None, None).status, CheckStatus::Failed);
        // 6% of 1.50 is exactly 0.09
        assert_eq!(v.verify(m(150), m(9), None, None).status, CheckStatus::Passed);
    }

    #[test]
    fn missing_or_zero_inputs_are_incomplete() {
        let v = VatRateValidator::belgium();
        assert_eq!(v.verify(None, m(100), None, None).status, CheckStatus::Incomplete);
        assert_eq!(v.verify(m(100), None, None, None).status, CheckStatus::Incomplete);
        assert_eq!(v.verify(m(0), m(0), None, None).status, CheckStatus::Incomplete);
    }

    #[test]
    fn credit_notes_with_negative_amounts() {
        let v = VatRateValidator::belgium();
        assert_eq!(v.verify(m(-10_000), m(-2_100), None, None).status, CheckStatus::Passed);
        assert_eq!(v.verify(m(-10_000), m(2_100), None, None).status, CheckStatus::Failed);
    }

    #[test]
    fn breakdown_checks_each_band() {
        let entries = vec![
            VatBreakdownEntry { rate: Some(21.0), base: m(10_000), amount: m(2_100) },
            VatBreakdownEntry { rate: Some(6.0), base: m(5_000), amount: m(350) },
            VatBreakdownEntry { rate: Some(19.0), base: m(1_000), amount: m(190) },
            VatBreakdownEntry { rate: None, base: m(1_000), amount: m(60) },
            VatBreakdownEntry { rate: Some(12.0), base: None, amount: m(60) },
        ];
        let checks = VatRateValidator::belgium().verify_breakdown(&entries, None, None);
        let statuses: Vec<_> = checks.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![
                CheckStatus::Passed,
                CheckStatus::Failed,
                CheckStatus::Failed,
                CheckStatus::Passed,
                CheckStatus::Incomplete,
            ]
        );
        assert_eq!(checks[1].field, "vat_breakdown[2]");
    }

    #[test]
    fn rule_set_validation() {
        let mut rules = VatRuleSet::belgium();
        assert!(rules.validate().is_ok());

        rules.base_rates.clear();
        assert!(matches!(rules.validate(), Err(ConfigError::EmptyRateTable(_))));

        let mut rules = VatRuleSet::belgium();
        rules.base_rates.push(121.0);
        assert_eq!(rules.validate(), Err(ConfigError::InvalidRate(121.0)));

        let mut rules = VatRuleSet::belgium();
        rules.rate_tolerance_pct = -0.1;
        assert!(VatRateValidator::new(rules).is_err());
    }

    #[test]
    fn alternative_jurisdiction_and_cutover() {
        let rules = VatRuleSet {
            jurisdiction: "NL".to_string(),
            base_rates: vec![0.0, 9.0, 21.0],
            category_rates: Vec::new(),
            boundary_rules: vec![RateBoundary {
                category: ExpenseCategory::Accommodation,
                added_rate: 12.0,
                effective_from: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            }],
            rate_tolerance_pct: 0.5,
            amount_tolerance_minor: 1,
        };
        let v = VatRateValidator::new(rules).unwrap();
        let accommodation = Some(ExpenseCategory::Accommodation);
        assert_eq!(v.verify(m(10_000), m(900), None, None).status, CheckStatus::Passed);
        assert_eq!(
            v.verify(m(10_000), m(1_200), date(2029, 12, 31), accommodation).status,
            CheckStatus::Failed
        );
        assert_eq!(
            v.verify(m(10_000), m(1_200), date(2030, 1, 1), accommodation).status,
            CheckStatus::Passed
        );
    }

    #[test]
    fn rule_set_deserializes_with_defaults() {
        let rules: VatRuleSet =
            serde_json::from_str(r#"{"jurisdiction": "BE", "rate_tolerance_pct": 1.0}"#).unwrap();
        assert_eq!(rules.base_rates, vec![0.0, 6.0, 12.0, 21.0]);
        assert!((rules.rate_tolerance_pct - 1.0).abs() < f64::EPSILON);
    }
}
