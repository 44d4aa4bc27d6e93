//! Name/code normalizer: canonical entity codes, donor names, contribution
//! types and revenue buckets across every source vocabulary.

use std::collections::HashMap;

use crate::error::FusionError;
use crate::model::{ContribClass, NormalizedContribution, RawContribution, RevenueBucket};
use crate::reference::{ContribTypeEntry, ReferenceTables};

/// Immutable lookup tables built once from [`ReferenceTables`].
#[derive(Debug, Clone)]
pub struct Normalizer {
    entity_aliases: HashMap<String, String>,
    donor_aliases: HashMap<String, String>,
    categories: Vec<ContribTypeEntry>,
    code_names: HashMap<String, String>,
    descriptors: HashMap<String, String>,
    revenue_codes: HashMap<String, RevenueBucket>,
    overrides: HashMap<String, String>,
    generic: std::collections::HashSet<String>,
    non_government: std::collections::HashSet<String>,
}

/// Outcome of revenue-type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueResolution {
    pub bucket: RevenueBucket,
    /// The input was a code absent from the code table.
    pub code_fallback: bool,
}

impl Normalizer {
    pub fn new(tables: &ReferenceTables) -> Result<Self, FusionError> {
        let donor_aliases = resolve_aliases(&tables.donor_aliases)?;

        let mut code_names = HashMap::new();
        let mut descriptors: HashMap<String, String> = HashMap::new();
        for entry in &tables.contrib_types {
            let code = entry.code.trim().to_string();
            if code_names.insert(code.clone(), entry.name.clone()).is_some() {
                return Err(FusionError::ConfigValidation(format!(
                    "contribution type code '{code}' listed twice"
                )));
            }
            for desc in std::iter::once(entry.name.trim()).chain(entry.descriptors()) {
                let key = desc.to_lowercase();
                match descriptors.get(&key) {
                    Some(existing) if *existing != code => {
                        return Err(FusionError::ConfigValidation(format!(
                            "descriptor '{desc}' maps to both '{existing}' and '{code}'"
                        )));
                    }
                    _ => {
                        descriptors.insert(key, code.clone());
                    }
                }
            }
        }

        let clean = |name: &str| -> String {
            let stripped = strip_footnotes(name);
            donor_aliases.get(&stripped).cloned().unwrap_or(stripped)
        };

        let overrides = tables
            .category_overrides
            .iter()
            .map(|(donor, code)| (clean(donor), code.trim().to_string()))
            .collect();
        let generic = tables.generic_donors.iter().map(|d| clean(d)).collect();
        let non_government = tables.non_government_donors.iter().map(|d| clean(d)).collect();

        Ok(Self {
            entity_aliases: tables
                .entity_aliases
                .iter()
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect(),
            categories: tables.contrib_types.clone(),
            code_names,
            descriptors,
            revenue_codes: tables
                .revenue_codes
                .iter()
                .map(|(k, v)| (k.trim().to_uppercase(), *v))
                .collect(),
            overrides,
            generic,
            non_government,
            donor_aliases,
        })
    }

    /// Strip footnote markup, then resolve known aliases. Idempotent.
    pub fn clean_donor_name(&self, raw: &str) -> String {
        let stripped = strip_footnotes(raw);
        match self.donor_aliases.get(&stripped) {
            Some(canonical) => canonical.clone(),
            None => stripped,
        }
    }

    /// Map a legacy/alternate entity code to its canonical code.
    pub fn normalize_entity(&self, raw: &str) -> String {
        let code = raw.trim();
        match self.entity_aliases.get(code) {
            Some(canonical) => canonical.clone(),
            None => code.to_string(),
        }
    }

    /// Resolve a raw contribution-type field to a code, or `Unknown`.
    ///
    /// Canonical-looking codes (`C` plus up to three characters) pass through
    /// untouched; anything else goes through the descriptor table.
    pub fn contrib_type(&self, raw: Option<&str>) -> ContribClass {
        let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
            return ContribClass::Unknown;
        };
        if text.starts_with('C') && text.chars().count() <= 4 {
            return ContribClass::Code(text.to_string());
        }
        match self.descriptors.get(&text.to_lowercase()) {
            Some(code) => ContribClass::Code(code.clone()),
            None => ContribClass::Unknown,
        }
    }

    /// Category name for a code, if the code table lists it.
    pub fn category_name(&self, code: &str) -> Option<&str> {
        self.code_names.get(code).map(String::as_str)
    }

    /// Contribution-type entries in table order.
    pub fn categories(&self) -> &[ContribTypeEntry] {
        &self.categories
    }

    /// Bucket a raw revenue type given either as a code or as free text.
    /// Any value present in the code table wins, whatever its shape.
    pub fn revenue_bucket(&self, raw: &str) -> RevenueResolution {
        let text = raw.trim();
        if let Some(bucket) = self.revenue_codes.get(&text.to_uppercase()) {
            return RevenueResolution {
                bucket: *bucket,
                code_fallback: false,
            };
        }
        if is_revenue_code(text) {
            // Unmapped codes land in the most populous bucket, not in Other.
            RevenueResolution {
                bucket: RevenueBucket::VoluntaryEarmarked,
                code_fallback: true,
            }
        } else {
            RevenueResolution {
                bucket: bucket_from_text(text),
                code_fallback: false,
            }
        }
    }

    /// Category forced for a cleaned donor name, if any.
    pub fn category_override(&self, donor: &str) -> Option<&str> {
        self.overrides.get(donor).map(String::as_str)
    }

    pub fn is_generic(&self, donor: &str) -> bool {
        self.generic.contains(donor)
    }

    /// Name appears in government ledgers but is not a government.
    pub fn is_misclassified_government(&self, donor: &str) -> bool {
        self.non_government.contains(donor)
    }

    /// Normalize one raw row. Category overrides win over the row's own code.
    pub fn normalize(&self, raw: &RawContribution) -> NormalizedContribution {
        let donor = self.clean_donor_name(&raw.donor_name_raw);
        let contrib = match self.category_override(&donor) {
            Some(code) => ContribClass::Code(code.to_string()),
            None => self.contrib_type(raw.contrib_type_raw.as_deref()),
        };
        let rev = self.revenue_bucket(&raw.rev_type_raw);
        NormalizedContribution {
            entity: self.normalize_entity(&raw.entity_code),
            is_generic: self.is_generic(&donor),
            donor,
            contrib,
            bucket: rev.bucket,
            year: raw.year,
            amount_cents: raw.amount_cents,
            rev_code_fallback: rev.code_fallback,
        }
    }
}

/// Remove footnote markers and typographic noise from a donor name.
///
/// Drops every `*`, folds curly apostrophes to `'`, strips trailing
/// superscript digits and collapses whitespace runs.
pub fn strip_footnotes(name: &str) -> String {
    let folded: String = name
        .chars()
        .filter(|c| *c != '*')
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();
    let trimmed = folded.trim_end_matches(|c: char| c.is_whitespace() || is_superscript_digit(c));
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_superscript_digit(c: char) -> bool {
    matches!(
        c,
        '\u{00B9}' | '\u{00B2}' | '\u{00B3}' | '\u{2070}' | '\u{2074}'..='\u{2079}'
    )
}

/// `R` + two digits + optional letter, e.g. `R01`, `R08B`.
fn is_revenue_code(text: &str) -> bool {
    let b = text.as_bytes();
    (b.len() == 3 || b.len() == 4)
        && b[0].eq_ignore_ascii_case(&b'R')
        && b[1].is_ascii_digit()
        && b[2].is_ascii_digit()
        && (b.len() == 3 || b[3].is_ascii_alphabetic())
}

/// Case-insensitive substring classification with fixed priority.
pub fn bucket_from_text(text: &str) -> RevenueBucket {
    let t = text.to_lowercase();
    if t.contains("assessed") {
        RevenueBucket::Assessed
    } else if t.contains("voluntary core") || t.contains("un-earmarked") {
        RevenueBucket::VoluntaryUnearmarked
    } else if t.contains("voluntary non-core") || t.contains("earmarked") {
        RevenueBucket::VoluntaryEarmarked
    } else {
        RevenueBucket::Other
    }
}

/// Strip keys and targets, then collapse alias chains so every target is
/// terminal. Cycles are rejected.
fn resolve_aliases(
    aliases: &std::collections::BTreeMap<String, String>,
) -> Result<HashMap<String, String>, FusionError> {
    let stripped: HashMap<String, String> = aliases
        .iter()
        .map(|(k, v)| (strip_footnotes(k), strip_footnotes(v)))
        .collect();

    let mut resolved = HashMap::with_capacity(stripped.len());
    for (key, target) in &stripped {
        let mut current = target;
        let mut steps = 0;
        while let Some(next) = stripped.get(current) {
            if next == current {
                break;
            }
            steps += 1;
            if steps > stripped.len() {
                return Err(FusionError::ConfigValidation(format!(
                    "donor alias cycle through '{key}'"
                )));
            }
            current = next;
        }
        resolved.insert(key.clone(), current.clone());
    }
    Ok(resolved)
}
