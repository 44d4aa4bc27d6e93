//! Static reference tables injected into the normalizer.
//!
//! Every table defaults to the built-in set below. A TOML reference file
//! replaces only the tables it names.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::FusionError;
use crate::model::RevenueBucket;

/// One contribution-type code with its category name and `|`-delimited
/// alternate descriptors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContribTypeEntry {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub alt_descriptors: String,
}

impl ContribTypeEntry {
    pub fn new(code: &str, name: &str, alt_descriptors: &str) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            alt_descriptors: alt_descriptors.into(),
        }
    }

    /// Alternate descriptors, trimmed, empty pieces skipped.
    pub fn descriptors(&self) -> impl Iterator<Item = &str> {
        self.alt_descriptors
            .split('|')
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReferenceTables {
    /// Legacy/alternate entity code → canonical code.
    pub entity_aliases: BTreeMap<String, String>,
    /// Footnote-stripped donor name → canonical donor name.
    pub donor_aliases: BTreeMap<String, String>,
    /// Contribution-type codes in iteration order.
    pub contrib_types: Vec<ContribTypeEntry>,
    /// Revenue-type code → bucket.
    pub revenue_codes: BTreeMap<String, RevenueBucket>,
    /// Donor name → contribution-type code, overriding the row's own code.
    pub category_overrides: BTreeMap<String, String>,
    /// Pooled donor names that never identify a single contributor.
    pub generic_donors: BTreeSet<String>,
    /// Names found in government ledgers that are not governments.
    pub non_government_donors: BTreeSet<String>,
    /// Canonical entity list for the optional cross-check; empty disables it.
    pub canonical_entities: BTreeSet<String>,
    pub member_states: BTreeSet<String>,
    pub observer_states: BTreeSet<String>,
    /// Roster spelling → ledger spelling for state names.
    pub state_aliases: BTreeMap<String, String>,
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self::builtin()
    }
}

fn pairs(items: &[(&str, &str)]) -> BTreeMap<String, String> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ReferenceTables {
    pub fn from_toml(input: &str) -> Result<Self, FusionError> {
        toml::from_str(input).map_err(|e| FusionError::ConfigParse(e.to_string()))
    }

    /// Tables with no entries at all; useful as a base for tests.
    pub fn empty() -> Self {
        Self {
            entity_aliases: BTreeMap::new(),
            donor_aliases: BTreeMap::new(),
            contrib_types: Vec::new(),
            revenue_codes: BTreeMap::new(),
            category_overrides: BTreeMap::new(),
            generic_donors: BTreeSet::new(),
            non_government_donors: BTreeSet::new(),
            canonical_entities: BTreeSet::new(),
            member_states: BTreeSet::new(),
            observer_states: BTreeSet::new(),
            state_aliases: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        Self {
            entity_aliases: pairs(&[
                ("UN-HABITAT", "UN-Habitat"),
                ("UNHABITAT", "UN-Habitat"),
                ("UNWOMEN", "UN-Women"),
                ("UNWTO", "UN Tourism"),
                ("OHRLLS", "UN-OHRLLS"),
                ("POE-CAR", "PoE-CAR"),
                ("POE-HAITI", "PoE-Haiti"),
                ("POE-LIBYA", "PoE-Libya"),
                ("POE-SUDAN", "PoE-Sudan"),
                ("POE-YEMEN", "PoE-Yemen"),
                ("POS-SSUDAN", "PoE-S.Sudan"),
                ("SRSG-CAAC", "OSRSG-CAAC"),
                ("SRSG-SVC", "OSRSG-SVC"),
                ("SRSG-VAC", "OSRSG-VAC"),
                ("OSESG-MYAN", "OSESG-Myanmar"),
                ("SESG-MYAN", "OSESG-Myanmar"),
                ("SESG-HAFRICA", "OSESG-Horn"),
                ("SESG-YEMEN", "OSESG-Yemen"),
                ("SC-RES1559", "OSESG-SCRES1559"),
                ("SASG-CYP", "OSASG-Cyprus"),
                ("PESG-WSAHARA", "PESG-WS"),
                ("OSESG-BDI", "OSESG-FG"),
                ("GEXP-DRC", "GoE-DRC"),
                ("UNGCO", "UNGC"),
                ("OVRA", "VRA"),
                ("ETHICS", "EO"),
                ("AOJ", "OAJ"),
                ("IM-MYANMAR", "IIMM"),
                ("OSET", "ODET"),
                ("RCS", "DCO"),
                ("UN-RGID", "UNRGID"),
            ]),
            donor_aliases: pairs(&[
                ("GAVI The Vaccine Alliance", "GAVI Alliance"),
                ("GAVI, The Vaccine Alliance", "GAVI Alliance"),
                ("Gavi Alliance", "GAVI Alliance"),
                ("Cote d'Ivoire", "Côte D'Ivoire"),
                ("Côte d'Ivoire", "Côte D'Ivoire"),
                ("Cote D'Ivoire", "Côte D'Ivoire"),
                ("Turkey", "Türkiye"),
                ("Turkiye", "Türkiye"),
                ("Netherlands (Kingdom of the)", "Netherlands"),
                ("China (the People's Republic of)", "China"),
                ("Bahamas (The)", "Bahamas"),
                ("Gambia (Republic of The)", "Gambia"),
                ("Guinea Bissau", "Guinea-Bissau"),
                ("Venezuela, Bolivarian Republic of", "Venezuela (Bolivarian Republic of)"),
                ("United Kingdom", "United Kingdom of Great Britain and Northern Ireland"),
                ("United States", "United States of America"),
                ("Bill and Melinda Gates Foundation", "Bill & Melinda Gates Foundation"),
                ("Bill & Melinda Gates Foundation (BMGF)", "Bill & Melinda Gates Foundation"),
                ("Global Fund to Fight AIDS, Tuberculosis and Malaria", "Global Fund"),
                ("The Global Fund", "Global Fund"),
            ]),
            contrib_types: vec![
                ContribTypeEntry::new("C01", "Government", "Governments|Member States|Government donors"),
                ContribTypeEntry::new(
                    "C02",
                    "Non-Governmental Organization",
                    "NGOs|Non-governmental organizations|Civil society organizations",
                ),
                ContribTypeEntry::new("C03", "Private Sector", "Private sector|Private sector entities|Corporations"),
                ContribTypeEntry::new("C04A", "European Union", "European Commission|EU institutions"),
                ContribTypeEntry::new(
                    "C04B",
                    "Multilateral",
                    "Multilateral organizations|Inter-governmental organizations|Other multilateral",
                ),
                ContribTypeEntry::new(
                    "C04C",
                    "Multilateral-IFI",
                    "International financial institutions|IFIs|Development banks",
                ),
                ContribTypeEntry::new("C05", "Pooled Funds", "Pooled funding|Inter-agency pooled funds|UN pooled funds"),
                ContribTypeEntry::new("C06", "Foundation", "Foundations|Philanthropic foundations|Private foundations"),
                ContribTypeEntry::new("C07", "Academic Institution", "Universities|Academic and research institutions"),
                ContribTypeEntry::new("C08", "Other", "Other contributors|Others|Individuals"),
                ContribTypeEntry::new("C09", "No Contributor", "Revenue from activities|No contributor"),
            ],
            revenue_codes: [
                ("R01", RevenueBucket::Assessed),
                ("R02A", RevenueBucket::VoluntaryUnearmarked),
                ("R02B", RevenueBucket::VoluntaryUnearmarked),
                ("R03A", RevenueBucket::VoluntaryEarmarked),
                ("R03B", RevenueBucket::VoluntaryEarmarked),
                ("R03C", RevenueBucket::VoluntaryEarmarked),
                ("R03D", RevenueBucket::VoluntaryEarmarked),
                ("R03E", RevenueBucket::VoluntaryEarmarked),
                ("R03F", RevenueBucket::VoluntaryEarmarked),
                ("R04A", RevenueBucket::Other),
                ("R04B", RevenueBucket::Other),
                ("R04C", RevenueBucket::Other),
                ("R05", RevenueBucket::Other),
                ("R07", RevenueBucket::VoluntaryEarmarked),
                ("R08", RevenueBucket::VoluntaryUnearmarked),
                ("R08B", RevenueBucket::VoluntaryUnearmarked),
                ("R09", RevenueBucket::VoluntaryEarmarked),
                ("R10", RevenueBucket::VoluntaryEarmarked),
                ("R11", RevenueBucket::VoluntaryEarmarked),
                ("R12", RevenueBucket::VoluntaryEarmarked),
            ]
            .into_iter()
            .map(|(code, bucket)| (code.to_string(), bucket))
            .collect(),
            category_overrides: pairs(&[
                ("World Bank", "C04C"),
                ("International Bank for Reconstruction and Development", "C04C"),
                ("Asian Development Bank", "C04C"),
                ("African Development Bank", "C04C"),
                ("Inter-American Development Bank", "C04C"),
                ("European Investment Bank", "C04C"),
                ("GAVI Alliance", "C04B"),
                ("Global Fund", "C04B"),
                ("Bill & Melinda Gates Foundation", "C06"),
            ]),
            generic_donors: names(&[
                "Multi Donor Trust Funds",
                "Multi-Partner Trust Funds",
                "Various Donors",
                "Other Donors",
                "Joint Programmes",
            ]),
            non_government_donors: names(&[
                "Private Donors",
                "Individual Donors",
                "Miscellaneous Donors",
            ]),
            canonical_entities: BTreeSet::new(),
            member_states: BTreeSet::new(),
            observer_states: BTreeSet::new(),
            state_aliases: pairs(&[
                ("Bahamas (The)", "Bahamas"),
                ("Gambia (Republic of The)", "Gambia"),
                ("Guinea Bissau", "Guinea-Bissau"),
                ("Netherlands (Kingdom of the)", "Netherlands"),
                ("Venezuela, Bolivarian Republic of", "Venezuela (Bolivarian Republic of)"),
                ("China (the People's Republic of)", "China"),
            ]),
        }
    }
}
