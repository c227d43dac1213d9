// 🧮 Field Derivation - Survey fields computed from merged records
// Derivation fills presentation fields only; it never decides validity

use crate::adapters::TerritoryContactAdapter;
use crate::identity::normalize_identity_value;
use crate::record::{Record, RecordSet, Value};
use tracing::{debug, info};

pub const TOUCHPOINT: &str = "Implementation";
pub const DEFAULT_ROLE: &str = "Project Stakeholder";
pub const DEFAULT_LOCALE: &str = "en_US";
pub const DEFAULT_COUNTRY: &str = "XX";
pub const DEFAULT_REGION: &str = "EMEA";
pub const DEFAULT_OFFICE_BASE: &str = "NA";
pub const ACCOUNT_NAME_NOT_FOUND: &str = "SAP_ACCOUNT_NAME_NOT_FOUND";

const CONVERSION_MARKER: &str = "Conversion - ";
const CORNERSTONE_CONVERSION: &str = "Conversion - Cornerstone";

/// Columns every derived record carries, even when the input lacks them
const DERIVED_COLUMNS: [&str; 6] = [
    "Account Name - SAP ID",
    "Touchpoint",
    "Customer Tier",
    "Role",
    "Region",
    "Locale",
];

// ============================================================================
// LOOKUPS
// ============================================================================

const NA_COUNTRIES: [&str; 26] = [
    "Other",
    "United States of America",
    "United States",
    "Mexico",
    "Canada",
    "Guatemala",
    "Cuba",
    "Haiti",
    "Dominican Republic",
    "Honduras",
    "Nicaragua",
    "El Salvador",
    "Costa Rica",
    "Panama",
    "Jamaica",
    "Trinidad and Tobago",
    "Belize",
    "Bahamas",
    "Barbados",
    "Saint Lucia",
    "Grenada",
    "Saint Vincent and the Grenadines",
    "Antigua and Barbuda",
    "Dominica",
    "Saint Kitts and Nevis",
    "North America",
];

const APAC_COUNTRIES: [&str; 38] = [
    "China",
    "Japan",
    "Mongolia",
    "North Korea",
    "South Korea",
    "Afghanistan",
    "Bangladesh",
    "Bhutan",
    "India",
    "Maldives",
    "Nepal",
    "Pakistan",
    "Sri Lanka",
    "Brunei",
    "Cambodia",
    "Indonesia",
    "Laos",
    "Malaysia",
    "Myanmar",
    "Philippines",
    "Singapore",
    "Thailand",
    "Timor-Leste",
    "Vietnam",
    "Australia",
    "New Zealand",
    "Fiji",
    "Papua New Guinea",
    "Solomon Islands",
    "Vanuatu",
    "Kiribati",
    "Marshall Islands",
    "Nauru",
    "Palau",
    "Samoa",
    "Tonga",
    "Tuvalu",
    "Hong Kong",
];

const APAC_IMPLEMENTERS: [&str; 8] = [
    "Erica Lombard",
    "Evan Wong",
    "Jennifer Tate",
    "Joanna Christie",
    "Luke Pierce",
    "Miah Dixon",
    "Reece Stanton",
    "Harry Twyford",
];

const EMEA_IMPLEMENTERS: [&str; 7] = [
    "Joshua Pamment",
    "Alexander Waller",
    "Angharad Owen",
    "Ben Chambers",
    "Maria Campos",
    "Michal Kamieniak",
    "Thomas Hoyle",
];

/// Sales region for a country name; unknown or missing countries are EMEA
pub fn region_for(country: Option<&str>) -> &'static str {
    match country {
        Some(c) if NA_COUNTRIES.contains(&c) => "NA",
        Some(c) if APAC_COUNTRIES.contains(&c) => "APAC",
        _ => DEFAULT_REGION,
    }
}

/// Office base of a team lead; blank leads have none
pub fn office_base_for(team_lead: &str) -> &'static str {
    if team_lead.is_empty() {
        ""
    } else if APAC_IMPLEMENTERS.contains(&team_lead) {
        "APAC"
    } else if EMEA_IMPLEMENTERS.contains(&team_lead) {
        "EMEA"
    } else {
        DEFAULT_OFFICE_BASE
    }
}

/// Size bracket label for a subscription user count
///
/// Counts below one have no bracket. From 75 up to 749 the brackets are
/// 25 wide; 750 and above share one bracket.
pub fn user_bracket(count: i64) -> Option<String> {
    let label = match count {
        i64::MIN..=0 => return None,
        1 => "1".to_string(),
        2..=9 => "2-9".to_string(),
        10..=19 => "10-19".to_string(),
        20..=29 => "20-29".to_string(),
        30..=49 => "30-49".to_string(),
        50..=74 => "50-74".to_string(),
        750.. => "750+".to_string(),
        n => {
            let low = (n / 25) * 25;
            format!("{}-{}", low, low + 24)
        }
    };
    Some(label)
}

/// Whole user count from a float cell or an integer string
fn user_count(value: &Value) -> Option<i64> {
    match value {
        Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        Value::Text(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// `"Acme (Conversion - Cornerstone) 2024"` → `"Cornerstone"`
pub fn converted_from(project_name: &str) -> Option<String> {
    let (_, rest) = project_name.split_once(CONVERSION_MARKER)?;
    let guess = rest.split(')').next().unwrap_or(rest);
    Some(guess.to_string())
}

// ============================================================================
// FIELD DERIVER
// ============================================================================

pub trait FieldDeriver {
    fn derive_record(&self, record: &mut Record);

    fn derive(&self, records: RecordSet) -> RecordSet {
        let mut derived = RecordSet::new(records.columns().to_vec());
        for column in DERIVED_COLUMNS {
            derived.add_column(column);
        }
        for mut record in records {
            self.derive_record(&mut record);
            derived.push(record);
        }
        info!(rows = derived.len(), "Derived survey fields");
        derived
    }
}

#[derive(Debug, Clone, Default)]
pub struct StandardDeriver;

impl StandardDeriver {
    pub fn new() -> Self {
        StandardDeriver
    }
}

impl FieldDeriver for StandardDeriver {
    fn derive_record(&self, record: &mut Record) {
        let sap_id = normalize_identity_value(record.get("SAP ID")).render_or_empty();
        let account_name = match record.get("sap_account_name") {
            v if v.is_blank() => format!("{}-{}", ACCOUNT_NAME_NOT_FOUND, sap_id),
            v => format!("{}-{}", v.render_or_empty(), sap_id),
        };
        record.set("Account Name - SAP ID", Value::Text(account_name));
        record.set("Touchpoint", Value::text(TOUCHPOINT));

        let tier = if record.get("Group").is_blank() {
            "Individual"
        } else {
            "Enterprise"
        };
        record.set("Customer Tier", Value::text(tier));

        if record.get("Country").is_blank() {
            record.set("Country", Value::text(DEFAULT_COUNTRY));
        }

        record.set("Role", Value::text(DEFAULT_ROLE));
        let region = region_for(record.get("Region Country").as_str());
        record.set("Region", Value::text(region));
        record.set("Locale", Value::text(DEFAULT_LOCALE));

        if record.get("Implementer Office Base").is_blank() {
            let lead = record.get("Team Lead / PM").render_or_empty();
            record.set("Implementer Office Base", Value::text(office_base_for(&lead)));
        }

        let project_name = record.get("Project Name").render_or_empty();
        if record.get("Converted From").is_blank() {
            if let Some(guess) = converted_from(&project_name) {
                record.set("Converted From", Value::Text(guess));
            }
        }

        if record.contains("Team UserCount") && !record.get("Team UserCount").is_null() {
            let raw = record.get("Team UserCount").clone();
            let bracket = user_count(&raw).and_then(user_bracket);
            if bracket.is_none() {
                info!(value = ?raw, "Cannot determine user bracket");
            }
            record.set("User Bracket", Value::Text(bracket.unwrap_or_default()));
        }

        // Teamwork tags Cornerstone conversions as MISC
        if project_name.contains(CORNERSTONE_CONVERSION) {
            if record
                .get("Product")
                .as_str()
                .is_some_and(|p| p.contains("MISC"))
            {
                record.set("Product", Value::text("Cornerstone"));
            }
            if record
                .get("Project Type")
                .as_str()
                .is_some_and(|t| t.contains("MISC"))
            {
                record.set("Project Type", Value::text("Cornerstone Conversion / Fresh"));
            }
        }
    }
}

// ============================================================================
// CONTACT ROLE FAN-OUT
// ============================================================================

const CONTACT_FIELDS: [(&str, &str); 4] = [
    ("First Name", "First_Name"),
    ("Last Name", "Last_Name"),
    ("Email", "Email"),
    ("Phone", "Phone"),
];

fn as_contact(record: &Record, prefix: &str, role: &str) -> Record {
    let mut copy = record.clone();
    for (survey_field, contact_field) in CONTACT_FIELDS {
        let column = TerritoryContactAdapter::contact_column(prefix, contact_field);
        copy.set(survey_field, record.get(&column).clone());
    }
    copy.set("Role", Value::text(role));
    copy
}

/// Originals, then one VDC copy per row, then one DX FSR copy per row
///
/// Copies take their contact fields from the merged territory contact columns,
/// so a row without a contact yields a copy with null contact fields.
pub fn expand_contact_roles(records: &RecordSet) -> RecordSet {
    let mut expanded = records.clone();
    for column in ["Role", "Phone"] {
        expanded.add_column(column);
    }
    for (prefix, role) in [("VDC", "VDC"), ("DXFSR", "DX FSR")] {
        for record in records {
            expanded.push(as_contact(record, prefix, role));
        }
    }
    debug!(input = records.len(), output = expanded.len(), "Expanded contact roles");
    expanded
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_record() -> Record {
        Record::new()
            .with("SAP ID", "1042")
            .with("sap_account_name", "Happy Paws")
            .with("Group", Value::Null)
            .with("Country", "")
            .with("Region Country", "New Zealand")
            .with("Team Lead / PM", "Evan Wong")
            .with("Implementer Office Base", Value::Null)
            .with("Project Name", "Happy Paws (Conversion - Cornerstone) 2024")
            .with("Converted From", Value::Null)
            .with("Product", "MISC")
            .with("Project Type", "MISC Project")
            .with("First Name", "Ana")
            .with("Email", "ana@happypaws.test")
            .with("VDC_First_Name", "Vic")
            .with("VDC_Email", "vic@idexx.test")
            .with("DXFSR_First_Name", "Fay")
    }

    fn derive_one(record: Record) -> Record {
        let set = StandardDeriver::new().derive(RecordSet::from_records(vec![record]));
        set.into_records().remove(0)
    }

    #[test]
    fn test_standard_derivation() {
        let derived = derive_one(create_test_record());

        assert_eq!(derived.get("Account Name - SAP ID"), &Value::text("Happy Paws-1042"));
        assert_eq!(derived.get("Touchpoint"), &Value::text("Implementation"));
        assert_eq!(derived.get("Customer Tier"), &Value::text("Individual"));
        assert_eq!(derived.get("Country"), &Value::text("XX"));
        assert_eq!(derived.get("Role"), &Value::text("Project Stakeholder"));
        assert_eq!(derived.get("Region"), &Value::text("APAC"));
        assert_eq!(derived.get("Locale"), &Value::text("en_US"));
        assert_eq!(derived.get("Implementer Office Base"), &Value::text("APAC"));
        assert_eq!(derived.get("Converted From"), &Value::text("Cornerstone"));
        assert_eq!(derived.get("Product"), &Value::text("Cornerstone"));
        assert_eq!(
            derived.get("Project Type"),
            &Value::text("Cornerstone Conversion / Fresh")
        );
        println!("✅ Survey fields derived");
    }

    #[test]
    fn test_missing_account_name_and_float_identity() {
        let record = create_test_record()
            .with("SAP ID", Value::Float(1042.0))
            .with("sap_account_name", Value::Null)
            .with("Group", "Banfield")
            .with("Region Country", Value::Null)
            .with("Implementer Office Base", "EMEA");
        let derived = derive_one(record);

        assert_eq!(
            derived.get("Account Name - SAP ID"),
            &Value::text("SAP_ACCOUNT_NAME_NOT_FOUND-1042")
        );
        assert_eq!(derived.get("Customer Tier"), &Value::text("Enterprise"));
        assert_eq!(derived.get("Region"), &Value::text("EMEA"));
        assert_eq!(derived.get("Implementer Office Base"), &Value::text("EMEA"));
    }

    #[test]
    fn test_user_brackets() {
        let cases = [
            (0, None),
            (1, Some("1")),
            (9, Some("2-9")),
            (10, Some("10-19")),
            (29, Some("20-29")),
            (49, Some("30-49")),
            (74, Some("50-74")),
            (75, Some("75-99")),
            (130, Some("125-149")),
            (749, Some("725-749")),
            (750, Some("750+")),
        ];
        for (count, expected) in cases {
            assert_eq!(user_bracket(count).as_deref(), expected, "count {}", count);
        }
    }

    #[test]
    fn test_user_bracket_only_when_count_present() {
        let with_count = derive_one(create_test_record().with("Team UserCount", Value::Float(12.0)));
        assert_eq!(with_count.get("User Bracket"), &Value::text("10-19"));

        let unparsable = derive_one(create_test_record().with("Team UserCount", "lots"));
        assert_eq!(unparsable.get("User Bracket"), &Value::text(""));

        let null_count = derive_one(create_test_record().with("Team UserCount", Value::Null));
        assert!(null_count.get("User Bracket").is_null());
    }

    #[test]
    fn test_lookups() {
        assert_eq!(region_for(Some("Canada")), "NA");
        assert_eq!(region_for(Some("France")), "EMEA");
        assert_eq!(office_base_for("Thomas Hoyle"), "EMEA");
        assert_eq!(office_base_for("Someone New"), "NA");
        assert_eq!(office_base_for(""), "");
        assert_eq!(converted_from("Plain project"), None);
        assert_eq!(converted_from("X Conversion - AVImark"), Some("AVImark".to_string()));
    }

    #[test]
    fn test_expand_contact_roles() {
        let records = RecordSet::from_records(vec![create_test_record()]);
        let expanded = expand_contact_roles(&records);

        assert_eq!(expanded.len(), 3);
        let originals = &expanded.records()[0];
        assert_eq!(originals.get("Email"), &Value::text("ana@happypaws.test"));

        let vdc = &expanded.records()[1];
        assert_eq!(vdc.get("Role"), &Value::text("VDC"));
        assert_eq!(vdc.get("First Name"), &Value::text("Vic"));
        assert_eq!(vdc.get("Email"), &Value::text("vic@idexx.test"));

        let fsr = &expanded.records()[2];
        assert_eq!(fsr.get("Role"), &Value::text("DX FSR"));
        assert_eq!(fsr.get("First Name"), &Value::text("Fay"));
        assert!(fsr.get("Email").is_null());
    }
}
