//! Ordered schema catalog
//!
//! A run walks the catalog front to back, one extraction per schema. The
//! built-in ESG catalog starts with the report metadata so that a document
//! without a usable identity fails as early as possible.

use crate::error::ExtractorError;
use esgex_domain::SchemaDescriptor;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Ordered, non-empty list of uniquely named schemas
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaCatalog {
    schemas: Vec<SchemaDescriptor>,
}

impl SchemaCatalog {
    /// Build a catalog, rejecting empty catalogs and duplicate names
    pub fn new(schemas: Vec<SchemaDescriptor>) -> Result<Self, ExtractorError> {
        if schemas.is_empty() {
            return Err(ExtractorError::Config("schema catalog is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for schema in &schemas {
            if schema.name.trim().is_empty() {
                return Err(ExtractorError::Config("schema name must not be empty".to_string()));
            }
            if !seen.insert(schema.name.as_str()) {
                return Err(ExtractorError::Config(format!(
                    "duplicate schema name '{}'",
                    schema.name
                )));
            }
        }

        Ok(Self { schemas })
    }

    /// Load a catalog from a JSON array of `{"name": ..., "shape": {...}}`
    pub fn from_json_str(json_str: &str) -> Result<Self, ExtractorError> {
        let schemas: Vec<SchemaDescriptor> = serde_json::from_str(json_str)
            .map_err(|e| ExtractorError::Config(format!("invalid schema catalog: {}", e)))?;
        Self::new(schemas)
    }

    /// Load a catalog from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ExtractorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExtractorError::Config(format!("cannot read catalog '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Serialize the catalog in the format `from_json_str` reads
    pub fn to_json_string(&self) -> Result<String, ExtractorError> {
        serde_json::to_string_pretty(&self.schemas)
            .map_err(|e| ExtractorError::Config(e.to_string()))
    }

    /// The built-in ESG catalog, eight facets in a fixed order
    pub fn esg_default() -> Self {
        Self {
            schemas: vec![
                report_metadata(),
                environmental_emissions_energy(),
                environmental_water_waste(),
                social_training_and_csr(),
                social_workforce_and_well_being(),
                governance_ethics_and_complaints(),
                governance_structure_and_openness(),
                materiality_assessment(),
            ],
        }
    }

    /// Schemas in run order
    pub fn iter(&self) -> impl Iterator<Item = &SchemaDescriptor> {
        self.schemas.iter()
    }

    /// Number of schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Always false for a constructed catalog
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Schema names in run order
    pub fn names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a schema by name
    pub fn get(&self, name: &str) -> Option<&SchemaDescriptor> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// Top-level keys declared by more than one schema, with the schemas that declare them
    ///
    /// Empty for a well-formed catalog. Overlaps are allowed but each one
    /// becomes a last-write-wins collision at merge time.
    pub fn overlapping_keys(&self) -> BTreeMap<String, Vec<String>> {
        let mut owners: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for schema in &self.schemas {
            for key in schema.top_level_keys() {
                owners.entry(key).or_default().push(schema.name.clone());
            }
        }
        owners.retain(|_, schemas| schemas.len() > 1);
        owners
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::esg_default()
    }
}

fn object(properties: Vec<(&str, Value)>) -> Value {
    let properties: Map<String, Value> = properties
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    json!({"type": "object", "properties": properties})
}

fn section(description: &str, properties: Vec<(&str, Value)>) -> Value {
    let mut value = object(properties);
    value["nullable"] = json!(true);
    value["description"] = json!(description);
    value
}

fn measurement(description: &str) -> Value {
    json!({
        "type": "object",
        "nullable": true,
        "description": description,
        "properties": {
            "numeric_value": {"type": "number", "nullable": true},
            "measurement_unit": {"type": "string", "nullable": true}
        }
    })
}

fn number(description: &str) -> Value {
    json!({"type": "number", "nullable": true, "description": description})
}

fn text(description: &str) -> Value {
    json!({"type": "string", "nullable": true, "description": description})
}

fn gender_split(description: &str) -> Value {
    section(
        description,
        vec![
            ("male", number("Count or share for men")),
            ("female", number("Count or share for women")),
            ("other", number("Count or share for other genders")),
            ("total", number("Total across genders")),
        ],
    )
}

fn report_metadata() -> SchemaDescriptor {
    let details = json!({
        "type": "object",
        "properties": {
            "company_legal_name": {
                "type": "string",
                "description": "Full legal name of the company issuing the report"
            },
            "reporting_year": {
                "type": "integer",
                "description": "Calendar or fiscal year the data pertains to"
            },
            "report_title": text("Title of the report"),
            "report_url": text("URL where the report is published"),
            "report_release_date": text("Release date in YYYY-MM-DD format"),
            "reporting_framework": text("Framework followed, e.g. GRI, SASB, TCFD, ESRS")
        },
        "required": ["company_legal_name", "reporting_year"]
    });

    SchemaDescriptor::new(
        "ReportMetadata",
        object(vec![("report_metadata", details)]),
    )
}

fn environmental_emissions_energy() -> SchemaDescriptor {
    SchemaDescriptor::new(
        "EnvironmentalEmissionsEnergy",
        object(vec![
            (
                "emissions",
                section(
                    "GHG emissions in tCO2e",
                    vec![
                        ("total_emissions", measurement("Scope 1 + 2 + 3 emissions")),
                        ("scope_1_emissions", measurement("Direct emissions")),
                        ("scope_2_emissions", measurement("Purchased energy emissions")),
                        ("scope_3_emissions", measurement("Value chain emissions")),
                        ("emission_intensity_per_revenue", measurement("Emissions per unit revenue")),
                    ],
                ),
            ),
            (
                "energy_consumption",
                section(
                    "Energy consumed within the organization",
                    vec![
                        ("total_energy", measurement("Total energy consumed")),
                        ("renewable_energy", measurement("Energy from renewable sources")),
                        ("non_renewable_energy", measurement("Energy from non-renewable sources")),
                        ("energy_intensity_per_revenue", measurement("Energy per unit revenue")),
                    ],
                ),
            ),
        ]),
    )
}

fn environmental_water_waste() -> SchemaDescriptor {
    SchemaDescriptor::new(
        "EnvironmentalWaterWaste",
        object(vec![
            (
                "water_withdrawal",
                section(
                    "Water withdrawn by source",
                    vec![
                        ("surface_water", measurement("Surface water withdrawn")),
                        ("groundwater", measurement("Groundwater withdrawn")),
                        ("third_party_water", measurement("Third-party water withdrawn")),
                        ("total_withdrawal", measurement("Total water withdrawn")),
                    ],
                ),
            ),
            (
                "water_discharge",
                section(
                    "Water discharged by destination and treatment",
                    vec![
                        ("treated_discharge", measurement("Discharge after treatment")),
                        ("untreated_discharge", measurement("Discharge without treatment")),
                        ("total_discharge", measurement("Total water discharged")),
                    ],
                ),
            ),
            (
                "waste_generation",
                section(
                    "Waste generated by category",
                    vec![
                        ("plastic_waste", measurement("Plastic waste")),
                        ("e_waste", measurement("Electronic waste")),
                        ("hazardous_waste", measurement("Hazardous waste")),
                        ("other_non_hazardous_waste", measurement("Other non-hazardous waste")),
                        ("total_waste", measurement("Total waste generated")),
                    ],
                ),
            ),
            (
                "waste_disposal",
                section(
                    "Waste disposed of",
                    vec![
                        ("incineration", measurement("Waste incinerated")),
                        ("landfilling", measurement("Waste sent to landfill")),
                        ("other_disposal", measurement("Other disposal operations")),
                    ],
                ),
            ),
            (
                "waste_recovery",
                section(
                    "Waste recovered",
                    vec![
                        ("recycled", measurement("Waste recycled")),
                        ("reused", measurement("Waste reused")),
                        ("other_recovery", measurement("Other recovery operations")),
                    ],
                ),
            ),
        ]),
    )
}

fn social_training_and_csr() -> SchemaDescriptor {
    SchemaDescriptor::new(
        "SocialTrainingAndCSR",
        object(vec![
            (
                "human_rights_training_coverage",
                section(
                    "Share of staff trained on human rights, in percent",
                    vec![
                        ("employees_percentage", number("Employees covered")),
                        ("workers_percentage", number("Workers covered")),
                    ],
                ),
            ),
            (
                "health_and_safety_ltifr",
                section(
                    "Lost time injury frequency rate per million hours worked",
                    vec![
                        ("employees", number("LTIFR for employees")),
                        ("workers", number("LTIFR for workers")),
                    ],
                ),
            ),
            (
                "other_health_and_safety_incidents",
                section(
                    "Recordable incidents other than lost time injuries",
                    vec![
                        ("recordable_injuries", number("Total recordable work-related injuries")),
                        ("fatalities", number("Number of fatalities")),
                        ("high_consequence_injuries", number("High consequence injuries")),
                    ],
                ),
            ),
            (
                "health_and_safety_training_coverage",
                section(
                    "Share of staff trained on health and safety, in percent",
                    vec![
                        ("employees_percentage", number("Employees covered")),
                        ("workers_percentage", number("Workers covered")),
                    ],
                ),
            ),
            (
                "grievances_reported",
                section(
                    "Grievances filed during the year",
                    vec![
                        ("filed", number("Complaints filed")),
                        ("pending_resolution", number("Complaints pending at year end")),
                    ],
                ),
            ),
            (
                "third_party_assessment_coverage_percentage",
                section(
                    "Share of plants and offices assessed by third parties, in percent",
                    vec![
                        ("health_and_safety", number("Health and safety practices")),
                        ("working_conditions", number("Working conditions")),
                    ],
                ),
            ),
            (
                "csr_beneficiaries",
                section(
                    "Beneficiaries of CSR projects",
                    vec![
                        ("total_beneficiaries", number("Persons benefitting")),
                        ("vulnerable_group_percentage", number("Share from vulnerable groups")),
                    ],
                ),
            ),
        ]),
    )
}

fn social_workforce_and_well_being() -> SchemaDescriptor {
    SchemaDescriptor::new(
        "SocialWorkforceAndWellBeing",
        object(vec![
            ("workforce_gender_diversity", gender_split("Headcount by gender")),
            ("turnover_count", gender_split("Employees who left during the year")),
            (
                "employee_well_being_coverage",
                section(
                    "Share of employees covered by well-being measures, in percent",
                    vec![
                        ("health_insurance", number("Health insurance")),
                        ("accident_insurance", number("Accident insurance")),
                        ("parental_benefits", number("Maternity or paternity benefits")),
                    ],
                ),
            ),
            (
                "worker_well_being_coverage",
                section(
                    "Share of workers covered by well-being measures, in percent",
                    vec![
                        ("health_insurance", number("Health insurance")),
                        ("accident_insurance", number("Accident insurance")),
                        ("parental_benefits", number("Maternity or paternity benefits")),
                    ],
                ),
            ),
            (
                "well_being_cost",
                section(
                    "Spending on well-being measures",
                    vec![
                        ("amount", measurement("Amount spent")),
                        ("percentage_of_revenue", number("Share of total revenue")),
                    ],
                ),
            ),
            (
                "wages_by_location",
                section(
                    "Share of job creation in smaller towns, in percent",
                    vec![
                        ("rural", number("Rural")),
                        ("semi_urban", number("Semi-urban")),
                        ("urban", number("Urban")),
                        ("metropolitan", number("Metropolitan")),
                    ],
                ),
            ),
            (
                "female_wage_share",
                section(
                    "Gross wages paid to women",
                    vec![("percentage_of_total_wages", number("Share of total wages"))],
                ),
            ),
        ]),
    )
}

fn governance_ethics_and_complaints() -> SchemaDescriptor {
    SchemaDescriptor::new(
        "GovernanceEthicsAndComplaints",
        object(vec![
            (
                "non_compliance_instances",
                section(
                    "Fines, penalties and settlements",
                    vec![
                        ("count", number("Number of instances")),
                        ("amount", measurement("Monetary value")),
                    ],
                ),
            ),
            (
                "disciplinary_actions_taken",
                section(
                    "Disciplinary actions for bribery or corruption",
                    vec![
                        ("directors", number("Directors")),
                        ("kmps", number("Key managerial personnel")),
                        ("employees", number("Employees")),
                        ("workers", number("Workers")),
                    ],
                ),
            ),
            (
                "consumer_complaints",
                section(
                    "Consumer complaints received",
                    vec![
                        ("received", number("Complaints received")),
                        ("pending_resolution", number("Complaints pending at year end")),
                    ],
                ),
            ),
            (
                "customer_data_breaches",
                section(
                    "Customer data breaches",
                    vec![
                        ("count", number("Number of breaches")),
                        ("percentage_involving_pii", number("Share involving personal data")),
                    ],
                ),
            ),
        ]),
    )
}

fn governance_structure_and_openness() -> SchemaDescriptor {
    SchemaDescriptor::new(
        "GovernanceStructureAndOpenness",
        object(vec![
            ("diversity_in_governance", gender_split("Board and KMP composition by gender")),
            (
                "business_openness_purchase_concentration",
                section(
                    "Concentration of purchases, in percent",
                    vec![
                        ("from_trading_houses", number("Purchases from trading houses")),
                        ("top_ten_trading_houses", number("Purchases from the top ten trading houses")),
                    ],
                ),
            ),
            (
                "business_openness_sales_concentration",
                section(
                    "Concentration of sales, in percent",
                    vec![
                        ("to_dealers", number("Sales to dealers or distributors")),
                        ("top_ten_dealers", number("Sales to the top ten dealers")),
                    ],
                ),
            ),
            (
                "related_party_transactions_share",
                section(
                    "Related party transactions as share of totals, in percent",
                    vec![
                        ("purchases", number("Share of purchases")),
                        ("sales", number("Share of sales")),
                        ("loans_and_advances", number("Share of loans and advances")),
                        ("investments", number("Share of investments")),
                    ],
                ),
            ),
        ]),
    )
}

fn materiality_assessment() -> SchemaDescriptor {
    let topic = json!({
        "type": "object",
        "properties": {
            "topic_name": {"type": "string", "description": "Name of the material topic"},
            "business_relevance_score": {
                "type": "number",
                "description": "Importance to the business on a 0 to 5 scale"
            },
            "stakeholder_priority_score": {
                "type": "number",
                "description": "Importance to stakeholders on a 0 to 5 scale"
            },
            "topic_importance_summary": {
                "type": "string",
                "description": "Why the topic matters, in one or two sentences"
            }
        },
        "required": ["topic_name", "business_relevance_score", "stakeholder_priority_score"]
    });

    SchemaDescriptor::new(
        "MaterialityAssessment",
        object(vec![(
            "material_topics",
            json!({
                "type": "array",
                "description": "Material topics with their position on the materiality matrix",
                "items": topic
            }),
        )]),
    )
}
