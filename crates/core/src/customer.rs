use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

/// Customer tier used for retention-offer selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Premium,
    Regular,
    New,
}

impl Tier {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "premium" => Some(Self::Premium),
            "regular" => Some(Self::Regular),
            "new" => Some(Self::New),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Premium => "premium",
            Self::Regular => "regular",
            Self::New => "new",
        }
    }

    /// Key used by the retention rule tables.
    pub fn rule_key(&self) -> &'static str {
        match self {
            Self::Premium => "premium_customers",
            Self::Regular => "regular_customers",
            Self::New => "new_customers",
        }
    }
}

/// One row of the customer directory. Columns beyond the well-known ones
/// (`customer_id`, `email`, `tier`) are carried through verbatim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomerRecord {
    fields: BTreeMap<String, String>,
}

impl CustomerRecord {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { fields: pairs.into_iter().collect() }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.get("customer_id")
    }

    pub fn email(&self) -> Option<&str> {
        self.get("email")
    }

    pub fn tier(&self) -> Option<Tier> {
        self.get("tier").and_then(Tier::parse)
    }

    /// Tool-result payload: the full record merged with `found: true`.
    pub fn to_tool_result(&self) -> Value {
        let mut out = Map::new();
        out.insert("found".to_string(), Value::Bool(true));
        for (key, value) in &self.fields {
            out.insert(key.clone(), Value::String(value.clone()));
        }
        Value::Object(out)
    }

    /// Parse a lookup tool result back into a record. `None` unless the
    /// payload carries `found: true`.
    pub fn from_tool_result(result: &Value) -> Option<Self> {
        let object = result.as_object()?;
        if object.get("found") != Some(&Value::Bool(true)) {
            return None;
        }
        let fields = object
            .iter()
            .filter(|(key, _)| key.as_str() != "found")
            .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect();
        Some(Self { fields })
    }

    /// One-line rendering for the synthetic "Customer profile:" context
    /// message injected ahead of the history.
    pub fn context_line(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// In-memory customer directory. Loaded once at startup, read-only after.
#[derive(Clone, Debug, Default)]
pub struct CustomerDirectory {
    records: Vec<CustomerRecord>,
}

impl CustomerDirectory {
    /// Load from CSV. A missing file yields an empty directory, not an
    /// error; a malformed row is skipped.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::warn!(
                event_name = "resources.customers.missing",
                path = %path.display(),
                "customer directory not found, starting empty"
            );
            return Self::default();
        }
        let mut reader = match csv::Reader::from_path(path) {
            Ok(reader) => reader,
            Err(error) => {
                tracing::warn!(
                    event_name = "resources.customers.unreadable",
                    path = %path.display(),
                    error = %error,
                    "customer directory unreadable, starting empty"
                );
                return Self::default();
            }
        };

        let headers = match reader.headers() {
            Ok(headers) => headers.clone(),
            Err(_) => return Self::default(),
        };
        let records = reader
            .records()
            .filter_map(Result::ok)
            .map(|row| {
                CustomerRecord::from_pairs(
                    headers
                        .iter()
                        .zip(row.iter())
                        .map(|(header, value)| (header.to_string(), value.to_string()))
                        .collect(),
                )
            })
            .collect();
        Self { records }
    }

    pub fn from_records(records: Vec<CustomerRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find_by_id(&self, customer_id: &str) -> Option<&CustomerRecord> {
        let needle = customer_id.trim().to_lowercase();
        self.records
            .iter()
            .find(|r| r.customer_id().map(|id| id.trim().to_lowercase()) == Some(needle.clone()))
    }

    pub fn find_by_email(&self, email: &str) -> Option<&CustomerRecord> {
        let needle = email.trim().to_lowercase();
        self.records
            .iter()
            .find(|r| r.email().map(|e| e.trim().to_lowercase()) == Some(needle.clone()))
    }

    /// Example identifiers for lookup-miss diagnostics.
    pub fn example_identifiers(&self) -> Vec<String> {
        let mut examples: Vec<String> =
            self.records.iter().take(2).filter_map(|r| r.email().map(str::to_string)).collect();
        if let Some(id) = self.records.first().and_then(CustomerRecord::customer_id) {
            examples.push(id.to_string());
        }
        examples
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{CustomerDirectory, CustomerRecord, Tier};

    fn directory_fixture() -> (tempfile::TempDir, CustomerDirectory) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "customer_id,name,email,tier,plan_type,device").unwrap();
        writeln!(file, "CUST_001,Sarah Chen,sarah.chen@email.com,premium,care_plus,Nova X2").unwrap();
        writeln!(file, "CUST_002,Marcus Webb,marcus.webb@email.com,regular,basic,Nova X1").unwrap();
        let directory = CustomerDirectory::load(&path);
        (dir, directory)
    }

    #[test]
    fn loads_rows_with_passthrough_columns() {
        let (_guard, directory) = directory_fixture();
        assert_eq!(directory.len(), 2);
        let record = directory.find_by_id("CUST_001").unwrap();
        assert_eq!(record.get("device"), Some("Nova X2"));
        assert_eq!(record.tier(), Some(Tier::Premium));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let (_guard, directory) = directory_fixture();
        assert!(directory.find_by_id("cust_001").is_some());
        assert!(directory.find_by_email("SARAH.CHEN@EMAIL.COM").is_some());
        assert!(directory.find_by_email("nobody@email.com").is_none());
    }

    #[test]
    fn missing_file_yields_empty_directory() {
        let directory = CustomerDirectory::load(std::path::Path::new("/nonexistent/customers.csv"));
        assert!(directory.is_empty());
    }

    #[test]
    fn tool_result_round_trip() {
        let (_guard, directory) = directory_fixture();
        let record = directory.find_by_id("CUST_002").unwrap();
        let payload = record.to_tool_result();
        assert_eq!(payload["found"], true);
        assert_eq!(payload["email"], "marcus.webb@email.com");

        let parsed = CustomerRecord::from_tool_result(&payload).unwrap();
        assert_eq!(&parsed, record);
    }

    #[test]
    fn not_found_payload_does_not_parse() {
        let payload = serde_json::json!({"found": false, "message": "no such customer"});
        assert!(CustomerRecord::from_tool_result(&payload).is_none());
    }

    #[test]
    fn tier_parse_rejects_unknown_values() {
        assert_eq!(Tier::parse(" Premium "), Some(Tier::Premium));
        assert_eq!(Tier::parse("gold"), None);
        assert_eq!(Tier::Regular.rule_key(), "regular_customers");
    }
}
