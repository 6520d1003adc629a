use std::fmt::Display;

use thiserror::Error;

pub const PAYMENTS_FIELD: &str = "payments";
pub const SUBSCRIPTIONS_FIELD: &str = "subscriptions";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("owner path must be `<collection>/<documentId>`, got `{0}`")]
    InvalidOwnerPath(String),
    #[error("external reference must have 2 to 4 non-empty segments, got `{0}`")]
    InvalidExternalReference(String),
}

/// Location of an owner document: exactly one collection segment and one id segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerPath {
    collection: String,
    document_id: String,
}

impl OwnerPath {
    pub fn new(collection: &str, document_id: &str) -> Result<Self, ReferenceError> {
        if !valid_segment(collection) || !valid_segment(document_id) {
            return Err(ReferenceError::InvalidOwnerPath(format!(
                "{collection}/{document_id}"
            )));
        }
        Ok(Self {
            collection: collection.to_string(),
            document_id: document_id.to_string(),
        })
    }

    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let segments: Vec<&str> = raw.trim().split('/').collect();
        match segments.as_slice() {
            [collection, document_id] => Self::new(collection, document_id)
                .map_err(|_| ReferenceError::InvalidOwnerPath(raw.to_string())),
            _ => Err(ReferenceError::InvalidOwnerPath(raw.to_string())),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// `<owner>/<field>/<recordId>`, the back-reference stamped on gateway records.
    pub fn record_reference(&self, field: &str, record_id: &str) -> ExternalReference {
        ExternalReference {
            owner: self.clone(),
            field: Some(field.to_string()),
            record_id: Some(record_id.to_string()),
        }
    }
}

impl Display for OwnerPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.document_id)
    }
}

/// Path-encoded routing key carried by gateway records:
/// `<collection>/<documentId>[/<field>[/<recordId>]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    owner: OwnerPath,
    field: Option<String>,
    record_id: Option<String>,
}

impl ExternalReference {
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let invalid = || ReferenceError::InvalidExternalReference(raw.to_string());
        let segments: Vec<&str> = raw.trim().split('/').collect();
        if segments.len() < 2 || segments.len() > 4 || !segments.iter().all(|s| valid_segment(s))
        {
            return Err(invalid());
        }

        Ok(Self {
            owner: OwnerPath::new(segments[0], segments[1]).map_err(|_| invalid())?,
            field: segments.get(2).map(|s| s.to_string()),
            record_id: segments.get(3).map(|s| s.to_string()),
        })
    }

    pub fn owner(&self) -> &OwnerPath {
        &self.owner
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl Display for ExternalReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.owner)?;
        if let Some(field) = &self.field {
            write!(f, "/{field}")?;
        }
        if let Some(record_id) = &self.record_id {
            write!(f, "/{record_id}")?;
        }
        Ok(())
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.trim() == segment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_segment_reference_is_split_into_owner_field_and_record() {
        let reference = ExternalReference::parse("clients/c1/payments/pay_1").unwrap();
        assert_eq!(reference.owner().to_string(), "clients/c1");
        assert_eq!(reference.owner().collection(), "clients");
        assert_eq!(reference.field(), Some("payments"));
        assert_eq!(reference.to_string(), "clients/c1/payments/pay_1");
    }

    #[test]
    fn owner_only_reference_is_accepted() {
        let reference = ExternalReference::parse("clients/c1").unwrap();
        assert_eq!(reference.field(), None);
        assert_eq!(reference.to_string(), "clients/c1");
    }

    #[test]
    fn malformed_references_are_rejected() {
        for raw in [
            "",
            "clients",
            "clients//payments/pay_1",
            "clients/c1/payments/pay_1/extra",
            "/c1/payments",
        ] {
            assert!(
                ExternalReference::parse(raw).is_err(),
                "expected `{raw}` to be rejected"
            );
        }
    }

    #[test]
    fn record_reference_encodes_four_segments() {
        let owner = OwnerPath::parse("clients/c1").unwrap();
        assert_eq!(
            owner.record_reference(SUBSCRIPTIONS_FIELD, "sub_9").to_string(),
            "clients/c1/subscriptions/sub_9"
        );
    }

    #[test]
    fn owner_path_requires_exactly_two_segments() {
        assert!(OwnerPath::parse("clients").is_err());
        assert!(OwnerPath::parse("clients/c1/payments").is_err());
        assert!(OwnerPath::parse("clients/c1").is_ok());
    }
}
