//! ACL rule model and the baseline grant table

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource name Kafka uses for cluster-level ACLs
pub const CLUSTER_RESOURCE_NAME: &str = "kafka-cluster";

/// Wildcard resource name / host
pub const WILDCARD: &str = "*";

/// ACL permission type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclPermission {
    Allow,
}

impl AclPermission {
    /// Kafka protocol code
    pub fn code(self) -> i8 {
        match self {
            AclPermission::Allow => 3,
        }
    }
}

/// ACL operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclOperation {
    All,
    Read,
}

impl AclOperation {
    pub fn code(self) -> i8 {
        match self {
            AclOperation::All => 2,
            AclOperation::Read => 3,
        }
    }
}

/// ACL resource type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclResourceType {
    Cluster,
    Topic,
    Group,
}

impl AclResourceType {
    pub fn code(self) -> i8 {
        match self {
            AclResourceType::Topic => 2,
            AclResourceType::Group => 3,
            AclResourceType::Cluster => 4,
        }
    }
}

/// ACL resource pattern type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclPatternType {
    Literal,
    Prefixed,
}

impl AclPatternType {
    pub fn code(self) -> i8 {
        match self {
            AclPatternType::Literal => 3,
            AclPatternType::Prefixed => 4,
        }
    }
}

/// A single authorization grant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclRule {
    pub principal: String,
    pub permission: AclPermission,
    pub operation: AclOperation,
    pub resource_type: AclResourceType,
    pub pattern_type: AclPatternType,
    pub resource_name: String,
    pub host: String,
}

impl fmt::Display for AclRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} {:?} on {:?}:{:?}:{} from {}",
            self.permission,
            self.principal,
            self.operation,
            self.resource_type,
            self.pattern_type,
            self.resource_name,
            self.host
        )
    }
}

/// Row of the baseline table; the principal is filled in per call
#[derive(Clone, Copy, Debug)]
pub struct BaselineGrant {
    pub resource_type: AclResourceType,
    pub pattern_type: AclPatternType,
    pub resource_name: &'static str,
    pub operation: AclOperation,
}

/// Grants provisioned for an administrative principal
pub const BASELINE_GRANTS: [BaselineGrant; 5] = [
    BaselineGrant {
        resource_type: AclResourceType::Cluster,
        pattern_type: AclPatternType::Literal,
        resource_name: CLUSTER_RESOURCE_NAME,
        operation: AclOperation::All,
    },
    BaselineGrant {
        resource_type: AclResourceType::Topic,
        pattern_type: AclPatternType::Literal,
        resource_name: WILDCARD,
        operation: AclOperation::All,
    },
    BaselineGrant {
        resource_type: AclResourceType::Topic,
        pattern_type: AclPatternType::Prefixed,
        resource_name: WILDCARD,
        operation: AclOperation::All,
    },
    BaselineGrant {
        resource_type: AclResourceType::Group,
        pattern_type: AclPatternType::Literal,
        resource_name: WILDCARD,
        operation: AclOperation::All,
    },
    BaselineGrant {
        resource_type: AclResourceType::Group,
        pattern_type: AclPatternType::Prefixed,
        resource_name: WILDCARD,
        operation: AclOperation::All,
    },
];

/// Expand the baseline table for `principal`
pub fn baseline_rules(principal: &str) -> Vec<AclRule> {
    BASELINE_GRANTS
        .iter()
        .map(|grant| AclRule {
            principal: principal.to_string(),
            permission: AclPermission::Allow,
            operation: grant.operation,
            resource_type: grant.resource_type,
            pattern_type: grant.pattern_type,
            resource_name: grant.resource_name.to_string(),
            host: WILDCARD.to_string(),
        })
        .collect()
}

/// Per-entry rejection reported by the data plane
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRejection {
    pub error_code: i16,
    pub message: String,
}

impl fmt::Display for GrantRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (error code {})", self.message, self.error_code)
    }
}

/// Outcome of one submitted rule, in submission order
pub type GrantOutcome = std::result::Result<(), GrantRejection>;

/// A rule the data plane did not apply
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantFailure {
    /// 1-based position in the submitted batch
    pub entry: usize,
    pub rule: AclRule,
    pub rejection: GrantRejection,
}

impl fmt::Display for GrantFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry {} [{}]: {}", self.entry, self.rule, self.rejection)
    }
}
