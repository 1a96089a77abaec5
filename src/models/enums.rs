use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($s => Ok(Self::$variant)),+,
                    other => Err(format!(
                        "unknown {} {:?} (expected one of: {})",
                        stringify!($name),
                        other,
                        [$($s),+].join(", ")
                    )),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(AppVariant {
    Personal => "personal",
    MultiOperator => "multi_operator",
    Admin => "admin",
});

str_enum!(ScanSource {
    Camera => "camera",
    Upload => "upload",
    Manual => "manual",
});

str_enum!(CodeBoundary {
    Plain => "plain",
    Word => "word",
});

/// Partition used by the admin variant and as the target of legacy repairs.
pub const GENERAL_PARTITION: &str = "general";

/// Partition used when the identifying key is empty.
pub const UNKNOWN_PARTITION: &str = "unknown";

impl Default for AppVariant {
    fn default() -> Self {
        Self::Personal
    }
}

impl AppVariant {
    /// Only the personal variant gates scanning behind a users.csv login.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Personal)
    }

    /// Variants where every record names the operator taking the part.
    pub fn requires_operator(&self) -> bool {
        matches!(self, Self::MultiOperator | Self::Admin)
    }

    pub fn warns_on_ambiguous_code(&self) -> bool {
        matches!(self, Self::MultiOperator)
    }

    pub fn default_code_boundary(&self) -> CodeBoundary {
        match self {
            Self::Personal => CodeBoundary::Plain,
            Self::MultiOperator | Self::Admin => CodeBoundary::Word,
        }
    }

    /// Storage partition key for a record.
    ///
    /// Personal files follow the logged-in user, multi-operator files follow
    /// the operator, admin writes everything to one shared partition.
    pub fn partition_for(&self, session_user: &str, operator_id: &str) -> String {
        let raw = match self {
            Self::Personal => session_user,
            Self::MultiOperator => operator_id,
            Self::Admin => GENERAL_PARTITION,
        };
        sanitize_partition(raw)
    }
}

/// Reduce a partition key to characters safe in a file name.
pub fn sanitize_partition(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect();
    if cleaned.is_empty() {
        UNKNOWN_PARTITION.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_round_trips_through_str() {
        for variant in [AppVariant::Personal, AppVariant::MultiOperator, AppVariant::Admin] {
            assert_eq!(variant.as_str().parse::<AppVariant>().unwrap(), variant);
        }
        assert_eq!(" Admin ".parse::<AppVariant>().unwrap(), AppVariant::Admin);
    }

    #[test]
    fn unknown_variant_lists_choices() {
        let err = "kiosk".parse::<AppVariant>().unwrap_err();
        assert!(err.contains("personal, multi_operator, admin"));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&AppVariant::MultiOperator).unwrap();
        assert_eq!(json, "\"multi_operator\"");
        let source: ScanSource = serde_json::from_str("\"camera\"").unwrap();
        assert_eq!(source, ScanSource::Camera);
    }

    #[test]
    fn partition_follows_variant() {
        assert_eq!(AppVariant::Personal.partition_for("100200", "300400"), "100200");
        assert_eq!(AppVariant::MultiOperator.partition_for("100200", "300400"), "300400");
        assert_eq!(AppVariant::Admin.partition_for("100200", "300400"), "general");
    }

    #[test]
    fn empty_partition_becomes_unknown() {
        assert_eq!(AppVariant::Personal.partition_for("", "300400"), "unknown");
        assert_eq!(sanitize_partition("  "), "unknown");
    }

    #[test]
    fn partition_strips_path_characters() {
        assert_eq!(sanitize_partition("../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_partition("op_12-a"), "op_12-a");
    }

    #[test]
    fn only_multi_operator_warns_on_ambiguity() {
        assert!(AppVariant::MultiOperator.warns_on_ambiguous_code());
        assert!(!AppVariant::Personal.warns_on_ambiguous_code());
        assert!(!AppVariant::Admin.warns_on_ambiguous_code());
    }
}
